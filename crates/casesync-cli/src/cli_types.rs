use casesync_runtime::AiProvider;
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliAiProvider {
    Openai,
    Claude,
}

impl From<CliAiProvider> for AiProvider {
    fn from(value: CliAiProvider) -> Self {
        match value {
            CliAiProvider::Openai => AiProvider::OpenAi,
            CliAiProvider::Claude => AiProvider::Claude,
        }
    }
}
