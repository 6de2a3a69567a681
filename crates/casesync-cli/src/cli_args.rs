use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::CliAiProvider;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "casesync",
    about = "Synchronize issue tracker issues with support cases",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,

    #[arg(
        long = "issue-body",
        env = "ISSUE_BODY",
        global = true,
        help = "Issue body used to build the support case (create)"
    )]
    pub issue_body: Option<String>,

    #[arg(
        long = "comment-body",
        env = "COMMENT_BODY",
        global = true,
        help = "Issue comment scanned for a /reply command (reply)"
    )]
    pub comment_body: Option<String>,

    #[arg(
        long = "issue-number",
        env = "ISSUE_NUMBER",
        global = true,
        value_parser = parse_positive_u64,
        help = "Issue number that receives confirmations and failure notices"
    )]
    pub issue_number: Option<u64>,

    #[arg(
        long,
        env = "GITHUB_REPOSITORY",
        global = true,
        help = "Repository in owner/repo format"
    )]
    pub repository: Option<String>,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        global = true,
        hide_env_values = true,
        help = "Issue tracker access token. Optional in mock mode."
    )]
    pub github_token: Option<String>,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_URL",
        global = true,
        default_value = casesync_runtime::DEFAULT_GITHUB_API_BASE,
        help = "Issue tracker REST API base URL"
    )]
    pub github_api_base: String,

    #[arg(
        long = "ai-api-key",
        env = "AI_API_KEY",
        global = true,
        hide_env_values = true,
        help = "AI provider API key. Must be set together with --ai-provider."
    )]
    pub ai_api_key: Option<String>,

    #[arg(
        long = "ai-provider",
        env = "AI_PROVIDER",
        global = true,
        value_enum,
        help = "AI provider selector. Must be set together with --ai-api-key."
    )]
    pub ai_provider: Option<CliAiProvider>,

    #[arg(
        long = "aws-profile",
        env = "AWS_PROFILE",
        global = true,
        default_value = "default",
        help = "Profile read from the shared credentials file"
    )]
    pub aws_profile: String,

    #[arg(
        long = "aws-credentials-file",
        env = "AWS_SHARED_CREDENTIALS_FILE",
        global = true,
        help = "Shared credentials file. Defaults to ~/.aws/credentials."
    )]
    pub aws_credentials_file: Option<PathBuf>,

    #[arg(
        long = "support-endpoint",
        env = "CASESYNC_SUPPORT_ENDPOINT",
        global = true,
        help = "Overrides the support API endpoint URL"
    )]
    pub support_endpoint: Option<String>,

    #[arg(
        long = "support-region",
        env = "CASESYNC_SUPPORT_REGION",
        global = true,
        default_value = casesync_support::DEFAULT_SUPPORT_REGION,
        help = "Region used for the support API endpoint and request signing"
    )]
    pub support_region: String,

    #[arg(
        long = "mock",
        env = "MOCK_MODE",
        global = true,
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Replace support API calls with deterministic fixtures"
    )]
    pub mock: bool,

    #[arg(
        long = "state-file",
        env = "CASESYNC_STATE_FILE",
        global = true,
        default_value = casesync_runtime::DEFAULT_STATE_PATH,
        help = "Case snapshot state file"
    )]
    pub state_file: PathBuf,

    #[arg(
        long = "max-retries",
        env = "CASESYNC_MAX_RETRIES",
        global = true,
        default_value_t = casesync_core::DEFAULT_MAX_RETRIES,
        help = "Retries after a rate-limited call before giving up"
    )]
    pub max_retries: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "CASESYNC_RETRY_BASE_DELAY_MS",
        global = true,
        default_value_t = casesync_core::DEFAULT_BASE_DELAY_MS,
        value_parser = parse_positive_u64,
        help = "First backoff delay in milliseconds, doubled per retry"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long = "request-timeout-ms",
        env = "CASESYNC_REQUEST_TIMEOUT_MS",
        global = true,
        default_value_t = casesync_runtime::DEFAULT_REQUEST_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        help = "Per-request HTTP timeout in milliseconds"
    )]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CliCommand {
    /// Create a support case from the issue body.
    Create,
    /// Relay a /reply comment to the case linked with the issue.
    Reply,
    /// Poll cases and post change notifications to linked issues.
    Monitor,
}
