use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use casesync_core::{RetryPolicy, DEFAULT_MAX_WAIT_MS};
use casesync_runtime::{AiProviderSettings, CaseSyncRuntimeConfig, RepoRef};
use casesync_support::CaseFilter;

use crate::{Cli, CliCommand};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Flow selected on the command line with its required inputs.
pub enum CaseSyncCommand {
    Create {
        issue_number: u64,
        issue_body: String,
    },
    Reply {
        issue_number: u64,
        comment_body: String,
    },
    Monitor {
        issue_number: Option<u64>,
    },
}

impl CaseSyncCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Reply { .. } => "reply",
            Self::Monitor { .. } => "monitor",
        }
    }

    /// Issue that receives failure notices, when one is known.
    pub fn notice_issue(&self) -> Option<u64> {
        match self {
            Self::Create { issue_number, .. } | Self::Reply { issue_number, .. } => {
                Some(*issue_number)
            }
            Self::Monitor { issue_number } => *issue_number,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseSyncInvocation {
    pub command: CaseSyncCommand,
    pub runtime: CaseSyncRuntimeConfig,
}

pub fn default_credentials_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".aws").join("credentials"),
        None => PathBuf::from(".aws").join("credentials"),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Validates parsed arguments and builds the single configuration value the
/// runtime is constructed from.
pub fn build_invocation(cli: &Cli) -> Result<CaseSyncInvocation> {
    let repository = non_empty(cli.repository.as_deref())
        .ok_or_else(|| anyhow!("--repository (GITHUB_REPOSITORY) is required"))?;
    let repo = RepoRef::parse(repository)?;

    let command = match cli.command {
        CliCommand::Create => CaseSyncCommand::Create {
            issue_number: require_issue_number(cli, "create")?,
            issue_body: cli
                .issue_body
                .clone()
                .filter(|body| !body.trim().is_empty())
                .ok_or_else(|| anyhow!("create requires --issue-body (ISSUE_BODY)"))?,
        },
        CliCommand::Reply => CaseSyncCommand::Reply {
            issue_number: require_issue_number(cli, "reply")?,
            comment_body: cli
                .comment_body
                .clone()
                .ok_or_else(|| anyhow!("reply requires --comment-body (COMMENT_BODY)"))?,
        },
        CliCommand::Monitor => CaseSyncCommand::Monitor {
            issue_number: cli.issue_number,
        },
    };

    let ai_provider = match (non_empty(cli.ai_api_key.as_deref()), cli.ai_provider) {
        (Some(api_key), Some(provider)) => Some(AiProviderSettings {
            provider: provider.into(),
            api_key: api_key.to_string(),
        }),
        (None, None) => None,
        (Some(_), None) => bail!("--ai-api-key requires --ai-provider (openai or claude)"),
        (None, Some(_)) => bail!("--ai-provider requires --ai-api-key (AI_API_KEY)"),
    };

    let github_token = non_empty(cli.github_token.as_deref()).map(ToOwned::to_owned);
    if github_token.is_none() && !cli.mock {
        bail!("--github-token (GITHUB_TOKEN) is required unless --mock is set");
    }

    let runtime = CaseSyncRuntimeConfig {
        repo_slug: repo.as_slug(),
        github_api_base: cli.github_api_base.trim().to_string(),
        github_token,
        mock_mode: cli.mock,
        aws_profile: cli.aws_profile.trim().to_string(),
        aws_credentials_path: cli
            .aws_credentials_file
            .clone()
            .unwrap_or_else(default_credentials_path),
        support_endpoint: non_empty(cli.support_endpoint.as_deref()).map(ToOwned::to_owned),
        support_region: cli.support_region.trim().to_string(),
        state_path: cli.state_file.clone(),
        retry_policy: RetryPolicy {
            max_retries: cli.max_retries,
            base_delay_ms: cli.retry_base_delay_ms,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
        },
        request_timeout_ms: cli.request_timeout_ms,
        describe_filter: CaseFilter::default(),
        ai_provider,
    };
    Ok(CaseSyncInvocation { command, runtime })
}

fn require_issue_number(cli: &Cli, command: &str) -> Result<u64> {
    cli.issue_number
        .ok_or_else(|| anyhow!("{command} requires --issue-number (ISSUE_NUMBER)"))
}
