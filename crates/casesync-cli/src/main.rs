mod bootstrap_helpers;

use std::process::ExitCode;

use anyhow::Result;
use casesync_cli::{build_invocation, CaseSyncCommand, Cli};
use casesync_runtime::{is_rate_limit_failure, CaseSyncRuntime, ReplyOutcome};
use clap::Parser;
use serde_json::json;

use bootstrap_helpers::init_tracing;

const EXIT_FAILURE: u8 = 1;
const EXIT_RATE_LIMITED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run_cli(cli).await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Configuration errors are returned as `Err`. Flow failures post a
/// best-effort notice to the issue and map to an exit code.
async fn run_cli(cli: Cli) -> Result<ExitCode> {
    let invocation = build_invocation(&cli)?;
    let runtime = CaseSyncRuntime::new(invocation.runtime)?;
    let command = invocation.command;

    match run_command(&runtime, &command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(error) => {
            let rate_limited = is_rate_limit_failure(&error);
            tracing::error!(command = command.name(), rate_limited, "{error:#}");
            match command.notice_issue() {
                Some(issue_number) => {
                    runtime
                        .notify_failure(issue_number, command.name(), &error)
                        .await;
                }
                None if rate_limited => {
                    let posted = runtime.notify_linked_issues(command.name(), &error).await;
                    tracing::info!(command = command.name(), posted, "rate-limit notices posted");
                }
                None => {
                    tracing::warn!(
                        command = command.name(),
                        "no issue number given, skipping failure notice"
                    );
                }
            }
            Ok(ExitCode::from(if rate_limited {
                EXIT_RATE_LIMITED
            } else {
                EXIT_FAILURE
            }))
        }
    }
}

async fn run_command(runtime: &CaseSyncRuntime, command: &CaseSyncCommand) -> Result<()> {
    match command {
        CaseSyncCommand::Create {
            issue_number,
            issue_body,
        } => {
            let created = runtime
                .create_case_from_issue(*issue_number, issue_body)
                .await?;
            println!(
                "{}",
                json!({
                    "command": "create",
                    "issue_number": issue_number,
                    "case_id": created.case_id,
                    "display_id": created.display_id,
                })
            );
        }
        CaseSyncCommand::Reply {
            issue_number,
            comment_body,
        } => {
            let payload = match runtime.relay_reply(*issue_number, comment_body).await? {
                ReplyOutcome::NoCommand => json!({
                    "command": "reply",
                    "issue_number": issue_number,
                    "relayed": false,
                }),
                ReplyOutcome::Relayed {
                    case_id,
                    display_id,
                } => json!({
                    "command": "reply",
                    "issue_number": issue_number,
                    "relayed": true,
                    "case_id": case_id,
                    "display_id": display_id,
                }),
            };
            println!("{payload}");
        }
        CaseSyncCommand::Monitor { .. } => {
            let report = runtime.monitor_cases().await?;
            println!(
                "{}",
                json!({
                    "command": "monitor",
                    "polled_cases": report.polled_cases,
                    "changed_cases": report.changed_cases,
                    "notifications": report.notifications,
                    "posted": report.dispatch.posted,
                    "failed": report.dispatch.failed,
                    "rate_limited": report.dispatch.rate_limited,
                    "stored_snapshots": report.stored_snapshots,
                })
            );
        }
    }
    Ok(())
}
