//! Case sync runtime: create, reply, and monitor flows between the issue
//! tracker and the support-case service.
//!
//! Every invocation is one-shot. State is read from the snapshot store at the
//! start of a flow and written back only after the flow's computation has
//! succeeded.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use casesync_core::{
    current_unix_timestamp_ms, RateLimitSignal, RetryPolicy, RetryingRequestExecutor,
};
use casesync_issues::case_comment::{
    render_case_created_comment, render_error_comment, render_rate_limit_comment,
    render_reply_relayed_comment,
};
use casesync_issues::{extract_reply, parse_case_data};
use casesync_support::{
    CaseFilter, CreatedCase, LiveSupportCaseGateway, LiveSupportGatewayConfig,
    MockSupportCaseGateway, SupportApiError, SupportCaseGateway,
};

pub mod case_state_store;
pub mod change_detector;
pub mod github_api_client;
pub mod issue_tracker;
pub mod notification_dispatcher;

use case_state_store::{find_linked_case, link_created_case, CaseSnapshotStore, JsonFileCaseStore};
use change_detector::{detect_poll_changes, merge_poll_into_snapshots};
use github_api_client::{GithubIssueTracker, RepoRef};
use issue_tracker::{IssueTracker, RecordingIssueTracker, TrackerApiError};
use notification_dispatcher::{notifications_for_changes, DispatchReport, NotificationDispatcher};

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_STATE_PATH: &str = ".casesync/state.json";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    OpenAi,
    Claude,
}

impl AiProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Claude => "claude",
        }
    }
}

#[derive(Clone)]
/// AI provider selection. Accepted and validated at startup; no flow reads it.
pub struct AiProviderSettings {
    pub provider: AiProvider,
    pub api_key: String,
}

impl fmt::Debug for AiProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiProviderSettings")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
/// Resolved settings for one run, built once at the entry point.
pub struct CaseSyncRuntimeConfig {
    pub repo_slug: String,
    pub github_api_base: String,
    pub github_token: Option<String>,
    pub mock_mode: bool,
    pub aws_profile: String,
    pub aws_credentials_path: PathBuf,
    pub support_endpoint: Option<String>,
    pub support_region: String,
    pub state_path: PathBuf,
    pub retry_policy: RetryPolicy,
    pub request_timeout_ms: u64,
    pub describe_filter: CaseFilter,
    pub ai_provider: Option<AiProviderSettings>,
}

impl fmt::Debug for CaseSyncRuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaseSyncRuntimeConfig")
            .field("repo_slug", &self.repo_slug)
            .field("github_api_base", &self.github_api_base)
            .field(
                "github_token",
                &self.github_token.as_ref().map(|_| "<redacted>"),
            )
            .field("mock_mode", &self.mock_mode)
            .field("aws_profile", &self.aws_profile)
            .field("aws_credentials_path", &self.aws_credentials_path)
            .field("support_endpoint", &self.support_endpoint)
            .field("support_region", &self.support_region)
            .field("state_path", &self.state_path)
            .field("retry_policy", &self.retry_policy)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("describe_filter", &self.describe_filter)
            .field("ai_provider", &self.ai_provider)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The comment carried no reply command.
    NoCommand,
    Relayed { case_id: String, display_id: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorReport {
    pub polled_cases: usize,
    pub changed_cases: usize,
    pub notifications: usize,
    pub dispatch: DispatchReport,
    pub stored_snapshots: usize,
}

pub struct CaseSyncRuntime {
    config: CaseSyncRuntimeConfig,
    gateway: Arc<dyn SupportCaseGateway>,
    tracker: Arc<dyn IssueTracker>,
    store: Arc<dyn CaseSnapshotStore>,
    executor: RetryingRequestExecutor,
}

impl CaseSyncRuntime {
    /// Selects the gateway, tracker, and store implementations for `config`.
    pub fn new(config: CaseSyncRuntimeConfig) -> Result<Self> {
        let gateway: Arc<dyn SupportCaseGateway> = if config.mock_mode {
            Arc::new(MockSupportCaseGateway)
        } else {
            Arc::new(
                LiveSupportCaseGateway::new(LiveSupportGatewayConfig {
                    endpoint: config.support_endpoint.clone(),
                    region: config.support_region.clone(),
                    credentials_path: config.aws_credentials_path.clone(),
                    profile: config.aws_profile.clone(),
                    request_timeout_ms: config.request_timeout_ms,
                })
                .context("failed to configure support case gateway")?,
            )
        };

        let repo = RepoRef::parse(&config.repo_slug)?;
        let token = config
            .github_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty());
        let tracker: Arc<dyn IssueTracker> = match token {
            Some(token) => Arc::new(GithubIssueTracker::new(
                &config.github_api_base,
                token,
                repo,
                config.request_timeout_ms,
            )?),
            None if config.mock_mode => {
                tracing::info!("no tracker token in mock mode, recording comments locally");
                Arc::new(RecordingIssueTracker::default())
            }
            None => bail!("--github-token (GITHUB_TOKEN) is required unless --mock is set"),
        };

        let store = Arc::new(JsonFileCaseStore::new(config.state_path.clone()));
        let runtime = Self::with_components(config, gateway, tracker, store);
        let policy = runtime.executor.policy();
        tracing::info!(
            repo = %runtime.config.repo_slug,
            mode = runtime.gateway.mode_label(),
            state_path = %runtime.config.state_path.display(),
            max_retries = policy.max_retries,
            base_delay_ms = policy.base_delay_ms,
            ai_provider = runtime
                .config
                .ai_provider
                .as_ref()
                .map_or("none", |settings| settings.provider.as_str()),
            "case sync runtime ready"
        );
        Ok(runtime)
    }

    pub fn with_components(
        config: CaseSyncRuntimeConfig,
        gateway: Arc<dyn SupportCaseGateway>,
        tracker: Arc<dyn IssueTracker>,
        store: Arc<dyn CaseSnapshotStore>,
    ) -> Self {
        let executor = RetryingRequestExecutor::new(config.retry_policy);
        Self {
            config,
            gateway,
            tracker,
            store,
            executor,
        }
    }

    pub fn config(&self) -> &CaseSyncRuntimeConfig {
        &self.config
    }

    /// Creates a support case from an issue body, links it to the issue, and
    /// posts a confirmation comment.
    pub async fn create_case_from_issue(
        &self,
        issue_number: u64,
        issue_body: &str,
    ) -> Result<CreatedCase> {
        let case_data = parse_case_data(issue_body);
        if case_data.subject.trim().is_empty() {
            bail!("issue #{issue_number} body has no summary section");
        }
        tracing::info!(
            issue_number,
            mode = self.gateway.mode_label(),
            severity = %case_data.severity,
            service_code = %case_data.service_code,
            "creating support case"
        );

        let gateway = self.gateway.as_ref();
        let payload = &case_data;
        let created = self
            .executor
            .execute("create support case", move || gateway.create_case(payload))
            .await
            .context("failed to create support case")?;

        let mut snapshots = self.store.load_all();
        link_created_case(
            &mut snapshots,
            &created,
            &case_data.subject,
            issue_number,
            current_unix_timestamp_ms(),
        );
        self.store
            .save_all(&snapshots)
            .context("failed to persist case link")?;

        let confirmation = render_case_created_comment(&created, &case_data);
        self.post_with_retry(issue_number, &confirmation)
            .await
            .context("failed to post case confirmation")?;
        tracing::info!(
            issue_number,
            case_id = %created.case_id,
            display_id = %created.display_id,
            "support case created"
        );
        Ok(created)
    }

    /// Relays the `/reply` payload of `comment_body` to the case linked with
    /// the issue.
    pub async fn relay_reply(&self, issue_number: u64, comment_body: &str) -> Result<ReplyOutcome> {
        let Some(reply) = extract_reply(comment_body) else {
            tracing::info!(issue_number, "comment has no reply command, nothing to relay");
            return Ok(ReplyOutcome::NoCommand);
        };

        let snapshots = self.store.load_all();
        let Some(linked) = find_linked_case(&snapshots, issue_number) else {
            bail!("issue #{issue_number} has no linked support case");
        };
        let case_id = linked.case.case_id.clone();
        let display_id = linked.case.display_id.clone();

        let gateway = self.gateway.as_ref();
        let target = case_id.as_str();
        let text = reply.as_str();
        let receipt = self
            .executor
            .execute("add case communication", move || {
                gateway.add_communication_to_case(target, text)
            })
            .await
            .with_context(|| format!("failed to relay reply to support case {case_id}"))?;
        if !receipt.result {
            bail!("support service rejected the reply for case {case_id}");
        }

        let confirmation = render_reply_relayed_comment(&display_id, &case_id, &reply);
        self.post_with_retry(issue_number, &confirmation)
            .await
            .context("failed to post reply confirmation")?;
        tracing::info!(issue_number, case_id = %case_id, "reply relayed to support case");
        Ok(ReplyOutcome::Relayed {
            case_id,
            display_id,
        })
    }

    /// Polls cases, notifies linked issues about changes, and stores the new
    /// snapshots. Individual notification failures do not fail the run.
    pub async fn monitor_cases(&self) -> Result<MonitorReport> {
        let gateway = self.gateway.as_ref();
        let filter = &self.config.describe_filter;
        let polled = self
            .executor
            .execute("describe support cases", move || {
                gateway.describe_cases(filter)
            })
            .await
            .context("failed to describe support cases")?;

        let previous = self.store.load_all();
        let changes = detect_poll_changes(&previous, &polled);
        let notifications = notifications_for_changes(&changes);
        let dispatcher = NotificationDispatcher::new(self.tracker.clone(), self.executor.clone());
        let dispatch = dispatcher.dispatch(&notifications).await;

        let merged = merge_poll_into_snapshots(&previous, &polled, current_unix_timestamp_ms());
        self.store
            .save_all(&merged)
            .context("failed to persist case snapshots")?;

        let report = MonitorReport {
            polled_cases: polled.len(),
            changed_cases: changes.len(),
            notifications: notifications.len(),
            dispatch,
            stored_snapshots: merged.len(),
        };
        if dispatch.failed > 0 {
            tracing::warn!(
                failed = dispatch.failed,
                rate_limited = dispatch.rate_limited,
                posted = dispatch.posted,
                "some case notifications could not be posted"
            );
        }
        tracing::info!(
            polled = report.polled_cases,
            changed = report.changed_cases,
            posted = dispatch.posted,
            stored = report.stored_snapshots,
            "case monitor run complete"
        );
        Ok(report)
    }

    /// Posts an error or rate-limit notice for a failed flow. Best effort: a
    /// failure to post is logged and never returned.
    pub async fn notify_failure(
        &self,
        issue_number: u64,
        operation: &str,
        error: &anyhow::Error,
    ) -> bool {
        let message = format!("{error:#}");
        let body = if is_rate_limit_failure(error) {
            render_rate_limit_comment(operation, &message)
        } else {
            render_error_comment(operation, &message)
        };
        match self.tracker.post_comment(issue_number, &body).await {
            Ok(_) => true,
            Err(post_error) => {
                tracing::warn!(
                    issue_number,
                    operation,
                    error = %post_error,
                    "failed to post failure notice"
                );
                false
            }
        }
    }

    /// Posts a failure notice for `operation` to every issue linked in the
    /// stored snapshots. Used when the failed flow has no issue of its own.
    /// Returns how many notices were posted.
    pub async fn notify_linked_issues(&self, operation: &str, error: &anyhow::Error) -> usize {
        let mut issue_numbers = self
            .store
            .load_all()
            .iter()
            .filter_map(|snapshot| snapshot.issue_number)
            .collect::<Vec<_>>();
        issue_numbers.sort_unstable();
        issue_numbers.dedup();
        if issue_numbers.is_empty() {
            tracing::warn!(operation, "no linked issues to notify about the failure");
            return 0;
        }
        let mut posted = 0_usize;
        for issue_number in issue_numbers {
            if self.notify_failure(issue_number, operation, error).await {
                posted += 1;
            }
        }
        posted
    }

    async fn post_with_retry(
        &self,
        issue_number: u64,
        body: &str,
    ) -> Result<(), TrackerApiError> {
        let tracker = self.tracker.as_ref();
        self.executor
            .execute("create issue comment", move || {
                tracker.post_comment(issue_number, body)
            })
            .await
            .map(|_| ())
    }
}

/// True when any error in the chain is an upstream rate-limit signal.
pub fn is_rate_limit_failure(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<SupportApiError>()
            .is_some_and(|error| error.is_rate_limited())
            || cause
                .downcast_ref::<TrackerApiError>()
                .is_some_and(|error| error.is_rate_limited())
    })
}

#[cfg(test)]
mod tests;
