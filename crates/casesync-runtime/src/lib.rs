//! Runtime crate for the issue tracker / support case bridge.
//!
//! Wires the support-case gateway, the issue tracker, and the snapshot store
//! into the one-shot create, reply, and monitor flows.

pub mod case_sync_runtime;

pub use case_sync_runtime::case_state_store::{
    CaseSnapshot, CaseSnapshotStore, JsonFileCaseStore, CASE_STATE_SCHEMA_VERSION,
};
pub use case_sync_runtime::change_detector::{detect_case_changes, CaseChangeEvent};
pub use case_sync_runtime::github_api_client::{GithubIssueTracker, RepoRef};
pub use case_sync_runtime::issue_tracker::{
    IssueTracker, PostedComment, RecordedComment, RecordingIssueTracker, TrackerApiError,
};
pub use case_sync_runtime::notification_dispatcher::{DispatchReport, NotificationDispatcher};
pub use case_sync_runtime::{
    is_rate_limit_failure, AiProvider, AiProviderSettings, CaseSyncRuntime,
    CaseSyncRuntimeConfig, MonitorReport, ReplyOutcome, DEFAULT_GITHUB_API_BASE,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_STATE_PATH,
};
