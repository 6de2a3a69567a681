use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use casesync_core::RetryPolicy;
use casesync_support::{
    Case, CaseData, CaseFilter, CaseStatus, Communication, CommunicationReceipt, CreatedCase,
    SupportApiError, SupportCaseGateway,
};

use super::case_state_store::{CaseSnapshot, CaseSnapshotStore};
use super::issue_tracker::{IssueTracker, PostedComment, RecordingIssueTracker, TrackerApiError};
use super::{
    is_rate_limit_failure, AiProvider, CaseSyncRuntime, CaseSyncRuntimeConfig, ReplyOutcome,
    DEFAULT_GITHUB_API_BASE,
};

const ISSUE_BODY: &str = "### Summary\nDisk full on primary volume\n\n### Details\nWrites fail since 09:00.\n\n### Severity\nHigh\n\n### Target service\nEC2\n";

#[derive(Default)]
struct ScriptedGateway {
    polls: Mutex<VecDeque<Vec<Case>>>,
    create_throttles: AtomicUsize,
    create_calls: AtomicUsize,
    communications: Mutex<Vec<(String, String)>>,
}

impl ScriptedGateway {
    fn with_polls(polls: Vec<Vec<Case>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SupportCaseGateway for ScriptedGateway {
    fn mode_label(&self) -> &'static str {
        "scripted"
    }

    async fn create_case(&self, _case_data: &CaseData) -> Result<CreatedCase, SupportApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let throttled = self
            .create_throttles
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if throttled {
            return Err(SupportApiError::RateLimited {
                status: 400,
                classification: "ThrottlingException".to_string(),
                message: "Rate exceeded".to_string(),
                retry_after: None,
            });
        }
        Ok(CreatedCase {
            case_id: "case-1".to_string(),
            display_id: "1001".to_string(),
        })
    }

    async fn describe_cases(&self, _filter: &CaseFilter) -> Result<Vec<Case>, SupportApiError> {
        Ok(self
            .polls
            .lock()
            .expect("polls lock")
            .pop_front()
            .unwrap_or_default())
    }

    async fn add_communication_to_case(
        &self,
        case_id: &str,
        body: &str,
    ) -> Result<CommunicationReceipt, SupportApiError> {
        self.communications
            .lock()
            .expect("communications lock")
            .push((case_id.to_string(), body.to_string()));
        Ok(CommunicationReceipt { result: true })
    }
}

#[derive(Default)]
struct InMemoryStore {
    snapshots: Mutex<Vec<CaseSnapshot>>,
    saves: AtomicUsize,
}

impl InMemoryStore {
    fn seeded(snapshots: Vec<CaseSnapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots),
            saves: AtomicUsize::new(0),
        }
    }

    fn snapshot_ids(&self) -> Vec<String> {
        self.snapshots
            .lock()
            .expect("store lock")
            .iter()
            .map(|snapshot| snapshot.case.case_id.clone())
            .collect()
    }
}

impl CaseSnapshotStore for InMemoryStore {
    fn load_all(&self) -> Vec<CaseSnapshot> {
        self.snapshots.lock().expect("store lock").clone()
    }

    fn save_all(&self, snapshots: &[CaseSnapshot]) -> anyhow::Result<()> {
        *self.snapshots.lock().expect("store lock") = snapshots.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct RejectingTracker;

#[async_trait]
impl IssueTracker for RejectingTracker {
    async fn post_comment(
        &self,
        _issue_number: u64,
        _body: &str,
    ) -> Result<PostedComment, TrackerApiError> {
        Err(TrackerApiError::Upstream {
            operation: "create issue comment".to_string(),
            status: 403,
            classification: "http_403".to_string(),
            message: "Resource not accessible by integration".to_string(),
        })
    }
}

fn test_config(mock_mode: bool, github_token: Option<&str>) -> CaseSyncRuntimeConfig {
    CaseSyncRuntimeConfig {
        repo_slug: "owner/repo".to_string(),
        github_api_base: DEFAULT_GITHUB_API_BASE.to_string(),
        github_token: github_token.map(ToOwned::to_owned),
        mock_mode,
        aws_profile: "default".to_string(),
        aws_credentials_path: PathBuf::from("/nonexistent/credentials"),
        support_endpoint: None,
        support_region: "us-east-1".to_string(),
        state_path: PathBuf::from("/nonexistent/state.json"),
        retry_policy: RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
            max_wait_ms: 1,
        },
        request_timeout_ms: 2_000,
        describe_filter: CaseFilter::default(),
        ai_provider: None,
    }
}

fn runtime_with(
    gateway: Arc<ScriptedGateway>,
    tracker: Arc<dyn IssueTracker>,
    store: Arc<InMemoryStore>,
) -> CaseSyncRuntime {
    CaseSyncRuntime::with_components(test_config(true, None), gateway, tracker, store)
}

fn linked_snapshot(case_id: &str, issue_number: u64, observed: bool) -> CaseSnapshot {
    CaseSnapshot {
        case: Case {
            case_id: case_id.to_string(),
            display_id: format!("D-{case_id}"),
            subject: "Disk full".to_string(),
            status: CaseStatus::Opened,
            recent_communications: Vec::new(),
        },
        issue_number: Some(issue_number),
        last_observed_unix_ms: observed.then_some(1),
        linked_unix_ms: None,
    }
}

fn polled_case(case_id: &str, status: CaseStatus, times: &[&str]) -> Case {
    Case {
        case_id: case_id.to_string(),
        display_id: format!("D-{case_id}"),
        subject: "Disk full".to_string(),
        status,
        recent_communications: times
            .iter()
            .map(|time| Communication {
                body: format!("support message {time}"),
                time_created: time.to_string(),
                submitted_by: "agent@support".to_string(),
            })
            .collect(),
    }
}

#[test]
fn unit_new_requires_tracker_token_outside_mock_mode() {
    let error = CaseSyncRuntime::new(test_config(false, None))
        .err()
        .expect("token required");
    assert!(error.to_string().contains("--github-token"));

    assert!(CaseSyncRuntime::new(test_config(true, None)).is_ok());
    assert!(CaseSyncRuntime::new(test_config(false, Some("token"))).is_ok());

    let mut bad_repo = test_config(true, None);
    bad_repo.repo_slug = "not-a-repo".to_string();
    assert!(CaseSyncRuntime::new(bad_repo).is_err());
}

#[test]
fn unit_ai_provider_labels_match_selector_values() {
    assert_eq!(AiProvider::OpenAi.as_str(), "openai");
    assert_eq!(AiProvider::Claude.as_str(), "claude");
}

#[test]
fn unit_config_debug_redacts_secrets() {
    let rendered = format!("{:?}", test_config(false, Some("ghp_secret_value")));
    assert!(!rendered.contains("ghp_secret_value"));
    assert!(rendered.contains("<redacted>"));
}

#[tokio::test]
async fn functional_create_case_links_issue_and_posts_confirmation() {
    let gateway = Arc::new(ScriptedGateway::default());
    let tracker = Arc::new(RecordingIssueTracker::default());
    let store = Arc::new(InMemoryStore::default());
    let runtime = runtime_with(gateway.clone(), tracker.clone(), store.clone());

    let created = runtime
        .create_case_from_issue(7, ISSUE_BODY)
        .await
        .expect("create");
    assert_eq!(created.case_id, "case-1");

    let snapshots = store.load_all();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].issue_number, Some(7));
    assert_eq!(snapshots[0].case.subject, "Disk full on primary volume");
    assert_eq!(snapshots[0].last_observed_unix_ms, None);
    assert!(snapshots[0].linked_unix_ms.is_some());

    let comments = tracker.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].issue_number, 7);
    assert!(comments[0].body.contains("Support case `1001` created."));
    assert!(comments[0].body.contains("severity: `high`"));
    assert!(comments[0]
        .body
        .contains("service: `amazon-elastic-compute-cloud-linux`"));
}

#[tokio::test]
async fn regression_create_case_without_summary_never_calls_gateway() {
    let gateway = Arc::new(ScriptedGateway::default());
    let tracker = Arc::new(RecordingIssueTracker::default());
    let store = Arc::new(InMemoryStore::default());
    let runtime = runtime_with(gateway.clone(), tracker, store.clone());

    let error = runtime
        .create_case_from_issue(7, "### Details\nno summary here")
        .await
        .expect_err("missing summary");
    assert!(error.to_string().contains("no summary section"));
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn functional_create_case_retries_rate_limits_then_succeeds() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.create_throttles.store(2, Ordering::SeqCst);
    let runtime = runtime_with(
        gateway.clone(),
        Arc::new(RecordingIssueTracker::default()),
        Arc::new(InMemoryStore::default()),
    );

    let created = runtime
        .create_case_from_issue(7, ISSUE_BODY)
        .await
        .expect("third attempt succeeds");
    assert_eq!(created.display_id, "1001");
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn integration_create_case_rate_limit_exhaustion_posts_rate_limit_notice() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.create_throttles.store(10, Ordering::SeqCst);
    let tracker = Arc::new(RecordingIssueTracker::default());
    let store = Arc::new(InMemoryStore::default());
    let runtime = runtime_with(gateway.clone(), tracker.clone(), store.clone());

    let error = runtime
        .create_case_from_issue(7, ISSUE_BODY)
        .await
        .expect_err("rate limited");
    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 3);
    assert!(is_rate_limit_failure(&error));
    assert!(format!("{error:#}").contains("ThrottlingException"));
    assert_eq!(store.saves.load(Ordering::SeqCst), 0);

    assert!(runtime.notify_failure(7, "create", &error).await);
    let comments = tracker.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains("casesync create was rate limited"));
}

#[tokio::test]
async fn functional_relay_reply_sends_text_to_linked_case() {
    let gateway = Arc::new(ScriptedGateway::default());
    let tracker = Arc::new(RecordingIssueTracker::default());
    let store = Arc::new(InMemoryStore::seeded(vec![linked_snapshot("case-1", 7, true)]));
    let runtime = runtime_with(gateway.clone(), tracker.clone(), store);

    let outcome = runtime
        .relay_reply(7, "Thanks!\n/reply The disk has been resized.")
        .await
        .expect("relay");
    assert_eq!(
        outcome,
        ReplyOutcome::Relayed {
            case_id: "case-1".to_string(),
            display_id: "D-case-1".to_string(),
        }
    );
    assert_eq!(
        *gateway.communications.lock().expect("lock"),
        vec![(
            "case-1".to_string(),
            "The disk has been resized.".to_string()
        )]
    );
    let comments = tracker.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains("> The disk has been resized."));
}

#[tokio::test]
async fn unit_relay_reply_without_command_is_a_noop() {
    let gateway = Arc::new(ScriptedGateway::default());
    let tracker = Arc::new(RecordingIssueTracker::default());
    let runtime = runtime_with(
        gateway.clone(),
        tracker.clone(),
        Arc::new(InMemoryStore::default()),
    );

    let outcome = runtime
        .relay_reply(7, "looks good to me")
        .await
        .expect("no command");
    assert_eq!(outcome, ReplyOutcome::NoCommand);
    assert!(gateway.communications.lock().expect("lock").is_empty());
    assert!(tracker.comments().is_empty());
}

#[tokio::test]
async fn regression_relay_reply_without_linked_case_fails_and_posts_error_notice() {
    let gateway = Arc::new(ScriptedGateway::default());
    let tracker = Arc::new(RecordingIssueTracker::default());
    let store = Arc::new(InMemoryStore::seeded(vec![linked_snapshot("case-1", 3, true)]));
    let runtime = runtime_with(gateway.clone(), tracker.clone(), store);

    let error = runtime
        .relay_reply(7, "/reply hello")
        .await
        .expect_err("no linked case");
    assert!(error.to_string().contains("no linked support case"));
    assert!(!is_rate_limit_failure(&error));
    assert!(gateway.communications.lock().expect("lock").is_empty());

    assert!(runtime.notify_failure(7, "reply", &error).await);
    assert!(tracker.comments()[0].body.contains("casesync reply failed."));
}

#[tokio::test]
async fn integration_monitor_is_silent_on_first_poll_then_reports_changes_in_order() {
    let gateway = Arc::new(ScriptedGateway::with_polls(vec![
        vec![polled_case("case-1", CaseStatus::Opened, &["t1"])],
        vec![polled_case("case-1", CaseStatus::Resolved, &["t1", "t2"])],
        vec![polled_case("case-1", CaseStatus::Resolved, &["t1", "t2"])],
    ]));
    let tracker = Arc::new(RecordingIssueTracker::default());
    let store = Arc::new(InMemoryStore::seeded(vec![linked_snapshot("case-1", 7, false)]));
    let runtime = runtime_with(gateway, tracker.clone(), store.clone());

    let first = runtime.monitor_cases().await.expect("first poll");
    assert_eq!(first.polled_cases, 1);
    assert_eq!(first.notifications, 0);
    assert!(tracker.comments().is_empty());
    let stored = store.load_all();
    assert_eq!(stored[0].issue_number, Some(7));
    assert!(stored[0].last_observed_unix_ms.is_some());

    let second = runtime.monitor_cases().await.expect("second poll");
    assert_eq!(second.changed_cases, 1);
    assert_eq!(second.notifications, 2);
    assert_eq!(second.dispatch.posted, 2);
    let comments = tracker.comments();
    assert_eq!(comments.len(), 2);
    assert!(comments[0].body.contains("`opened` -> `resolved`"));
    assert!(comments[1].body.contains("support message t2"));
    assert!(!comments[1].body.contains("support message t1"));

    let third = runtime.monitor_cases().await.expect("third poll");
    assert_eq!(third.notifications, 0);
    assert_eq!(tracker.comments().len(), 2);
}

#[tokio::test]
async fn regression_first_monitor_after_create_reports_agent_reply_and_status() {
    let updated = polled_case(
        "case-1",
        CaseStatus::PendingCustomerAction,
        &["2000-01-01T00:00:00.000Z", "2999-01-01T00:00:00.000Z"],
    );
    let gateway = Arc::new(ScriptedGateway::with_polls(vec![
        vec![updated.clone()],
        vec![updated],
    ]));
    let tracker = Arc::new(RecordingIssueTracker::default());
    let store = Arc::new(InMemoryStore::default());
    let runtime = runtime_with(gateway, tracker.clone(), store.clone());

    runtime
        .create_case_from_issue(7, ISSUE_BODY)
        .await
        .expect("create");
    let first = runtime.monitor_cases().await.expect("first poll");
    assert_eq!(first.changed_cases, 1);
    assert_eq!(first.notifications, 2);

    let comments = tracker.comments();
    assert_eq!(comments.len(), 3);
    assert!(comments[1..].iter().all(|comment| comment.issue_number == 7));
    assert!(comments[1]
        .body
        .contains("`opened` -> `pending-customer-action`"));
    assert!(comments[2].body.contains("support message 2999-01-01T00:00:00.000Z"));
    assert!(!comments[2].body.contains("2000-01-01T00:00:00.000Z"));

    let second = runtime.monitor_cases().await.expect("second poll");
    assert_eq!(second.notifications, 0);
    assert_eq!(tracker.comments().len(), 3);
}

#[tokio::test]
async fn regression_monitor_retains_snapshots_missing_from_poll() {
    let mut resolved = linked_snapshot("case-old", 3, true);
    resolved.case.status = CaseStatus::Resolved;
    let gateway = Arc::new(ScriptedGateway::with_polls(vec![vec![polled_case(
        "case-new",
        CaseStatus::Opened,
        &[],
    )]]));
    let store = Arc::new(InMemoryStore::seeded(vec![resolved.clone()]));
    let runtime = runtime_with(
        gateway,
        Arc::new(RecordingIssueTracker::default()),
        store.clone(),
    );

    let report = runtime.monitor_cases().await.expect("monitor");
    assert_eq!(report.stored_snapshots, 2);
    assert_eq!(store.snapshot_ids(), vec!["case-new", "case-old"]);
    assert_eq!(store.load_all()[1], resolved);
}

#[tokio::test]
async fn regression_monitor_saves_state_when_every_notification_fails() {
    let gateway = Arc::new(ScriptedGateway::with_polls(vec![vec![
        polled_case("case-1", CaseStatus::Resolved, &["t9"]),
        polled_case("case-2", CaseStatus::Reopened, &[]),
    ]]));
    let store = Arc::new(InMemoryStore::seeded(vec![
        linked_snapshot("case-1", 1, true),
        linked_snapshot("case-2", 2, true),
    ]));
    let runtime = runtime_with(gateway, Arc::new(RejectingTracker), store.clone());

    let report = runtime.monitor_cases().await.expect("monitor");
    assert_eq!(report.notifications, 3);
    assert_eq!(report.dispatch.failed, 3);
    assert_eq!(report.dispatch.posted, 0);
    assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    assert_eq!(store.load_all()[0].case.status, CaseStatus::Resolved);
}

#[tokio::test]
async fn regression_notify_failure_swallows_tracker_errors() {
    let runtime = runtime_with(
        Arc::new(ScriptedGateway::default()),
        Arc::new(RejectingTracker),
        Arc::new(InMemoryStore::default()),
    );
    let error = anyhow::anyhow!("boom");
    assert!(!runtime.notify_failure(7, "monitor", &error).await);
}

#[tokio::test]
async fn functional_notify_linked_issues_posts_once_per_linked_issue() {
    let mut unlinked = linked_snapshot("case-4", 1, true);
    unlinked.issue_number = None;
    let store = Arc::new(InMemoryStore::seeded(vec![
        linked_snapshot("case-1", 5, true),
        linked_snapshot("case-2", 3, true),
        linked_snapshot("case-3", 5, false),
        unlinked,
    ]));
    let tracker = Arc::new(RecordingIssueTracker::default());
    let runtime = runtime_with(Arc::new(ScriptedGateway::default()), tracker.clone(), store);
    let error = anyhow::Error::new(SupportApiError::RateLimited {
        status: 400,
        classification: "ThrottlingException".to_string(),
        message: "Rate exceeded".to_string(),
        retry_after: None,
    })
    .context("failed to describe support cases");

    assert_eq!(runtime.notify_linked_issues("monitor", &error).await, 2);
    let comments = tracker.comments();
    assert_eq!(
        comments
            .iter()
            .map(|comment| comment.issue_number)
            .collect::<Vec<_>>(),
        vec![3, 5]
    );
    assert!(comments
        .iter()
        .all(|comment| comment.body.contains("casesync monitor was rate limited")));

    let empty = runtime_with(
        Arc::new(ScriptedGateway::default()),
        Arc::new(RecordingIssueTracker::default()),
        Arc::new(InMemoryStore::default()),
    );
    assert_eq!(empty.notify_linked_issues("monitor", &error).await, 0);
}
