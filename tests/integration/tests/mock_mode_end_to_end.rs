use std::sync::Arc;

use casesync_integration_tests::mock_runtime_config;
use casesync_runtime::{
    CaseSnapshotStore, CaseSyncRuntime, JsonFileCaseStore, RecordingIssueTracker, ReplyOutcome,
    CASE_STATE_SCHEMA_VERSION,
};
use casesync_support::mock_gateway::MOCK_FIXTURE_CASE_ID;
use casesync_support::{
    CaseData, CaseFilter, CaseStatus, MockSupportCaseGateway, Severity, SupportCaseGateway,
    MOCK_CASE_ID_PREFIX,
};
use tempfile::tempdir;

const ISSUE_BODY: &str = "\
### Summary
Checkout API returns 502 under load

### Details
Since the last deploy, roughly 3% of checkout requests fail.

### Reproduction steps
Run the load test against staging.

### Severity
Critical - production impact

### Target service
Lambda
";

fn mock_runtime(
    state_path: &std::path::Path,
) -> (CaseSyncRuntime, Arc<RecordingIssueTracker>, JsonFileCaseStore) {
    let tracker = Arc::new(RecordingIssueTracker::default());
    let store = JsonFileCaseStore::new(state_path);
    let runtime = CaseSyncRuntime::with_components(
        mock_runtime_config(state_path),
        Arc::new(MockSupportCaseGateway),
        tracker.clone(),
        Arc::new(store.clone()),
    );
    (runtime, tracker, store)
}

#[tokio::test]
async fn integration_mock_gateway_supports_create_describe_and_reply() {
    let gateway = MockSupportCaseGateway;
    let created = gateway
        .create_case(&CaseData {
            subject: "X".to_string(),
            body: "Y".to_string(),
            severity: Severity::Low,
            ..CaseData::default()
        })
        .await
        .expect("create");
    assert!(created.case_id.starts_with(MOCK_CASE_ID_PREFIX));

    let cases = gateway
        .describe_cases(&CaseFilter::default())
        .await
        .expect("describe");
    assert!(!cases.is_empty());

    let receipt = gateway
        .add_communication_to_case("any-case", "any body")
        .await
        .expect("add communication");
    assert!(receipt.result);
}

#[tokio::test]
async fn integration_runtime_new_in_mock_mode_persists_created_case_link() {
    let temp = tempdir().expect("tempdir");
    let state_path = temp.path().join(".casesync/state.json");
    let runtime = CaseSyncRuntime::new(mock_runtime_config(&state_path)).expect("runtime");

    let created = runtime
        .create_case_from_issue(42, ISSUE_BODY)
        .await
        .expect("create");
    assert!(created.case_id.starts_with(MOCK_CASE_ID_PREFIX));
    assert!(created.display_id.starts_with("MOCK-"));

    let raw = std::fs::read_to_string(&state_path).expect("state file");
    let state: serde_json::Value = serde_json::from_str(&raw).expect("state json");
    assert_eq!(state["schema_version"], CASE_STATE_SCHEMA_VERSION);
    assert_eq!(state["cases"][0]["caseId"], created.case_id.as_str());
    assert_eq!(state["cases"][0]["issue_number"], 42);
}

#[tokio::test]
async fn integration_create_reply_and_monitor_flow_across_runs() {
    let temp = tempdir().expect("tempdir");
    let state_path = temp.path().join("state.json");

    let (runtime, tracker, store) = mock_runtime(&state_path);
    let created = runtime
        .create_case_from_issue(42, ISSUE_BODY)
        .await
        .expect("create");
    let comments = tracker.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains("severity: `urgent`"));
    assert!(comments[0].body.contains("service: `aws-lambda`"));
    assert!(comments[0]
        .body
        .contains("subject: Checkout API returns 502 under load"));

    // A fresh runtime models the next one-shot invocation.
    let (runtime, tracker, _) = mock_runtime(&state_path);
    let outcome = runtime
        .relay_reply(42, "Status update:\n/reply\n```\nRolled back the deploy.\nStill seeing errors.\n```")
        .await
        .expect("reply");
    assert_eq!(
        outcome,
        ReplyOutcome::Relayed {
            case_id: created.case_id.clone(),
            display_id: created.display_id.clone(),
        }
    );
    assert!(tracker.comments()[0]
        .body
        .contains("> Rolled back the deploy.\n> Still seeing errors."));

    let (runtime, tracker, _) = mock_runtime(&state_path);
    let first = runtime.monitor_cases().await.expect("first monitor");
    assert_eq!(first.polled_cases, 1);
    assert_eq!(first.notifications, 0);
    assert_eq!(first.stored_snapshots, 2);
    assert!(tracker.comments().is_empty());

    let snapshots = store.load_all();
    assert_eq!(snapshots[0].case.case_id, MOCK_FIXTURE_CASE_ID);
    assert_eq!(snapshots[1].case.case_id, created.case_id);
    assert_eq!(snapshots[1].issue_number, Some(42));

    let (runtime, tracker, _) = mock_runtime(&state_path);
    let second = runtime.monitor_cases().await.expect("second monitor");
    assert_eq!(second.notifications, 0);
    assert!(tracker.comments().is_empty());
}

#[tokio::test]
async fn integration_monitor_posts_status_change_for_linked_fixture_case() {
    let temp = tempdir().expect("tempdir");
    let state_path = temp.path().join("state.json");
    let (runtime, _, store) = mock_runtime(&state_path);
    runtime.monitor_cases().await.expect("seed monitor");

    let mut snapshots = store.load_all();
    snapshots[0].issue_number = Some(5);
    snapshots[0].case.status = CaseStatus::Resolved;
    snapshots[0].case.recent_communications.clear();
    store.save_all(&snapshots).expect("save edited state");

    let (runtime, tracker, store) = mock_runtime(&state_path);
    let report = runtime.monitor_cases().await.expect("monitor");
    assert_eq!(report.notifications, 2);
    assert_eq!(report.dispatch.posted, 2);

    let comments = tracker.comments();
    assert_eq!(comments.len(), 2);
    assert!(comments.iter().all(|comment| comment.issue_number == 5));
    assert!(comments[0].body.contains("`resolved` -> `opened`"));
    assert!(comments[1].body.contains("has 1 new message."));
    assert_eq!(store.load_all()[0].case.status, CaseStatus::Opened);
    assert_eq!(store.load_all()[0].issue_number, Some(5));
}
