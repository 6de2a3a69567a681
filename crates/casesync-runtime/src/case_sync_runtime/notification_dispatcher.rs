//! Rendering and posting of case change notifications.

use std::sync::Arc;

use casesync_core::{RateLimitSignal, RetryingRequestExecutor};
use casesync_issues::case_comment::{
    render_new_communications_comment, render_status_changed_comment,
};

use super::change_detector::{CaseChangeEvent, CaseChanges};
use super::issue_tracker::IssueTracker;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One change event routed to the issue linked with its case.
pub struct CaseNotification {
    pub issue_number: u64,
    pub case_id: String,
    pub display_id: String,
    pub event: CaseChangeEvent,
}

impl CaseNotification {
    pub fn render(&self) -> String {
        match &self.event {
            CaseChangeEvent::StatusChanged { previous, current } => render_status_changed_comment(
                &self.display_id,
                &self.case_id,
                previous,
                current,
            ),
            CaseChangeEvent::NewCommunications { communications } => {
                render_new_communications_comment(&self.display_id, &self.case_id, communications)
            }
        }
    }
}

/// Flattens detected changes into notifications, preserving case order and
/// per-case event order. Cases without a linked issue are skipped.
pub fn notifications_for_changes(changes: &[CaseChanges]) -> Vec<CaseNotification> {
    let mut notifications = Vec::new();
    for change in changes {
        let Some(issue_number) = change.issue_number else {
            tracing::warn!(
                case_id = %change.case.case_id,
                events = change.events.len(),
                "case has no linked issue, skipping notifications"
            );
            continue;
        };
        notifications.extend(change.events.iter().map(|event| CaseNotification {
            issue_number,
            case_id: change.case.case_id.clone(),
            display_id: change.case.display_id.clone(),
            event: event.clone(),
        }));
    }
    notifications
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub posted: usize,
    pub failed: usize,
    /// Subset of `failed` that ended in rate-limit exhaustion.
    pub rate_limited: usize,
}

pub struct NotificationDispatcher {
    tracker: Arc<dyn IssueTracker>,
    executor: RetryingRequestExecutor,
}

impl NotificationDispatcher {
    pub fn new(tracker: Arc<dyn IssueTracker>, executor: RetryingRequestExecutor) -> Self {
        Self { tracker, executor }
    }

    /// Posts every notification in order. A failed post is logged and counted;
    /// the remaining notifications are still attempted.
    pub async fn dispatch(&self, notifications: &[CaseNotification]) -> DispatchReport {
        let mut report = DispatchReport::default();
        let tracker = self.tracker.as_ref();
        for notification in notifications {
            let rendered = notification.render();
            let body = rendered.as_str();
            let issue_number = notification.issue_number;
            let result = self
                .executor
                .execute("post case notification", move || {
                    tracker.post_comment(issue_number, body)
                })
                .await;
            match result {
                Ok(posted) => {
                    report.posted += 1;
                    tracing::info!(
                        issue_number,
                        case_id = %notification.case_id,
                        kind = notification.event.kind(),
                        comment_id = posted.id,
                        "posted case notification"
                    );
                }
                Err(error) => {
                    report.failed += 1;
                    if error.is_rate_limited() {
                        report.rate_limited += 1;
                    }
                    tracing::warn!(
                        issue_number,
                        case_id = %notification.case_id,
                        kind = notification.event.kind(),
                        error = %error,
                        "failed to post case notification"
                    );
                }
            }
        }
        report
    }
}
