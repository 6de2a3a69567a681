//! Issue-tracker comment capability and its typed errors.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use casesync_core::RateLimitSignal;
use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates failures raised at the issue-tracker API boundary.
pub enum TrackerApiError {
    #[error("issue tracker rate limited {operation} (status {status}, {classification}): {message}")]
    RateLimited {
        operation: String,
        status: u16,
        classification: String,
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("issue tracker {operation} failed (status {status}, {classification}): {message}")]
    Upstream {
        operation: String,
        status: u16,
        classification: String,
        message: String,
    },
    #[error("issue tracker {operation} request failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode issue tracker {operation} response: {source}")]
    Decode {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
}

impl RateLimitSignal for TrackerApiError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    fn wait_hint(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub id: u64,
    pub html_url: Option<String>,
}

#[async_trait]
/// Comment posting against the issue tracker.
pub trait IssueTracker: Send + Sync {
    async fn post_comment(
        &self,
        issue_number: u64,
        body: &str,
    ) -> Result<PostedComment, TrackerApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedComment {
    pub issue_number: u64,
    pub body: String,
}

#[derive(Debug, Default)]
/// Keeps posted comments in memory and logs them. Used in mock mode when no
/// tracker token is configured.
pub struct RecordingIssueTracker {
    comments: Mutex<Vec<RecordedComment>>,
}

impl RecordingIssueTracker {
    pub fn comments(&self) -> Vec<RecordedComment> {
        self.comments
            .lock()
            .map(|comments| comments.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl IssueTracker for RecordingIssueTracker {
    async fn post_comment(
        &self,
        issue_number: u64,
        body: &str,
    ) -> Result<PostedComment, TrackerApiError> {
        let mut comments = self
            .comments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        comments.push(RecordedComment {
            issue_number,
            body: body.to_string(),
        });
        tracing::info!(issue_number, "recorded issue comment:\n{body}");
        Ok(PostedComment {
            id: comments.len() as u64,
            html_url: None,
        })
    }
}
