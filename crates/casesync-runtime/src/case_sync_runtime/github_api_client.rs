use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use casesync_core::{current_unix_timestamp, truncate_for_error};
use serde::Deserialize;
use serde_json::json;

use super::issue_tracker::{IssueTracker, PostedComment, TrackerApiError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid --repository '{raw}', expected owner/repo"))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("invalid --repository '{raw}', expected owner/repo");
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GithubCommentCreateResponse {
    id: u64,
    html_url: Option<String>,
}

#[derive(Clone)]
/// GitHub REST client for issue comments.
pub struct GithubIssueTracker {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
}

impl GithubIssueTracker {
    pub fn new(api_base: &str, token: &str, repo: RepoRef, request_timeout_ms: u64) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("casesync-issue-bridge"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
        })
    }
}

#[async_trait]
impl IssueTracker for GithubIssueTracker {
    async fn post_comment(
        &self,
        issue_number: u64,
        body: &str,
    ) -> Result<PostedComment, TrackerApiError> {
        let operation = "create issue comment";
        let response = self
            .http
            .post(format!(
                "{}/repos/{}/{}/issues/{}/comments",
                self.api_base, self.repo.owner, self.repo.name, issue_number
            ))
            .json(&json!({ "body": body }))
            .send()
            .await
            .map_err(|source| TrackerApiError::Transport {
                operation: operation.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            let created = response
                .json::<GithubCommentCreateResponse>()
                .await
                .map_err(|source| TrackerApiError::Decode {
                    operation: operation.to_string(),
                    source,
                })?;
            return Ok(PostedComment {
                id: created.id,
                html_url: created.html_url,
            });
        }

        let wait_hint = github_wait_hint(response.headers());
        let remaining_exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim() == "0");
        let body = response.text().await.unwrap_or_default();
        Err(classify_github_error(
            operation,
            status.as_u16(),
            &body,
            remaining_exhausted,
            wait_hint,
        ))
    }
}

/// Maps a non-success GitHub response to a typed error. Primary limits surface
/// as 429 or as 403 with an exhausted quota; secondary limits as 403 with a
/// "secondary rate limit" message.
fn classify_github_error(
    operation: &str,
    status: u16,
    body: &str,
    remaining_exhausted: bool,
    retry_after: Option<Duration>,
) -> TrackerApiError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(ToOwned::to_owned)
        })
        .unwrap_or_else(|| truncate_for_error(body, 800));
    let secondary = message.to_ascii_lowercase().contains("secondary rate limit");

    let rate_limit_class = match status {
        429 => Some("rate_limit"),
        403 if secondary => Some("secondary_rate_limit"),
        403 if remaining_exhausted => Some("rate_limit"),
        _ => None,
    };
    match rate_limit_class {
        Some(classification) => TrackerApiError::RateLimited {
            operation: operation.to_string(),
            status,
            classification: classification.to_string(),
            message,
            retry_after,
        },
        None => TrackerApiError::Upstream {
            operation: operation.to_string(),
            status,
            classification: format!("http_{status}"),
            message,
        },
    }
}

/// `retry-after` seconds when present, else the time until `x-ratelimit-reset`.
fn github_wait_hint(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    if let Some(delay) = parse_retry_after(headers) {
        return Some(delay);
    }
    let reset = headers
        .get("x-ratelimit-reset")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(
        reset.saturating_sub(current_unix_timestamp()),
    ))
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?;
    let seconds = raw.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}
