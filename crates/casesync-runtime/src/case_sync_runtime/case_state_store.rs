//! State-file persistence for observed case snapshots and issue links.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use casesync_core::write_text_atomic;
use casesync_support::{Case, CreatedCase};
use serde::{Deserialize, Serialize};

pub const CASE_STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Last observed view of one case plus the issue it is linked to.
pub struct CaseSnapshot {
    #[serde(flatten)]
    pub case: Case,
    #[serde(default)]
    pub issue_number: Option<u64>,
    /// `None` until the case has been seen by a monitor poll.
    #[serde(default)]
    pub last_observed_unix_ms: Option<u64>,
    /// Set when this process created the case and linked it to an issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_unix_ms: Option<u64>,
}

impl CaseSnapshot {
    /// Prior view of the case to diff `current` against.
    ///
    /// An observed snapshot is its own baseline. An unobserved snapshot
    /// created by `create` is the baseline too, widened with the
    /// communications in `current` that predate the link (the customer's
    /// opening message). Any other unobserved snapshot has no baseline.
    pub fn baseline_for(&self, current: &Case) -> Option<Case> {
        if self.last_observed_unix_ms.is_some() {
            return Some(self.case.clone());
        }
        let linked_unix_ms = i64::try_from(self.linked_unix_ms?).unwrap_or(i64::MAX);
        let mut baseline = self.case.clone();
        baseline.recent_communications.extend(
            current
                .recent_communications
                .iter()
                .filter(|communication| {
                    communication
                        .created_unix_ms()
                        .is_some_and(|created| created <= linked_unix_ms)
                })
                .cloned(),
        );
        Some(baseline)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CaseStateFile {
    schema_version: u32,
    #[serde(default)]
    cases: Vec<CaseSnapshot>,
}

/// Persistence boundary for case snapshots.
pub trait CaseSnapshotStore: Send + Sync {
    /// Returns every stored snapshot. Missing or unreadable state yields an
    /// empty list.
    fn load_all(&self) -> Vec<CaseSnapshot>;

    /// Replaces the stored snapshots.
    fn save_all(&self, snapshots: &[CaseSnapshot]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonFileCaseStore {
    path: PathBuf,
}

impl JsonFileCaseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaseSnapshotStore for JsonFileCaseStore {
    fn load_all(&self) -> Vec<CaseSnapshot> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "failed to read case state file (starting fresh)"
                );
                return Vec::new();
            }
        };
        let state = match serde_json::from_str::<CaseStateFile>(&raw) {
            Ok(state) => state,
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "failed to parse case state file (starting fresh)"
                );
                return Vec::new();
            }
        };
        if state.schema_version != CASE_STATE_SCHEMA_VERSION {
            tracing::warn!(
                path = %self.path.display(),
                expected = CASE_STATE_SCHEMA_VERSION,
                found = state.schema_version,
                "unsupported case state schema (starting fresh)"
            );
            return Vec::new();
        }
        state.cases
    }

    fn save_all(&self, snapshots: &[CaseSnapshot]) -> Result<()> {
        let state = CaseStateFile {
            schema_version: CASE_STATE_SCHEMA_VERSION,
            cases: snapshots.to_vec(),
        };
        let mut payload =
            serde_json::to_string_pretty(&state).context("failed to serialize case state")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write case state {}", self.path.display()))
    }
}

/// Most recently linked case for `issue_number`.
pub fn find_linked_case(snapshots: &[CaseSnapshot], issue_number: u64) -> Option<&CaseSnapshot> {
    snapshots
        .iter()
        .rev()
        .find(|snapshot| snapshot.issue_number == Some(issue_number))
}

/// Records a freshly created case as linked to `issue_number` at
/// `linked_unix_ms`. The first poll diffs against this `opened` snapshot and
/// ignores communications dated at or before the link.
pub fn link_created_case(
    snapshots: &mut Vec<CaseSnapshot>,
    created: &CreatedCase,
    subject: &str,
    issue_number: u64,
    linked_unix_ms: u64,
) {
    if let Some(existing) = snapshots
        .iter_mut()
        .find(|snapshot| snapshot.case.case_id == created.case_id)
    {
        existing.issue_number = Some(issue_number);
        existing.case.display_id = created.display_id.clone();
        existing.linked_unix_ms = Some(linked_unix_ms);
        return;
    }
    snapshots.push(CaseSnapshot {
        case: Case {
            case_id: created.case_id.clone(),
            display_id: created.display_id.clone(),
            subject: subject.to_string(),
            status: "opened".into(),
            recent_communications: Vec::new(),
        },
        issue_number: Some(issue_number),
        last_observed_unix_ms: None,
        linked_unix_ms: Some(linked_unix_ms),
    });
}
