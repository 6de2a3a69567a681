//! Diffing of polled cases against their persisted snapshots.

use std::collections::{HashMap, HashSet};

use casesync_support::{Case, CaseStatus, Communication};

use super::case_state_store::CaseSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseChangeEvent {
    StatusChanged {
        previous: CaseStatus,
        current: CaseStatus,
    },
    NewCommunications {
        communications: Vec<Communication>,
    },
}

impl CaseChangeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "status-changed",
            Self::NewCommunications { .. } => "new-communications",
        }
    }
}

/// Events for one case. A case with no prior observation yields nothing.
/// Status changes come before new communications.
pub fn detect_case_changes(previous: Option<&Case>, current: &Case) -> Vec<CaseChangeEvent> {
    let Some(previous) = previous else {
        return Vec::new();
    };
    let mut events = Vec::new();
    if previous.status != current.status {
        events.push(CaseChangeEvent::StatusChanged {
            previous: previous.status.clone(),
            current: current.status.clone(),
        });
    }
    let seen = previous
        .recent_communications
        .iter()
        .map(|communication| communication.time_created.as_str())
        .collect::<HashSet<_>>();
    let fresh = current
        .recent_communications
        .iter()
        .filter(|communication| !seen.contains(communication.time_created.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    if !fresh.is_empty() {
        events.push(CaseChangeEvent::NewCommunications {
            communications: fresh,
        });
    }
    events
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseChanges {
    pub case: Case,
    pub issue_number: Option<u64>,
    pub events: Vec<CaseChangeEvent>,
}

/// Runs [`detect_case_changes`] for every polled case in poll order and keeps
/// only cases with at least one event. See [`CaseSnapshot::baseline_for`] for
/// the prior view each case is diffed against.
pub fn detect_poll_changes(previous: &[CaseSnapshot], polled: &[Case]) -> Vec<CaseChanges> {
    let by_id = previous
        .iter()
        .map(|snapshot| (snapshot.case.case_id.as_str(), snapshot))
        .collect::<HashMap<_, _>>();
    polled
        .iter()
        .filter_map(|case| {
            let snapshot = by_id.get(case.case_id.as_str());
            let baseline = snapshot.and_then(|snapshot| snapshot.baseline_for(case));
            let events = detect_case_changes(baseline.as_ref(), case);
            if events.is_empty() {
                return None;
            }
            Some(CaseChanges {
                case: case.clone(),
                issue_number: snapshot.and_then(|snapshot| snapshot.issue_number),
                events,
            })
        })
        .collect()
}

/// Next state file contents: every polled case in poll order, carrying its
/// issue link forward, followed by previous snapshots the poll did not return.
pub fn merge_poll_into_snapshots(
    previous: &[CaseSnapshot],
    polled: &[Case],
    observed_unix_ms: u64,
) -> Vec<CaseSnapshot> {
    let links = previous
        .iter()
        .filter_map(|snapshot| {
            snapshot
                .issue_number
                .map(|issue_number| (snapshot.case.case_id.as_str(), issue_number))
        })
        .collect::<HashMap<_, _>>();
    let polled_ids = polled
        .iter()
        .map(|case| case.case_id.as_str())
        .collect::<HashSet<_>>();

    let mut merged = polled
        .iter()
        .map(|case| CaseSnapshot {
            case: case.clone(),
            issue_number: links.get(case.case_id.as_str()).copied(),
            last_observed_unix_ms: Some(observed_unix_ms),
            linked_unix_ms: None,
        })
        .collect::<Vec<_>>();
    merged.extend(
        previous
            .iter()
            .filter(|snapshot| !polled_ids.contains(snapshot.case.case_id.as_str()))
            .cloned(),
    );
    merged
}
