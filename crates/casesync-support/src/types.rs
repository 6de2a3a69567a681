use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY_CODE: &str = "general-guidance";
pub const DEFAULT_SERVICE_CODE: &str = "general-info";
pub const DEFAULT_DESCRIBE_MAX_RESULTS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
/// Case status as reported upstream. Unknown values are carried verbatim.
pub enum CaseStatus {
    Opened,
    PendingCustomerAction,
    Reopened,
    Resolved,
    Unassigned,
    Other(String),
}

impl CaseStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Opened => "opened",
            Self::PendingCustomerAction => "pending-customer-action",
            Self::Reopened => "reopened",
            Self::Resolved => "resolved",
            Self::Unassigned => "unassigned",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for CaseStatus {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "opened" => Self::Opened,
            "pending-customer-action" => Self::PendingCustomerAction,
            "reopened" => Self::Reopened,
            "resolved" => Self::Resolved,
            "unassigned" => Self::Unassigned,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for CaseStatus {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<CaseStatus> for String {
    fn from(status: CaseStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One message exchanged on a case. `time_created` is the per-case dedup key.
pub struct Communication {
    pub body: String,
    pub time_created: String,
    #[serde(default)]
    pub submitted_by: String,
}

impl Communication {
    /// `time_created` as Unix milliseconds, or `None` when it is not RFC 3339.
    pub fn created_unix_ms(&self) -> Option<i64> {
        chrono::DateTime::parse_from_rfc3339(self.time_created.trim())
            .ok()
            .map(|created| created.timestamp_millis())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub case_id: String,
    pub display_id: String,
    pub subject: String,
    pub status: CaseStatus,
    #[serde(default)]
    pub recent_communications: Vec<Communication>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Normal,
    High,
    Urgent,
}

impl Severity {
    /// Severity code understood by the support service.
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Case-creation payload derived from an issue body.
pub struct CaseData {
    pub subject: String,
    pub body: String,
    pub severity: Severity,
    pub category: String,
    pub service_code: String,
}

impl Default for CaseData {
    fn default() -> Self {
        Self {
            subject: String::new(),
            body: String::new(),
            severity: Severity::Low,
            category: DEFAULT_CATEGORY_CODE.to_string(),
            service_code: DEFAULT_SERVICE_CODE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseFilter {
    pub include_resolved_cases: bool,
    pub max_results: u32,
}

impl Default for CaseFilter {
    fn default() -> Self {
        Self {
            include_resolved_cases: true,
            max_results: DEFAULT_DESCRIBE_MAX_RESULTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCase {
    pub case_id: String,
    pub display_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommunicationReceipt {
    pub result: bool,
}
