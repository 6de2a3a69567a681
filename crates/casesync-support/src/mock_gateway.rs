use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use casesync_core::current_unix_timestamp_ms;

use crate::error::SupportApiError;
use crate::gateway::SupportCaseGateway;
use crate::types::{
    Case, CaseData, CaseFilter, CaseStatus, Communication, CommunicationReceipt, CreatedCase,
};

pub const MOCK_CASE_ID_PREFIX: &str = "case-mock-";
pub const MOCK_FIXTURE_CASE_ID: &str = "case-mock-fixture";

static MOCK_CASE_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, Default)]
/// In-memory gateway returning deterministic fixtures.
pub struct MockSupportCaseGateway;

impl MockSupportCaseGateway {
    pub fn fixture_case() -> Case {
        Case {
            case_id: MOCK_FIXTURE_CASE_ID.to_string(),
            display_id: "MOCK-000001".to_string(),
            subject: "Mock support case".to_string(),
            status: CaseStatus::Opened,
            recent_communications: vec![Communication {
                body: "Thank you for contacting support. We are looking into this.".to_string(),
                time_created: "2024-01-01T00:00:00.000Z".to_string(),
                submitted_by: "support@mock.invalid".to_string(),
            }],
        }
    }
}

#[async_trait]
impl SupportCaseGateway for MockSupportCaseGateway {
    fn mode_label(&self) -> &'static str {
        "mock"
    }

    async fn create_case(&self, case_data: &CaseData) -> Result<CreatedCase, SupportApiError> {
        let millis = current_unix_timestamp_ms();
        let sequence = MOCK_CASE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let created = CreatedCase {
            case_id: format!("{MOCK_CASE_ID_PREFIX}{millis}-{sequence}"),
            display_id: format!("MOCK-{:06}", millis % 1_000_000),
        };
        tracing::info!(
            case_id = %created.case_id,
            severity = %case_data.severity,
            service_code = %case_data.service_code,
            "mock support case created"
        );
        Ok(created)
    }

    async fn describe_cases(&self, _filter: &CaseFilter) -> Result<Vec<Case>, SupportApiError> {
        Ok(vec![Self::fixture_case()])
    }

    async fn add_communication_to_case(
        &self,
        case_id: &str,
        body: &str,
    ) -> Result<CommunicationReceipt, SupportApiError> {
        tracing::info!(
            case_id,
            body_chars = body.chars().count(),
            "mock communication added"
        );
        Ok(CommunicationReceipt { result: true })
    }
}
