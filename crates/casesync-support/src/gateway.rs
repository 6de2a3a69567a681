use async_trait::async_trait;

use crate::error::SupportApiError;
use crate::types::{Case, CaseData, CaseFilter, CommunicationReceipt, CreatedCase};

#[async_trait]
/// Case lifecycle operations against the support-case service.
pub trait SupportCaseGateway: Send + Sync {
    /// Short label used in logs (`live`, `mock`).
    fn mode_label(&self) -> &'static str;

    async fn create_case(&self, case_data: &CaseData) -> Result<CreatedCase, SupportApiError>;

    async fn describe_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>, SupportApiError>;

    async fn add_communication_to_case(
        &self,
        case_id: &str,
        body: &str,
    ) -> Result<CommunicationReceipt, SupportApiError>;
}
