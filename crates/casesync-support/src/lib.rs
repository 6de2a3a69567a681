//! Support-case service access: case data model, credentials, and the
//! `SupportCaseGateway` capability with live and mock implementations.

pub mod credentials;
pub mod error;
pub mod gateway;
pub mod live_gateway;
pub mod mock_gateway;
pub mod sigv4;
pub mod types;

pub use credentials::{resolve_profile_from_text, CredentialResolver, Credentials, CredentialsFile};
pub use error::SupportApiError;
pub use gateway::SupportCaseGateway;
pub use live_gateway::{LiveSupportCaseGateway, LiveSupportGatewayConfig, DEFAULT_SUPPORT_REGION};
pub use mock_gateway::{MockSupportCaseGateway, MOCK_CASE_ID_PREFIX};
pub use types::{
    Case, CaseData, CaseFilter, CaseStatus, Communication, CommunicationReceipt, CreatedCase,
    Severity, DEFAULT_CATEGORY_CODE, DEFAULT_SERVICE_CODE,
};
