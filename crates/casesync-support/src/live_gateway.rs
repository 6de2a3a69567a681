//! HTTP gateway for the support-case service (JSON 1.1 protocol, SigV4 signed).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use casesync_core::truncate_for_error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::credentials::{CredentialResolver, Credentials};
use crate::error::SupportApiError;
use crate::gateway::SupportCaseGateway;
use crate::sigv4::{sign_request, SigningRequest, SigningScope};
use crate::types::{
    Case, CaseData, CaseFilter, CaseStatus, Communication, CommunicationReceipt, CreatedCase,
};

pub const SUPPORT_API_TARGET_PREFIX: &str = "AWSSupport_20130415";
pub const SUPPORT_SIGNING_SERVICE: &str = "support";
pub const DEFAULT_SUPPORT_REGION: &str = "us-east-1";
const SUPPORT_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const THROTTLING_CLASSIFICATIONS: &[&str] = &[
    "ThrottlingException",
    "Throttling",
    "TooManyRequestsException",
    "RequestLimitExceeded",
];

#[derive(Debug, Clone)]
/// Settings for [`LiveSupportCaseGateway`].
pub struct LiveSupportGatewayConfig {
    /// Overrides `https://support.<region>.amazonaws.com`.
    pub endpoint: Option<String>,
    pub region: String,
    pub credentials_path: PathBuf,
    pub profile: String,
    pub request_timeout_ms: u64,
}

pub struct LiveSupportCaseGateway {
    http: reqwest::Client,
    endpoint: String,
    host: String,
    region: String,
    resolver: CredentialResolver,
    credentials: OnceCell<Credentials>,
}

impl LiveSupportCaseGateway {
    pub fn new(config: LiveSupportGatewayConfig) -> Result<Self, SupportApiError> {
        let region = config.region.trim();
        let region = if region.is_empty() {
            DEFAULT_SUPPORT_REGION
        } else {
            region
        };
        let endpoint = config
            .endpoint
            .map(|endpoint| endpoint.trim().trim_end_matches('/').to_string())
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or_else(|| format!("https://support.{region}.amazonaws.com"));
        let parsed = reqwest::Url::parse(&endpoint).map_err(|error| {
            SupportApiError::Configuration(format!(
                "invalid support endpoint '{endpoint}': {error}"
            ))
        })?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(SupportApiError::Configuration(format!(
                    "support endpoint '{endpoint}' has no host"
                )));
            }
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            host,
            region: region.to_string(),
            resolver: CredentialResolver::new(config.credentials_path, config.profile),
            credentials: OnceCell::new(),
        })
    }

    async fn credentials(&self) -> Result<&Credentials, SupportApiError> {
        self.credentials
            .get_or_try_init(|| async {
                tracing::debug!(
                    path = %self.resolver.path().display(),
                    profile = self.resolver.profile(),
                    "loading support credentials"
                );
                self.resolver.resolve()
            })
            .await
    }

    async fn call<Req, Resp>(&self, operation: &str, payload: &Req) -> Result<Resp, SupportApiError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let credentials = self.credentials().await?;
        let body = serde_json::to_vec(payload).map_err(|source| SupportApiError::Decode {
            operation: operation.to_string(),
            source,
        })?;
        let target = format!("{SUPPORT_API_TARGET_PREFIX}.{operation}");
        let signed = sign_request(
            credentials,
            SigningScope {
                region: &self.region,
                service: SUPPORT_SIGNING_SERVICE,
            },
            chrono::Utc::now(),
            SigningRequest {
                method: "POST",
                host: &self.host,
                path: "/",
                headers: &[
                    ("content-type", SUPPORT_CONTENT_TYPE),
                    ("x-amz-target", target.as_str()),
                ],
                payload: &body,
            },
        )?;

        let mut request = self
            .http
            .post(format!("{}/", self.endpoint))
            .header(reqwest::header::CONTENT_TYPE, SUPPORT_CONTENT_TYPE)
            .header("x-amz-target", target.as_str());
        for (name, value) in &signed {
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::debug!(operation, "support api request");
        let response = request.body(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(classify_support_error(status.as_u16(), &text));
        }
        serde_json::from_str::<Resp>(&text).map_err(|source| SupportApiError::Decode {
            operation: operation.to_string(),
            source,
        })
    }
}

/// Maps a non-success support API response to a typed error.
pub fn classify_support_error(status: u16, body: &str) -> SupportApiError {
    let parsed = serde_json::from_str::<Value>(body).unwrap_or(Value::Null);
    let classification = parsed
        .get("__type")
        .and_then(Value::as_str)
        .map(|raw| raw.rsplit('#').next().unwrap_or(raw).to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    let message = parsed
        .get("message")
        .or_else(|| parsed.get("Message"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| truncate_for_error(body, 400));

    if status == 429 || THROTTLING_CLASSIFICATIONS.contains(&classification.as_str()) {
        return SupportApiError::RateLimited {
            status,
            classification,
            message,
            retry_after: None,
        };
    }
    if classification == "SubscriptionRequiredException" {
        return SupportApiError::SubscriptionRequired { message };
    }
    SupportApiError::Upstream {
        status,
        classification,
        message,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCaseResponse {
    case_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeCasesResponse {
    #[serde(default)]
    cases: Vec<CaseDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaseDetails {
    case_id: String,
    #[serde(default)]
    display_id: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    recent_communications: Option<RecentCommunications>,
}

#[derive(Debug, Deserialize)]
struct RecentCommunications {
    #[serde(default)]
    communications: Vec<Communication>,
}

#[derive(Debug, Deserialize)]
struct AddCommunicationResponse {
    #[serde(default)]
    result: bool,
}

impl From<CaseDetails> for Case {
    fn from(details: CaseDetails) -> Self {
        Self {
            display_id: details
                .display_id
                .unwrap_or_else(|| details.case_id.clone()),
            case_id: details.case_id,
            subject: details.subject.unwrap_or_default(),
            status: CaseStatus::from(details.status.unwrap_or_default()),
            recent_communications: details
                .recent_communications
                .map(|recent| recent.communications)
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SupportCaseGateway for LiveSupportCaseGateway {
    fn mode_label(&self) -> &'static str {
        "live"
    }

    async fn create_case(&self, case_data: &CaseData) -> Result<CreatedCase, SupportApiError> {
        let payload = json!({
            "subject": case_data.subject,
            "communicationBody": case_data.body,
            "severityCode": case_data.severity.as_code(),
            "categoryCode": case_data.category,
            "serviceCode": case_data.service_code,
            "language": "en",
            "issueType": "technical",
        });
        let created: CreateCaseResponse = self.call("CreateCase", &payload).await?;

        let lookup = json!({
            "caseIdList": [created.case_id],
            "includeResolvedCases": true,
            "includeCommunications": false,
        });
        let display_id = match self
            .call::<_, DescribeCasesResponse>("DescribeCases", &lookup)
            .await
        {
            Ok(described) => described
                .cases
                .into_iter()
                .find(|case| case.case_id == created.case_id)
                .and_then(|case| case.display_id),
            Err(error) => {
                tracing::warn!(
                    case_id = %created.case_id,
                    error = %error,
                    "failed to resolve display id for new case"
                );
                None
            }
        };
        Ok(CreatedCase {
            display_id: display_id.unwrap_or_else(|| created.case_id.clone()),
            case_id: created.case_id,
        })
    }

    async fn describe_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>, SupportApiError> {
        let payload = json!({
            "includeResolvedCases": filter.include_resolved_cases,
            "maxResults": filter.max_results.clamp(10, 100),
            "includeCommunications": true,
            "language": "en",
        });
        let described: DescribeCasesResponse = self.call("DescribeCases", &payload).await?;
        Ok(described.cases.into_iter().map(Case::from).collect())
    }

    async fn add_communication_to_case(
        &self,
        case_id: &str,
        body: &str,
    ) -> Result<CommunicationReceipt, SupportApiError> {
        let payload = json!({
            "caseId": case_id,
            "communicationBody": body,
        });
        let response: AddCommunicationResponse =
            self.call("AddCommunicationToCase", &payload).await?;
        Ok(CommunicationReceipt {
            result: response.result,
        })
    }
}
