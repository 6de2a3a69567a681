//! Shared fixtures for the mock-mode end-to-end tests.

use std::path::Path;

use casesync_core::RetryPolicy;
use casesync_runtime::{CaseSyncRuntimeConfig, DEFAULT_GITHUB_API_BASE};
use casesync_support::{CaseFilter, DEFAULT_SUPPORT_REGION};

/// Mock-mode configuration with no tracker token and fast retries.
pub fn mock_runtime_config(state_path: &Path) -> CaseSyncRuntimeConfig {
    CaseSyncRuntimeConfig {
        repo_slug: "acme/platform".to_string(),
        github_api_base: DEFAULT_GITHUB_API_BASE.to_string(),
        github_token: None,
        mock_mode: true,
        aws_profile: "default".to_string(),
        aws_credentials_path: state_path.with_file_name("credentials"),
        support_endpoint: None,
        support_region: DEFAULT_SUPPORT_REGION.to_string(),
        state_path: state_path.to_path_buf(),
        retry_policy: RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_wait_ms: 5,
        },
        request_timeout_ms: 2_000,
        describe_filter: CaseFilter::default(),
        ai_provider: None,
    }
}
