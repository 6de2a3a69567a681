//! AWS Signature Version 4 signing for single-shot POST requests.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::credentials::Credentials;
use crate::error::SupportApiError;

const SIGNING_ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    /// Extra headers that must be covered by the signature.
    pub headers: &'a [(&'a str, &'a str)],
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, Copy)]
pub struct SigningScope<'a> {
    pub region: &'a str,
    pub service: &'a str,
}

/// Returns the headers to attach: `x-amz-date`, optional
/// `x-amz-security-token`, and `authorization`.
pub fn sign_request(
    credentials: &Credentials,
    scope: SigningScope<'_>,
    timestamp: DateTime<Utc>,
    request: SigningRequest<'_>,
) -> Result<Vec<(String, String)>, SupportApiError> {
    let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();
    let short_date = timestamp.format("%Y%m%d").to_string();

    let mut canonical: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    canonical.push(("host".to_string(), request.host.to_string()));
    canonical.push(("x-amz-date".to_string(), amz_date.clone()));
    if let Some(token) = credentials.session_token.as_deref() {
        canonical.push(("x-amz-security-token".to_string(), token.to_string()));
    }
    canonical.sort_by(|left, right| left.0.cmp(&right.0));

    let canonical_headers = canonical
        .iter()
        .fold(String::new(), |mut output, (name, value)| {
            let _ = writeln!(output, "{name}:{value}");
            output
        });
    let signed_headers = canonical
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        request.method,
        request.path,
        canonical_headers,
        signed_headers,
        sha256_hex(request.payload)
    );

    let credential_scope = format!(
        "{short_date}/{}/{}/aws4_request",
        scope.region, scope.service
    );
    let string_to_sign = format!(
        "{SIGNING_ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let date_key = hmac_sha256(
        format!("AWS4{}", credentials.secret_access_key).as_bytes(),
        short_date.as_bytes(),
    )?;
    let region_key = hmac_sha256(&date_key, scope.region.as_bytes())?;
    let service_key = hmac_sha256(&region_key, scope.service.as_bytes())?;
    let signing_key = hmac_sha256(&service_key, b"aws4_request")?;
    let signature = hex_encode(&hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    let mut headers = vec![("x-amz-date".to_string(), amz_date)];
    if let Some(token) = credentials.session_token.as_deref() {
        headers.push(("x-amz-security-token".to_string(), token.to_string()));
    }
    headers.push((
        "authorization".to_string(),
        format!(
            "{SIGNING_ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
    ));
    Ok(headers)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SupportApiError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|error| SupportApiError::Signing(error.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
