//! Shared-credentials file parsing and per-profile resolution.
//!
//! The file is INI-like: `[profile]` headers followed by `key = value` lines.
//! Keys may carry the conventional `aws_` prefix (`aws_access_key_id`) or
//! omit it (`access_key_id`). Lines starting with `#` or `;` are comments.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::SupportApiError;

#[derive(Clone, PartialEq, Eq)]
/// Access credentials for one profile. Held in memory only.
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ProfileSection {
    name: String,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Parsed credentials file, profiles in file order.
pub struct CredentialsFile {
    profiles: Vec<ProfileSection>,
}

impl CredentialsFile {
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut profiles: Vec<ProfileSection> = Vec::new();
        let mut current: Option<usize> = None;
        for (index, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(format!("line {}: unterminated profile header", index + 1));
                };
                let name = name.trim();
                let name = name.strip_prefix("profile ").unwrap_or(name).trim();
                if name.is_empty() {
                    return Err(format!("line {}: empty profile name", index + 1));
                }
                let position = match profiles.iter().position(|profile| profile.name == name) {
                    Some(position) => position,
                    None => {
                        profiles.push(ProfileSection {
                            name: name.to_string(),
                            ..ProfileSection::default()
                        });
                        profiles.len() - 1
                    }
                };
                current = Some(position);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(format!("line {}: expected key=value", index + 1));
            };
            let Some(position) = current else {
                return Err(format!(
                    "line {}: key '{}' appears before any profile header",
                    index + 1,
                    key.trim()
                ));
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim().to_string();
            let section = &mut profiles[position];
            match key.strip_prefix("aws_").unwrap_or(key.as_str()) {
                "access_key_id" => section.access_key_id = Some(value),
                "secret_access_key" => section.secret_access_key = Some(value),
                "session_token" => section.session_token = Some(value),
                _ => {}
            }
        }
        Ok(Self { profiles })
    }

    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles
            .iter()
            .map(|profile| profile.name.as_str())
            .collect()
    }

    /// Returns the three credential fields of `profile`.
    pub fn resolve(&self, profile: &str) -> Result<Credentials, SupportApiError> {
        let section = self
            .profiles
            .iter()
            .find(|section| section.name == profile);
        let non_empty = |value: &Option<String>| value.clone().filter(|value| !value.is_empty());
        let (access_key_id, secret_access_key) = match section {
            Some(section) => (
                non_empty(&section.access_key_id),
                non_empty(&section.secret_access_key),
            ),
            None => (None, None),
        };
        match (access_key_id, secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Credentials {
                access_key_id,
                secret_access_key,
                session_token: section.and_then(|section| non_empty(&section.session_token)),
            }),
            (None, None) => {
                let found = self.profile_names();
                let found = if found.is_empty() {
                    "none".to_string()
                } else {
                    found.join(", ")
                };
                Err(SupportApiError::Configuration(format!(
                    "profile '{profile}' has no access_key_id or secret_access_key (profiles found: {found})"
                )))
            }
            (Some(_), None) => Err(SupportApiError::Configuration(format!(
                "profile '{profile}' is missing secret_access_key"
            ))),
            (None, Some(_)) => Err(SupportApiError::Configuration(format!(
                "profile '{profile}' is missing access_key_id"
            ))),
        }
    }
}

/// Parses `text` and resolves `profile`; `source` names the file in errors.
pub fn resolve_profile_from_text(
    text: &str,
    profile: &str,
    source: &str,
) -> Result<Credentials, SupportApiError> {
    let parsed =
        CredentialsFile::parse(text).map_err(|message| SupportApiError::CredentialsParse {
            path: source.to_string(),
            message,
        })?;
    parsed.resolve(profile)
}

#[derive(Debug, Clone)]
/// Loads credentials for one named profile from a local file.
pub struct CredentialResolver {
    path: PathBuf,
    profile: String,
}

impl CredentialResolver {
    pub fn new(path: PathBuf, profile: impl Into<String>) -> Self {
        Self {
            path,
            profile: profile.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn resolve(&self) -> Result<Credentials, SupportApiError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(SupportApiError::Configuration(format!(
                    "credentials file {} not found",
                    self.path.display()
                )));
            }
            Err(error) => {
                return Err(SupportApiError::Configuration(format!(
                    "failed to read credentials file {}: {error}",
                    self.path.display()
                )));
            }
        };
        let credentials = resolve_profile_from_text(
            &text,
            &self.profile,
            &self.path.display().to_string(),
        )?;
        tracing::debug!(
            profile = %self.profile,
            path = %self.path.display(),
            has_session_token = credentials.session_token.is_some(),
            "resolved support credentials"
        );
        Ok(credentials)
    }
}
