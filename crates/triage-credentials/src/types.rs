use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `CredentialStoreEncryptionMode` values.
pub enum CredentialStoreEncryptionMode {
    None,
    #[default]
    Keyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// The two secrets the pipeline authorizes outbound requests with.
pub enum SecretKind {
    GithubToken,
    CompletionApiKey,
}

impl SecretKind {
    pub const ALL: [SecretKind; 2] = [SecretKind::GithubToken, SecretKind::CompletionApiKey];

    pub fn as_str(self) -> &'static str {
        match self {
            SecretKind::GithubToken => "github_token",
            SecretKind::CompletionApiKey => "completion_api_key",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SecretKind::GithubToken => "GitHub API token",
            SecretKind::CompletionApiKey => "Completion API key",
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-empty secret whose `Debug` and `Display` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        let trimmed = secret.trim();
        if trimmed.is_empty() {
            bail!("secret must not be empty");
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns plaintext for explicit use sites such as request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone)]
/// Both secrets, resolved once per session and shared read-only afterwards.
pub struct Credentials {
    pub github_token: SecretString,
    pub completion_api_key: SecretString,
}

impl Credentials {
    pub fn get(&self, kind: SecretKind) -> &SecretString {
        match kind {
            SecretKind::GithubToken => &self.github_token,
            SecretKind::CompletionApiKey => &self.completion_api_key,
        }
    }
}
