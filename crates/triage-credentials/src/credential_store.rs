//! Credential store trait, resolution order, and the on-disk store.
//!
//! Secrets live in a versioned JSON document written atomically. In keyed mode
//! each secret is sealed with AES-256-GCM using a key derived from an explicit
//! passphrase or, when none is given, from machine-local identifiers.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use triage_core::write_private_text_atomic;

use crate::secret_sealing::SecretSealer;
use crate::types::{CredentialStoreEncryptionMode, Credentials, SecretKind, SecretString};

const CREDENTIAL_STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct CredentialStoreFile {
    schema_version: u32,
    encryption: CredentialStoreEncryptionMode,
    #[serde(default)]
    secrets: BTreeMap<String, StoredSecret>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct StoredSecret {
    secret: String,
}

/// Persists and retrieves the pipeline's two secrets.
pub trait CredentialStore {
    fn read_secret(&self, kind: SecretKind) -> Result<Option<SecretString>>;

    fn write_secret(&self, kind: SecretKind, secret: &str) -> Result<()>;

    /// Removes a secret, returning whether one was present.
    fn clear_secret(&self, kind: SecretKind) -> Result<bool>;
}

/// Reads both secrets once, filling gaps from `overrides` and then `acquire`.
///
/// Any secret obtained from an override or from `acquire` is written back so
/// later sessions find it in the store.
pub fn resolve_credentials<S, F>(
    store: &S,
    overrides: &BTreeMap<SecretKind, String>,
    mut acquire: F,
) -> Result<Credentials>
where
    S: CredentialStore + ?Sized,
    F: FnMut(SecretKind) -> Result<Option<String>>,
{
    let mut resolved = BTreeMap::new();
    for kind in SecretKind::ALL {
        let supplied = overrides
            .get(&kind)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty());
        let secret = if let Some(value) = supplied {
            store.write_secret(kind, value)?;
            SecretString::new(value)?
        } else if let Some(stored) = store.read_secret(kind)? {
            stored
        } else {
            let acquired = acquire(kind)?
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| anyhow!("{} is required but was not provided", kind.label()))?;
            store.write_secret(kind, &acquired)?;
            SecretString::new(acquired)?
        };
        resolved.insert(kind, secret);
    }

    let mut take = |kind: SecretKind| {
        resolved
            .remove(&kind)
            .ok_or_else(|| anyhow!("{} was not resolved", kind.label()))
    };
    Ok(Credentials {
        github_token: take(SecretKind::GithubToken)?,
        completion_api_key: take(SecretKind::CompletionApiKey)?,
    })
}

/// Both secrets in one schema-versioned JSON file, sealed per entry when keyed.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    encryption: CredentialStoreEncryptionMode,
    key: Option<String>,
}

impl FileCredentialStore {
    pub fn new(
        path: impl Into<PathBuf>,
        encryption: CredentialStoreEncryptionMode,
        key: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            encryption,
            key,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<SecretKind, SecretString>> {
        tracing::debug!(
            credential_store = %self.path.display(),
            encryption = ?self.encryption,
            has_key = self.key.as_deref().is_some_and(|value| !value.trim().is_empty()),
            "loading credential store"
        );
        load_credential_store(&self.path, self.key.as_deref())
    }

    fn save(&self, secrets: &BTreeMap<SecretKind, SecretString>) -> Result<()> {
        tracing::debug!(
            credential_store = %self.path.display(),
            encryption = ?self.encryption,
            entries = secrets.len(),
            "saving credential store"
        );
        save_credential_store(&self.path, secrets, self.encryption, self.key.as_deref())
    }
}

impl CredentialStore for FileCredentialStore {
    fn read_secret(&self, kind: SecretKind) -> Result<Option<SecretString>> {
        Ok(self.load()?.remove(&kind))
    }

    fn write_secret(&self, kind: SecretKind, secret: &str) -> Result<()> {
        let secret = SecretString::new(secret)?;
        let mut secrets = self.load()?;
        secrets.insert(kind, secret);
        self.save(&secrets)
    }

    fn clear_secret(&self, kind: SecretKind) -> Result<bool> {
        let mut secrets = self.load()?;
        let removed = secrets.remove(&kind).is_some();
        if removed {
            self.save(&secrets)?;
        }
        Ok(removed)
    }
}

#[derive(Debug, Default)]
/// Process-local store for embedding hosts that persist secrets elsewhere.
pub struct MemoryCredentialStore {
    secrets: Mutex<BTreeMap<SecretKind, SecretString>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn read_secret(&self, kind: SecretKind) -> Result<Option<SecretString>> {
        let secrets = self
            .secrets
            .lock()
            .map_err(|_| anyhow!("credential store lock is poisoned"))?;
        Ok(secrets.get(&kind).cloned())
    }

    fn write_secret(&self, kind: SecretKind, secret: &str) -> Result<()> {
        let secret = SecretString::new(secret)?;
        self.secrets
            .lock()
            .map_err(|_| anyhow!("credential store lock is poisoned"))?
            .insert(kind, secret);
        Ok(())
    }

    fn clear_secret(&self, kind: SecretKind) -> Result<bool> {
        Ok(self
            .secrets
            .lock()
            .map_err(|_| anyhow!("credential store lock is poisoned"))?
            .remove(&kind)
            .is_some())
    }
}

fn secret_kind_from_str(raw: &str) -> Option<SecretKind> {
    SecretKind::ALL
        .into_iter()
        .find(|kind| kind.as_str() == raw)
}

fn load_credential_store(
    path: &Path,
    key: Option<&str>,
) -> Result<BTreeMap<SecretKind, SecretString>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read credential store {}", path.display()))?;
    let parsed = serde_json::from_str::<CredentialStoreFile>(&raw)
        .with_context(|| format!("credential store {} is not valid JSON", path.display()))?;
    if parsed.schema_version != CREDENTIAL_STORE_SCHEMA_VERSION {
        bail!(
            "credential store {} has schema_version {}; this build reads version {}",
            path.display(),
            parsed.schema_version,
            CREDENTIAL_STORE_SCHEMA_VERSION
        );
    }

    let sealer = SecretSealer::new(parsed.encryption, key)?;
    let mut secrets = BTreeMap::new();
    for (name, record) in parsed.secrets {
        let Some(kind) = secret_kind_from_str(&name) else {
            tracing::debug!(entry = %name, "ignoring unknown credential store entry");
            continue;
        };
        let plaintext = sealer
            .open(kind, &record.secret)
            .with_context(|| format!("cannot read '{name}' from {}", path.display()))?;
        secrets.insert(kind, SecretString::new(plaintext)?);
    }
    Ok(secrets)
}

fn save_credential_store(
    path: &Path,
    secrets: &BTreeMap<SecretKind, SecretString>,
    encryption: CredentialStoreEncryptionMode,
    key: Option<&str>,
) -> Result<()> {
    let sealer = SecretSealer::new(encryption, key)?;
    let secrets = secrets
        .iter()
        .map(|(kind, secret)| {
            Ok((
                kind.as_str().to_string(),
                StoredSecret {
                    secret: sealer.seal(*kind, secret.expose())?,
                },
            ))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    let document = CredentialStoreFile {
        schema_version: CREDENTIAL_STORE_SCHEMA_VERSION,
        encryption,
        secrets,
    };
    let mut encoded =
        serde_json::to_string_pretty(&document).context("failed to serialize credential store")?;
    encoded.push('\n');
    write_private_text_atomic(path, &encoded)
}
