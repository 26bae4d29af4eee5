use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use sha2::{Digest, Sha256};

use crate::types::{CredentialStoreEncryptionMode, SecretKind};

const SEALED_PREFIX: &str = "sealed:v1:";
const NONCE_LEN: usize = 12;
const MIN_PASSPHRASE_CHARS: usize = 8;
const PASSPHRASE_DOMAIN: &[u8] = b"triage-credentials/passphrase/v1";
const MACHINE_DOMAIN: &[u8] = b"triage-credentials/machine/v1";
const MACHINE_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];
const MACHINE_ENV_VARS: [&str; 3] = ["HOSTNAME", "COMPUTERNAME", "USER"];

/// Seals secrets for one store with a key derived once.
///
/// Every sealed value is bound to its [`SecretKind`] through the AEAD
/// associated data, so moving a sealed token into another entry fails to open.
pub struct SecretSealer {
    cipher: Option<Aes256Gcm>,
}

impl SecretSealer {
    pub fn new(mode: CredentialStoreEncryptionMode, passphrase: Option<&str>) -> Result<Self> {
        let cipher = match mode {
            CredentialStoreEncryptionMode::None => None,
            CredentialStoreEncryptionMode::Keyed => {
                let key = derive_key(passphrase)?;
                Some(
                    Aes256Gcm::new_from_slice(&key)
                        .map_err(|_| anyhow!("derived credential key has the wrong length"))?,
                )
            }
        };
        Ok(Self { cipher })
    }

    pub fn seal(&self, kind: SecretKind, secret: &str) -> Result<String> {
        let secret = secret.trim();
        if secret.is_empty() {
            bail!("refusing to store an empty {}", kind.label());
        }
        let Some(cipher) = &self.cipher else {
            return Ok(secret.to_string());
        };

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let aad = associated_data(kind);
        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: secret.as_bytes(),
                    aad: &aad,
                },
            )
            .map_err(|_| anyhow!("failed to seal {}", kind.label()))?;
        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(format!("{SEALED_PREFIX}{}", BASE64_STANDARD.encode(sealed)))
    }

    pub fn open(&self, kind: SecretKind, stored: &str) -> Result<String> {
        let stored = stored.trim();
        let plaintext = match &self.cipher {
            None => {
                if stored.starts_with(SEALED_PREFIX) {
                    bail!("{} is sealed but the store is not keyed", kind.label());
                }
                stored.to_string()
            }
            Some(cipher) => {
                let encoded = stored
                    .strip_prefix(SEALED_PREFIX)
                    .ok_or_else(|| anyhow!("{} is not sealed", kind.label()))?;
                let raw = BASE64_STANDARD
                    .decode(encoded)
                    .context("sealed secret is not valid base64")?;
                if raw.len() <= NONCE_LEN {
                    bail!("sealed secret is truncated");
                }
                let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
                let aad = associated_data(kind);
                let bytes = cipher
                    .decrypt(
                        Nonce::from_slice(nonce),
                        Payload {
                            msg: ciphertext,
                            aad: &aad,
                        },
                    )
                    .map_err(|_| {
                        anyhow!(
                            "{} failed authentication (wrong key or tampered store)",
                            kind.label()
                        )
                    })?;
                String::from_utf8(bytes).context("sealed secret is not valid UTF-8")?
            }
        };
        if plaintext.trim().is_empty() {
            bail!("stored {} is empty", kind.label());
        }
        Ok(plaintext)
    }
}

fn associated_data(kind: SecretKind) -> Vec<u8> {
    format!("triage-credentials/v1/{}", kind.as_str()).into_bytes()
}

fn derive_key(passphrase: Option<&str>) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    match passphrase.map(str::trim).filter(|value| !value.is_empty()) {
        Some(passphrase) => {
            if passphrase.chars().count() < MIN_PASSPHRASE_CHARS {
                bail!("credential store key must be at least {MIN_PASSPHRASE_CHARS} characters");
            }
            hasher.update(PASSPHRASE_DOMAIN);
            hasher.update(passphrase.as_bytes());
        }
        None => {
            hasher.update(MACHINE_DOMAIN);
            for part in machine_identity() {
                hasher.update((part.len() as u64).to_le_bytes());
                hasher.update(part.as_bytes());
            }
        }
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    Ok(key)
}

/// Stable per-machine inputs used when no passphrase is configured.
fn machine_identity() -> Vec<String> {
    let mut parts = vec![
        std::env::consts::OS.to_string(),
        std::env::consts::ARCH.to_string(),
    ];
    parts.extend(MACHINE_ENV_VARS.iter().filter_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| format!("{name}={value}"))
    }));
    if let Some(machine_id) = MACHINE_ID_PATHS.iter().find_map(|path| {
        std::fs::read_to_string(path)
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|value| !value.is_empty())
    }) {
        parts.push(format!("machine-id={machine_id}"));
    }
    parts
}
