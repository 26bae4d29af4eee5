use anyhow::Result;

use crate::{CredentialStore, SecretKind};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Presence of one stored secret, with a redacted preview when set.
pub struct SecretStatus {
    pub kind: SecretKind,
    pub present: bool,
    pub preview: Option<String>,
}

/// Administrative operations over a credential store.
///
/// This is the only way to inspect or reset stored secrets; it never exposes
/// full plaintext.
pub struct CredentialAdmin<'a, S: CredentialStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CredentialStore + ?Sized> CredentialAdmin<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn status(&self) -> Result<Vec<SecretStatus>> {
        SecretKind::ALL
            .into_iter()
            .map(|kind| {
                let secret = self.store.read_secret(kind)?;
                Ok(SecretStatus {
                    kind,
                    present: secret.is_some(),
                    preview: secret.map(|value| redact_secret(value.expose())),
                })
            })
            .collect()
    }

    pub fn reset(&self, kind: SecretKind) -> Result<bool> {
        let removed = self.store.clear_secret(kind)?;
        tracing::info!(secret = %kind, removed, "credential reset");
        Ok(removed)
    }

    pub fn reset_all(&self) -> Result<Vec<SecretKind>> {
        let mut removed = Vec::new();
        for kind in SecretKind::ALL {
            if self.reset(kind)? {
                removed.push(kind);
            }
        }
        Ok(removed)
    }
}

/// Keeps at most the first and last four characters of long secrets.
pub fn redact_secret(secret: &str) -> String {
    let chars = secret.chars().collect::<Vec<_>>();
    if chars.len() < 12 {
        return "*".repeat(chars.len().clamp(4, 8));
    }
    let head = chars[..4].iter().collect::<String>();
    let tail = chars[chars.len() - 4..].iter().collect::<String>();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::{redact_secret, CredentialAdmin};
    use crate::{CredentialStore, MemoryCredentialStore, SecretKind};

    #[test]
    fn unit_redact_secret_hides_middle_and_short_values() {
        assert_eq!(redact_secret("sk-abcdefghijklmnop"), "sk-a...mnop");
        assert_eq!(redact_secret("short"), "*****");
        assert_eq!(redact_secret("ab"), "****");
    }

    #[test]
    fn functional_status_reports_presence_without_plaintext() {
        let store = MemoryCredentialStore::new();
        store
            .write_secret(SecretKind::GithubToken, "ghp_0123456789abcdef")
            .expect("seed");
        let statuses = CredentialAdmin::new(&store).status().expect("status");

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].kind, SecretKind::GithubToken);
        assert!(statuses[0].present);
        let preview = statuses[0].preview.as_deref().expect("preview");
        assert_ne!(preview, "ghp_0123456789abcdef");
        assert!(!preview.contains("456789ab"));
        assert!(!statuses[1].present);
        assert_eq!(statuses[1].preview, None);
    }

    #[test]
    fn functional_reset_removes_only_requested_secret() {
        let store = MemoryCredentialStore::new();
        store
            .write_secret(SecretKind::GithubToken, "ghp_token_value")
            .expect("seed");
        store
            .write_secret(SecretKind::CompletionApiKey, "sk-key-value")
            .expect("seed");
        let admin = CredentialAdmin::new(&store);

        assert!(admin.reset(SecretKind::CompletionApiKey).expect("reset"));
        assert!(store
            .read_secret(SecretKind::CompletionApiKey)
            .expect("read")
            .is_none());
        assert!(store
            .read_secret(SecretKind::GithubToken)
            .expect("read")
            .is_some());

        assert_eq!(
            admin.reset_all().expect("reset all"),
            vec![SecretKind::GithubToken]
        );
    }
}
