//! Persistence and administration of the two secrets the triage pipeline
//! needs: the repository API token and the completion API key.
//!
//! Secrets are read once when a session is constructed and held as redacting
//! wrappers afterwards.

pub mod admin;
pub mod credential_store;
pub mod secret_sealing;
pub mod types;

pub use admin::{redact_secret, CredentialAdmin, SecretStatus};
pub use credential_store::{
    resolve_credentials, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
pub use secret_sealing::SecretSealer;
pub use types::{CredentialStoreEncryptionMode, Credentials, SecretKind, SecretString};
