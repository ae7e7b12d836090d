//! Credential Vault - encrypted pharmacy backend credentials for TeleRx Engine
//!
//! This crate owns everything about backend secrets at rest:
//!
//! - AES-256-GCM encryption with a fresh 128-bit IV per call
//! - The colon-separated `iv:tag:ciphertext` hex record format
//! - Tagged parsing of stored values (encrypted record vs legacy plaintext)
//! - Rotation to fresh records for the admin re-encryption flow
//! - The backend credential model and its persistence interface
//!
//! The encryption key comes from process configuration
//! (`CREDENTIAL_VAULT_KEY`, 64 hex characters) and is zeroized on drop.

pub mod cipher;
pub mod error;
pub mod material;
pub mod store;
pub mod vault;

pub use cipher::{CredentialCipher, EncryptedRecord, IV_LEN, KEY_LEN, TAG_LEN};
pub use error::{VaultError, VaultResult};
pub use material::SecretMaterial;
pub use store::{BackendCredential, BackendCredentialStore, NewBackendCredential, PharmacySystem};
pub use vault::{CredentialVault, VAULT_KEY_ENV};
