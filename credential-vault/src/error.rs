use thiserror::Error;

/// Vault error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Missing or malformed key material. Fatal at startup.
    #[error("Vault configuration error: {0}")]
    Configuration(String),

    /// Authentication failed during decryption. Deliberately carries no
    /// detail about which part of the record was tampered with.
    #[error("Credential integrity check failed")]
    Integrity,

    /// Stored record does not match the expected iv:tag:ciphertext layout.
    #[error("Malformed credential record: {0}")]
    InvalidFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Storage backend error: {0}")]
    Storage(String),
}

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;
