use tracing::warn;

use crate::cipher::CredentialCipher;
use crate::error::{VaultError, VaultResult};
use crate::material::SecretMaterial;

/// Environment variable holding the hex-encoded AES-256 key.
pub const VAULT_KEY_ENV: &str = "CREDENTIAL_VAULT_KEY";

/// Credential vault for pharmacy backend secrets
///
/// Wraps the AES-256-GCM cipher with the policy pieces the pipeline needs:
/// key loading from process configuration, legacy plaintext pass-through and
/// rotation to fresh records.
pub struct CredentialVault {
    cipher: CredentialCipher,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Build from an explicit 32-byte key.
    pub fn new(key: [u8; 32]) -> VaultResult<Self> {
        Ok(Self {
            cipher: CredentialCipher::new(key)?,
        })
    }

    /// Build from a hex-encoded key string.
    pub fn from_key_hex(key_hex: &str) -> VaultResult<Self> {
        Ok(Self {
            cipher: CredentialCipher::from_hex(key_hex)?,
        })
    }

    /// Build from `CREDENTIAL_VAULT_KEY`. A missing or malformed key is a
    /// configuration error; callers treat it as fatal at startup.
    pub fn from_env() -> VaultResult<Self> {
        let key_hex = std::env::var(VAULT_KEY_ENV)
            .map_err(|_| VaultError::Configuration(format!("{VAULT_KEY_ENV} is not set")))?;
        Self::from_key_hex(&key_hex)
    }

    /// Fingerprint of the loaded key, safe to log.
    pub fn key_fingerprint(&self) -> String {
        self.cipher.key_fingerprint()
    }

    /// Encrypt a secret into the stored record format.
    pub fn encrypt(&self, plaintext: &str) -> VaultResult<String> {
        if plaintext.is_empty() {
            return Err(VaultError::InvalidInput("empty credential".to_string()));
        }
        self.cipher.encrypt(plaintext)
    }

    /// Decrypt a stored record.
    pub fn decrypt(&self, record: &str) -> VaultResult<String> {
        self.cipher.decrypt(record)
    }

    /// Recover the plaintext secret from stored material.
    ///
    /// Legacy plaintext passes through unchanged so un-migrated backends keep
    /// working; a warning is emitted so operators can find and rotate them.
    pub fn reveal(&self, material: &SecretMaterial) -> VaultResult<String> {
        match material {
            SecretMaterial::Encrypted(record) => self.cipher.decrypt_record(record),
            SecretMaterial::Plaintext(value) => {
                warn!("revealing legacy plaintext credential; rotate it through the vault");
                Ok(value.clone())
            }
        }
    }

    /// Produce a fresh encrypted record (new IV) for the given plaintext.
    /// Used by the admin re-encryption endpoint and legacy upgrades.
    pub fn rotate(&self, plaintext: &str) -> VaultResult<String> {
        self.encrypt(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> CredentialVault {
        CredentialVault::new(CredentialCipher::generate_key()).unwrap()
    }

    #[test]
    fn reveal_decrypts_encrypted_material() {
        let vault = vault();
        let record = vault.encrypt("api-key-123").unwrap();

        let material = SecretMaterial::parse(&record);
        assert_eq!(vault.reveal(&material).unwrap(), "api-key-123");
    }

    #[test]
    fn reveal_passes_legacy_plaintext_through() {
        let vault = vault();
        let material = SecretMaterial::parse("legacy-plain-key");

        assert_eq!(vault.reveal(&material).unwrap(), "legacy-plain-key");
    }

    #[test]
    fn rotate_produces_a_distinct_record_for_same_secret() {
        let vault = vault();
        let first = vault.encrypt("stable-secret").unwrap();
        let second = vault.rotate("stable-secret").unwrap();

        assert_ne!(first, second);
        assert_eq!(vault.decrypt(&second).unwrap(), "stable-secret");
    }

    #[test]
    fn empty_credentials_are_rejected() {
        assert!(matches!(
            vault().encrypt(""),
            Err(VaultError::InvalidInput(_))
        ));
    }

    #[test]
    fn from_key_hex_enforces_length() {
        let err = CredentialVault::from_key_hex("abcd").unwrap_err();
        assert!(matches!(err, VaultError::Configuration(_)));
    }
}
