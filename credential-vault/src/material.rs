use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::EncryptedRecord;

/// A stored credential value, parsed once into its actual shape.
///
/// Backends onboarded before encryption-at-rest hold legacy plaintext
/// secrets; everything newer holds an `iv:tag:ciphertext` record. Consumers
/// match on the variant instead of re-probing the string at every call site.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub enum SecretMaterial {
    /// Encrypted `iv:tag:ciphertext` record.
    Encrypted(EncryptedRecord),
    /// Legacy plaintext secret, kept until rotated through the vault.
    Plaintext(String),
}

impl SecretMaterial {
    /// Classify a stored value. Anything that does not strictly match the
    /// encrypted record layout is treated as legacy plaintext.
    pub fn parse(stored: &str) -> Self {
        match EncryptedRecord::parse(stored) {
            Ok(record) => Self::Encrypted(record),
            Err(_) => Self::Plaintext(stored.to_string()),
        }
    }

    /// Structural check for the encrypted record format.
    pub fn is_encrypted(stored: &str) -> bool {
        EncryptedRecord::parse(stored).is_ok()
    }

    /// The value as it would appear in storage.
    pub fn stored_form(&self) -> String {
        match self {
            Self::Encrypted(record) => record.encode(),
            Self::Plaintext(value) => value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CredentialCipher;

    #[test]
    fn encrypted_records_are_recognized() {
        let cipher = CredentialCipher::new(CredentialCipher::generate_key()).unwrap();
        let record = cipher.encrypt("secret").unwrap();

        assert!(SecretMaterial::is_encrypted(&record));
        assert!(matches!(
            SecretMaterial::parse(&record),
            SecretMaterial::Encrypted(_)
        ));
    }

    #[test]
    fn plaintext_falls_through() {
        for legacy in [
            "dk_live_plain_api_key",
            "has:colons:but-not-hex",
            "aa:bb", // too few segments
            "",
        ] {
            assert!(!SecretMaterial::is_encrypted(legacy));
            assert_eq!(
                SecretMaterial::parse(legacy),
                SecretMaterial::Plaintext(legacy.to_string())
            );
        }
    }

    #[test]
    fn uppercase_hex_still_counts_as_encrypted() {
        let cipher = CredentialCipher::new(CredentialCipher::generate_key()).unwrap();
        let record = cipher.encrypt("secret").unwrap().to_uppercase();

        assert!(SecretMaterial::is_encrypted(&record));
    }

    #[test]
    fn stored_form_is_canonical() {
        let cipher = CredentialCipher::new(CredentialCipher::generate_key()).unwrap();
        let record = cipher.encrypt("secret").unwrap();

        assert_eq!(SecretMaterial::parse(&record).stored_form(), record);
        assert_eq!(
            SecretMaterial::parse("plain").stored_form(),
            "plain".to_string()
        );
    }
}
