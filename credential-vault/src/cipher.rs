use aes_gcm::{
    aead::{generic_array::typenum::U16, Aead, KeyInit, OsRng},
    aes::Aes256,
    AesGcm, Nonce,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::ZeroizeOnDrop;

use crate::error::{VaultError, VaultResult};

/// IV length in bytes (128-bit, one fresh random IV per encryption).
pub const IV_LEN: usize = 16;
/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// AES-256-GCM with a 128-bit nonce, matching the stored credential format.
type CipherImpl = AesGcm<Aes256, U16>;

/// AES-256-GCM credential cipher
///
/// Encrypts pharmacy backend secrets into the colon-separated
/// `iv:tag:ciphertext` record format (lowercase hex, 16-byte IV, detached
/// 16-byte authentication tag). The key is zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct CredentialCipher {
    #[zeroize(skip)]
    cipher: CipherImpl,
    /// Master key - automatically zeroized on drop
    key: [u8; KEY_LEN],
}

impl CredentialCipher {
    /// Create a new cipher with a 32-byte key
    pub fn new(key: [u8; KEY_LEN]) -> VaultResult<Self> {
        let cipher = CipherImpl::new_from_slice(&key)
            .map_err(|_| VaultError::Configuration("invalid key".to_string()))?;

        Ok(Self { cipher, key })
    }

    /// Create from a hex-encoded key. Anything other than 64 hex characters
    /// decoding to exactly 32 bytes is a configuration error.
    pub fn from_hex(key_hex: &str) -> VaultResult<Self> {
        let key_bytes = hex::decode(key_hex.trim())
            .map_err(|_| VaultError::Configuration("key is not valid hex".to_string()))?;

        if key_bytes.len() != KEY_LEN {
            return Err(VaultError::Configuration(format!(
                "key must be {} bytes, got {}",
                KEY_LEN,
                key_bytes.len()
            )));
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&key_bytes);

        Self::new(key)
    }

    /// Generate a new random key (cryptographically secure)
    pub fn generate_key() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Short fingerprint of the loaded key, safe to log at startup.
    pub fn key_fingerprint(&self) -> String {
        let digest = Sha256::digest(self.key);
        hex::encode(&digest[..4])
    }

    /// Encrypt into the stored record format: `{iv_hex}:{tag_hex}:{ct_hex}`
    pub fn encrypt(&self, plaintext: &str) -> VaultResult<String> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let nonce = Nonce::from_slice(&iv);

        // aes-gcm appends the tag to the ciphertext; the stored format keeps
        // them as separate segments
        let combined = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::EncryptionFailed)?;

        let split_at = combined
            .len()
            .checked_sub(TAG_LEN)
            .ok_or(VaultError::EncryptionFailed)?;
        let (ciphertext, tag) = combined.split_at(split_at);

        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    /// Decrypt a stored record, verifying the authentication tag.
    pub fn decrypt(&self, record: &str) -> VaultResult<String> {
        let parsed = EncryptedRecord::parse(record)?;
        self.decrypt_record(&parsed)
    }

    /// Decrypt an already-parsed record.
    pub fn decrypt_record(&self, record: &EncryptedRecord) -> VaultResult<String> {
        let nonce = Nonce::from_slice(&record.iv);

        let mut combined = record.ciphertext.clone();
        combined.extend_from_slice(&record.tag);

        let plaintext = self
            .cipher
            .decrypt(nonce, combined.as_slice())
            .map_err(|_| VaultError::Integrity)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::Integrity)
    }
}

/// Parsed `iv:tag:ciphertext` credential record.
#[derive(Debug, Clone, PartialEq, Eq, zeroize::Zeroize)]
pub struct EncryptedRecord {
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncryptedRecord {
    /// Strict structural parse: exactly three non-empty colon-separated
    /// segments, all valid hex, IV and tag of exact length.
    pub fn parse(record: &str) -> VaultResult<Self> {
        let parts: Vec<&str> = record.split(':').collect();
        if parts.len() != 3 {
            return Err(VaultError::InvalidFormat(
                "expected iv:tag:ciphertext".to_string(),
            ));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(VaultError::InvalidFormat("empty segment".to_string()));
        }

        let iv_bytes = hex::decode(parts[0])
            .map_err(|_| VaultError::InvalidFormat("iv is not valid hex".to_string()))?;
        let tag_bytes = hex::decode(parts[1])
            .map_err(|_| VaultError::InvalidFormat("tag is not valid hex".to_string()))?;
        let ciphertext = hex::decode(parts[2])
            .map_err(|_| VaultError::InvalidFormat("ciphertext is not valid hex".to_string()))?;

        let iv: [u8; IV_LEN] = iv_bytes
            .try_into()
            .map_err(|_| VaultError::InvalidFormat(format!("iv must be {IV_LEN} bytes")))?;
        let tag: [u8; TAG_LEN] = tag_bytes
            .try_into()
            .map_err(|_| VaultError::InvalidFormat(format!("tag must be {TAG_LEN} bytes")))?;

        Ok(Self {
            iv,
            tag,
            ciphertext,
        })
    }

    /// Render back to the canonical stored form.
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}",
            hex::encode(self.iv),
            hex::encode(self.tag),
            hex::encode(&self.ciphertext)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> CredentialCipher {
        CredentialCipher::new(CredentialCipher::generate_key()).unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = cipher();

        let plaintext = "dk_live_4f9a8b7c6d5e";
        let record = cipher.encrypt(plaintext).unwrap();
        let decrypted = cipher.decrypt(&record).unwrap();

        assert_eq!(plaintext, decrypted);
    }

    #[test]
    fn record_has_three_hex_segments() {
        let cipher = cipher();
        let record = cipher.encrypt("api-key").unwrap();

        let parts: Vec<&str> = record.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), IV_LEN * 2);
        assert_eq!(parts[1].len(), TAG_LEN * 2);
        assert!(parts
            .iter()
            .all(|p| p.chars().all(|c| c.is_ascii_hexdigit())));
    }

    #[test]
    fn same_plaintext_gets_fresh_ivs() {
        let cipher = cipher();

        let first = cipher.encrypt("same secret").unwrap();
        let second = cipher.encrypt("same secret").unwrap();

        assert_ne!(first, second);
        assert_eq!(cipher.decrypt(&first).unwrap(), "same secret");
        assert_eq!(cipher.decrypt(&second).unwrap(), "same secret");
    }

    #[test]
    fn tampered_ciphertext_fails_integrity() {
        let cipher = cipher();
        let record = cipher.encrypt("authenticated secret").unwrap();

        let tampered = flip_last_hex_char(&record);
        assert_eq!(cipher.decrypt(&tampered).unwrap_err(), VaultError::Integrity);
    }

    #[test]
    fn tampered_tag_fails_integrity() {
        let cipher = cipher();
        let record = cipher.encrypt("authenticated secret").unwrap();

        let mut parts: Vec<String> = record.split(':').map(str::to_string).collect();
        parts[1] = flip_last_hex_char(&parts[1]);
        let tampered = parts.join(":");

        assert_eq!(cipher.decrypt(&tampered).unwrap_err(), VaultError::Integrity);
    }

    #[test]
    fn tampered_iv_fails_integrity() {
        let cipher = cipher();
        let record = cipher.encrypt("authenticated secret").unwrap();

        let mut parts: Vec<String> = record.split(':').map(str::to_string).collect();
        parts[0] = flip_last_hex_char(&parts[0]);
        let tampered = parts.join(":");

        assert_eq!(cipher.decrypt(&tampered).unwrap_err(), VaultError::Integrity);
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let record = cipher().encrypt("secret").unwrap();
        let other = cipher();

        assert_eq!(other.decrypt(&record).unwrap_err(), VaultError::Integrity);
    }

    #[test]
    fn malformed_records_are_rejected() {
        let cipher = cipher();

        for bad in [
            "not-a-record",
            "aa:bb",
            "aa:bb:cc:dd",
            "::",
            "zz:bb:cc",
            "aabb:ccdd:eeff", // iv too short
        ] {
            assert!(matches!(
                cipher.decrypt(bad),
                Err(VaultError::InvalidFormat(_))
            ));
        }
    }

    #[test]
    fn from_hex_rejects_bad_keys() {
        let short = hex::encode([0u8; 16]);
        assert!(matches!(
            CredentialCipher::from_hex(&short),
            Err(VaultError::Configuration(_))
        ));
        assert!(matches!(
            CredentialCipher::from_hex("not hex at all"),
            Err(VaultError::Configuration(_))
        ));
    }

    #[test]
    fn from_hex_accepts_generated_key() {
        let key_hex = hex::encode(CredentialCipher::generate_key());
        let cipher = CredentialCipher::from_hex(&key_hex).unwrap();

        let record = cipher.encrypt("hello").unwrap();
        assert_eq!(cipher.decrypt(&record).unwrap(), "hello");
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(
            CredentialCipher::generate_key(),
            CredentialCipher::generate_key()
        );
    }

    #[test]
    fn record_encode_parse_roundtrip() {
        let cipher = cipher();
        let record = cipher.encrypt("roundtrip").unwrap();
        let parsed = EncryptedRecord::parse(&record).unwrap();

        assert_eq!(parsed.encode(), record);
        assert_eq!(cipher.decrypt_record(&parsed).unwrap(), "roundtrip");
    }

    fn flip_last_hex_char(s: &str) -> String {
        let mut chars: Vec<char> = s.chars().collect();
        if let Some(last) = chars.last_mut() {
            *last = if *last == '0' { '1' } else { '0' };
        }
        chars.into_iter().collect()
    }
}
