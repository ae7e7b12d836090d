use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::VaultResult;
use crate::material::SecretMaterial;

/// External pharmacy system protocol. One per pharmacy backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PharmacySystem {
    DigitalRx,
    PioneerRx,
}

impl PharmacySystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DigitalRx => "digital_rx",
            Self::PioneerRx => "pioneer_rx",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "digital_rx" => Some(Self::DigitalRx),
            "pioneer_rx" => Some(Self::PioneerRx),
            _ => None,
        }
    }
}

impl fmt::Display for PharmacySystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection record for one external pharmacy system.
///
/// Created at pharmacy onboarding. Never deleted, only deactivated, so audit
/// history keeps resolving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendCredential {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub system: PharmacySystem,
    pub base_url: String,
    pub store_id: Option<String>,
    pub location_id: Option<String>,
    /// Stored secret: an encrypted record, or legacy plaintext on
    /// un-migrated rows.
    pub secret: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BackendCredential {
    /// Parse the stored secret into its actual shape.
    pub fn secret_material(&self) -> SecretMaterial {
        SecretMaterial::parse(&self.secret)
    }
}

/// Fields for onboarding a new backend credential. The secret must already
/// be an encrypted record.
#[derive(Debug, Clone)]
pub struct NewBackendCredential {
    pub pharmacy_id: Uuid,
    pub system: PharmacySystem,
    pub base_url: String,
    pub store_id: Option<String>,
    pub location_id: Option<String>,
    pub secret: String,
}

/// Persistence interface for backend credentials.
#[async_trait]
pub trait BackendCredentialStore: Send + Sync {
    async fn find_active_for_pharmacy(
        &self,
        pharmacy_id: Uuid,
    ) -> VaultResult<Option<BackendCredential>>;

    async fn find_by_id(&self, id: Uuid) -> VaultResult<Option<BackendCredential>>;

    async fn insert(&self, credential: NewBackendCredential) -> VaultResult<BackendCredential>;

    /// Replace the stored secret in a single atomic update. Returns `false`
    /// when the credential does not exist.
    async fn update_secret(&self, id: Uuid, secret: &str) -> VaultResult<bool>;

    /// Deactivate without deleting. Returns `false` when the credential does
    /// not exist.
    async fn deactivate(&self, id: Uuid) -> VaultResult<bool>;

    async fn list(&self) -> VaultResult<Vec<BackendCredential>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pharmacy_system_parse_is_case_insensitive() {
        assert_eq!(
            PharmacySystem::parse("DIGITAL_RX"),
            Some(PharmacySystem::DigitalRx)
        );
        assert_eq!(
            PharmacySystem::parse("pioneer_rx"),
            Some(PharmacySystem::PioneerRx)
        );
        assert_eq!(PharmacySystem::parse("fax"), None);
    }

    #[test]
    fn pharmacy_system_round_trips_through_str() {
        for system in [PharmacySystem::DigitalRx, PharmacySystem::PioneerRx] {
            assert_eq!(PharmacySystem::parse(system.as_str()), Some(system));
        }
    }
}
