//! Client for submitting paid prescriptions to pharmacy fulfillment
//! backends.
//!
//! The backend's API secret is decrypted immediately before the request and
//! every decrypt leaves a credential audit row. A failed audit write aborts
//! the submission.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use credential_vault::{BackendCredentialStore, CredentialVault, VaultError};
use fulfillment_engine::Prescription;

use crate::services::CredentialAuditService;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("No active pharmacy backend for pharmacy {0}")]
    NoBackend(Uuid),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Credential audit write failed: {0}")]
    Audit(String),

    #[error("Pharmacy backend error: {0}")]
    Upstream(String),
}

/// Client for the external pharmacy order APIs.
pub struct PharmacyClient {
    client: reqwest::Client,
    vault: Arc<CredentialVault>,
    credentials: Arc<dyn BackendCredentialStore>,
    audit: CredentialAuditService,
}

#[derive(Serialize)]
struct SubmitOrderRequest<'a> {
    external_id: Uuid,
    patient_name: &'a str,
    medication: &'a str,
    strength: &'a str,
    quantity: i32,
    refills: i32,
    instructions: Option<&'a str>,
    store_id: Option<&'a str>,
    location_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct SubmitOrderResponse {
    queue_id: String,
}

impl PharmacyClient {
    pub fn new(
        vault: Arc<CredentialVault>,
        credentials: Arc<dyn BackendCredentialStore>,
        audit: CredentialAuditService,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build pharmacy HTTP client")?;

        Ok(Self {
            client,
            vault,
            credentials,
            audit,
        })
    }

    /// Submit a paid prescription to its pharmacy's active backend.
    ///
    /// Returns the queue id the pharmacy assigned, which correlates all
    /// later status webhooks.
    pub async fn submit_prescription(
        &self,
        prescription: &Prescription,
    ) -> Result<String, SubmitError> {
        let credential = self
            .credentials
            .find_active_for_pharmacy(prescription.pharmacy_id)
            .await?
            .ok_or(SubmitError::NoBackend(prescription.pharmacy_id))?;

        let secret = self.vault.reveal(&credential.secret_material())?;
        self.audit
            .log_revealed(credential.id, "pharmacy_submission")
            .await
            .map_err(|e| SubmitError::Audit(e.to_string()))?;

        let url = format!("{}/orders", credential.base_url.trim_end_matches('/'));
        let request = SubmitOrderRequest {
            external_id: prescription.id,
            patient_name: &prescription.patient_name,
            medication: &prescription.medication.name,
            strength: &prescription.medication.strength,
            quantity: prescription.medication.quantity,
            refills: prescription.medication.refills,
            instructions: prescription.medication.instructions.as_deref(),
            store_id: credential.store_id.as_deref(),
            location_id: credential.location_id.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&secret)
            .json(&request)
            .send()
            .await
            .map_err(|e| SubmitError::Upstream(format!("request error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Upstream(format!(
                "pharmacy backend returned {status}: {body}"
            )));
        }

        let submitted: SubmitOrderResponse = response
            .json()
            .await
            .map_err(|e| SubmitError::Upstream(format!("response parse error: {e}")))?;

        info!(
            prescription_id = %prescription.id,
            queue_id = %submitted.queue_id,
            system = %credential.system,
            "prescription submitted to pharmacy backend"
        );

        Ok(submitted.queue_id)
    }
}
