//! Process-local store implementations.
//!
//! Back the state machine in tests and demos without a database. The server
//! wires Postgres implementations of the same traits.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::audit::{TransitionLog, TransitionRecord};
use crate::error::FulfillmentResult;
use crate::model::Prescription;
use crate::status::{PaymentStatus, PrescriptionStatus};
use crate::store::FulfillmentStore;

/// In-memory [`FulfillmentStore`].
#[derive(Default)]
pub struct InMemoryFulfillmentStore {
    prescriptions: Arc<RwLock<HashMap<Uuid, Prescription>>>,
}

impl InMemoryFulfillmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a prescription.
    pub async fn insert(&self, prescription: Prescription) {
        self.prescriptions
            .write()
            .await
            .insert(prescription.id, prescription);
    }

    /// Fetch a snapshot of a stored prescription.
    pub async fn get(&self, id: Uuid) -> Option<Prescription> {
        self.prescriptions.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl FulfillmentStore for InMemoryFulfillmentStore {
    async fn find_by_queue_id(&self, queue_id: &str) -> FulfillmentResult<Option<Prescription>> {
        let prescriptions = self.prescriptions.read().await;
        Ok(prescriptions
            .values()
            .find(|p| p.queue_id.as_deref() == Some(queue_id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> FulfillmentResult<Option<Prescription>> {
        Ok(self.prescriptions.read().await.get(&id).cloned())
    }

    async fn apply_status(
        &self,
        prescription_id: Uuid,
        status: PrescriptionStatus,
        tracking_number: Option<&str>,
    ) -> FulfillmentResult<()> {
        let mut prescriptions = self.prescriptions.write().await;
        if let Some(prescription) = prescriptions.get_mut(&prescription_id) {
            prescription.status = status;
            if let Some(tracking) = tracking_number {
                prescription.tracking_number = Some(tracking.to_string());
            }
            prescription.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_submission(
        &self,
        prescription_id: Uuid,
        queue_id: &str,
    ) -> FulfillmentResult<()> {
        let mut prescriptions = self.prescriptions.write().await;
        if let Some(prescription) = prescriptions.get_mut(&prescription_id) {
            prescription.queue_id = Some(queue_id.to_string());
            prescription.status = PrescriptionStatus::Submitted;
            prescription.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_payment_status(
        &self,
        prescription_id: Uuid,
        payment_status: PaymentStatus,
    ) -> FulfillmentResult<()> {
        let mut prescriptions = self.prescriptions.write().await;
        if let Some(prescription) = prescriptions.get_mut(&prescription_id) {
            prescription.payment_status = payment_status;
            prescription.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// In-memory [`TransitionLog`] that keeps records in append order.
#[derive(Default)]
pub struct InMemoryTransitionLog {
    records: Arc<RwLock<Vec<TransitionRecord>>>,
}

impl InMemoryTransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub async fn entries(&self) -> Vec<TransitionRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl TransitionLog for InMemoryTransitionLog {
    async fn record(&self, entry: &TransitionRecord) -> FulfillmentResult<()> {
        self.records.write().await.push(entry.clone());
        Ok(())
    }
}
