//! Process-local store implementations for tests and demos.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfillment_engine::PrescriptionStatus;
use pricing_engine::Tier;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::PaymentLinkResult;
use crate::model::{PaymentTransaction, TransactionStatus};
use crate::store::{InsertOutcome, NewPaymentTransaction, PaymentTransactionStore, TierStore};

/// In-memory [`PaymentTransactionStore`].
#[derive(Default)]
pub struct InMemoryPaymentStore {
    transactions: Arc<RwLock<HashMap<Uuid, PaymentTransaction>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite a row's expiry, used by tests to age links without waiting.
    pub async fn force_expire(&self, token: &str, expires_at: DateTime<Utc>) {
        let mut transactions = self.transactions.write().await;
        if let Some(transaction) = transactions.values_mut().find(|t| t.token == token) {
            transaction.expires_at = expires_at;
        }
    }

    /// Refresh the denormalized order-progress columns on every transaction
    /// for a prescription, mirroring what the Postgres fulfillment store
    /// does inside its status-update transaction.
    pub async fn set_order_progress(
        &self,
        prescription_id: Uuid,
        status: PrescriptionStatus,
        tracking_number: Option<&str>,
    ) {
        let mut transactions = self.transactions.write().await;
        for transaction in transactions
            .values_mut()
            .filter(|t| t.prescription_id == prescription_id)
        {
            transaction.order_status = status;
            if let Some(tracking) = tracking_number {
                transaction.tracking_number = Some(tracking.to_string());
            }
            transaction.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl PaymentTransactionStore for InMemoryPaymentStore {
    async fn find_pending_for_prescription(
        &self,
        prescription_id: Uuid,
    ) -> PaymentLinkResult<Option<PaymentTransaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .values()
            .find(|t| {
                t.prescription_id == prescription_id && t.status == TransactionStatus::Pending
            })
            .cloned())
    }

    async fn insert_pending_if_absent(
        &self,
        transaction: NewPaymentTransaction,
    ) -> PaymentLinkResult<InsertOutcome> {
        // One write lock across check and insert keeps this conditional, the
        // same guarantee the Postgres store gets from its partial unique
        // index.
        let mut transactions = self.transactions.write().await;
        if let Some(existing) = transactions.values().find(|t| {
            t.prescription_id == transaction.prescription_id
                && t.status == TransactionStatus::Pending
        }) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }

        let now = Utc::now();
        let row = PaymentTransaction {
            id: Uuid::new_v4(),
            prescription_id: transaction.prescription_id,
            token: transaction.token,
            hosted_url: transaction.hosted_url,
            description: transaction.description,
            consultation_fee: transaction.consultation_fee,
            medication_cost: transaction.medication_cost,
            total_amount: transaction.total_amount,
            profit: transaction.profit,
            status: TransactionStatus::Pending,
            processor_ref: None,
            order_status: transaction.order_status,
            tracking_number: None,
            expires_at: transaction.expires_at,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        transactions.insert(row.id, row.clone());
        Ok(InsertOutcome::Inserted(row))
    }

    async fn delete_if_expired(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>,
    ) -> PaymentLinkResult<bool> {
        let mut transactions = self.transactions.write().await;
        let expired = transactions
            .get(&transaction_id)
            .is_some_and(|t| t.is_expired(now));
        if expired {
            transactions.remove(&transaction_id);
        }
        Ok(expired)
    }

    async fn find_by_token(&self, token: &str) -> PaymentLinkResult<Option<PaymentTransaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.values().find(|t| t.token == token).cloned())
    }

    async fn mark_paid(
        &self,
        token: &str,
        processor_ref: &str,
        paid_at: DateTime<Utc>,
    ) -> PaymentLinkResult<Option<PaymentTransaction>> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .values_mut()
            .find(|t| t.token == token && t.status == TransactionStatus::Pending);
        Ok(transaction.map(|t| {
            t.status = TransactionStatus::Paid;
            t.processor_ref = Some(processor_ref.to_string());
            t.paid_at = Some(paid_at);
            t.updated_at = paid_at;
            t.clone()
        }))
    }

    async fn delete_expired_pending(&self, now: DateTime<Utc>) -> PaymentLinkResult<u64> {
        let mut transactions = self.transactions.write().await;
        let before = transactions.len();
        transactions.retain(|_, t| !t.is_expired(now));
        Ok((before - transactions.len()) as u64)
    }
}

/// In-memory [`TierStore`] keyed by provider id.
#[derive(Default)]
pub struct InMemoryTierStore {
    tiers: Arc<RwLock<HashMap<Uuid, Tier>>>,
}

impl InMemoryTierStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, provider_id: Uuid, tier: Tier) {
        self.tiers.write().await.insert(provider_id, tier);
    }
}

#[async_trait]
impl TierStore for InMemoryTierStore {
    async fn find_for_provider(&self, provider_id: Uuid) -> PaymentLinkResult<Option<Tier>> {
        Ok(self.tiers.read().await.get(&provider_id).cloned())
    }
}
