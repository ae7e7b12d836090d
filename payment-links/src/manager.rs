//! Idempotent payment link issuance and token resolution.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fulfillment_engine::{FulfillmentStore, PaymentStatus};
use pricing_engine::{dollars_to_cents, final_price, format_usd, profit, tier_discount};

use crate::error::{PaymentLinkError, PaymentLinkResult};
use crate::model::{
    LinkOutcome, PaymentDetails, PaymentLink, PaymentOutcome, PaymentTransaction,
    TransactionStatus,
};
use crate::processor::{HostedLinkRequest, PaymentProcessor};
use crate::store::{InsertOutcome, NewPaymentTransaction, PaymentTransactionStore, TierStore};

/// Issues hosted payment links and resolves them for the patient page.
///
/// Creation is idempotent per prescription: as long as an unexpired pending
/// transaction exists, every call returns that link unchanged. The pending
/// slot itself is claimed with a conditional insert, so two racing requests
/// cannot both mint a charge.
pub struct PaymentLinkManager {
    prescriptions: Arc<dyn FulfillmentStore>,
    transactions: Arc<dyn PaymentTransactionStore>,
    tiers: Arc<dyn TierStore>,
    processor: Arc<dyn PaymentProcessor>,
    link_ttl: Duration,
}

impl PaymentLinkManager {
    pub fn new(
        prescriptions: Arc<dyn FulfillmentStore>,
        transactions: Arc<dyn PaymentTransactionStore>,
        tiers: Arc<dyn TierStore>,
        processor: Arc<dyn PaymentProcessor>,
        link_ttl: Duration,
    ) -> Self {
        Self {
            prescriptions,
            transactions,
            tiers,
            processor,
            link_ttl,
        }
    }

    /// Return the live link for a prescription, minting one if needed.
    ///
    /// Already-paid prescriptions get [`LinkOutcome::AlreadyPaid`] and no
    /// link. An expired pending transaction is deleted before a replacement
    /// is minted so its stale token stops resolving.
    pub async fn get_or_create_link(
        &self,
        prescription_id: Uuid,
    ) -> PaymentLinkResult<LinkOutcome> {
        let prescription = self
            .prescriptions
            .find_by_id(prescription_id)
            .await?
            .ok_or(PaymentLinkError::PrescriptionNotFound)?;

        if prescription.payment_status == PaymentStatus::Paid {
            return Ok(LinkOutcome::AlreadyPaid);
        }

        let now = Utc::now();
        if let Some(existing) = self
            .transactions
            .find_pending_for_prescription(prescription_id)
            .await?
        {
            if !existing.is_expired(now) {
                return Ok(LinkOutcome::Existing(Self::link_view(&existing)?));
            }
            self.transactions
                .delete_if_expired(existing.id, now)
                .await?;
            debug!(prescription_id = %prescription_id, "deleted expired payment link before reissue");
        }

        if prescription.consultation_fee < Decimal::ZERO {
            return Err(PaymentLinkError::InvalidInput(format!(
                "negative consultation fee: {}",
                prescription.consultation_fee
            )));
        }

        let quote = final_price(prescription.acquisition_cost)?;
        let total = prescription.consultation_fee + quote.patient_price;
        // Fail on a sub-cent row before anything reaches the processor.
        let total_cents = dollars_to_cents(total)?;

        let tier = self
            .tiers
            .find_for_provider(prescription.provider_id)
            .await?;
        let discount = tier_discount(tier.as_ref());
        if discount > Decimal::ZERO {
            debug!(
                provider_id = %prescription.provider_id,
                discount_percent = %discount,
                "provider tier discount computed for reporting"
            );
        }

        let description = prescription.medication.summary();
        let hosted = self
            .processor
            .create_hosted_link(&HostedLinkRequest {
                reference: prescription_id,
                amount: total,
                description: description.clone(),
            })
            .await?;

        let outcome = self
            .transactions
            .insert_pending_if_absent(NewPaymentTransaction {
                prescription_id,
                token: hosted.token,
                hosted_url: hosted.url,
                description,
                consultation_fee: prescription.consultation_fee,
                medication_cost: quote.patient_price,
                total_amount: total,
                profit: profit(quote.patient_price, quote.pharmacy_cost),
                order_status: prescription.status,
                expires_at: now + self.link_ttl,
            })
            .await?;

        match outcome {
            InsertOutcome::Inserted(transaction) => {
                info!(
                    prescription_id = %prescription_id,
                    amount_cents = total_cents,
                    expires_at = %transaction.expires_at,
                    "payment link created"
                );
                Ok(LinkOutcome::Created(Self::link_view(&transaction)?))
            }
            InsertOutcome::Existing(transaction) => {
                // A concurrent request claimed the pending slot first; hand
                // out its link and let ours go unused.
                debug!(prescription_id = %prescription_id, "lost payment link race, returning stored link");
                Ok(LinkOutcome::Existing(Self::link_view(&transaction)?))
            }
        }
    }

    /// Resolve a bearer token into patient-facing details.
    ///
    /// Expiry is re-checked here at read time; a pending link past its
    /// expiry returns [`PaymentLinkError::Expired`] even if the sweeper has
    /// not removed the row yet.
    pub async fn resolve_by_token(&self, token: &str) -> PaymentLinkResult<PaymentDetails> {
        let transaction = self
            .transactions
            .find_by_token(token)
            .await?
            .ok_or(PaymentLinkError::NotFound)?;

        if transaction.is_expired(Utc::now()) {
            return Err(PaymentLinkError::Expired);
        }

        let prescription = self
            .prescriptions
            .find_by_id(transaction.prescription_id)
            .await?
            .ok_or_else(|| {
                PaymentLinkError::Storage(format!(
                    "prescription row missing for payment transaction {}",
                    transaction.id
                ))
            })?;

        Ok(PaymentDetails {
            description: transaction.description.clone(),
            patient_name: prescription.patient_name,
            provider_name: prescription.provider_name,
            consultation_fee_cents: dollars_to_cents(transaction.consultation_fee)?,
            medication_cost_cents: dollars_to_cents(transaction.medication_cost)?,
            total_cents: dollars_to_cents(transaction.total_amount)?,
            total_display: format_usd(transaction.total_amount),
            paid: transaction.status == TransactionStatus::Paid,
            order_status: transaction.order_status,
            tracking_number: transaction.tracking_number,
        })
    }

    /// Apply a processor payment confirmation.
    ///
    /// The `pending → paid` flip is a conditional update, so a redelivered
    /// confirmation finds nothing to update and returns
    /// [`PaymentOutcome::AlreadyApplied`] without touching the prescription.
    /// Only the first application reports the prescription id, which is the
    /// caller's cue to submit to the pharmacy.
    pub async fn mark_paid(
        &self,
        token: &str,
        processor_ref: &str,
    ) -> PaymentLinkResult<PaymentOutcome> {
        let updated = self
            .transactions
            .mark_paid(token, processor_ref, Utc::now())
            .await?;

        match updated {
            Some(transaction) => {
                self.prescriptions
                    .set_payment_status(transaction.prescription_id, PaymentStatus::Paid)
                    .await?;
                info!(
                    prescription_id = %transaction.prescription_id,
                    processor_ref = processor_ref,
                    "payment confirmed"
                );
                Ok(PaymentOutcome::Applied {
                    prescription_id: transaction.prescription_id,
                })
            }
            None => match self.transactions.find_by_token(token).await? {
                Some(transaction) if transaction.status == TransactionStatus::Paid => {
                    debug!(processor_ref = processor_ref, "duplicate payment confirmation ignored");
                    Ok(PaymentOutcome::AlreadyApplied)
                }
                _ => {
                    warn!(processor_ref = processor_ref, "payment confirmation for unknown token");
                    Err(PaymentLinkError::NotFound)
                }
            },
        }
    }

    fn link_view(transaction: &PaymentTransaction) -> PaymentLinkResult<PaymentLink> {
        Ok(PaymentLink {
            token: transaction.token.clone(),
            url: transaction.hosted_url.clone(),
            amount_cents: dollars_to_cents(transaction.total_amount)?,
            amount_display: format_usd(transaction.total_amount),
            description: transaction.description.clone(),
            expires_at: transaction.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryPaymentStore, InMemoryTierStore};
    use crate::processor::{HostedLink, ProcessorError};
    use async_trait::async_trait;
    use fulfillment_engine::{
        InMemoryFulfillmentStore, MedicationOrder, Prescription, PrescriptionStatus,
    };
    use pricing_engine::Tier;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn prescription(payment_status: PaymentStatus) -> Prescription {
        Prescription {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            pharmacy_id: Uuid::new_v4(),
            patient_name: "Ada Lovelace".to_string(),
            provider_name: "Dr. Byron".to_string(),
            medication: MedicationOrder {
                name: "Amoxicillin".to_string(),
                strength: "500mg".to_string(),
                quantity: 30,
                refills: 0,
                instructions: None,
            },
            acquisition_cost: dec!(12.50),
            consultation_fee: dec!(40.00),
            queue_id: None,
            status: PrescriptionStatus::PendingPayment,
            payment_status,
            tracking_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct FakeProcessor {
        calls: AtomicUsize,
    }

    impl FakeProcessor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentProcessor for FakeProcessor {
        async fn create_hosted_link(
            &self,
            request: &HostedLinkRequest,
        ) -> Result<HostedLink, ProcessorError> {
            // Distinct token per call so tests can tell a stored link from
            // a re-mint.
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(HostedLink {
                token: format!("tok_{}_{n}", request.reference.simple()),
                url: format!("https://pay.telerx.test/l/{}/{n}", request.reference.simple()),
            })
        }
    }

    struct DownProcessor;

    #[async_trait]
    impl PaymentProcessor for DownProcessor {
        async fn create_hosted_link(
            &self,
            _request: &HostedLinkRequest,
        ) -> Result<HostedLink, ProcessorError> {
            Err(ProcessorError::Unavailable("connect timeout".to_string()))
        }
    }

    struct Pipeline {
        manager: PaymentLinkManager,
        prescriptions: Arc<InMemoryFulfillmentStore>,
        transactions: Arc<InMemoryPaymentStore>,
        tiers: Arc<InMemoryTierStore>,
        processor: Arc<FakeProcessor>,
    }

    fn pipeline() -> Pipeline {
        let prescriptions = Arc::new(InMemoryFulfillmentStore::new());
        let transactions = Arc::new(InMemoryPaymentStore::new());
        let tiers = Arc::new(InMemoryTierStore::new());
        let processor = FakeProcessor::new();
        let manager = PaymentLinkManager::new(
            prescriptions.clone(),
            transactions.clone(),
            tiers.clone(),
            processor.clone(),
            Duration::minutes(30),
        );
        Pipeline {
            manager,
            prescriptions,
            transactions,
            tiers,
            processor,
        }
    }

    #[tokio::test]
    async fn mints_link_for_unpaid_prescription() {
        let p = pipeline();
        let rx = prescription(PaymentStatus::Unpaid);
        let rx_id = rx.id;
        p.prescriptions.insert(rx).await;

        let outcome = p.manager.get_or_create_link(rx_id).await.unwrap();
        let link = match &outcome {
            LinkOutcome::Created(link) => link,
            other => panic!("expected Created, got {other:?}"),
        };

        // $40.00 consultation + $12.50 medication
        assert_eq!(link.amount_cents, 5250);
        assert_eq!(link.amount_display, "$52.50");
        assert_eq!(link.description, "Amoxicillin 500mg x 30");

        let stored = p.transactions.find_by_token(&link.token).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Pending);
        assert_eq!(stored.prescription_id, rx_id);
        assert_eq!(stored.profit, dec!(0.00));
    }

    #[tokio::test]
    async fn link_creation_is_idempotent() {
        let p = pipeline();
        let rx = prescription(PaymentStatus::Unpaid);
        let rx_id = rx.id;
        p.prescriptions.insert(rx).await;

        let first = p.manager.get_or_create_link(rx_id).await.unwrap();
        let second = p.manager.get_or_create_link(rx_id).await.unwrap();

        let first_link = first.link().unwrap();
        let second_link = match &second {
            LinkOutcome::Existing(link) => link,
            other => panic!("expected Existing, got {other:?}"),
        };
        assert_eq!(first_link, second_link);
        // only the first call reached the processor
        assert_eq!(p.processor.call_count(), 1);
    }

    #[tokio::test]
    async fn paid_prescription_gets_no_link() {
        let p = pipeline();
        let rx = prescription(PaymentStatus::Paid);
        let rx_id = rx.id;
        p.prescriptions.insert(rx).await;

        let outcome = p.manager.get_or_create_link(rx_id).await.unwrap();
        assert!(matches!(outcome, LinkOutcome::AlreadyPaid));
        assert_eq!(p.processor.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_prescription_is_not_found() {
        let p = pipeline();
        let err = p.manager.get_or_create_link(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PaymentLinkError::PrescriptionNotFound));
    }

    #[tokio::test]
    async fn expired_pending_link_is_deleted_and_replaced() {
        let p = pipeline();
        let rx = prescription(PaymentStatus::Unpaid);
        let rx_id = rx.id;
        p.prescriptions.insert(rx).await;

        let first = p.manager.get_or_create_link(rx_id).await.unwrap();
        let stale_token = first.link().unwrap().token.clone();
        p.transactions
            .force_expire(&stale_token, Utc::now() - Duration::minutes(1))
            .await;

        let second = p.manager.get_or_create_link(rx_id).await.unwrap();
        let fresh = match &second {
            LinkOutcome::Created(link) => link,
            other => panic!("expected Created, got {other:?}"),
        };
        assert_ne!(fresh.token, stale_token);

        // the stale token no longer resolves at all
        let err = p.manager.resolve_by_token(&stale_token).await.unwrap_err();
        assert!(matches!(err, PaymentLinkError::NotFound));
    }

    #[tokio::test]
    async fn processor_outage_leaves_no_row_behind() {
        let prescriptions = Arc::new(InMemoryFulfillmentStore::new());
        let transactions = Arc::new(InMemoryPaymentStore::new());
        let rx = prescription(PaymentStatus::Unpaid);
        let rx_id = rx.id;
        prescriptions.insert(rx).await;

        let manager = PaymentLinkManager::new(
            prescriptions,
            transactions.clone(),
            Arc::new(InMemoryTierStore::new()),
            Arc::new(DownProcessor),
            Duration::minutes(30),
        );

        let err = manager.get_or_create_link(rx_id).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentLinkError::Processor(ProcessorError::Unavailable(_))
        ));
        assert!(transactions
            .find_pending_for_prescription(rx_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn tier_lookup_does_not_change_the_charge() {
        let p = pipeline();
        let rx = prescription(PaymentStatus::Unpaid);
        let rx_id = rx.id;
        let provider_id = rx.provider_id;
        p.prescriptions.insert(rx).await;
        p.tiers
            .insert(
                provider_id,
                Tier {
                    code: "gold".to_string(),
                    name: "Gold".to_string(),
                    discount_percent: dec!(10),
                },
            )
            .await;

        let outcome = p.manager.get_or_create_link(rx_id).await.unwrap();
        // discount is reporting-only for now
        assert_eq!(outcome.link().unwrap().amount_cents, 5250);
    }

    #[tokio::test]
    async fn resolves_sanitized_details() {
        let p = pipeline();
        let rx = prescription(PaymentStatus::Unpaid);
        let rx_id = rx.id;
        p.prescriptions.insert(rx).await;

        let outcome = p.manager.get_or_create_link(rx_id).await.unwrap();
        let token = outcome.link().unwrap().token.clone();

        let details = p.manager.resolve_by_token(&token).await.unwrap();
        assert_eq!(details.patient_name, "Ada Lovelace");
        assert_eq!(details.provider_name, "Dr. Byron");
        assert_eq!(details.consultation_fee_cents, 4000);
        assert_eq!(details.medication_cost_cents, 1250);
        assert_eq!(details.total_cents, 5250);
        assert_eq!(details.total_display, "$52.50");
        assert!(!details.paid);
        assert_eq!(details.order_status, PrescriptionStatus::PendingPayment);
        assert_eq!(details.tracking_number, None);
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let p = pipeline();
        let err = p.manager.resolve_by_token("tok_missing").await.unwrap_err();
        assert!(matches!(err, PaymentLinkError::NotFound));
    }

    #[tokio::test]
    async fn expired_token_is_gone_not_missing() {
        let p = pipeline();
        let rx = prescription(PaymentStatus::Unpaid);
        let rx_id = rx.id;
        p.prescriptions.insert(rx).await;

        let outcome = p.manager.get_or_create_link(rx_id).await.unwrap();
        let token = outcome.link().unwrap().token.clone();
        p.transactions
            .force_expire(&token, Utc::now() - Duration::minutes(1))
            .await;

        let err = p.manager.resolve_by_token(&token).await.unwrap_err();
        assert!(matches!(err, PaymentLinkError::Expired));
    }

    #[tokio::test]
    async fn first_confirmation_applies_and_flips_the_prescription() {
        let p = pipeline();
        let rx = prescription(PaymentStatus::Unpaid);
        let rx_id = rx.id;
        p.prescriptions.insert(rx).await;

        let outcome = p.manager.get_or_create_link(rx_id).await.unwrap();
        let token = outcome.link().unwrap().token.clone();

        let applied = p.manager.mark_paid(&token, "pi_123").await.unwrap();
        assert_eq!(
            applied,
            PaymentOutcome::Applied {
                prescription_id: rx_id
            }
        );

        let stored = p.transactions.find_by_token(&token).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Paid);
        assert_eq!(stored.processor_ref.as_deref(), Some("pi_123"));
        assert!(stored.paid_at.is_some());
        assert_eq!(
            p.prescriptions.get(rx_id).await.unwrap().payment_status,
            PaymentStatus::Paid
        );

        let details = p.manager.resolve_by_token(&token).await.unwrap();
        assert!(details.paid);
    }

    #[tokio::test]
    async fn duplicate_confirmation_is_ignored() {
        let p = pipeline();
        let rx = prescription(PaymentStatus::Unpaid);
        let rx_id = rx.id;
        p.prescriptions.insert(rx).await;

        let outcome = p.manager.get_or_create_link(rx_id).await.unwrap();
        let token = outcome.link().unwrap().token.clone();

        p.manager.mark_paid(&token, "pi_123").await.unwrap();
        let second = p.manager.mark_paid(&token, "pi_123").await.unwrap();
        assert_eq!(second, PaymentOutcome::AlreadyApplied);
    }

    #[tokio::test]
    async fn confirmation_for_unknown_token_fails() {
        let p = pipeline();
        let err = p.manager.mark_paid("tok_missing", "pi_999").await.unwrap_err();
        assert!(matches!(err, PaymentLinkError::NotFound));
    }

    #[tokio::test]
    async fn paid_link_resolves_after_expiry() {
        let p = pipeline();
        let rx = prescription(PaymentStatus::Unpaid);
        let rx_id = rx.id;
        p.prescriptions.insert(rx).await;

        let outcome = p.manager.get_or_create_link(rx_id).await.unwrap();
        let token = outcome.link().unwrap().token.clone();
        p.manager.mark_paid(&token, "pi_123").await.unwrap();
        p.transactions
            .force_expire(&token, Utc::now() - Duration::minutes(1))
            .await;

        // receipts outlive the checkout window
        let details = p.manager.resolve_by_token(&token).await.unwrap();
        assert!(details.paid);
    }
}
