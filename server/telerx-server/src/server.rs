//! Shared server state wiring the engine crates to Postgres-backed stores.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use carrier_tracking::{CarrierTrackingClient, HttpCarrierTransport, InMemoryTokenCache};
use credential_vault::{BackendCredentialStore, CredentialVault};
use fulfillment_engine::{FulfillmentStateMachine, FulfillmentStore};
use payment_links::{PaymentLinkManager, PaymentTransactionStore};

use crate::config::ServerConfig;
use crate::db::{
    PgBackendCredentialStore, PgFulfillmentStore, PgPaymentTransactionStore, PgTierStore,
    PgTransitionLog,
};
use crate::integrations::{HttpPaymentProcessor, PharmacyClient};
use crate::services::CredentialAuditService;

/// Application state handed to every handler via axum's `State` extractor.
///
/// Cloning is cheap: everything interesting lives behind `Arc` or is a
/// pooled handle.
#[derive(Clone)]
pub struct TelerxServer {
    pub config: ServerConfig,
    pub db_pool: PgPool,
    pub vault: Arc<CredentialVault>,
    pub credentials: Arc<dyn BackendCredentialStore>,
    pub prescriptions: Arc<dyn FulfillmentStore>,
    pub transactions: Arc<dyn PaymentTransactionStore>,
    pub fulfillment: Arc<FulfillmentStateMachine>,
    pub payments: Arc<PaymentLinkManager>,
    pub pharmacy: Arc<PharmacyClient>,
    pub carrier: Option<Arc<CarrierTrackingClient>>,
    pub audit: CredentialAuditService,
}

impl TelerxServer {
    /// Connect to Postgres and assemble the full engine stack.
    pub async fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("Failed to connect to database")?;

        Self::new_with_pool(config, db_pool)
    }

    /// Assemble the engine stack over an existing pool.
    ///
    /// Used by `main` after running migrations and by tests that supply a
    /// lazy pool.
    pub fn new_with_pool(config: ServerConfig, db_pool: PgPool) -> anyhow::Result<Self> {
        let vault = Arc::new(
            CredentialVault::from_key_hex(&config.vault_key_hex)
                .context("Invalid credential vault key")?,
        );

        let credentials: Arc<dyn BackendCredentialStore> =
            Arc::new(PgBackendCredentialStore::new(db_pool.clone()));
        let prescriptions: Arc<dyn FulfillmentStore> =
            Arc::new(PgFulfillmentStore::new(db_pool.clone()));
        let transactions: Arc<dyn PaymentTransactionStore> =
            Arc::new(PgPaymentTransactionStore::new(db_pool.clone()));
        let transitions = Arc::new(PgTransitionLog::new(db_pool.clone()));
        let tiers = Arc::new(PgTierStore::new(db_pool.clone()));

        let fulfillment = Arc::new(FulfillmentStateMachine::new(
            prescriptions.clone(),
            transitions,
        ));

        let processor = Arc::new(
            HttpPaymentProcessor::new(
                config.processor_base_url.clone(),
                config.processor_api_key.clone(),
            )
            .context("Failed to build payment processor client")?,
        );
        let payments = Arc::new(PaymentLinkManager::new(
            prescriptions.clone(),
            transactions.clone(),
            tiers,
            processor,
            chrono::Duration::hours(config.link_ttl_hours),
        ));

        let audit = CredentialAuditService::new(db_pool.clone());
        let pharmacy = Arc::new(
            PharmacyClient::new(vault.clone(), credentials.clone(), audit.clone())
                .context("Failed to build pharmacy client")?,
        );

        let carrier = match config.carrier.clone() {
            Some(carrier_config) => {
                let transport = Arc::new(
                    HttpCarrierTransport::new(carrier_config)
                        .context("Failed to build carrier transport")?,
                );
                let cache = Arc::new(InMemoryTokenCache::new());
                Some(Arc::new(CarrierTrackingClient::new(transport, cache)))
            }
            None => None,
        };

        Ok(Self {
            config,
            db_pool,
            vault,
            credentials,
            prescriptions,
            transactions,
            fulfillment,
            payments,
            pharmacy,
            carrier,
            audit,
        })
    }
}

impl std::fmt::Debug for TelerxServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelerxServer")
            .field("vault_key", &self.vault.key_fingerprint())
            .field("carrier_enabled", &self.carrier.is_some())
            .finish_non_exhaustive()
    }
}
