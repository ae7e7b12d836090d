//! Background cleanup of expired pending payment links.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::error::PaymentLinkResult;
use crate::store::PaymentTransactionStore;

/// Deletes expired pending transactions so their tokens stop resolving.
///
/// One pass is a single bulk delete; the server drives passes from a
/// `tokio` interval task. Read paths do not depend on the sweeper having
/// run: expiry is re-checked at resolution time.
pub struct ExpirySweeper {
    transactions: Arc<dyn PaymentTransactionStore>,
}

impl ExpirySweeper {
    pub fn new(transactions: Arc<dyn PaymentTransactionStore>) -> Self {
        Self { transactions }
    }

    /// Delete everything expired at `now`. Returns the number of rows
    /// removed.
    pub async fn run_once(&self, now: DateTime<Utc>) -> PaymentLinkResult<u64> {
        let removed = self.transactions.delete_expired_pending(now).await?;
        if removed > 0 {
            info!(removed, "swept expired payment links");
        }
        Ok(removed)
    }
}
