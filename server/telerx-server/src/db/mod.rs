//! Postgres implementations of the engine crates' storage traits.
//!
//! Each engine crate defines its own persistence trait and ships an
//! in-memory implementation for tests; this module supplies the production
//! ones. Monetary columns are BIGINT cents, status columns are TEXT holding
//! the enums' wire strings.

pub mod audit;
pub mod backends;
pub mod payments;
pub mod prescriptions;
pub mod tiers;

pub use audit::PgTransitionLog;
pub use backends::PgBackendCredentialStore;
pub use payments::PgPaymentTransactionStore;
pub use prescriptions::PgFulfillmentStore;
pub use tiers::PgTierStore;
