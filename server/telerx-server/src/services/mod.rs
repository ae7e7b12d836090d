//! Server-side services that do not belong to an engine crate.

pub mod audit;

pub use audit::CredentialAuditService;
