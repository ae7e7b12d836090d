//! HTTP request handlers.

pub mod backends;
pub mod health;
pub mod payment_links;
pub mod webhooks;
