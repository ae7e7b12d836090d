//! Carrier Tracking - shipment tracking enrichment for TeleRx Engine
//!
//! OAuth2 client-credentials access to the shipping carrier's tracking API
//! with a cached bearer token:
//!
//! - Token reuse while at least 60 seconds of validity remain
//! - 401-triggered invalidation, re-authenticating on the next call
//! - Lenient payload parsing; an actual delivery date wins over an
//!   estimate
//!
//! Tracking is best-effort enrichment. Every failure mode degrades to
//! `None`; nothing in this crate can block the fulfillment pipeline.

pub mod cache;
pub mod client;
pub mod error;
pub mod transport;

pub use cache::{CachedToken, InMemoryTokenCache, TokenCache};
pub use client::{CarrierTrackingClient, TrackingDetails};
pub use error::{CarrierError, CarrierResult};
pub use transport::{
    CarrierConfig, CarrierTransport, HttpCarrierTransport, IssuedToken, TrackPayload,
    TrackingResponse,
};
