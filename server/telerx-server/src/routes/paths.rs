//! Centralized API route path constants
//!
//! Keeps runtime route definitions consistent with the OpenAPI
//! documentation. utoipa `#[path(...)]` attributes require string literals
//! and cannot use these constants directly; the literals in handler
//! annotations must match these values.

/// API base path
pub const API_V1: &str = "/api/v1";

/// Health check endpoints
pub mod health {
    pub const HEALTH: &str = "/health";
    pub const VERSION: &str = "/version";
}

/// Webhook ingress endpoints, relative to [`super::API_V1`]
pub mod webhooks {
    pub const PHARMACY: &str = "/webhooks/pharmacy";
    pub const PHARMACY_CANCEL: &str = "/webhooks/pharmacy/cancel";
    pub const PAYMENTS: &str = "/webhooks/payments";
}

/// Provider prescription endpoints, relative to [`super::API_V1`]
pub mod prescriptions {
    pub const PAYMENT_LINK: &str = "/prescriptions/:id/payment-link";
}

/// Patient payment page endpoints, mounted at the root so links stay short
pub mod pay {
    pub const PAGE: &str = "/pay/:token";
    pub const TRACKING: &str = "/pay/:token/tracking";
}

/// Pharmacy backend admin endpoints, relative to [`super::API_V1`]
pub mod backends {
    pub const BACKENDS: &str = "/pharmacy/backends";
    pub const REENCRYPT: &str = "/pharmacy/backends/:id/reencrypt";
    pub const DEACTIVATE: &str = "/pharmacy/backends/:id/deactivate";
}
