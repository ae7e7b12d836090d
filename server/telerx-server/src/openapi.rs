use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::server::TelerxServer;

/// Main OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::handlers::health::health_check,
        crate::handlers::health::version_info,

        // Webhook ingress
        crate::handlers::webhooks::pharmacy_status_webhook,
        crate::handlers::webhooks::pharmacy_cancel_webhook,
        crate::handlers::webhooks::processor_payment_webhook,

        // Payment links and patient pages
        crate::handlers::payment_links::create_payment_link,
        crate::handlers::payment_links::pay_page,
        crate::handlers::payment_links::pay_tracking,

        // Pharmacy backend administration
        crate::handlers::backends::list_backends,
        crate::handlers::backends::create_backend,
        crate::handlers::backends::reencrypt_backend,
        crate::handlers::backends::deactivate_backend,
    ),
    components(
        schemas(
            // Health schemas
            crate::handlers::health::HealthResponse,
            crate::handlers::health::VersionResponse,

            // Webhook schemas
            crate::handlers::webhooks::PharmacyStatusEvent,
            crate::handlers::webhooks::PharmacyCancelEvent,
            crate::handlers::webhooks::ProcessorPaymentEvent,
            crate::handlers::webhooks::TransitionResponse,
            crate::handlers::webhooks::PaymentAckResponse,

            // Payment link schemas
            crate::handlers::payment_links::PaymentLinkView,
            crate::handlers::payment_links::PaymentLinkResponse,
            crate::handlers::payment_links::PayPageResponse,
            crate::handlers::payment_links::PayTrackingResponse,

            // Pharmacy backend schemas
            crate::handlers::backends::BackendView,
            crate::handlers::backends::CreateBackendRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "System health and status endpoints"),
        (name = "webhooks", description = "Pharmacy and payment processor event ingress"),
        (name = "payment-links", description = "Hosted payment links and patient payment pages"),
        (name = "pharmacy-backends", description = "Pharmacy backend credential administration"),
    ),
    info(
        title = "TeleRx Engine API",
        version = "0.1.0",
        description = "Telehealth prescription fulfillment API covering pharmacy submission, hosted payment links, payment webhooks, and delivery tracking.",
        contact(
            name = "TeleRx Team",
            email = "eng@telerx.health",
            url = "https://telerx.health"
        ),
        license(
            name = "AGPL-3.0-only",
            url = "https://github.com/telerx-health/telerx-engine/blob/main/LICENSE"
        ),
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
        (url = "https://api.telerx.health", description = "Production server"),
    ),
)]
pub struct ApiDoc;

/// Registers the bearer token scheme referenced by authenticated endpoints.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create OpenAPI documentation routes
pub fn create_docs_routes() -> Router<TelerxServer> {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
