//! Payment link issuance (provider-facing) and the patient payment page.
//!
//! The patient routes authenticate by unguessable link token alone and only
//! ever return sanitized fields: names, amounts and order progress, never
//! internal ids, costs or margins.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use payment_links::{LinkOutcome, PaymentLink};

use crate::error::{api_success, ApiError, ApiResponse};
use crate::middleware::AuthContext;
use crate::server::TelerxServer;

/// A live hosted payment link
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentLinkView {
    /// Opaque bearer token; keys the patient-facing routes
    pub token: String,
    /// Hosted checkout URL to hand to the patient
    pub url: String,
    /// Total charge in cents
    #[schema(example = 5250)]
    pub amount_cents: i64,
    /// Display amount
    #[schema(example = "$52.50")]
    pub amount_display: String,
    /// Medication summary shown at checkout
    #[schema(example = "Amoxicillin 500mg x 30")]
    pub description: String,
    /// Expiry of the checkout window
    pub expires_at: DateTime<Utc>,
}

impl PaymentLinkView {
    fn from_link(link: PaymentLink) -> Self {
        Self {
            token: link.token,
            url: link.url,
            amount_cents: link.amount_cents,
            amount_display: link.amount_display,
            description: link.description,
            expires_at: link.expires_at,
        }
    }
}

/// Outcome of a payment link request
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentLinkResponse {
    /// `created`, `existing` or `already_paid`
    #[schema(example = "created")]
    pub status: String,
    /// The live link; absent when the prescription is already paid
    pub link: Option<PaymentLinkView>,
}

/// Patient-facing payment page details
#[derive(Debug, Serialize, ToSchema)]
pub struct PayPageResponse {
    /// Medication summary
    #[schema(example = "Amoxicillin 500mg x 30")]
    pub description: String,
    pub patient_name: String,
    pub provider_name: String,
    pub consultation_fee_cents: i64,
    pub medication_cost_cents: i64,
    pub total_cents: i64,
    #[schema(example = "$52.50")]
    pub total_display: String,
    /// Whether this link has been paid
    pub paid: bool,
    /// Current order progress
    #[schema(example = "shipped")]
    pub order_status: String,
    pub tracking_number: Option<String>,
}

/// Patient-facing shipment tracking details
#[derive(Debug, Serialize, ToSchema)]
pub struct PayTrackingResponse {
    pub tracking_number: Option<String>,
    /// Latest carrier activity description, when enrichment is available
    #[schema(example = "In Transit")]
    pub status: Option<String>,
    pub delivered: bool,
    pub delivery_date: Option<NaiveDate>,
    pub last_activity_at: Option<NaiveDateTime>,
}

/// Create or return the payment link for a prescription
#[utoipa::path(
    post,
    path = "/api/v1/prescriptions/{id}/payment-link",
    tag = "payment-links",
    params(
        ("id" = Uuid, Path, description = "Prescription ID")
    ),
    responses(
        (status = 201, description = "Fresh link minted", body = PaymentLinkResponse),
        (status = 200, description = "Existing link returned, or prescription already paid", body = PaymentLinkResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Prescription belongs to another provider"),
        (status = 404, description = "Prescription not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_payment_link(
    State(server): State<TelerxServer>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentLinkResponse>>), ApiError> {
    let prescription = server
        .prescriptions
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("prescription"))?;

    if prescription.provider_id != auth.user_id && !auth.is_admin() {
        return Err(ApiError::authorization(
            "Prescription belongs to another provider",
        ));
    }

    let (code, status, link) = match server.payments.get_or_create_link(id).await? {
        LinkOutcome::Created(link) => (StatusCode::CREATED, "created", Some(link)),
        LinkOutcome::Existing(link) => (StatusCode::OK, "existing", Some(link)),
        LinkOutcome::AlreadyPaid => (StatusCode::OK, "already_paid", None),
    };

    Ok((
        code,
        Json(api_success(PaymentLinkResponse {
            status: status.to_string(),
            link: link.map(PaymentLinkView::from_link),
        })),
    ))
}

/// Patient payment page lookup
#[utoipa::path(
    get,
    path = "/pay/{token}",
    tag = "payment-links",
    params(
        ("token" = String, Path, description = "Payment link token")
    ),
    responses(
        (status = 200, description = "Payment page details", body = PayPageResponse),
        (status = 404, description = "Unknown token"),
        (status = 410, description = "Link expired")
    )
)]
pub async fn pay_page(
    State(server): State<TelerxServer>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<PayPageResponse>>, ApiError> {
    let details = server.payments.resolve_by_token(&token).await?;

    Ok(Json(api_success(PayPageResponse {
        description: details.description,
        patient_name: details.patient_name,
        provider_name: details.provider_name,
        consultation_fee_cents: details.consultation_fee_cents,
        medication_cost_cents: details.medication_cost_cents,
        total_cents: details.total_cents,
        total_display: details.total_display,
        paid: details.paid,
        order_status: details.order_status.to_string(),
        tracking_number: details.tracking_number,
    })))
}

/// Patient shipment tracking lookup
///
/// Gated by the same token resolution as the payment page, so a dead link
/// reveals nothing here either. Carrier enrichment is best effort: when the
/// carrier integration is disabled or its lookup fails, the response carries
/// the bare tracking number.
#[utoipa::path(
    get,
    path = "/pay/{token}/tracking",
    tag = "payment-links",
    params(
        ("token" = String, Path, description = "Payment link token")
    ),
    responses(
        (status = 200, description = "Tracking details, possibly unenriched", body = PayTrackingResponse),
        (status = 404, description = "Unknown token"),
        (status = 410, description = "Link expired")
    )
)]
pub async fn pay_tracking(
    State(server): State<TelerxServer>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<PayTrackingResponse>>, ApiError> {
    let details = server.payments.resolve_by_token(&token).await?;

    let mut response = PayTrackingResponse {
        tracking_number: details.tracking_number,
        status: None,
        delivered: false,
        delivery_date: None,
        last_activity_at: None,
    };

    if let (Some(carrier), Some(tracking_number)) =
        (server.carrier.as_ref(), response.tracking_number.as_deref())
    {
        if let Some(enriched) = carrier.fetch_tracking(tracking_number).await {
            response.status = enriched.status;
            response.delivered = enriched.delivered;
            response.delivery_date = enriched.delivery_date;
            response.last_activity_at = enriched.last_activity_at;
        }
    }

    Ok(Json(api_success(response)))
}
