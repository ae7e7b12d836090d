//! Machine-to-machine webhook ingress.
//!
//! Two callers, two auth schemes: the pharmacy system presents a shared
//! token header, the payment processor signs the raw body. Both are checked
//! before the payload is even parsed.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use fulfillment_engine::{AppliedTransition, WebhookEvent};
use payment_links::PaymentOutcome;

use crate::error::{api_success, ApiError, ApiResponse};
use crate::server::TelerxServer;
use crate::signature::{constant_time_eq, SignatureError, SignatureVerifier};
use crate::validation::RequestValidation;
use crate::{validate_field, validate_length, validate_required};

/// Shared-token header presented by the pharmacy system.
pub const WEBHOOK_TOKEN_HEADER: &str = "X-Webhook-Token";
/// Signature header presented by the payment processor.
pub const PROCESSOR_SIGNATURE_HEADER: &str = "X-Processor-Signature";

/// Event type that confirms a completed payment; everything else is
/// acknowledged and ignored.
pub const EVENT_PAYMENT_COMPLETED: &str = "payment-completed";

/// Pharmacy fulfillment status event
#[derive(Debug, Deserialize, ToSchema)]
pub struct PharmacyStatusEvent {
    /// Pharmacy queue id assigned at submission
    #[schema(example = "RX-20260115-1042")]
    pub queue_id: String,
    /// New fulfillment status reported by the pharmacy
    #[schema(example = "shipped")]
    pub status: String,
    /// Carrier tracking number, meaningful on shipped events
    #[schema(example = "1Z999AA10123456784")]
    pub tracking_number: Option<String>,
}

impl RequestValidation for PharmacyStatusEvent {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.queue_id, "Queue ID is required");
        validate_length!(self.queue_id, 1, 128, "Queue ID must be at most 128 characters");
        validate_required!(self.status, "Status is required");
        Ok(())
    }
}

/// Pharmacy-initiated cancellation event
#[derive(Debug, Deserialize, ToSchema)]
pub struct PharmacyCancelEvent {
    /// Pharmacy queue id assigned at submission
    #[schema(example = "RX-20260115-1042")]
    pub queue_id: String,
    /// Optional cancellation reason, kept in the audit trail
    #[schema(example = "out of stock")]
    pub reason: Option<String>,
}

impl RequestValidation for PharmacyCancelEvent {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.queue_id, "Queue ID is required");
        validate_length!(self.queue_id, 1, 128, "Queue ID must be at most 128 characters");
        Ok(())
    }
}

/// Payment processor event, parsed only after its signature verifies
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessorPaymentEvent {
    /// Payment link token the event refers to
    pub token: String,
    /// Processor event type
    #[schema(example = "payment-completed")]
    pub event_type: String,
    /// Processor-side payment reference
    #[schema(example = "pi_3MtwBwLkdIwHu7ix28a3tqPa")]
    pub processor_ref: String,
}

impl RequestValidation for ProcessorPaymentEvent {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.token, "Token is required");
        validate_required!(self.event_type, "Event type is required");
        validate_required!(self.processor_ref, "Processor reference is required");
        Ok(())
    }
}

/// Outcome of a fulfillment transition, echoed back to the pharmacy
#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionResponse {
    pub queue_id: String,
    #[schema(example = "billing")]
    pub previous_status: String,
    #[schema(example = "shipped")]
    pub new_status: String,
    pub tracking_number: Option<String>,
    /// `applied` or `replayed`
    #[schema(example = "applied")]
    pub outcome: String,
}

impl TransitionResponse {
    fn from_transition(transition: AppliedTransition) -> Self {
        Self {
            queue_id: transition.queue_id,
            previous_status: transition.previous_status.to_string(),
            new_status: transition.new_status.to_string(),
            tracking_number: transition.tracking_number,
            outcome: transition.outcome.as_str().to_string(),
        }
    }
}

/// Acknowledgement returned to the payment processor
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentAckResponse {
    /// `applied`, `already_applied` or `ignored`
    #[schema(example = "applied")]
    pub status: String,
}

/// Check the pharmacy shared-token header before touching the payload.
fn require_webhook_token(server: &TelerxServer, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::authentication("Missing X-Webhook-Token header"))?;

    if !constant_time_eq(&server.config.pharmacy_webhook_token, presented) {
        return Err(ApiError::authentication("Invalid webhook token"));
    }
    Ok(())
}

/// Pharmacy fulfillment status webhook
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/pharmacy",
    tag = "webhooks",
    request_body = PharmacyStatusEvent,
    responses(
        (status = 200, description = "Transition applied or replayed", body = TransitionResponse),
        (status = 401, description = "Missing or invalid webhook token"),
        (status = 404, description = "Unknown queue id"),
        (status = 409, description = "Transition not allowed from the current status"),
        (status = 422, description = "Status outside the webhook vocabulary")
    )
)]
pub async fn pharmacy_status_webhook(
    State(server): State<TelerxServer>,
    headers: HeaderMap,
    Json(event): Json<PharmacyStatusEvent>,
) -> Result<Json<ApiResponse<TransitionResponse>>, ApiError> {
    require_webhook_token(&server, &headers)?;
    event.validate()?;

    let transition = server
        .fulfillment
        .apply_webhook_event(&WebhookEvent {
            queue_id: event.queue_id,
            new_status: event.status,
            tracking_number: event.tracking_number,
        })
        .await?;

    Ok(Json(api_success(TransitionResponse::from_transition(
        transition,
    ))))
}

/// Pharmacy-initiated cancellation webhook
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/pharmacy/cancel",
    tag = "webhooks",
    request_body = PharmacyCancelEvent,
    responses(
        (status = 200, description = "Cancellation applied or replayed", body = TransitionResponse),
        (status = 401, description = "Missing or invalid webhook token"),
        (status = 404, description = "Unknown queue id"),
        (status = 409, description = "Prescription already in a terminal state")
    )
)]
pub async fn pharmacy_cancel_webhook(
    State(server): State<TelerxServer>,
    headers: HeaderMap,
    Json(event): Json<PharmacyCancelEvent>,
) -> Result<Json<ApiResponse<TransitionResponse>>, ApiError> {
    require_webhook_token(&server, &headers)?;
    event.validate()?;

    let transition = server
        .fulfillment
        .apply_cancellation(&event.queue_id, event.reason.as_deref())
        .await?;

    Ok(Json(api_success(TransitionResponse::from_transition(
        transition,
    ))))
}

/// Payment processor webhook
///
/// The HMAC signature covers the raw request body, so the body is taken as
/// bytes and parsed only after verification.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payments",
    tag = "webhooks",
    request_body = ProcessorPaymentEvent,
    responses(
        (status = 200, description = "Event applied, already applied or ignored", body = PaymentAckResponse),
        (status = 400, description = "Missing or malformed signature header"),
        (status = 401, description = "Signature verification failed"),
        (status = 404, description = "Unknown payment link token")
    )
)]
pub async fn processor_payment_webhook(
    State(server): State<TelerxServer>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<PaymentAckResponse>>, ApiError> {
    let header = headers
        .get(PROCESSOR_SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::validation("Missing X-Processor-Signature header"))?;

    let verifier = SignatureVerifier::new(server.config.processor_webhook_secret.clone());
    let valid = verifier.verify(&body, header).map_err(|e| match e {
        SignatureError::MalformedHeader => {
            ApiError::validation("Malformed X-Processor-Signature header")
        }
        SignatureError::Key => ApiError::internal("Webhook signature key error"),
    })?;
    if !valid {
        return Err(ApiError::authentication("Invalid webhook signature"));
    }

    let event: ProcessorPaymentEvent = serde_json::from_slice(&body)?;
    event.validate()?;

    if event.event_type != EVENT_PAYMENT_COMPLETED {
        debug!(event_type = %event.event_type, "ignoring processor event");
        return Ok(Json(api_success(PaymentAckResponse {
            status: "ignored".to_string(),
        })));
    }

    let outcome = server
        .payments
        .mark_paid(&event.token, &event.processor_ref)
        .await?;

    let status = match outcome {
        PaymentOutcome::Applied { prescription_id } => {
            submit_to_pharmacy(&server, prescription_id).await;
            "applied"
        }
        PaymentOutcome::AlreadyApplied => "already_applied",
    };

    Ok(Json(api_success(PaymentAckResponse {
        status: status.to_string(),
    })))
}

/// Hand a freshly paid prescription to its pharmacy backend.
///
/// Failures are logged, not returned: the payment has been applied and the
/// processor gets its acknowledgement either way. A prescription left in
/// `pending_payment` with `payment_status = paid` is the operator's cue to
/// resubmit.
async fn submit_to_pharmacy(server: &TelerxServer, prescription_id: Uuid) {
    let prescription = match server.prescriptions.find_by_id(prescription_id).await {
        Ok(Some(prescription)) => prescription,
        Ok(None) => {
            warn!(%prescription_id, "paid prescription vanished before pharmacy submission");
            return;
        }
        Err(e) => {
            warn!(%prescription_id, error = %e, "failed to load prescription for pharmacy submission");
            return;
        }
    };

    let queue_id = match server.pharmacy.submit_prescription(&prescription).await {
        Ok(queue_id) => queue_id,
        Err(e) => {
            warn!(%prescription_id, error = %e, "pharmacy submission failed; prescription stays paid and unsubmitted");
            return;
        }
    };

    if let Err(e) = server
        .fulfillment
        .mark_submitted(prescription_id, &queue_id)
        .await
    {
        warn!(%prescription_id, queue_id = %queue_id, error = %e, "failed to record pharmacy submission");
    }
}
