use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Unique error ID for log correlation
    pub error_id: String,
    /// Error type/code
    pub error_type: String,
    /// Human-readable error message
    pub message: String,
    /// Detailed error description for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Timestamp when the error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Standard API success response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Authorization error: {message}")]
    Authorization { message: String },

    #[error("Resource not found: {resource_type}")]
    NotFound { resource_type: String },

    #[error("Resource conflict: {message}")]
    Conflict { message: String },

    /// The resource existed but its lifetime has passed (expired payment
    /// links). Distinct from `NotFound` so clients can tell a dead link
    /// from a mistyped one.
    #[error("Resource gone: {message}")]
    Gone { message: String },

    #[error("Unprocessable entity: {message}")]
    UnprocessableEntity { message: String },

    /// An external dependency (payment processor, pharmacy backend)
    /// failed or timed out.
    #[error("Upstream service error: {message}")]
    Upstream { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ApiError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create an authorization error
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource_type: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a gone error
    pub fn gone(message: impl Into<String>) -> Self {
        Self::Gone {
            message: message.into(),
        }
    }

    /// Create an unprocessable entity error
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::UnprocessableEntity {
            message: message.into(),
        }
    }

    /// Create an upstream error
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Authorization { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Gone { .. } => StatusCode::GONE,
            ApiError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::Authentication { .. } => "authentication_error",
            ApiError::Authorization { .. } => "authorization_error",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Conflict { .. } => "conflict",
            ApiError::Gone { .. } => "gone",
            ApiError::UnprocessableEntity { .. } => "unprocessable_entity",
            ApiError::Upstream { .. } => "upstream_error",
            ApiError::Database { .. } => "database_error",
            ApiError::Internal { .. } => "internal_error",
            ApiError::Configuration { .. } => "configuration_error",
        }
    }

    /// Message safe to return to the caller. Server-side failures keep
    /// their detail in the logs only; the caller gets the error id for
    /// correlation.
    fn client_message(&self) -> String {
        match self {
            ApiError::Database { .. } | ApiError::Internal { .. } | ApiError::Configuration { .. } => {
                "Internal server error".to_string()
            }
            ApiError::Upstream { .. } => "Upstream service unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        // Log the error with correlation ID
        error!(
            error_id = %error_id,
            error_type = %self.error_type(),
            status_code = %status_code.as_u16(),
            error = %self,
            "API error occurred"
        );

        let error_response = ApiErrorResponse {
            error_id,
            error_type: self.error_type().to_string(),
            message: self.client_message(),
            details: None,
            timestamp: chrono::Utc::now(),
        };

        (status_code, Json(error_response)).into_response()
    }
}

/// Helper function to create successful API responses
pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
    }
}

/// Convert SQLx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("record"),
            sqlx::Error::Database(db) if db.message().contains("duplicate key") => {
                ApiError::conflict("A record with these details already exists")
            }
            _ => ApiError::Database {
                message: err.to_string(),
            },
        }
    }
}

/// Convert anyhow errors to API errors
impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::Internal {
            message: error.to_string(),
        }
    }
}

/// Convert serde JSON errors to API errors
impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::Validation {
            message: format!("Invalid JSON: {}", error),
        }
    }
}

impl From<credential_vault::VaultError> for ApiError {
    fn from(err: credential_vault::VaultError) -> Self {
        use credential_vault::VaultError;
        match err {
            VaultError::InvalidInput(message) => ApiError::Validation { message },
            VaultError::Configuration(message) => ApiError::Configuration { message },
            // Tampered or corrupt stored records stay opaque to the caller.
            VaultError::Integrity | VaultError::InvalidFormat(_) | VaultError::EncryptionFailed => {
                ApiError::Internal {
                    message: err.to_string(),
                }
            }
            VaultError::Storage(message) => ApiError::Database { message },
        }
    }
}

impl From<fulfillment_engine::FulfillmentError> for ApiError {
    fn from(err: fulfillment_engine::FulfillmentError) -> Self {
        use fulfillment_engine::FulfillmentError;
        match err {
            FulfillmentError::NotFound => ApiError::not_found("prescription"),
            FulfillmentError::InvalidStatus(_) => ApiError::UnprocessableEntity {
                message: err.to_string(),
            },
            FulfillmentError::InvalidTransition { .. } | FulfillmentError::QueueConflict { .. } => {
                ApiError::Conflict {
                    message: err.to_string(),
                }
            }
            FulfillmentError::Storage(message) => ApiError::Database { message },
        }
    }
}

impl From<payment_links::PaymentLinkError> for ApiError {
    fn from(err: payment_links::PaymentLinkError) -> Self {
        use payment_links::PaymentLinkError;
        match err {
            PaymentLinkError::PrescriptionNotFound => ApiError::not_found("prescription"),
            PaymentLinkError::NotFound => ApiError::not_found("payment link"),
            PaymentLinkError::Expired => ApiError::gone("Payment link expired"),
            PaymentLinkError::InvalidInput(message) => ApiError::Validation { message },
            PaymentLinkError::Pricing(e) => ApiError::Internal {
                message: e.to_string(),
            },
            PaymentLinkError::Processor(e) => ApiError::Upstream {
                message: e.to_string(),
            },
            PaymentLinkError::Storage(message) => ApiError::Database { message },
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
