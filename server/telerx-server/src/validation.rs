//! Request validation utilities for consistent validation across handlers
//!
//! This module provides a `RequestValidation` trait and helper macros to
//! centralize validation logic and ensure consistent error messages.

use crate::error::ApiError;

/// Trait for validating request payloads
///
/// Implement this trait for all create/update request types to ensure
/// consistent validation across the API.
///
/// # Example
///
/// ```ignore
/// impl RequestValidation for CreateBackendRequest {
///     fn validate(&self) -> Result<(), ApiError> {
///         validate_uuid!(self.pharmacy_id, "Pharmacy ID is required");
///         validate_required!(self.base_url, "Base URL is required");
///         Ok(())
///     }
/// }
/// ```
pub trait RequestValidation {
    /// Validates the request and returns an error if validation fails
    fn validate(&self) -> Result<(), ApiError>;
}

/// Macro for validating fields with custom predicates
///
/// # Usage
///
/// ```ignore
/// validate_field!(self.base_url, self.base_url.starts_with("https://"), "Base URL must use HTTPS");
/// ```
#[macro_export]
macro_rules! validate_field {
    ($field:expr, $predicate:expr, $message:expr) => {
        if !$predicate {
            return Err($crate::error::ApiError::validation($message));
        }
    };
}

/// Macro for validating required fields (non-empty strings)
///
/// # Usage
///
/// ```ignore
/// validate_required!(self.queue_id, "Queue ID is required");
/// ```
#[macro_export]
macro_rules! validate_required {
    ($field:expr, $message:expr) => {
        validate_field!($field, !$field.trim().is_empty(), $message);
    };
}

/// Macro for validating UUID fields (non-nil)
///
/// # Usage
///
/// ```ignore
/// validate_uuid!(self.pharmacy_id, "Pharmacy ID is required");
/// ```
#[macro_export]
macro_rules! validate_uuid {
    ($field:expr, $message:expr) => {
        validate_field!($field, !$field.is_nil(), $message);
    };
}

/// Macro for validating string length
///
/// # Usage
///
/// ```ignore
/// validate_length!(self.queue_id, 1, 128, "Queue ID must be between 1 and 128 characters");
/// ```
#[macro_export]
macro_rules! validate_length {
    ($field:expr, $min:expr, $max:expr, $message:expr) => {
        let len = $field.len();
        validate_field!($field, len >= $min && len <= $max, $message);
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    struct TestRequest {
        queue_id: String,
        pharmacy_id: Uuid,
    }

    impl RequestValidation for TestRequest {
        fn validate(&self) -> Result<(), ApiError> {
            validate_required!(self.queue_id, "Queue ID is required");
            validate_length!(self.queue_id, 1, 128, "Queue ID too long");
            validate_uuid!(self.pharmacy_id, "Pharmacy ID is required");
            Ok(())
        }
    }

    #[test]
    fn valid_request_passes() {
        let request = TestRequest {
            queue_id: "RX-1042".to_string(),
            pharmacy_id: Uuid::new_v4(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn blank_queue_id_fails() {
        let request = TestRequest {
            queue_id: "   ".to_string(),
            pharmacy_id: Uuid::new_v4(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn nil_uuid_fails() {
        let request = TestRequest {
            queue_id: "RX-1042".to_string(),
            pharmacy_id: Uuid::nil(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn oversized_field_fails() {
        let request = TestRequest {
            queue_id: "q".repeat(200),
            pharmacy_id: Uuid::new_v4(),
        };
        assert!(request.validate().is_err());
    }
}
