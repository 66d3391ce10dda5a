//! # API Error Type
//!
//! Unified error type for register commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Register Server                    │
//! │                                                                         │
//! │  Command Function  Result<T, ApiError>                                  │
//! │         │                                                               │
//! │         ├─ ValidationError ─────────► 400 VALIDATION_ERROR              │
//! │         ├─ DrawerBusy / SessionClosed► 409 CONFLICT                     │
//! │         ├─ InsufficientPayment ──────► 402 INSUFFICIENT_PAYMENT         │
//! │         │                                  + shortfallCents             │
//! │         ├─ *NotFound ────────────────► 404 NOT_FOUND                    │
//! │         ├─ Busy / connection / pool ─► 503 TRANSIENT (client retries)   │
//! │         └─ anything else ────────────► 500 INTERNAL (logged)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only `TRANSIENT` invites a retry. Clients that retry a sale send the
//! same idempotency key.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use medtill_core::{CoreError, ErrorCategory};
use medtill_db::DbError;

/// API error returned from register commands.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INSUFFICIENT_PAYMENT",
///   "message": "Insufficient payment: 1000 due, 800 tendered, 200 short",
///   "shortfallCents": 200
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Amount still owed, for `INSUFFICIENT_PAYMENT`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall_cents: Option<i64>,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed input (400)
    ValidationError,

    /// Business-rule violation against current state (409)
    Conflict,

    /// Tender below amount due (402)
    InsufficientPayment,

    /// Resource not found (404)
    NotFound,

    /// Storage temporarily unavailable (503)
    Transient,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::InsufficientPayment => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Transient => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            shortfall_cents: None,
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let shortfall = match &err {
            CoreError::InsufficientPayment {
                shortfall_cents, ..
            } => Some(*shortfall_cents),
            _ => None,
        };

        let code = match err.category() {
            ErrorCategory::Validation => ErrorCode::ValidationError,
            ErrorCategory::Conflict => ErrorCode::Conflict,
            ErrorCategory::InsufficientPayment => ErrorCode::InsufficientPayment,
            ErrorCategory::NotFound => ErrorCode::NotFound,
        };

        // Validation messages are surfaced verbatim
        let message = match err {
            CoreError::Validation(e) => e.to_string(),
            other => other.to_string(),
        };

        ApiError {
            code,
            message,
            shortfall_cents: shortfall,
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            tracing::warn!(error = %err, "Transient database failure");
            return ApiError::new(ErrorCode::Transient, "Storage temporarily unavailable, retry");
        }

        match err {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            other => {
                // Log the actual error but return a generic message
                tracing::error!(error = %other, "Database operation failed");
                ApiError::internal("Database operation failed")
            }
        }
    }
}

/// Malformed JSON bodies keep the error shape of every other failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medtill_core::ValidationError;

    #[test]
    fn test_core_categories_map_to_codes() {
        let busy: ApiError = CoreError::DrawerBusy {
            drawer_id: "d1".into(),
        }
        .into();
        assert_eq!(busy.code, ErrorCode::Conflict);
        assert_eq!(busy.code.status(), StatusCode::CONFLICT);

        let short: ApiError = CoreError::InsufficientPayment {
            due_cents: 1000,
            tendered_cents: 800,
            shortfall_cents: 200,
        }
        .into();
        assert_eq!(short.code, ErrorCode::InsufficientPayment);
        assert_eq!(short.shortfall_cents, Some(200));
        assert_eq!(short.code.status(), StatusCode::PAYMENT_REQUIRED);

        let missing: ApiError = CoreError::SessionNotFound("s1".into()).into();
        assert_eq!(missing.code.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err: ApiError = CoreError::Validation(ValidationError::EmptyCart).into();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "empty cart");
    }

    #[test]
    fn test_db_errors() {
        let busy: ApiError = DbError::Busy("database is locked".into()).into();
        assert_eq!(busy.code, ErrorCode::Transient);
        assert_eq!(busy.code.status(), StatusCode::SERVICE_UNAVAILABLE);

        let closed: ApiError = DbError::Domain(CoreError::SessionClosed {
            session_id: "s1".into(),
        })
        .into();
        assert_eq!(closed.code, ErrorCode::Conflict);

        let corrupt: ApiError = DbError::Corrupt("bad row".into()).into();
        assert_eq!(corrupt.code, ErrorCode::Internal);
        assert!(!corrupt.message.contains("bad row"));
    }

    #[test]
    fn test_serialization_skips_missing_shortfall() {
        let json = serde_json::to_value(ApiError::not_found("Sale", "x")).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert!(json.get("shortfallCents").is_none());
    }
}
