//! # Error Types
//!
//! Domain-specific error types for medtill-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  medtill-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  medtill-db errors                                                     │
//! │  └── DbError          - Storage failures (wraps CoreError)             │
//! │                                                                         │
//! │  medtill-sync errors                                                   │
//! │  └── SyncError        - Offline queue failures (retryable or not)      │
//! │                                                                         │
//! │  register-server errors                                                │
//! │  └── ApiError         - What the client sees (serialized)              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Categories
//! Every `CoreError` falls in exactly one [`ErrorCategory`]. None of them is
//! transient: a core error means the request itself is wrong and replaying it
//! unchanged produces the same error.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A drawer already has an open session.
    ///
    /// ## When This Occurs
    /// ```text
    /// Terminal A: start(drawer "Main") ──► OK, session S1 open
    /// Terminal B: start(drawer "Main") ──► DrawerBusy (S1 still open)
    /// ```
    #[error("Drawer busy: drawer {drawer_id} already has an open session")]
    DrawerBusy { drawer_id: String },

    /// The session has been closed; no further sales or closes are accepted.
    #[error("Session closed: session {session_id} no longer accepts changes")]
    SessionClosed { session_id: String },

    /// Tendered amount is below the patient amount due.
    #[error("Insufficient payment: {due_cents} due, {tendered_cents} tendered, {shortfall_cents} short")]
    InsufficientPayment {
        due_cents: i64,
        tendered_cents: i64,
        shortfall_cents: i64,
    },

    /// Drawer cannot be found.
    #[error("Drawer not found: {0}")]
    DrawerNotFound(String),

    /// Session cannot be found.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Sale cannot be found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Cart line cannot be found.
    #[error("Cart line not found: {0}")]
    LineNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Coarse classification used by the outer layers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input, rejected before persistence.
    Validation,
    /// Business-rule violation against current state.
    Conflict,
    /// Tender below amount due.
    InsufficientPayment,
    /// Referenced entity does not exist.
    NotFound,
}

impl CoreError {
    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::DrawerBusy { .. } | CoreError::SessionClosed { .. } => {
                ErrorCategory::Conflict
            }
            CoreError::InsufficientPayment { .. } => ErrorCategory::InsufficientPayment,
            CoreError::DrawerNotFound(_)
            | CoreError::SessionNotFound(_)
            | CoreError::SaleNotFound(_)
            | CoreError::LineNotFound(_) => ErrorCategory::NotFound,
            CoreError::Validation(_) => ErrorCategory::Validation,
        }
    }

    /// Returns true for business-rule conflicts (drawer busy, session closed).
    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., drawer code already used by this owner).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// Settlement was requested for a cart with no lines.
    #[error("empty cart")]
    EmptyCart,
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub(crate) fn not_negative(field: &str) -> Self {
        ValidationError::MustNotBeNegative {
            field: field.to_string(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
