//! # Error Types
//!
//! Domain-specific error types for dosely-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  dosely-core errors (this file)                                        │
//! │  ├── CoreError        - Domain lookups and invariants                  │
//! │  └── ValidationError  - Form input failures                            │
//! │                                                                         │
//! │  dosely-client errors (separate crate)                                 │
//! │  └── ClientError      - Transport, auth, server rejections             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ClientError → CLI message         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Stock is not present in the locally held collection.
    #[error("Stock not found: {0}")]
    StockNotFound(i64),

    /// Medicine is not present in the stock being edited.
    #[error("Medicine {medicine_id} not found in stock {stock_id}")]
    MedicineNotFound { stock_id: i64, medicine_id: i64 },

    /// A payload from the server did not have the expected shape.
    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors raised before anything is sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., an email without `@`).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
