//! # dosely-core: Pure Domain Logic for Dosely
//!
//! This crate holds the medicine-stock domain as plain data and pure functions.
//! Everything that touches the network or the disk lives in `dosely-client`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Dosely Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/cli (`dosely` binary)                   │   │
//! │  │      login ──► list ──► show ──► add-med / edit-med / delete    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    dosely-client                                │   │
//! │  │   HttpApi ◄── SessionStore    StockListSynchronizer  StockEditor│   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ dosely-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │validation │  │   view    │  │   error   │  │   │
//! │  │   │  Stock    │  │ forms     │  │ cards     │  │ CoreError │  │   │
//! │  │   │  Medicine │  │ coercion  │  │ schedule  │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • PURE FUNCTIONS                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Stock, Medicine, StockPage, auth payloads)
//! - [`validation`] - Form validation and numeric coercion
//! - [`view`] - Declarative view models for the stock list and schedule
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use dosely_core::validation::MedicineForm;
//!
//! let form = MedicineForm {
//!     name: "Ibuprofen".to_string(),
//!     dose: "400".to_string(),
//!     quantity: "20 tablets".to_string(),
//!     take_morning: true,
//!     ..MedicineForm::default()
//! };
//!
//! let fields = form.into_fields().unwrap();
//! assert_eq!(fields.dose, 400.0);
//! assert_eq!(fields.quantity, 20);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;
pub mod view;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Number of stocks requested per page by the list view.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound accepted for a configured page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Storage key under which the session token is persisted.
pub const DEFAULT_TOKEN_KEY: &str = "dosely_token";

/// Maximum length of a stock or medicine name.
pub const MAX_NAME_LEN: usize = 100;

/// Minimum password length accepted by the signup form.
pub const MIN_PASSWORD_LEN: usize = 6;
