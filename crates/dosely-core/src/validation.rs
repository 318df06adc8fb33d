//! # Validation Module
//!
//! Form validation and numeric coercion for Dosely.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Form input (CLI arguments)                                   │
//! │  ├── Raw strings for dose and quantity                                 │
//! │  └── THIS MODULE: trim, required, length, coercion                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: dosely-client                                                │
//! │  └── Typed request bodies (MedicineFields, MedicinePatch)              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Stock service                                                │
//! │  └── Authoritative checks, reported back as ClientError::Rejected      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Numeric Coercion
//! Dose and quantity come in as free text. They are read the way a browser
//! form reads them: the longest numeric prefix wins and anything unreadable
//! becomes zero (`"20 tablets"` → 20, `"abc"` → 0).

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{Credentials, Medicine, MedicineFields, SignupRequest};
use crate::{MAX_NAME_LEN, MIN_PASSWORD_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Coercion
// =============================================================================

/// Parses the leading decimal number of `input`, or 0.0 if there is none.
///
/// ```rust
/// use dosely_core::validation::parse_float_lenient;
///
/// assert_eq!(parse_float_lenient(" 2.5mg"), 2.5);
/// assert_eq!(parse_float_lenient(".5"), 0.5);
/// assert_eq!(parse_float_lenient("mg"), 0.0);
/// ```
pub fn parse_float_lenient(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start || digits > 0 {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        return 0.0;
    }

    s[..end]
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parses the leading integer of `input`, or 0 if there is none.
///
/// ```rust
/// use dosely_core::validation::parse_int_lenient;
///
/// assert_eq!(parse_int_lenient("20 tablets"), 20);
/// assert_eq!(parse_int_lenient("3.9"), 3);
/// assert_eq!(parse_int_lenient(""), 0);
/// ```
pub fn parse_int_lenient(input: &str) -> i64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digit_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digit_start {
        return 0;
    }

    s[..end].parse::<i64>().unwrap_or(0)
}

// =============================================================================
// String Validators
// =============================================================================

fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates a stock name and returns it trimmed.
///
/// ## Example
/// ```rust
/// use dosely_core::validation::validate_stock_name;
///
/// assert_eq!(validate_stock_name("  Travel Kit ").unwrap(), "Travel Kit");
/// assert!(validate_stock_name("   ").is_err());
/// ```
pub fn validate_stock_name(name: &str) -> ValidationResult<String> {
    validate_name("name", name)
}

/// Validates a medicine name and returns it trimmed.
pub fn validate_medicine_name(name: &str) -> ValidationResult<String> {
    validate_name("medicine name", name)
}

fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email.to_string()),
        _ => Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "expected name@domain".to_string(),
        }),
    }
}

fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Validates the login form.
pub fn validate_credentials(email: &str, password: &str) -> ValidationResult<Credentials> {
    let email = validate_email(email)?;
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }
    Ok(Credentials {
        email,
        password: password.to_string(),
    })
}

/// Validates the signup form.
pub fn validate_signup(name: &str, email: &str, password: &str) -> ValidationResult<SignupRequest> {
    let name = validate_name("name", name)?;
    let email = validate_email(email)?;
    validate_password(password)?;
    Ok(SignupRequest {
        name,
        email,
        password: password.to_string(),
    })
}

// =============================================================================
// Medicine Form
// =============================================================================

/// Raw state of the add/edit medicine form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineForm {
    pub name: String,
    pub dose: String,
    pub quantity: String,
    pub take_morning: bool,
    pub take_afternoon: bool,
    pub take_evening: bool,
}

impl MedicineForm {
    /// Prefills the form from an existing medicine (edit flow).
    pub fn from_medicine(medicine: &Medicine) -> Self {
        MedicineForm {
            name: medicine.name.clone(),
            dose: medicine.dose.to_string(),
            quantity: medicine.quantity.to_string(),
            take_morning: medicine.take_morning,
            take_afternoon: medicine.take_afternoon,
            take_evening: medicine.take_evening,
        }
    }

    /// Validates and coerces the form into a request body.
    pub fn into_fields(self) -> ValidationResult<MedicineFields> {
        let name = validate_medicine_name(&self.name)?;

        let dose = parse_float_lenient(&self.dose);
        if dose < 0.0 {
            return Err(ValidationError::Negative {
                field: "dose".to_string(),
            });
        }

        let quantity = parse_int_lenient(&self.quantity);
        if quantity < 0 {
            return Err(ValidationError::Negative {
                field: "quantity".to_string(),
            });
        }

        Ok(MedicineFields {
            name,
            dose,
            quantity,
            take_morning: self.take_morning,
            take_afternoon: self.take_afternoon,
            take_evening: self.take_evening,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
