//! # Domain Types
//!
//! Core domain types used throughout Dosely.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐  owns  ┌─────────────────┐                        │
//! │  │     Stock       │───────►│    Medicine     │                        │
//! │  │  ─────────────  │  0..n  │  ─────────────  │                        │
//! │  │  id (server)    │        │  id (server)    │                        │
//! │  │  name           │        │  name           │                        │
//! │  │  medicines      │        │  dose (f64)     │                        │
//! │  │  created_at     │        │  quantity (i64) │                        │
//! │  └─────────────────┘        │  take_morning   │                        │
//! │                             │  take_afternoon │                        │
//! │  ┌─────────────────┐        │  take_evening   │                        │
//! │  │   StockPage     │        └─────────────────┘                        │
//! │  │  items, total   │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Tolerance
//! The stock service is not strict about numbers: `dose` and `quantity` can
//! arrive as JSON numbers or as numeric strings, and summary listings may omit
//! the `medicines` relation entirely. Deserialization absorbs all of that so
//! the rest of the workspace only ever sees the typed values.

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::validation::{parse_float_lenient, parse_int_lenient};

/// Server-assigned identifier of a stock.
pub type StockId = i64;

/// Server-assigned identifier of a medicine.
pub type MedicineId = i64;

// =============================================================================
// Time of Day
// =============================================================================

/// The three intake slots a medicine can be scheduled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    /// All slots in display order.
    pub const ALL: [TimeOfDay; 3] = [TimeOfDay::Morning, TimeOfDay::Afternoon, TimeOfDay::Evening];

    /// Column heading used by the schedule view.
    pub fn label(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "Morning",
            TimeOfDay::Afternoon => "Afternoon",
            TimeOfDay::Evening => "Evening",
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeOfDay::Morning => write!(f, "morning"),
            TimeOfDay::Afternoon => write!(f, "afternoon"),
            TimeOfDay::Evening => write!(f, "evening"),
        }
    }
}

// =============================================================================
// Medicine
// =============================================================================

/// A dosed, quantified item with a morning/afternoon/evening schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: MedicineId,

    pub name: String,

    /// Dose per intake. Accepts `2.5` or `"2.5"` on the wire.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub dose: f64,

    /// Units left in the stock. Accepts `10` or `"10"` on the wire.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub quantity: i64,

    #[serde(default)]
    pub take_morning: bool,

    #[serde(default)]
    pub take_afternoon: bool,

    #[serde(default)]
    pub take_evening: bool,
}

impl Medicine {
    /// Returns true if this medicine is taken in the given slot.
    pub fn takes_at(&self, slot: TimeOfDay) -> bool {
        match slot {
            TimeOfDay::Morning => self.take_morning,
            TimeOfDay::Afternoon => self.take_afternoon,
            TimeOfDay::Evening => self.take_evening,
        }
    }

    /// Applies a partial update, as the server does for `PATCH /stock/medicine/{id}`.
    pub fn apply_patch(&mut self, patch: &MedicinePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(dose) = patch.dose {
            self.dose = dose;
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(flag) = patch.take_morning {
            self.take_morning = flag;
        }
        if let Some(flag) = patch.take_afternoon {
            self.take_afternoon = flag;
        }
        if let Some(flag) = patch.take_evening {
            self.take_evening = flag;
        }
    }
}

/// Body of `POST /stock/insertMedicine/{stockId}`: every medicine field but the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineFields {
    pub name: String,
    pub dose: f64,
    pub quantity: i64,
    pub take_morning: bool,
    pub take_afternoon: bool,
    pub take_evening: bool,
}

impl MedicineFields {
    /// Builds the medicine the server would create from these fields.
    pub fn with_id(self, id: MedicineId) -> Medicine {
        Medicine {
            id,
            name: self.name,
            dose: self.dose,
            quantity: self.quantity,
            take_morning: self.take_morning,
            take_afternoon: self.take_afternoon,
            take_evening: self.take_evening,
        }
    }
}

/// Body of `PATCH /stock/medicine/{medId}`. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicinePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_morning: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_afternoon: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_evening: Option<bool>,
}

impl MedicinePatch {
    /// Returns true if nothing would be changed.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.dose.is_none()
            && self.quantity.is_none()
            && self.take_morning.is_none()
            && self.take_afternoon.is_none()
            && self.take_evening.is_none()
    }
}

impl From<MedicineFields> for MedicinePatch {
    fn from(fields: MedicineFields) -> Self {
        MedicinePatch {
            name: Some(fields.name),
            dose: Some(fields.dose),
            quantity: Some(fields.quantity),
            take_morning: Some(fields.take_morning),
            take_afternoon: Some(fields.take_afternoon),
            take_evening: Some(fields.take_evening),
        }
    }
}

// =============================================================================
// Stock
// =============================================================================

/// A named container of medicine records owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub id: StockId,

    pub name: String,

    /// Ordered medicines. Summary listings may omit this or send `null`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub medicines: Vec<Medicine>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Stock {
    /// Creates a stock with no medicines (mostly useful for tests and fakes).
    pub fn new(id: StockId, name: impl Into<String>) -> Self {
        Stock {
            id,
            name: name.into(),
            medicines: Vec::new(),
            created_at: None,
        }
    }

    /// Number of medicines held.
    pub fn medicine_count(&self) -> usize {
        self.medicines.len()
    }

    /// Looks up a medicine by id.
    pub fn find_medicine(&self, id: MedicineId) -> Option<&Medicine> {
        self.medicines.iter().find(|m| m.id == id)
    }

    /// Replaces the medicine with the same id, keeping its position.
    /// Returns false if no such medicine exists.
    pub fn replace_medicine(&mut self, medicine: Medicine) -> bool {
        match self.medicines.iter_mut().find(|m| m.id == medicine.id) {
            Some(slot) => {
                *slot = medicine;
                true
            }
            None => false,
        }
    }

    /// Removes a medicine by id, returning it.
    pub fn remove_medicine(&mut self, id: MedicineId) -> CoreResult<Medicine> {
        let index = self
            .medicines
            .iter()
            .position(|m| m.id == id)
            .ok_or(CoreError::MedicineNotFound {
                stock_id: self.id,
                medicine_id: id,
            })?;
        Ok(self.medicines.remove(index))
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// One normalized page of the stock listing.
#[derive(Debug, Clone, PartialEq)]
pub struct StockPage {
    pub items: Vec<Stock>,
    /// Total number of stocks the server reports for the user.
    pub total: usize,
}

/// Raw `GET /stock/getAll` body.
///
/// The paginated contract is authoritative; the bare array is the legacy
/// unpaginated shape, which always carries the whole collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StockListResponse {
    Paginated { data: Vec<Stock>, total: usize },
    Legacy(Vec<Stock>),
}

impl StockListResponse {
    /// Returns true if the server answered with the legacy bare array.
    pub fn is_legacy(&self) -> bool {
        matches!(self, StockListResponse::Legacy(_))
    }

    /// Normalizes either shape into a [`StockPage`].
    pub fn into_page(self) -> StockPage {
        match self {
            StockListResponse::Paginated { data, total } => StockPage { items: data, total },
            StockListResponse::Legacy(items) => {
                let total = items.len();
                StockPage { items, total }
            }
        }
    }
}

/// Position of the list view inside the server collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    /// Last page applied to the local collection (1-based, 0 = nothing loaded).
    pub page_number: u32,
    pub page_size: u32,
    /// Total reported by the server, if a page has been applied.
    pub total_count: Option<usize>,
}

impl PageWindow {
    /// A window with nothing loaded yet.
    pub fn empty(page_size: u32) -> Self {
        PageWindow {
            page_number: 0,
            page_size,
            total_count: None,
        }
    }

    /// The page cursor: next page number to request.
    pub fn next_page(&self) -> u32 {
        self.page_number + 1
    }

    /// Page to request next after `removed` loaded stocks were deleted on the
    /// server. Offsets after them shift towards the front, so the request
    /// steps back far enough to cover the stocks that crossed the boundary.
    pub fn resume_page(&self, removed: usize) -> u32 {
        if self.page_number == 0 || self.page_size == 0 || removed == 0 {
            return self.next_page();
        }
        let size = self.page_size as usize;
        let offset = (self.page_number as usize * size).saturating_sub(removed);
        (offset / size) as u32 + 1
    }
}

// =============================================================================
// Medicine Insert Response
// =============================================================================

/// What `POST /stock/insertMedicine/{stockId}` answered with.
///
/// Depending on the server build it is either the whole updated stock or just
/// the created medicine.
#[derive(Debug, Clone, PartialEq)]
pub enum MedicineAdded {
    Stock(Stock),
    Medicine(Medicine),
}

impl MedicineAdded {
    /// Sniffs the payload: an object with a `medicines` key is a stock.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        let is_stock = value
            .as_object()
            .map(|obj| obj.contains_key("medicines"))
            .ok_or_else(|| CoreError::UnexpectedPayload("expected a JSON object".into()))?;

        if is_stock {
            serde_json::from_value(value)
                .map(MedicineAdded::Stock)
                .map_err(|e| CoreError::UnexpectedPayload(e.to_string()))
        } else {
            serde_json::from_value(value)
                .map(MedicineAdded::Medicine)
                .map_err(|e| CoreError::UnexpectedPayload(e.to_string()))
        }
    }

    /// Applies the response to the stock it was added to.
    pub fn apply_to(self, stock: &mut Stock) {
        match self {
            MedicineAdded::Stock(updated) => *stock = updated,
            MedicineAdded::Medicine(medicine) => {
                if !stock.replace_medicine(medicine.clone()) {
                    stock.medicines.push(medicine);
                }
            }
        }
    }
}

// =============================================================================
// Users & Auth
// =============================================================================

/// The authenticated user, as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Response of `/user/login`, `/user/signup` and `/user/google-login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<User>,
}

/// Body of `POST /user/login`.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Body of `POST /user/signup`.
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body of `POST /user/google-login`.
#[derive(Debug, Clone, Serialize)]
pub struct GoogleLoginRequest {
    pub token: String,
}

// =============================================================================
// Lenient Deserializers
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(serde_json::Number),
    Text(String),
    Other(IgnoredAny),
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(NumberOrText::Text(s)) => parse_float_lenient(&s),
        Some(NumberOrText::Other(_)) | None => 0.0,
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(NumberOrText::Text(s)) => parse_int_lenient(&s),
        Some(NumberOrText::Other(_)) | None => 0,
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_medicine_coerces_string_numbers() {
        let med: Medicine = serde_json::from_value(json!({
            "id": 1,
            "name": "Paracetamol",
            "dose": "500",
            "quantity": "12",
            "takeMorning": true
        }))
        .unwrap();

        assert_eq!(med.dose, 500.0);
        assert_eq!(med.quantity, 12);
        assert!(med.take_morning);
        assert!(!med.take_afternoon);
        assert!(!med.take_evening);
    }

    #[test]
    fn test_medicine_coerces_garbage_to_zero() {
        let med: Medicine = serde_json::from_value(json!({
            "id": 2,
            "name": "Mystery",
            "dose": "abc",
            "quantity": null
        }))
        .unwrap();

        assert_eq!(med.dose, 0.0);
        assert_eq!(med.quantity, 0);
    }

    #[test]
    fn test_medicine_accepts_float_quantity() {
        let med: Medicine = serde_json::from_value(json!({
            "id": 3, "name": "Drops", "dose": 2.5, "quantity": 7.0
        }))
        .unwrap();
        assert_eq!(med.dose, 2.5);
        assert_eq!(med.quantity, 7);
    }

    #[test]
    fn test_stock_without_medicines() {
        let stock: Stock = serde_json::from_value(json!({
            "id": 9,
            "name": "Travel Kit",
            "medicines": null,
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert!(stock.medicines.is_empty());
        assert!(stock.created_at.is_some());

        let bare: Stock = serde_json::from_value(json!({"id": 1, "name": "Bare"})).unwrap();
        assert_eq!(bare.medicine_count(), 0);
        assert!(bare.created_at.is_none());
    }

    #[test]
    fn test_stock_serializes_camel_case() {
        let value = serde_json::to_value(Stock::new(1, "Home")).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn test_list_response_paginated() {
        let resp: StockListResponse = serde_json::from_value(json!({
            "data": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}],
            "total": 25
        }))
        .unwrap();
        assert!(!resp.is_legacy());

        let page = resp.into_page();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 25);
    }

    #[test]
    fn test_list_response_legacy_array() {
        let resp: StockListResponse =
            serde_json::from_value(json!([{"id": 1, "name": "A"}])).unwrap();
        assert!(resp.is_legacy());

        let page = resp.into_page();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_medicine_added_sniffs_shape() {
        let as_stock = MedicineAdded::from_value(json!({
            "id": 4, "name": "Cabinet", "medicines": [{"id": 10, "name": "Aspirin"}]
        }))
        .unwrap();
        assert!(matches!(as_stock, MedicineAdded::Stock(ref s) if s.medicine_count() == 1));

        let as_medicine =
            MedicineAdded::from_value(json!({"id": 10, "name": "Aspirin", "dose": 100})).unwrap();
        assert!(matches!(as_medicine, MedicineAdded::Medicine(ref m) if m.id == 10));

        assert!(MedicineAdded::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_medicine_added_apply_appends_or_replaces() {
        let mut stock = Stock::new(1, "Kit");
        let aspirin = Medicine {
            id: 10,
            name: "Aspirin".into(),
            dose: 100.0,
            quantity: 5,
            take_morning: true,
            take_afternoon: false,
            take_evening: false,
        };

        MedicineAdded::Medicine(aspirin.clone()).apply_to(&mut stock);
        assert_eq!(stock.medicine_count(), 1);

        let mut restocked = aspirin;
        restocked.quantity = 50;
        MedicineAdded::Medicine(restocked).apply_to(&mut stock);
        assert_eq!(stock.medicine_count(), 1);
        assert_eq!(stock.medicines[0].quantity, 50);
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = MedicinePatch {
            quantity: Some(3),
            ..MedicinePatch::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"quantity": 3}));
        assert!(MedicinePatch::default().is_empty());
    }

    #[test]
    fn test_user_id_accepts_number() {
        let resp: AuthResponse = serde_json::from_value(json!({
            "token": "abc",
            "user": {"id": 17, "name": "Ana", "email": "ana@example.com"}
        }))
        .unwrap();
        assert_eq!(resp.user.unwrap().id, "17");
    }

    #[test]
    fn test_remove_medicine_not_found() {
        let mut stock = Stock::new(5, "Empty");
        let err = stock.remove_medicine(99).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MedicineNotFound {
                stock_id: 5,
                medicine_id: 99
            }
        ));
    }

    #[test]
    fn test_page_window_cursor() {
        let window = PageWindow::empty(10);
        assert_eq!(window.next_page(), 1);
    }

    #[test]
    fn test_resume_page_after_server_deletes() {
        let window = PageWindow {
            page_number: 2,
            page_size: 10,
            total_count: Some(30),
        };
        assert_eq!(window.resume_page(0), 3);
        assert_eq!(window.resume_page(1), 2);
        assert_eq!(window.resume_page(10), 2);
        assert_eq!(window.resume_page(11), 1);
        assert_eq!(window.resume_page(25), 1);
        assert_eq!(PageWindow::empty(10).resume_page(3), 1);
    }

    #[test]
    fn test_medicine_ignores_non_numeric_json() {
        let med: Medicine = serde_json::from_value(json!({
            "id": 4, "name": "Odd", "dose": true, "quantity": {"count": 3}
        }))
        .unwrap();
        assert_eq!(med.dose, 0.0);
        assert_eq!(med.quantity, 0);
    }
}
