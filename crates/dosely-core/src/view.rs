//! # View Models
//!
//! One declarative view model per screen, independent of how it is rendered.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stock list                         │  Stock detail                     │
//! │  ──────────                         │  ────────────                     │
//! │  StockListView                      │  ScheduleView                     │
//! │  ├── cards: Vec<StockCardView>      │  ├── morning:   [&Medicine]       │
//! │  ├── loading_first_page / more      │  ├── afternoon: [&Medicine]       │
//! │  └── has_more (sentinel shown)      │  └── evening:   [&Medicine]       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use crate::types::{Medicine, Stock, StockId, TimeOfDay};

// =============================================================================
// Stock List
// =============================================================================

/// One card in the stock grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCardView {
    pub id: StockId,
    pub name: String,
    pub medicine_count: usize,
    pub subtitle: String,
}

impl From<&Stock> for StockCardView {
    fn from(stock: &Stock) -> Self {
        let count = stock.medicine_count();
        let subtitle = if count == 1 {
            "1 item stored".to_string()
        } else {
            format!("{} items stored", count)
        };
        StockCardView {
            id: stock.id,
            name: stock.name.clone(),
            medicine_count: count,
            subtitle,
        }
    }
}

/// The whole stock list screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockListView {
    pub cards: Vec<StockCardView>,
    /// Number of stocks held locally, before the search filter.
    pub loaded_count: usize,
    pub total_count: Option<usize>,
    pub loading_first_page: bool,
    pub loading_more: bool,
    pub has_more: bool,
    pub last_error: Option<String>,
}

impl StockListView {
    /// True when the empty-state panel should be shown instead of the grid.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty() && !self.loading_first_page
    }

    /// True when the infinite-scroll sentinel should be rendered.
    ///
    /// The sentinel is hidden while any page is loading so it cannot re-fire.
    pub fn show_sentinel(&self) -> bool {
        self.has_more && !self.loading_first_page && !self.loading_more
    }

    /// Index of the card after which the sentinel sits.
    pub fn sentinel_index(&self) -> Option<usize> {
        sentinel_index(self.cards.len())
    }
}

/// Index of the last rendered card, after which the sentinel is placed.
pub fn sentinel_index(visible_len: usize) -> Option<usize> {
    visible_len.checked_sub(1)
}

/// Case-insensitive substring filter used by the search box.
///
/// ```rust
/// use dosely_core::{Stock, view::filter_by_name};
///
/// let stocks = vec![Stock::new(1, "Travel Kit"), Stock::new(2, "Bathroom Cabinet")];
/// let hits = filter_by_name(&stocks, "kit");
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].id, 1);
/// ```
pub fn filter_by_name<'a>(stocks: &'a [Stock], query: &str) -> Vec<&'a Stock> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return stocks.iter().collect();
    }
    stocks
        .iter()
        .filter(|s| s.name.to_lowercase().contains(&needle))
        .collect()
}

// =============================================================================
// Schedule
// =============================================================================

/// Medicines of one stock grouped into the three intake columns.
///
/// A medicine with several flags set appears in several columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleView<'a> {
    pub morning: Vec<&'a Medicine>,
    pub afternoon: Vec<&'a Medicine>,
    pub evening: Vec<&'a Medicine>,
}

impl<'a> ScheduleView<'a> {
    /// Groups the medicines of `stock`, preserving their order.
    pub fn of(stock: &'a Stock) -> Self {
        let pick = |slot: TimeOfDay| -> Vec<&'a Medicine> {
            stock.medicines.iter().filter(|m| m.takes_at(slot)).collect()
        };
        ScheduleView {
            morning: pick(TimeOfDay::Morning),
            afternoon: pick(TimeOfDay::Afternoon),
            evening: pick(TimeOfDay::Evening),
        }
    }

    /// The column for one slot.
    pub fn column(&self, slot: TimeOfDay) -> &[&'a Medicine] {
        match slot {
            TimeOfDay::Morning => &self.morning,
            TimeOfDay::Afternoon => &self.afternoon,
            TimeOfDay::Evening => &self.evening,
        }
    }

    /// Returns true if no medicine is scheduled at all.
    pub fn is_empty(&self) -> bool {
        self.morning.is_empty() && self.afternoon.is_empty() && self.evening.is_empty()
    }
}

/// Medicines with no time-of-day flag set (shown as "unscheduled").
pub fn unscheduled(stock: &Stock) -> Vec<&Medicine> {
    stock
        .medicines
        .iter()
        .filter(|m| !TimeOfDay::ALL.iter().any(|slot| m.takes_at(*slot)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn medicine(id: i64, name: &str, flags: (bool, bool, bool)) -> Medicine {
        Medicine {
            id,
            name: name.to_string(),
            dose: 1.0,
            quantity: 10,
            take_morning: flags.0,
            take_afternoon: flags.1,
            take_evening: flags.2,
        }
    }

    #[test]
    fn test_card_subtitle_pluralization() {
        let mut stock = Stock::new(1, "Kit");
        assert_eq!(StockCardView::from(&stock).subtitle, "0 items stored");

        stock.medicines.push(medicine(1, "A", (true, false, false)));
        assert_eq!(StockCardView::from(&stock).subtitle, "1 item stored");

        stock.medicines.push(medicine(2, "B", (true, false, false)));
        let card = StockCardView::from(&stock);
        assert_eq!(card.subtitle, "2 items stored");
        assert_eq!(card.medicine_count, 2);
    }

    #[test]
    fn test_filter_by_name() {
        let stocks = vec![
            Stock::new(1, "Home First Aid"),
            Stock::new(2, "Travel Kit"),
            Stock::new(3, "Grandma's Meds"),
        ];

        assert_eq!(filter_by_name(&stocks, "").len(), 3);
        assert_eq!(filter_by_name(&stocks, "  ").len(), 3);
        assert_eq!(filter_by_name(&stocks, "AID")[0].id, 1);
        assert!(filter_by_name(&stocks, "office").is_empty());
    }

    #[test]
    fn test_schedule_grouping() {
        let mut stock = Stock::new(1, "Kit");
        stock.medicines = vec![
            medicine(1, "Morning only", (true, false, false)),
            medicine(2, "Twice a day", (true, false, true)),
            medicine(3, "As needed", (false, false, false)),
            medicine(4, "Lunch", (false, true, false)),
        ];

        let schedule = ScheduleView::of(&stock);
        let ids = |col: &[&Medicine]| col.iter().map(|m| m.id).collect::<Vec<_>>();

        assert_eq!(ids(schedule.column(TimeOfDay::Morning)), vec![1, 2]);
        assert_eq!(ids(schedule.column(TimeOfDay::Afternoon)), vec![4]);
        assert_eq!(ids(schedule.column(TimeOfDay::Evening)), vec![2]);
        assert_eq!(unscheduled(&stock).len(), 1);
        assert!(!schedule.is_empty());
    }

    #[test]
    fn test_sentinel_visibility() {
        let view = StockListView {
            cards: vec![StockCardView::from(&Stock::new(1, "A"))],
            loaded_count: 1,
            total_count: Some(5),
            loading_first_page: false,
            loading_more: false,
            has_more: true,
            last_error: None,
        };
        assert!(view.show_sentinel());
        assert_eq!(view.sentinel_index(), Some(0));

        let busy = StockListView {
            loading_more: true,
            ..view.clone()
        };
        assert!(!busy.show_sentinel());

        assert_eq!(sentinel_index(0), None);
    }
}
