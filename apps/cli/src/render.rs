//! Plain-text rendering of the view models.

use std::path::Path;

use dosely_client::AuthState;
use dosely_core::view::{unscheduled, ScheduleView, StockListView};
use dosely_core::{Medicine, Stock, TimeOfDay};

pub fn stock_list(view: &StockListView) -> String {
    let mut out = String::new();

    if let Some(error) = &view.last_error {
        out.push_str(&format!("! {}\n", error));
    }

    if view.is_empty() {
        if view.loaded_count == 0 {
            out.push_str("No stocks yet. Create one with `dosely create <name>`.\n");
        } else {
            out.push_str("No stocks match your search.\n");
        }
        return out;
    }

    match view.total_count {
        Some(total) => out.push_str(&format!("My Stocks ({} of {})\n", view.loaded_count, total)),
        None => out.push_str(&format!("My Stocks ({})\n", view.loaded_count)),
    }
    for card in &view.cards {
        out.push_str(&format!("  #{:<6} {:<32} {}\n", card.id, card.name, card.subtitle));
    }
    if view.show_sentinel() {
        out.push_str("  ... more stocks available, run `dosely list --all`\n");
    }
    out
}

pub fn stock_detail(stock: &Stock, schedule: &ScheduleView<'_>) -> String {
    let mut out = format!("{} (#{})\n", stock.name, stock.id);

    if stock.medicines.is_empty() {
        out.push_str("  No medicines yet. Add one with `dosely add-med`.\n");
        return out;
    }

    for slot in TimeOfDay::ALL {
        out.push_str(&format!("\n{}\n", slot.label()));
        let column = schedule.column(slot);
        if column.is_empty() {
            out.push_str("  -\n");
        }
        for medicine in column {
            out.push_str(&medicine_line(medicine));
        }
    }

    let loose = unscheduled(stock);
    if !loose.is_empty() {
        out.push_str("\nNot scheduled\n");
        for medicine in loose {
            out.push_str(&medicine_line(medicine));
        }
    }
    out
}

fn medicine_line(medicine: &Medicine) -> String {
    format!(
        "  #{:<6} {:<28} dose {:<6} left {}\n",
        medicine.id, medicine.name, medicine.dose, medicine.quantity
    )
}

pub fn status(base_url: &str, config_path: Option<&Path>, state: AuthState) -> String {
    let session = match state {
        AuthState::Anonymous => "signed out",
        AuthState::Authenticated => "signed in",
        AuthState::Expired => "expired",
    };
    let config = config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    format!("API:     {}\nConfig:  {}\nSession: {}\n", base_url, config, session)
}
