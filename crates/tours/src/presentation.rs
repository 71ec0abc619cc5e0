use std::fmt::Write as _;

use rust_decimal::prelude::RoundingStrategy;
use rust_decimal::Decimal;

use tourlead_core::domain::tenant::PlanTier;
use tourlead_core::plan::PlanCapabilities;

use crate::model::TourRecord;

pub const EMPTY_RESULTS: &str =
    "No tours matched these parameters. Suggest other dates or a different budget.";

const MASKED_PRICE_FACTOR: Decimal = Decimal::from_parts(85, 0, 0, false, 2);

fn whole(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Price shown to tiers without exact disclosure: 85% of the provider figure.
pub fn masked_price(record: &TourRecord) -> Decimal {
    whole(record.price * MASKED_PRICE_FACTOR)
}

fn price_line(record: &TourRecord, exact: bool) -> String {
    if exact {
        format!(
            "💰 {} RUB/person (~{} USD) for {} nights",
            whole(record.price_local),
            whole(record.price),
            record.nights
        )
    } else {
        format!("💰 from {} USD for {} nights", masked_price(record), record.nights)
    }
}

/// Renders tour records as the text block embedded in the model instructions.
pub fn format_for_presentation(records: &[TourRecord], tier: PlanTier) -> String {
    if records.is_empty() {
        return EMPTY_RESULTS.to_string();
    }

    let capabilities = PlanCapabilities::for_tier(tier);
    let limit = capabilities.presentation_limit.max(1);
    let mut block = String::from("Available tours:\n");
    for (index, record) in records.iter().take(limit).enumerate() {
        let _ = writeln!(block, "{}. 🏨 **{}** ({}★)", index + 1, record.hotel_name, record.stars);
        let _ = writeln!(block, "📍 {} · 🌴 {}", record.operator, record.resort);
        let _ = writeln!(block, "✈️ {} · 📅 from {}", record.departure_city, record.date_begin);
        let _ = writeln!(block, "🍽️ {} · 🛏️ {}", record.meal, record.room_type);
        let _ = writeln!(block, "{}", price_line(record, capabilities.exact_prices));
    }
    block.trim_end().to_string()
}
