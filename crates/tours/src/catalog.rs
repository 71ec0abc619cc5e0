//! Static reference data: gateway ids for destinations and departure cities, board
//! codes, and the synthetic offers served when live inventory is out of reach.

use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::RoundingStrategy;
use rust_decimal::Decimal;

use tourlead_core::domain::slots::MealPlan;

use crate::model::{RecordOrigin, SearchCriteria, TourRecord};

pub const SEARCH_WINDOW_START_DAYS: i64 = 14;
pub const SEARCH_WINDOW_END_DAYS: i64 = 60;

const DEFAULT_LOCAL_PRICE: u32 = 60_000;
const DEFAULT_STARS: u8 = 4;

#[derive(Debug)]
pub struct Destination {
    pub key: &'static str,
    pub name: &'static str,
    pub gateway_id: u32,
    aliases: &'static [&'static str],
}

const DESTINATIONS: &[Destination] = &[
    Destination { key: "turkey", name: "Turkey", gateway_id: 1, aliases: &["турция"] },
    Destination { key: "egypt", name: "Egypt", gateway_id: 2, aliases: &["египет"] },
    Destination { key: "greece", name: "Greece", gateway_id: 5, aliases: &["греция"] },
    Destination { key: "italy", name: "Italy", gateway_id: 4, aliases: &["италия"] },
    Destination { key: "spain", name: "Spain", gateway_id: 6, aliases: &["испания"] },
    Destination { key: "cyprus", name: "Cyprus", gateway_id: 7, aliases: &["кипр"] },
    Destination { key: "france", name: "France", gateway_id: 8, aliases: &["франция"] },
    Destination { key: "thailand", name: "Thailand", gateway_id: 12, aliases: &["таиланд"] },
    Destination {
        key: "uae",
        name: "UAE",
        gateway_id: 22,
        aliases: &["united arab emirates", "оаэ"],
    },
    Destination { key: "bali", name: "Bali", gateway_id: 35, aliases: &["бали", "indonesia"] },
    Destination { key: "maldives", name: "Maldives", gateway_id: 39, aliases: &["мальдивы"] },
];

const DEPARTURES: &[(&str, u32, &[&str])] = &[
    ("moscow", 1, &["москва"]),
    ("saint petersburg", 2, &["st petersburg", "st. petersburg", "санкт-петербург"]),
    ("yekaterinburg", 3, &["екатеринбург"]),
    ("novosibirsk", 4, &["новосибирск"]),
    ("krasnodar", 5, &["краснодар"]),
];

const DEFAULT_DEPARTURE_ID: u32 = 1;

/// Lower-cases and drops leading decoration such as flag emoji, so "🇹🇷 Turkey" and
/// "turkey" compare equal.
pub fn normalize_place(raw: &str) -> String {
    raw.trim_start_matches(|ch: char| !ch.is_alphanumeric()).trim().to_lowercase()
}

pub fn find_destination(raw: &str) -> Option<&'static Destination> {
    let wanted = normalize_place(raw);
    DESTINATIONS.iter().find(|destination| {
        destination.key == wanted
            || destination.name.to_lowercase() == wanted
            || destination.aliases.contains(&wanted.as_str())
    })
}

pub fn departure_id(raw: &str) -> u32 {
    let wanted = normalize_place(raw);
    DEPARTURES
        .iter()
        .find(|(name, _, aliases)| *name == wanted || aliases.contains(&wanted.as_str()))
        .map(|(_, id, _)| *id)
        .unwrap_or(DEFAULT_DEPARTURE_ID)
}

pub fn gateway_meal_code(meal: Option<MealPlan>) -> &'static str {
    match meal {
        Some(MealPlan::Uai) => "UltraAll",
        Some(MealPlan::Hb) => "HalfBoard",
        Some(MealPlan::Fb) => "FullBoard",
        Some(MealPlan::Bb) => "BedBreakfast",
        Some(MealPlan::Ro) => "RoomOnly",
        Some(MealPlan::Ai) | None => "All",
    }
}

pub fn search_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (
        today + Duration::days(SEARCH_WINDOW_START_DAYS),
        today + Duration::days(SEARCH_WINDOW_END_DAYS),
    )
}

struct FallbackOffer {
    hotel_name: &'static str,
    operator: &'static str,
    price: u32,
    nights: u32,
    resort: &'static str,
    room_type: &'static str,
}

const TURKEY_OFFERS: &[FallbackOffer] = &[
    FallbackOffer {
        hotel_name: "Rixos Premium Belek",
        operator: "Coral Travel",
        price: 1_400,
        nights: 7,
        resort: "Belek",
        room_type: "Superior Room",
    },
    FallbackOffer {
        hotel_name: "Maxx Royal Belek Golf Resort",
        operator: "Anex Tour",
        price: 1_800,
        nights: 7,
        resort: "Belek",
        room_type: "Deluxe Room",
    },
    FallbackOffer {
        hotel_name: "Kaya Palazzo Golf Resort",
        operator: "Pegas Touristik",
        price: 1_100,
        nights: 7,
        resort: "Belek",
        room_type: "Standard Room",
    },
];

const EGYPT_OFFERS: &[FallbackOffer] = &[
    FallbackOffer {
        hotel_name: "Rixos Premium Seagate",
        operator: "Coral Travel",
        price: 900,
        nights: 7,
        resort: "Sharm el-Sheikh",
        room_type: "Deluxe Sea View",
    },
    FallbackOffer {
        hotel_name: "Albatros Palace Sharm",
        operator: "Pegas Touristik",
        price: 700,
        nights: 7,
        resort: "Sharm el-Sheikh",
        room_type: "Standard Room",
    },
];

const THAILAND_OFFERS: &[FallbackOffer] = &[
    FallbackOffer {
        hotel_name: "Anantara Koh Samui Resort",
        operator: "Anex Tour",
        price: 1_600,
        nights: 10,
        resort: "Samui",
        room_type: "Pool Villa",
    },
    FallbackOffer {
        hotel_name: "Centara Grand Beach Phuket",
        operator: "Fun&Sun",
        price: 1_200,
        nights: 10,
        resort: "Phuket",
        room_type: "Deluxe Room",
    },
];

fn fallback_offers(destination_key: &str) -> Option<&'static [FallbackOffer]> {
    match destination_key {
        "turkey" => Some(TURKEY_OFFERS),
        "egypt" => Some(EGYPT_OFFERS),
        "thailand" => Some(THAILAND_OFFERS),
        _ => None,
    }
}

pub fn meal_label(meal: Option<MealPlan>) -> String {
    meal.map(|meal| meal.label().to_string()).unwrap_or_else(|| "Any board".to_string())
}

/// Builds offers from the static catalog, or one generic offer for destinations the
/// catalog does not cover. With a budget, only offers up to 120% of it survive.
pub fn synthesize(
    criteria: &SearchCriteria,
    exchange_rate: Decimal,
    today: NaiveDate,
) -> Vec<TourRecord> {
    let date_begin = search_window(today).0.format("%Y-%m-%d").to_string();
    let meal = meal_label(criteria.meal);
    let destination = find_destination(&criteria.destination);

    let records: Vec<TourRecord> = match destination.and_then(|found| fallback_offers(found.key)) {
        Some(offers) => offers
            .iter()
            .map(|offer| {
                let price = Decimal::from(offer.price);
                TourRecord {
                    hotel_name: offer.hotel_name.to_string(),
                    stars: 5,
                    operator: offer.operator.to_string(),
                    price,
                    price_local: price * exchange_rate,
                    nights: offer.nights,
                    meal: meal.clone(),
                    resort: offer.resort.to_string(),
                    departure_city: criteria.departure_city.clone(),
                    date_begin: date_begin.clone(),
                    room_type: offer.room_type.to_string(),
                    tour_id: None,
                    origin: RecordOrigin::Synthetic,
                }
            })
            .collect(),
        None => {
            let country = destination
                .map(|found| found.name.to_string())
                .unwrap_or_else(|| criteria.destination.trim().to_string());
            let stars = criteria.stars.unwrap_or(DEFAULT_STARS);
            let price_local = Decimal::from(criteria.budget.unwrap_or(DEFAULT_LOCAL_PRICE));
            vec![TourRecord {
                hotel_name: format!("{stars}★ hotel in {country}"),
                stars,
                operator: "Coral Travel".to_string(),
                price: (price_local / exchange_rate)
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
                price_local,
                nights: criteria.nights,
                meal,
                resort: country,
                departure_city: criteria.departure_city.clone(),
                date_begin,
                room_type: "Standard".to_string(),
                tour_id: None,
                origin: RecordOrigin::Synthetic,
            }]
        }
    };

    records.into_iter().filter(|record| within_budget(record, criteria.budget)).collect()
}

pub fn within_budget(record: &TourRecord, budget: Option<u32>) -> bool {
    match budget {
        Some(budget) => record.price_local <= Decimal::from(budget) * Decimal::new(12, 1),
        None => true,
    }
}
