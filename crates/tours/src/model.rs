use std::fmt;

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Serialize;

use tourlead_core::domain::slots::MealPlan;

/// Decrypted gateway login, alive only for the duration of one search.
#[derive(Clone)]
pub struct GatewayCredentials {
    pub login: SecretString,
    pub password: SecretString,
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GatewayCredentials(<redacted>)")
    }
}

#[derive(Clone, Debug)]
pub struct SearchCriteria {
    pub credentials: Option<GatewayCredentials>,
    pub destination: String,
    pub meal: Option<MealPlan>,
    pub stars: Option<u8>,
    pub nights: u32,
    pub travelers: u32,
    /// Per-person ceiling in local currency.
    pub budget: Option<u32>,
    pub departure_city: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    Gateway,
    Synthetic,
}

/// One normalized tour offer. `price` is in the provider currency, `price_local` in
/// local currency at the configured exchange rate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TourRecord {
    pub hotel_name: String,
    pub stars: u8,
    pub operator: String,
    pub price: Decimal,
    pub price_local: Decimal,
    pub nights: u32,
    pub meal: String,
    pub resort: String,
    pub departure_city: String,
    pub date_begin: String,
    pub room_type: String,
    pub tour_id: Option<String>,
    pub origin: RecordOrigin,
}
