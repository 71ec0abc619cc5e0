use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use tourlead_core::config::SearchConfig;

use crate::catalog;
use crate::gateway::{SearchGateway, MAX_RECORDS};
use crate::model::{SearchCriteria, TourRecord};

/// Tour lookup as seen by the chat pipeline. Never fails: provider problems degrade to
/// synthetic offers.
#[async_trait]
pub trait TourSearch: Send + Sync {
    async fn search(&self, criteria: &SearchCriteria) -> Vec<TourRecord>;
}

pub struct TourSearchAdapter {
    gateway: Option<SearchGateway>,
    exchange_rate: Decimal,
}

impl TourSearchAdapter {
    pub fn new(config: &SearchConfig) -> Self {
        let gateway = match SearchGateway::new(config) {
            Ok(gateway) => Some(gateway),
            Err(error) => {
                warn!(
                    event_name = "tours.gateway.unavailable",
                    error = %error,
                    "search gateway client could not be built; serving synthetic offers only"
                );
                None
            }
        };
        Self { gateway, exchange_rate: Decimal::from(config.exchange_rate) }
    }

    pub fn synthetic_only(exchange_rate: u32) -> Self {
        Self { gateway: None, exchange_rate: Decimal::from(exchange_rate) }
    }

    pub async fn search_on(&self, criteria: &SearchCriteria, today: NaiveDate) -> Vec<TourRecord> {
        let (Some(gateway), Some(credentials)) = (&self.gateway, &criteria.credentials) else {
            debug!(
                event_name = "tours.search.fallback",
                reason = "no_credentials",
                destination = %criteria.destination,
                "serving synthetic offers"
            );
            return self.fallback(criteria, today);
        };

        match gateway.search(credentials, criteria, today).await {
            Ok(records) => {
                debug!(
                    event_name = "tours.search.live",
                    destination = %criteria.destination,
                    count = records.len(),
                    "gateway search succeeded"
                );
                records
            }
            Err(error) => {
                warn!(
                    event_name = "tours.search.fallback",
                    reason = "gateway_error",
                    destination = %criteria.destination,
                    error = %error,
                    "gateway search failed; serving synthetic offers"
                );
                self.fallback(criteria, today)
            }
        }
    }

    fn fallback(&self, criteria: &SearchCriteria, today: NaiveDate) -> Vec<TourRecord> {
        let mut records = catalog::synthesize(criteria, self.exchange_rate, today);
        records.truncate(MAX_RECORDS);
        records
    }
}

#[async_trait]
impl TourSearch for TourSearchAdapter {
    async fn search(&self, criteria: &SearchCriteria) -> Vec<TourRecord> {
        self.search_on(criteria, Utc::now().date_naive()).await
    }
}
