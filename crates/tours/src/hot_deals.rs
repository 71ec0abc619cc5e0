//! Discounted last-minute offers sold on the hot-deals plan.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::catalog::find_destination;

const FALLBACK_SIZE: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HotDeal {
    pub id: &'static str,
    pub country: &'static str,
    pub resort: &'static str,
    pub hotel: &'static str,
    pub stars: u8,
    pub meal: &'static str,
    pub operator: &'static str,
    /// Per person, local currency.
    pub price: u32,
    pub original_price: u32,
    pub discount_percent: u8,
    pub nights: u32,
    pub date_from: &'static str,
    pub rating: f32,
    pub description: &'static str,
}

const STANDARD_DEALS: &[HotDeal] = &[
    HotDeal {
        id: "ht1",
        country: "Turkey",
        resort: "Belek",
        hotel: "Limak Arcadia Resort",
        stars: 5,
        meal: "UAI",
        operator: "Coral Travel",
        price: 74_000,
        original_price: 95_000,
        discount_percent: 22,
        nights: 7,
        date_from: "2026-03-05",
        rating: 4.6,
        description: "Aquapark · casino · 8 restaurants · right on the beach",
    },
    HotDeal {
        id: "ht2",
        country: "Egypt",
        resort: "Sharm el-Sheikh",
        hotel: "Jaz Mirabel Beach",
        stars: 5,
        meal: "AI",
        operator: "Anex Tour",
        price: 48_000,
        original_price: 68_000,
        discount_percent: 29,
        nights: 7,
        date_from: "2026-03-03",
        rating: 4.4,
        description: "Snorkeling · coral reef · animation",
    },
    HotDeal {
        id: "ht3",
        country: "Turkey",
        resort: "Antalya",
        hotel: "Asteria Kremlin Palace",
        stars: 5,
        meal: "AI",
        operator: "Tez Tour",
        price: 52_000,
        original_price: 72_000,
        discount_percent: 28,
        nights: 7,
        date_from: "2026-03-04",
        rating: 4.5,
        description: "Landmark architecture · all inclusive · central Antalya",
    },
    HotDeal {
        id: "ht4",
        country: "Egypt",
        resort: "Hurghada",
        hotel: "Titanic Palace",
        stars: 5,
        meal: "AI",
        operator: "Pegas",
        price: 38_000,
        original_price: 55_000,
        discount_percent: 31,
        nights: 7,
        date_from: "2026-03-06",
        rating: 4.3,
        description: "Large resort · aquapark · long beach",
    },
    HotDeal {
        id: "ht5",
        country: "Thailand",
        resort: "Phuket",
        hotel: "Kata Palm Resort",
        stars: 4,
        meal: "BB",
        operator: "Biblio Globus",
        price: 62_000,
        original_price: 82_000,
        discount_percent: 24,
        nights: 7,
        date_from: "2026-03-07",
        rating: 4.4,
        description: "500m to the beach · tropical garden · infinity pool",
    },
    HotDeal {
        id: "ht6",
        country: "Turkey",
        resort: "Kemer",
        hotel: "Valeri Beach Hotel",
        stars: 4,
        meal: "AI",
        operator: "Coral Travel",
        price: 44_000,
        original_price: 60_000,
        discount_percent: 27,
        nights: 7,
        date_from: "2026-03-05",
        rating: 4.2,
        description: "Cozy hotel · mountains and sea · snorkeling",
    },
];

/// Query filter. `budget` is for two travelers, matching the widget's default party.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct HotDealFilter {
    pub budget: Option<u32>,
    pub nights: Option<u32>,
    pub stars: Option<u8>,
}

impl HotDealFilter {
    fn accepts(&self, deal: &HotDeal) -> bool {
        let within_budget = self.budget.map_or(true, |budget| {
            u64::from(deal.price) * 2 * 10 <= u64::from(budget) * 12
        });
        within_budget
            && self.nights.map_or(true, |nights| deal.nights == nights)
            && self.stars.map_or(true, |stars| deal.stars >= stars)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HotDealSelection {
    pub deals: Vec<HotDeal>,
    /// Set when the requested country had no deals and the cheapest overall are shown.
    pub fallback: bool,
}

impl HotDealSelection {
    pub fn render(&self) -> String {
        let mut block = String::new();
        if self.fallback {
            block.push_str("No hot deals for this destination; best prices elsewhere:\n");
        } else {
            block.push_str("Hot deals:\n");
        }
        for deal in &self.deals {
            let _ = writeln!(
                block,
                "🔥 {} {}★, {} ({}), {}, {} nights from {}: {} RUB/person instead of {} (-{}%)",
                deal.hotel,
                deal.stars,
                deal.resort,
                deal.country,
                deal.meal,
                deal.nights,
                deal.date_from,
                deal.price,
                deal.original_price,
                deal.discount_percent
            );
        }
        block.trim_end().to_string()
    }
}

#[derive(Clone, Debug)]
pub struct HotDeals {
    deals: Vec<HotDeal>,
}

impl Default for HotDeals {
    fn default() -> Self {
        Self { deals: STANDARD_DEALS.to_vec() }
    }
}

impl HotDeals {
    pub fn all(&self) -> &[HotDeal] {
        &self.deals
    }

    /// Deals passing the filter, cheapest first.
    pub fn query(&self, filter: &HotDealFilter) -> Vec<HotDeal> {
        let mut deals: Vec<HotDeal> =
            self.deals.iter().filter(|deal| filter.accepts(deal)).cloned().collect();
        deals.sort_by_key(|deal| deal.price);
        deals
    }

    pub fn for_country(&self, country: &str) -> HotDealSelection {
        let wanted = find_destination(country).map(|destination| destination.key);
        let deals: Vec<HotDeal> = self
            .deals
            .iter()
            .filter(|deal| match wanted {
                Some(key) => find_destination(deal.country).map(|found| found.key) == Some(key),
                None => deal.country.eq_ignore_ascii_case(country.trim()),
            })
            .cloned()
            .collect();

        if deals.is_empty() {
            let mut cheapest = self.query(&HotDealFilter::default());
            cheapest.truncate(FALLBACK_SIZE);
            return HotDealSelection { deals: cheapest, fallback: true };
        }
        HotDealSelection { deals, fallback: false }
    }
}

#[cfg(test)]
mod tests {
    use super::{HotDealFilter, HotDeals};

    #[test]
    fn query_filters_for_two_travelers_and_sorts_by_price() {
        let deals = HotDeals::default().query(&HotDealFilter {
            budget: Some(80_000),
            nights: Some(7),
            stars: Some(5),
        });

        let ids: Vec<&str> = deals.iter().map(|deal| deal.id).collect();
        assert_eq!(ids, vec!["ht4", "ht2"]);
    }

    #[test]
    fn unfiltered_query_returns_everything_cheapest_first() {
        let deals = HotDeals::default().query(&HotDealFilter::default());
        assert_eq!(deals.len(), 6);
        assert!(deals.windows(2).all(|pair| pair[0].price <= pair[1].price));
    }

    #[test]
    fn country_lookup_ignores_case_and_accepts_aliases() {
        let deals = HotDeals::default();

        let turkey = deals.for_country("TURKEY");
        assert!(!turkey.fallback);
        assert_eq!(turkey.deals.len(), 3);

        assert_eq!(deals.for_country("Египет").deals.len(), 2);
    }

    #[test]
    fn unknown_country_falls_back_to_three_cheapest() {
        let selection = HotDeals::default().for_country("Maldives");

        assert!(selection.fallback);
        let ids: Vec<&str> = selection.deals.iter().map(|deal| deal.id).collect();
        assert_eq!(ids, vec!["ht4", "ht6", "ht2"]);
        assert!(selection.render().starts_with("No hot deals"));
    }
}
