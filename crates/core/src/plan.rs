//! Tier-based feature access and dialog quota.

use serde::Serialize;

use crate::domain::tenant::{PlanTier, Tenant};
use crate::errors::ApplicationError;

/// Where the tour block shown to the model comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TourSource {
    None,
    Synthetic,
    /// Remote gateway when the tenant has stored credentials, synthetic otherwise.
    Live,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PlanCapabilities {
    pub model_enabled: bool,
    pub tour_source: TourSource,
    pub exact_prices: bool,
    pub presentation_limit: usize,
    pub hot_deals: bool,
}

impl PlanCapabilities {
    pub fn for_tier(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Basic => Self {
                model_enabled: false,
                tour_source: TourSource::None,
                exact_prices: false,
                presentation_limit: 0,
                hot_deals: false,
            },
            PlanTier::Hot => Self {
                model_enabled: true,
                tour_source: TourSource::Synthetic,
                exact_prices: false,
                presentation_limit: 2,
                hot_deals: true,
            },
            PlanTier::Pro => Self {
                model_enabled: true,
                tour_source: TourSource::Synthetic,
                exact_prices: false,
                presentation_limit: 2,
                hot_deals: false,
            },
            PlanTier::Premium => Self {
                model_enabled: true,
                tour_source: TourSource::Live,
                exact_prices: true,
                presentation_limit: 5,
                hot_deals: false,
            },
        }
    }

    pub fn live_search(&self) -> bool {
        self.tour_source == TourSource::Live
    }

    /// How many alternatives the model is told to offer, and how to talk about price.
    pub fn offer_instruction(&self) -> &'static str {
        if self.exact_prices {
            "Offer 3 to 5 alternatives. Quote exact prices from the tour data."
        } else {
            "Offer at most 2 alternatives. Quote prices only as \"from\" figures, never exact amounts."
        }
    }
}

pub struct PlanGate;

impl PlanGate {
    /// Rejects a new dialog once usage has reached quota. Does not mutate anything;
    /// the charge itself is a conditional increment in the store.
    pub fn check(tenant: &Tenant) -> Result<(), ApplicationError> {
        if tenant.dialogs_used >= tenant.dialogs_limit {
            return Err(ApplicationError::QuotaExceeded {
                used: tenant.dialogs_used,
                limit: tenant.dialogs_limit,
                plan: tenant.plan,
            });
        }
        Ok(())
    }

    pub fn capabilities(tenant: &Tenant) -> PlanCapabilities {
        PlanCapabilities::for_tier(tenant.plan)
    }
}
