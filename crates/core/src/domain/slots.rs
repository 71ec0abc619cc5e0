use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestType {
    Beach,
    Excursion,
    Ski,
    Wellness,
    Active,
}

impl RestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beach => "beach",
            Self::Excursion => "excursion",
            Self::Ski => "ski",
            Self::Wellness => "wellness",
            Self::Active => "active",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Beach => "Beach",
            Self::Excursion => "Sightseeing",
            Self::Ski => "Ski",
            Self::Wellness => "Wellness",
            Self::Active => "Active",
        }
    }
}

impl FromStr for RestType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "beach" => Ok(Self::Beach),
            "excursion" => Ok(Self::Excursion),
            "ski" => Ok(Self::Ski),
            "wellness" => Ok(Self::Wellness),
            "active" => Ok(Self::Active),
            other => Err(DomainError::Validation(format!("unsupported rest type `{other}`"))),
        }
    }
}

/// Board basis using the codes the widget sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealPlan {
    Ro,
    Bb,
    Hb,
    Fb,
    Ai,
    Uai,
}

impl MealPlan {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ro => "ro",
            Self::Bb => "bb",
            Self::Hb => "hb",
            Self::Fb => "fb",
            Self::Ai => "ai",
            Self::Uai => "uai",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ro => "Room only",
            Self::Bb => "Breakfast",
            Self::Hb => "Half board",
            Self::Fb => "Full board",
            Self::Ai => "All inclusive",
            Self::Uai => "Ultra all inclusive",
        }
    }
}

impl fmt::Display for MealPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MealPlan {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ro" => Ok(Self::Ro),
            "bb" => Ok(Self::Bb),
            "hb" => Ok(Self::Hb),
            "fb" => Ok(Self::Fb),
            "ai" => Ok(Self::Ai),
            "uai" | "ui" => Ok(Self::Uai),
            other => Err(DomainError::Validation(format!("unsupported meal code `{other}`"))),
        }
    }
}

/// Travel preferences collected over a session. Every field is independently nullable;
/// the same shape doubles as a partial update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slots {
    pub rest_type: Option<RestType>,
    pub country: Option<String>,
    pub budget: Option<u32>,
    pub stars: Option<u8>,
    pub meal: Option<MealPlan>,
    pub wishes: Option<String>,
}

pub type SlotPatch = Slots;

impl Slots {
    /// Overwrites only the fields the patch carries a value for.
    pub fn merge(&mut self, patch: &SlotPatch) -> bool {
        let before = self.clone();
        if let Some(rest_type) = patch.rest_type {
            self.rest_type = Some(rest_type);
        }
        if let Some(country) = &patch.country {
            self.country = Some(country.clone());
        }
        if let Some(budget) = patch.budget {
            self.budget = Some(budget);
        }
        if let Some(stars) = patch.stars {
            self.stars = Some(stars);
        }
        if let Some(meal) = patch.meal {
            self.meal = Some(meal);
        }
        if let Some(wishes) = &patch.wishes {
            self.wishes = Some(wishes.clone());
        }
        *self != before
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// All fields needed to hand the visitor to a human are known.
    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.rest_type.is_none() {
            missing.push("rest_type");
        }
        if self.country.is_none() {
            missing.push("country");
        }
        if self.budget.is_none() {
            missing.push("budget");
        }
        if self.stars.is_none() {
            missing.push("stars");
        }
        if self.meal.is_none() {
            missing.push("meal");
        }
        missing
    }

    /// Single-line, human-readable snapshot used for lead summaries and prompts.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(rest_type) = self.rest_type {
            parts.push(format!("rest: {} ({})", rest_type.label(), rest_type.as_str()));
        }
        if let Some(country) = &self.country {
            parts.push(format!("country: {country}"));
        }
        if let Some(budget) = self.budget {
            parts.push(format!("budget: {budget} RUB/person"));
        }
        if let Some(stars) = self.stars {
            parts.push(format!("hotel: {stars}★"));
        }
        if let Some(meal) = self.meal {
            parts.push(format!("meal: {} ({})", meal.label(), meal.code()));
        }
        if let Some(wishes) = &self.wishes {
            parts.push(format!("wishes: {wishes}"));
        }
        parts.join(" · ")
    }
}

/// Raw slot values as submitted by the widget form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSlots {
    pub rest_type: Option<String>,
    pub country: Option<String>,
    pub budget: Option<u32>,
    pub stars: Option<u8>,
    pub meal: Option<String>,
    pub wishes: Option<String>,
}

impl TryFrom<ClientSlots> for SlotPatch {
    type Error = DomainError;

    fn try_from(raw: ClientSlots) -> Result<Self, Self::Error> {
        let rest_type = non_blank(raw.rest_type).map(|value| value.parse()).transpose()?;
        let meal = non_blank(raw.meal).map(|value| value.parse()).transpose()?;
        let stars = raw.stars.filter(|stars| *stars > 0);
        if let Some(stars) = stars {
            if stars > 5 {
                return Err(DomainError::Validation(format!(
                    "stars must be in range 1..=5, got {stars}"
                )));
            }
        }

        Ok(Self {
            rest_type,
            country: non_blank(raw.country),
            budget: raw.budget.filter(|budget| *budget > 0),
            stars,
            meal,
            wishes: non_blank(raw.wishes),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{ClientSlots, MealPlan, RestType, SlotPatch, Slots};

    fn complete_slots() -> Slots {
        Slots {
            rest_type: Some(RestType::Beach),
            country: Some("Turkey".to_string()),
            budget: Some(80_000),
            stars: Some(4),
            meal: Some(MealPlan::Ai),
            wishes: None,
        }
    }

    #[test]
    fn merge_keeps_fields_absent_from_patch() {
        let mut slots = complete_slots();
        let changed = slots.merge(&SlotPatch { budget: Some(90_000), ..SlotPatch::default() });

        assert!(changed);
        assert_eq!(slots.budget, Some(90_000));
        assert_eq!(slots.country.as_deref(), Some("Turkey"));
        assert_eq!(slots.meal, Some(MealPlan::Ai));
    }

    #[test]
    fn completeness_ignores_wishes() {
        let mut slots = complete_slots();
        assert!(slots.is_complete());
        slots.stars = None;
        assert_eq!(slots.missing_required(), vec!["stars"]);
    }

    #[test]
    fn summary_carries_slot_values() {
        let summary = complete_slots().summary();
        for needle in ["beach", "Turkey", "80000", "4", "ai"] {
            assert!(summary.contains(needle), "summary `{summary}` should contain `{needle}`");
        }
    }

    #[test]
    fn client_slots_treat_blank_values_as_absent() {
        let patch = SlotPatch::try_from(ClientSlots {
            rest_type: Some("  ".to_string()),
            country: Some(" Egypt ".to_string()),
            budget: Some(0),
            stars: Some(0),
            meal: Some(String::new()),
            wishes: None,
        })
        .expect("blank values are not errors");

        assert_eq!(patch, SlotPatch { country: Some("Egypt".to_string()), ..SlotPatch::default() });
    }

    #[test]
    fn client_slots_reject_unknown_codes() {
        let error = SlotPatch::try_from(ClientSlots {
            meal: Some("buffet".to_string()),
            ..ClientSlots::default()
        })
        .expect_err("unknown meal code");
        assert!(error.to_string().contains("buffet"));

        assert!(SlotPatch::try_from(ClientSlots { stars: Some(7), ..ClientSlots::default() })
            .is_err());
    }

    fn arb_slots() -> impl Strategy<Value = Slots> {
        (
            proptest::option::of(prop_oneof![
                Just(RestType::Beach),
                Just(RestType::Ski),
                Just(RestType::Excursion)
            ]),
            proptest::option::of("[A-Za-z]{1,12}"),
            proptest::option::of(1u32..1_000_000),
            proptest::option::of(1u8..=5),
            proptest::option::of(prop_oneof![Just(MealPlan::Ai), Just(MealPlan::Bb)]),
            proptest::option::of("[a-z ]{0,20}"),
        )
            .prop_map(|(rest_type, country, budget, stars, meal, wishes)| Slots {
                rest_type,
                country,
                budget,
                stars,
                meal,
                wishes,
            })
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(base in arb_slots(), patch in arb_slots()) {
            let mut once = base.clone();
            once.merge(&patch);
            let mut twice = once.clone();
            let changed = twice.merge(&patch);

            prop_assert_eq!(&once, &twice);
            prop_assert!(!changed);
        }
    }
}
