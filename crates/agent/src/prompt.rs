//! Instruction block sent as the system prompt of every model call.
//!
//! The block is a pure function of tenant settings, the session's slots and the
//! optional tour/hot-deal blocks, so identical inputs always yield identical text.

use tourlead_core::domain::slots::Slots;
use tourlead_core::domain::tenant::Tenant;
use tourlead_core::plan::PlanCapabilities;

pub struct PromptContext<'a> {
    pub tenant: &'a Tenant,
    pub slots: &'a Slots,
    pub capabilities: PlanCapabilities,
    pub tour_block: Option<&'a str>,
    pub hot_deals_block: Option<&'a str>,
}

pub fn build_instructions(context: &PromptContext<'_>) -> String {
    let tenant = context.tenant;
    let persona = &tenant.persona;
    let mut sections = vec![
        format!(
            "You are {}, the travel assistant of the agency \"{}\".",
            persona.bot_name, tenant.name
        ),
        format!("STYLE: {}", persona.tone.directive()),
    ];

    if let Some(custom) = tenant.custom_instructions.as_deref().filter(|text| !text.trim().is_empty())
    {
        sections.push(format!("AGENCY INSTRUCTIONS:\n{}", custom.trim()));
    }

    let known = context.slots.summary();
    sections.push(format!(
        "CLIENT DATA: {}",
        if known.is_empty() { "not collected yet" } else { known.as_str() }
    ));

    if !tenant.catalog.is_empty() {
        sections.push(format!("AGENCY DESTINATIONS:\n{}", tenant.catalog.render()));
    }
    if let Some(tours) = context.tour_block {
        sections.push(format!("TOURS FROM INVENTORY:\n{tours}"));
    }
    if let Some(deals) = context.hot_deals_block {
        sections.push(format!("HOT DEALS (refreshed regularly):\n{deals}"));
    }

    sections.push(format!(
        "RULES:\n\
         - {}\n\
         - Answer in at most 5 sentences.\n\
         - Suggest only destinations from the agency list when one is given.\n\
         - When the client wants to leave contact details, add [ACTION:contact].\n\
         - When the client is ready to book, add [ACTION:manager].",
        context.capabilities.offer_instruction()
    ));
    sections.push(
        "Hotel format:\n\
         🏨 **Name** (X★) - short description\n\
         📍 Operator · ✈️ date · 🍽️ meal\n\
         💰 price"
            .to_string(),
    );
    sections.push("End every reply with [ACTION:none] or [ACTION:manager].".to_string());

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tourlead_core::domain::slots::{MealPlan, RestType, Slots};
    use tourlead_core::domain::tenant::{DestinationCatalog, PlanTier, Tenant, Tone};
    use tourlead_core::plan::PlanCapabilities;

    use super::{build_instructions, PromptContext};

    fn tenant(plan: PlanTier) -> Tenant {
        let mut tenant = Tenant::new("Sunny Travel", "tl_sunny", plan);
        tenant.persona.bot_name = "Marina".to_string();
        tenant.persona.tone = Tone::Luxury;
        tenant.custom_instructions = Some("Always mention free transfers.".to_string());
        let mut catalog = BTreeMap::new();
        catalog.insert("beach".to_string(), vec!["Turkey".to_string(), "Maldives".to_string()]);
        tenant.catalog = DestinationCatalog(catalog);
        tenant
    }

    #[test]
    fn block_carries_persona_slots_and_tours() {
        let tenant = tenant(PlanTier::Premium);
        let slots = Slots {
            rest_type: Some(RestType::Beach),
            country: Some("Turkey".to_string()),
            budget: Some(80_000),
            meal: Some(MealPlan::Ai),
            ..Slots::default()
        };
        let block = build_instructions(&PromptContext {
            tenant: &tenant,
            slots: &slots,
            capabilities: PlanCapabilities::for_tier(tenant.plan),
            tour_block: Some("1. 🏨 **Rixos Premium Belek** (5★)"),
            hot_deals_block: None,
        });

        assert!(block.starts_with("You are Marina, the travel assistant of the agency \"Sunny Travel\"."));
        assert!(block.contains(Tone::Luxury.directive()));
        assert!(block.contains("Always mention free transfers."));
        assert!(block.contains("country: Turkey"));
        assert!(block.contains("80000 RUB/person"));
        assert!(block.contains("Beach: Turkey, Maldives"));
        assert!(block.contains("Rixos Premium Belek"));
        assert!(block.contains("Quote exact prices"));
        assert!(!block.contains("HOT DEALS"));
    }

    #[test]
    fn block_is_deterministic_and_masks_prices_below_premium() {
        let tenant = tenant(PlanTier::Pro);
        let slots = Slots::default();
        let context = PromptContext {
            tenant: &tenant,
            slots: &slots,
            capabilities: PlanCapabilities::for_tier(tenant.plan),
            tour_block: None,
            hot_deals_block: None,
        };

        let first = build_instructions(&context);
        assert_eq!(first, build_instructions(&context));
        assert!(first.contains("CLIENT DATA: not collected yet"));
        assert!(first.contains("at most 2 alternatives"));
        assert!(!first.contains("TOURS FROM INVENTORY"));
    }
}
