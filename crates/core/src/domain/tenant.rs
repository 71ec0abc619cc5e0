use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;
use crate::vault::SealedSecret;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subscription level. Ordering follows feature breadth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Basic,
    Hot,
    Pro,
    Premium,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Hot => "hot",
            Self::Pro => "pro",
            Self::Premium => "premium",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Hot => "Hot Deals",
            Self::Pro => "Pro",
            Self::Premium => "Premium",
        }
    }

    pub fn default_quota(&self) -> u32 {
        match self {
            Self::Basic => 100,
            Self::Hot => 300,
            Self::Pro => 1_000,
            Self::Premium => 5_000,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "hot" => Ok(Self::Hot),
            "pro" => Ok(Self::Pro),
            "premium" => Ok(Self::Premium),
            other => Err(DomainError::Validation(format!(
                "unsupported plan `{other}` (expected basic|hot|pro|premium)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Friendly,
    Professional,
    Expert,
    Luxury,
    Energetic,
    Consultative,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::Professional => "professional",
            Self::Expert => "expert",
            Self::Luxury => "luxury",
            Self::Energetic => "energetic",
            Self::Consultative => "consultative",
        }
    }

    /// Style directive handed to the model for this tone.
    pub fn directive(&self) -> &'static str {
        match self {
            Self::Friendly => {
                "Be warm and friendly, use a few emoji, talk like a good acquaintance."
            }
            Self::Professional => {
                "Be professional and precise. Facts, specifics, respectful tone, no extra emoji."
            }
            Self::Expert => {
                "You are an expert advisor. Speak with confidence and show deep knowledge of tours and destinations."
            }
            Self::Luxury => {
                "Refined tone for premium clients. Unhurried, attentive to detail and quality."
            }
            Self::Energetic => "Energetic and enthusiastic for an active audience. Dynamic and motivating.",
            Self::Consultative => {
                "Ask clarifying questions and dig into details. You are a personal manager, not just a bot."
            }
        }
    }
}

impl FromStr for Tone {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "friendly" => Ok(Self::Friendly),
            "professional" => Ok(Self::Professional),
            "expert" => Ok(Self::Expert),
            "luxury" => Ok(Self::Luxury),
            "energetic" => Ok(Self::Energetic),
            "consultative" => Ok(Self::Consultative),
            other => Err(DomainError::Validation(format!("unsupported tone `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub bot_name: String,
    pub greeting: Option<String>,
    pub brand_color: String,
    pub tone: Tone,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            bot_name: "Roman".to_string(),
            greeting: None,
            brand_color: "#1d4ed8".to_string(),
            tone: Tone::Friendly,
        }
    }
}

impl Persona {
    pub fn greeting_or_default(&self) -> String {
        self.greeting
            .clone()
            .unwrap_or_else(|| format!("Hi! I'm {}, your travel assistant.", self.bot_name))
    }
}

/// Travel-style category mapped to the destinations a tenant sells.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationCatalog(pub BTreeMap<String, Vec<String>>);

impl DestinationCatalog {
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn render(&self) -> String {
        self.0
            .iter()
            .filter(|(_, destinations)| !destinations.is_empty())
            .map(|(category, destinations)| {
                let label = category
                    .parse::<crate::domain::slots::RestType>()
                    .map(|rest| rest.label().to_string())
                    .unwrap_or_else(|_| category.clone());
                format!("{label}: {}", destinations.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (category, destinations) in &self.0 {
            if category.trim().is_empty() {
                return Err(DomainError::Validation(
                    "catalog categories must not be empty".to_string(),
                ));
            }
            if destinations.iter().any(|destination| destination.trim().is_empty()) {
                return Err(DomainError::Validation(format!(
                    "catalog category `{category}` contains an empty destination"
                )));
            }
        }
        Ok(())
    }
}

/// Sealed third-party secrets owned by a tenant. Never exposed through reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TenantCredentials {
    pub model_key: Option<SealedSecret>,
    pub search_login: Option<SealedSecret>,
    pub search_password: Option<SealedSecret>,
}

impl TenantCredentials {
    pub fn has_search_credentials(&self) -> bool {
        self.search_login.is_some() && self.search_password.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub api_key: String,
    pub plan: PlanTier,
    pub persona: Persona,
    pub custom_instructions: Option<String>,
    pub catalog: DestinationCatalog,
    pub credentials: TenantCredentials,
    pub dialogs_used: u32,
    pub dialogs_limit: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, plan: PlanTier) -> Self {
        Self {
            id: TenantId::generate(),
            name: name.into(),
            api_key: api_key.into(),
            plan,
            persona: Persona::default(),
            custom_instructions: None,
            catalog: DestinationCatalog::default(),
            credentials: TenantCredentials::default(),
            dialogs_used: 0,
            dialogs_limit: plan.default_quota(),
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn dialogs_left(&self) -> u32 {
        self.dialogs_limit.saturating_sub(self.dialogs_used)
    }
}
