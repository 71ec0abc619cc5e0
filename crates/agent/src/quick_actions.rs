use std::str::FromStr;

use serde::{Deserialize, Serialize};

use tourlead_core::errors::DomainError;

/// Canned follow-ups the widget operator can trigger under an assistant reply. The
/// instruction is sent as a trailing user turn but never stored as one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickAction {
    Expensive,
    Whatsapp,
    Negative,
    Post,
    Hidden,
}

impl QuickAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expensive => "expensive",
            Self::Whatsapp => "whatsapp",
            Self::Negative => "negative",
            Self::Post => "post",
            Self::Hidden => "hidden",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Expensive => {
                "TOO EXPENSIVE: justify the price of the last offer and suggest a cheaper alternative."
            }
            Self::Whatsapp => {
                "MESSENGER FORMAT: rewrite the last offer in 3 lines, price in bold like **price**, 2 emoji."
            }
            Self::Negative => {
                "HONEST REVIEW: list the most common guest complaints about this hotel."
            }
            Self::Post => "PROMO POST: write a selling Telegram post about this tour, about 120 words.",
            Self::Hidden => "ANONYMOUS LISTING: describe the tour without naming the hotel.",
        }
    }
}

impl FromStr for QuickAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "expensive" => Ok(Self::Expensive),
            "whatsapp" => Ok(Self::Whatsapp),
            "negative" => Ok(Self::Negative),
            "post" => Ok(Self::Post),
            "hidden" => Ok(Self::Hidden),
            other => Err(DomainError::Validation(format!("unsupported quick action `{other}`"))),
        }
    }
}
