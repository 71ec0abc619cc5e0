//! Control markers embedded by the model in its free-text reply.
//!
//! Grammar: any number of `[ACTION:<token>]` markers (the first one decides) plus the
//! bare legacy `[LEAD]` marker. Model output is untrusted: the token is checked against
//! a fixed set and anything else reads as `none`.

use serde::{Deserialize, Serialize};

const ACTION_OPEN: &str = "[ACTION:";
const LEGACY_LEAD: &str = "[LEAD]";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    #[default]
    None,
    Manager,
    Contact,
}

impl Directive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Manager => "manager",
            Self::Contact => "contact",
        }
    }

    fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "manager" => Self::Manager,
            "contact" => Self::Contact,
            _ => Self::None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedReply {
    pub text: String,
    pub directive: Directive,
    pub legacy_lead: bool,
}

impl ParsedReply {
    /// The model asked for a human hand-off.
    pub fn is_qualifying(&self) -> bool {
        self.directive == Directive::Manager || self.legacy_lead
    }
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    let directive = first_action_token(raw).map(Directive::from_token).unwrap_or_default();
    let legacy_lead = raw.contains(LEGACY_LEAD);

    ParsedReply { text: strip_markers(raw), directive, legacy_lead }
}

fn first_action_token(raw: &str) -> Option<&str> {
    let start = raw.find(ACTION_OPEN)? + ACTION_OPEN.len();
    let rest = &raw[start..];
    let end = rest.find(']')?;
    Some(&rest[..end])
}

/// Removes every marker. Repeats until stable, since removing one marker can splice
/// the surrounding text into a new one.
pub fn strip_markers(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = remove_action_markers(&current.replace(LEGACY_LEAD, ""));
        if next == current {
            return current.trim().to_string();
        }
        current = next;
    }
}

fn remove_action_markers(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find(ACTION_OPEN) {
        let after_open = &rest[start + ACTION_OPEN.len()..];
        match after_open.find(']') {
            Some(end) => {
                output.push_str(&rest[..start]);
                rest = &after_open[end + 1..];
            }
            None => break,
        }
    }
    output.push_str(rest);
    output
}

pub fn contains_marker(text: &str) -> bool {
    text.contains(LEGACY_LEAD)
        || text.find(ACTION_OPEN).is_some_and(|start| text[start..].contains(']'))
}
