//! Conversation runtime for the agency chat widget.
//!
//! - `runtime` drives one visitor message end to end: session resolution and dialog
//!   charging, slot merge, model call, directive handling and lead creation.
//! - `prompt` builds the instruction block; `quick_actions` holds the canned follow-ups.
//! - `llm` is the model-service port and its HTTP client.
//! - `locks` serializes work per session.
//! - `settings` covers tenant configuration, leads and usage stats.
//!
//! The model only writes prose and an action marker. Quota, slot state, completion and
//! lead creation are decided here.

pub mod llm;
pub mod locks;
pub mod prompt;
pub mod quick_actions;
pub mod runtime;
pub mod settings;

pub use llm::{AnthropicClient, ChatTurn, CompletionRequest, LlmClient};
pub use locks::SessionLocks;
pub use quick_actions::QuickAction;
pub use runtime::{ChatReply, ChatRequest, ChatRuntime, RuntimeSettings, SessionHistory, SessionStart};
pub use settings::{AgencyService, PersonaUpdate, TenantProfile, TenantStats};
