//! Per-message chat pipeline.
//!
//! Flow for one inbound message: validate input, resolve or open the session (opening
//! one charges a dialog through the plan gate), take the session's lock, merge slots,
//! store the user turn, then either answer by rule (basic plan) or build the
//! instruction block, call the model and act on its directive.

use std::sync::Arc;

use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, info, warn};

use tourlead_core::config::AppConfig;
use tourlead_core::directive::{parse_reply, Directive};
use tourlead_core::domain::message::{Message, MessageRole};
use tourlead_core::domain::session::{QualifyingSignal, Session, SessionId};
use tourlead_core::domain::slots::{ClientSlots, SlotPatch, Slots};
use tourlead_core::domain::tenant::Tenant;
use tourlead_core::errors::ApplicationError;
use tourlead_core::plan::{PlanCapabilities, PlanGate, TourSource};
use tourlead_core::vault::{CredentialVault, SealedSecret};
use tourlead_db::{RepositoryError, Store};
use tourlead_tours::{format_for_presentation, GatewayCredentials, HotDeals, SearchCriteria, TourSearch};

use crate::llm::{ChatTurn, CompletionRequest, LlmClient};
use crate::locks::SessionLocks;
use crate::prompt::{build_instructions, PromptContext};
use crate::quick_actions::QuickAction;

pub const FORM_INCOMPLETE_REPLY: &str =
    "Thank you! Please fill in all the fields of the form and our manager will pick the best tour for you.";

#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    pub history_window: usize,
    pub default_departure: String,
    pub default_nights: u32,
    pub default_travelers: u32,
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            history_window: config.llm.history_window,
            default_departure: config.search.default_departure.clone(),
            default_nights: config.search.default_nights,
            default_travelers: config.search.default_travelers,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionStart {
    pub session_id: SessionId,
    pub bot_name: String,
    pub greeting: String,
    pub brand_color: String,
}

#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
    /// `None` opens a new session.
    pub session_id: Option<SessionId>,
    pub message: String,
    pub client_data: Option<ClientSlots>,
    pub quick_action: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub session_id: SessionId,
    pub reply: String,
    /// First directive in the model reply. A bare legacy lead marker completes the session
    /// without changing this; `lead_created` reports the hand-off.
    pub action: Directive,
    pub lead_created: bool,
    pub completed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionHistory {
    pub session: Session,
    pub messages: Vec<Message>,
}

pub struct ChatRuntime {
    store: Store,
    vault: CredentialVault,
    llm: Arc<dyn LlmClient>,
    tours: Arc<dyn TourSearch>,
    hot_deals: HotDeals,
    locks: SessionLocks,
    settings: RuntimeSettings,
}

impl ChatRuntime {
    pub fn new(
        store: Store,
        vault: CredentialVault,
        llm: Arc<dyn LlmClient>,
        tours: Arc<dyn TourSearch>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            store,
            vault,
            llm,
            tours,
            hot_deals: HotDeals::default(),
            locks: SessionLocks::default(),
            settings,
        }
    }

    pub async fn start_session(&self, tenant: &Tenant) -> Result<SessionStart, ApplicationError> {
        let session = self.open_session(tenant).await?;
        Ok(SessionStart {
            session_id: session.id,
            bot_name: tenant.persona.bot_name.clone(),
            greeting: tenant.persona.greeting_or_default(),
            brand_color: tenant.persona.brand_color.clone(),
        })
    }

    pub async fn handle_message(
        &self,
        tenant: &Tenant,
        request: ChatRequest,
    ) -> Result<ChatReply, ApplicationError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(ApplicationError::validation("message is required"));
        }
        let patch = request.client_data.map(SlotPatch::try_from).transpose()?;
        let quick_action = resolve_quick_action(request.quick_action.as_deref());

        let session_id = match request.session_id {
            Some(session_id) => {
                self.owned_session(tenant, &session_id).await?;
                session_id
            }
            None => self.open_session(tenant).await?.id,
        };

        let _guard = self.locks.acquire(&session_id).await;
        let mut session = self.owned_session(tenant, &session_id).await?;
        let slots_changed = patch.as_ref().is_some_and(|patch| session.merge(patch));

        self.store
            .messages
            .append(Message::new(session.id.clone(), MessageRole::User, message))
            .await?;
        info!(
            event_name = "chat.message.accepted",
            tenant_id = %tenant.id,
            session_id = %session.id,
            plan = tenant.plan.as_str(),
            quick_action = quick_action.map(|action| action.as_str()),
            "chat message accepted"
        );

        let capabilities = PlanGate::capabilities(tenant);
        if !capabilities.model_enabled {
            return self.rule_based_reply(session, slots_changed).await;
        }
        self.model_reply(tenant, session, slots_changed, capabilities, quick_action).await
    }

    pub async fn history(
        &self,
        tenant: &Tenant,
        session_id: &SessionId,
    ) -> Result<SessionHistory, ApplicationError> {
        let session = self.owned_session(tenant, session_id).await?;
        let messages = self.store.messages.list_for_session(session_id).await?;
        Ok(SessionHistory { session, messages })
    }

    /// Checks quota, charges one dialog and persists a fresh session.
    async fn open_session(&self, tenant: &Tenant) -> Result<Session, ApplicationError> {
        PlanGate::check(tenant)?;
        if !self.store.tenants.try_consume_dialog(&tenant.id).await? {
            let current = self
                .store
                .tenants
                .find_by_id(&tenant.id)
                .await?
                .ok_or_else(|| ApplicationError::not_found("tenant", tenant.id.0.clone()))?;
            warn!(
                event_name = "plan.quota.exhausted",
                tenant_id = %tenant.id,
                used = current.dialogs_used,
                limit = current.dialogs_limit,
                "dialog quota exhausted"
            );
            return Err(ApplicationError::QuotaExceeded {
                used: current.dialogs_used,
                limit: current.dialogs_limit,
                plan: current.plan,
            });
        }

        let session = Session::new(SessionId::generate(), tenant.id.clone());
        self.store.sessions.save(session.clone()).await?;
        info!(
            event_name = "chat.session.started",
            tenant_id = %tenant.id,
            session_id = %session.id,
            "dialog opened"
        );
        Ok(session)
    }

    async fn owned_session(
        &self,
        tenant: &Tenant,
        session_id: &SessionId,
    ) -> Result<Session, ApplicationError> {
        self.store
            .sessions
            .find_by_id(session_id)
            .await?
            .filter(|session| session.belongs_to(&tenant.id))
            .ok_or_else(|| ApplicationError::not_found("session", session_id.0.clone()))
    }

    async fn rule_based_reply(
        &self,
        mut session: Session,
        slots_changed: bool,
    ) -> Result<ChatReply, ApplicationError> {
        if !session.slots.is_complete() {
            if slots_changed {
                self.store.sessions.save(session.clone()).await?;
            }
            self.append_assistant(&session.id, FORM_INCOMPLETE_REPLY).await?;
            return Ok(ChatReply {
                session_id: session.id,
                reply: FORM_INCOMPLETE_REPLY.to_string(),
                action: Directive::None,
                lead_created: false,
                completed: session.completed,
            });
        }

        let summary = session.slots.summary();
        let lead_created =
            self.complete_session(&mut session, QualifyingSignal::SlotsComplete, slots_changed).await?;
        let reply = format!(
            "Great, all the details are recorded 📋\n\n{summary}\n\nOur manager will contact you shortly to pick and book the best tour! 🌴"
        );
        self.append_assistant(&session.id, &reply).await?;

        Ok(ChatReply {
            session_id: session.id,
            reply,
            action: Directive::Manager,
            lead_created,
            completed: session.completed,
        })
    }

    async fn model_reply(
        &self,
        tenant: &Tenant,
        mut session: Session,
        slots_changed: bool,
        capabilities: PlanCapabilities,
        quick_action: Option<QuickAction>,
    ) -> Result<ChatReply, ApplicationError> {
        let tour_block = self.tour_block(tenant, &session.slots, capabilities).await;
        let hot_deals_block = session
            .slots
            .country
            .as_deref()
            .filter(|_| capabilities.hot_deals)
            .map(|country| self.hot_deals.for_country(country).render());
        let system = build_instructions(&PromptContext {
            tenant,
            slots: &session.slots,
            capabilities,
            tour_block: tour_block.as_deref(),
            hot_deals_block: hot_deals_block.as_deref(),
        });
        let turns = self.history_window(&session.id, quick_action).await?;
        let api_key_override =
            self.open_secret(tenant, tenant.credentials.model_key.as_ref(), "model_key");

        let raw = match self
            .llm
            .complete(CompletionRequest { system, turns, api_key_override })
            .await
        {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "chat.model.failed",
                    tenant_id = %tenant.id,
                    session_id = %session.id,
                    error = format!("{error:#}"),
                    "model call failed; user turn kept, session unchanged"
                );
                return Err(ApplicationError::AssistantUnavailable {
                    session_id: session.id,
                    reason: error.to_string(),
                });
            }
        };

        let parsed = parse_reply(&raw);
        self.append_assistant(&session.id, &parsed.text).await?;

        let lead_created = if parsed.is_qualifying() {
            self.complete_session(&mut session, QualifyingSignal::Directive, slots_changed).await?
        } else {
            if slots_changed {
                self.store.sessions.save(session.clone()).await?;
            }
            false
        };
        Ok(ChatReply {
            session_id: session.id,
            reply: parsed.text,
            action: parsed.directive,
            lead_created,
            completed: session.completed,
        })
    }

    /// Moves the session to its terminal state and records its lead. The lead is written
    /// before the session so a completed session always has one. Returns whether a new
    /// lead was created.
    async fn complete_session(
        &self,
        session: &mut Session,
        signal: QualifyingSignal,
        slots_changed: bool,
    ) -> Result<bool, ApplicationError> {
        if session.completed {
            if slots_changed {
                self.store.sessions.save(session.clone()).await?;
            }
            debug!(
                event_name = "lead.skipped",
                session_id = %session.id,
                "session already completed"
            );
            return Ok(false);
        }

        let lead = session.complete(signal)?;
        let created = match self.store.leads.save(lead.clone()).await {
            Ok(()) => true,
            Err(RepositoryError::Conflict(reason)) => {
                warn!(
                    event_name = "lead.duplicate_suppressed",
                    session_id = %session.id,
                    reason = %reason,
                    "session already has a lead"
                );
                false
            }
            Err(error) => return Err(error.into()),
        };
        self.store.sessions.save(session.clone()).await?;

        if created {
            info!(
                event_name = "lead.created",
                tenant_id = %lead.tenant_id,
                session_id = %lead.session_id,
                lead_id = %lead.id,
                "lead handed to manager"
            );
        }
        Ok(created)
    }

    async fn tour_block(
        &self,
        tenant: &Tenant,
        slots: &Slots,
        capabilities: PlanCapabilities,
    ) -> Option<String> {
        if capabilities.tour_source == TourSource::None {
            return None;
        }
        let destination = slots.country.clone()?;
        let credentials =
            if capabilities.live_search() { self.search_credentials(tenant) } else { None };

        let criteria = SearchCriteria {
            credentials,
            destination,
            meal: slots.meal,
            stars: slots.stars,
            nights: self.settings.default_nights,
            travelers: self.settings.default_travelers,
            budget: slots.budget,
            departure_city: self.settings.default_departure.clone(),
        };
        let records = self.tours.search(&criteria).await;
        Some(format_for_presentation(&records, tenant.plan))
    }

    fn search_credentials(&self, tenant: &Tenant) -> Option<GatewayCredentials> {
        let login =
            self.open_secret(tenant, tenant.credentials.search_login.as_ref(), "search_login")?;
        let password = self.open_secret(
            tenant,
            tenant.credentials.search_password.as_ref(),
            "search_password",
        )?;
        Some(GatewayCredentials { login, password })
    }

    /// A record that fails to open counts as absent.
    fn open_secret(
        &self,
        tenant: &Tenant,
        sealed: Option<&SealedSecret>,
        credential: &'static str,
    ) -> Option<SecretString> {
        match self.vault.decrypt_optional(sealed) {
            Ok(secret) => secret,
            Err(error) => {
                warn!(
                    event_name = "vault.decrypt_failed",
                    tenant_id = %tenant.id,
                    credential,
                    error = %error,
                    "stored credential could not be opened; treating it as absent"
                );
                None
            }
        }
    }

    async fn history_window(
        &self,
        session_id: &SessionId,
        quick_action: Option<QuickAction>,
    ) -> Result<Vec<ChatTurn>, ApplicationError> {
        let messages = self.store.messages.list_for_session(session_id).await?;
        let mut skip = messages.len().saturating_sub(self.settings.history_window);
        // A window cut on an assistant turn also takes the user turn that prompted it.
        if skip > 0 && messages.get(skip).is_some_and(|message| message.role == MessageRole::Assistant)
        {
            skip -= 1;
        }
        let mut turns: Vec<ChatTurn> = messages
            .into_iter()
            .skip(skip)
            .map(|message| ChatTurn { role: message.role, content: message.content })
            .collect();
        // The model API expects the conversation to open with a user turn.
        while turns.first().is_some_and(|turn| turn.role == MessageRole::Assistant) {
            turns.remove(0);
        }
        if let Some(action) = quick_action {
            turns.push(ChatTurn::user(action.instruction()));
        }
        Ok(turns)
    }

    async fn append_assistant(
        &self,
        session_id: &SessionId,
        content: &str,
    ) -> Result<(), ApplicationError> {
        self.store
            .messages
            .append(Message::new(session_id.clone(), MessageRole::Assistant, content))
            .await?;
        Ok(())
    }
}

fn resolve_quick_action(raw: Option<&str>) -> Option<QuickAction> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
    match raw.parse::<QuickAction>() {
        Ok(action) => Some(action),
        Err(error) => {
            warn!(event_name = "chat.quick_action.ignored", error = %error, "unknown quick action");
            None
        }
    }
}
