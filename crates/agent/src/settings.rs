//! Tenant-facing settings, lead management and usage statistics.

use std::collections::{BTreeMap, BTreeSet};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::info;

use tourlead_core::domain::lead::{Lead, LeadId, LeadStatus};
use tourlead_core::domain::tenant::{DestinationCatalog, PlanTier, Tenant, Tone};
use tourlead_core::errors::ApplicationError;
use tourlead_core::vault::{CredentialVault, SealedSecret};
use tourlead_db::Store;

const MODEL_KEY_PREFIX: &str = "sk-ant-";
const RECENT_LEADS: usize = 20;

/// Public view of a tenant. Holds no credential material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TenantProfile {
    pub name: String,
    pub plan: PlanTier,
    pub bot_name: String,
    pub greeting: String,
    pub brand_color: String,
    pub tone: Tone,
    pub custom_instructions: Option<String>,
    pub catalog: BTreeMap<String, Vec<String>>,
    pub dialogs_used: u32,
    pub dialogs_limit: u32,
    pub dialogs_left: u32,
    pub has_model_key: bool,
    pub has_search_credentials: bool,
}

impl From<&Tenant> for TenantProfile {
    fn from(tenant: &Tenant) -> Self {
        Self {
            name: tenant.name.clone(),
            plan: tenant.plan,
            bot_name: tenant.persona.bot_name.clone(),
            greeting: tenant.persona.greeting_or_default(),
            brand_color: tenant.persona.brand_color.clone(),
            tone: tenant.persona.tone,
            custom_instructions: tenant.custom_instructions.clone(),
            catalog: tenant.catalog.0.clone(),
            dialogs_used: tenant.dialogs_used,
            dialogs_limit: tenant.dialogs_limit,
            dialogs_left: tenant.dialogs_left(),
            has_model_key: tenant.credentials.model_key.is_some(),
            has_search_credentials: tenant.credentials.has_search_credentials(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersonaUpdate {
    pub bot_name: Option<String>,
    pub greeting: Option<String>,
    pub brand_color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TenantStats {
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub active_days: usize,
    pub dialogs_used: u32,
    pub dialogs_limit: u32,
    pub recent_leads: Vec<Lead>,
}

pub struct AgencyService {
    store: Store,
    vault: CredentialVault,
}

impl AgencyService {
    pub fn new(store: Store, vault: CredentialVault) -> Self {
        Self { store, vault }
    }

    pub async fn tenant_profile(&self, tenant: &Tenant) -> Result<TenantProfile, ApplicationError> {
        let current = self.current(tenant).await?;
        Ok(TenantProfile::from(&current))
    }

    pub async fn store_model_key(
        &self,
        tenant: &Tenant,
        key: &SecretString,
    ) -> Result<(), ApplicationError> {
        let key = key.expose_secret().trim();
        if !key.starts_with(MODEL_KEY_PREFIX) {
            return Err(ApplicationError::validation(format!(
                "model key must start with `{MODEL_KEY_PREFIX}`"
            )));
        }
        let mut current = self.current(tenant).await?;
        current.credentials.model_key = Some(self.seal(key)?);
        self.store.tenants.save(current).await?;
        info!(
            event_name = "tenant.credentials.stored",
            tenant_id = %tenant.id,
            credential = "model_key",
            "tenant credential stored"
        );
        Ok(())
    }

    pub async fn store_search_credentials(
        &self,
        tenant: &Tenant,
        login: &SecretString,
        password: &SecretString,
    ) -> Result<(), ApplicationError> {
        let login = login.expose_secret().trim();
        let password = password.expose_secret();
        if login.is_empty() || password.is_empty() {
            return Err(ApplicationError::validation("login and password are required"));
        }
        let mut current = self.current(tenant).await?;
        current.credentials.search_login = Some(self.seal(login)?);
        current.credentials.search_password = Some(self.seal(password)?);
        self.store.tenants.save(current).await?;
        info!(
            event_name = "tenant.credentials.stored",
            tenant_id = %tenant.id,
            credential = "search",
            "tenant credential stored"
        );
        Ok(())
    }

    pub async fn update_persona(
        &self,
        tenant: &Tenant,
        update: PersonaUpdate,
    ) -> Result<TenantProfile, ApplicationError> {
        let mut current = self.current(tenant).await?;
        if let Some(bot_name) = update.bot_name {
            let bot_name = bot_name.trim();
            if bot_name.is_empty() {
                return Err(ApplicationError::validation("bot name must not be empty"));
            }
            current.persona.bot_name = bot_name.to_string();
        }
        if let Some(greeting) = update.greeting {
            let greeting = greeting.trim();
            current.persona.greeting = (!greeting.is_empty()).then(|| greeting.to_string());
        }
        if let Some(color) = update.brand_color {
            let color = color.trim();
            if !is_hex_color(color) {
                return Err(ApplicationError::validation(format!(
                    "brand color `{color}` is not a #RRGGBB value"
                )));
            }
            current.persona.brand_color = color.to_ascii_lowercase();
        }
        self.persist(current).await
    }

    pub async fn update_tone(
        &self,
        tenant: &Tenant,
        tone: &str,
        custom_instructions: Option<String>,
    ) -> Result<TenantProfile, ApplicationError> {
        let tone: Tone = tone.parse()?;
        let mut current = self.current(tenant).await?;
        current.persona.tone = tone;
        current.custom_instructions =
            custom_instructions.map(|text| text.trim().to_string()).filter(|text| !text.is_empty());
        self.persist(current).await
    }

    pub async fn update_catalog(
        &self,
        tenant: &Tenant,
        catalog: DestinationCatalog,
    ) -> Result<TenantProfile, ApplicationError> {
        catalog.validate()?;
        let mut current = self.current(tenant).await?;
        current.catalog = catalog;
        self.persist(current).await
    }

    pub async fn list_leads(&self, tenant: &Tenant) -> Result<Vec<Lead>, ApplicationError> {
        Ok(self.store.leads.list_for_tenant(&tenant.id).await?)
    }

    pub async fn set_lead_status(
        &self,
        tenant: &Tenant,
        lead_id: &LeadId,
        status: LeadStatus,
    ) -> Result<Lead, ApplicationError> {
        let mut lead = self
            .store
            .leads
            .find_by_id(lead_id)
            .await?
            .filter(|lead| lead.tenant_id == tenant.id)
            .ok_or_else(|| ApplicationError::not_found("lead", lead_id.0.clone()))?;
        lead.status = status;
        self.store.leads.save(lead.clone()).await?;
        info!(
            event_name = "lead.status.changed",
            tenant_id = %tenant.id,
            lead_id = %lead.id,
            status = status.as_str(),
            "lead status changed"
        );
        Ok(lead)
    }

    pub async fn tenant_stats(&self, tenant: &Tenant) -> Result<TenantStats, ApplicationError> {
        let current = self.current(tenant).await?;
        let sessions = self.store.sessions.list_for_tenant(&tenant.id).await?;
        let mut recent_leads = self.store.leads.list_for_tenant(&tenant.id).await?;
        recent_leads.truncate(RECENT_LEADS);

        let active_days: BTreeSet<_> =
            sessions.iter().map(|session| session.created_at.date_naive()).collect();
        Ok(TenantStats {
            total_sessions: sessions.len(),
            completed_sessions: sessions.iter().filter(|session| session.completed).count(),
            active_days: active_days.len(),
            dialogs_used: current.dialogs_used,
            dialogs_limit: current.dialogs_limit,
            recent_leads,
        })
    }

    /// The caller's tenant may be stale; mutations start from the stored copy.
    async fn current(&self, tenant: &Tenant) -> Result<Tenant, ApplicationError> {
        self.store
            .tenants
            .find_by_id(&tenant.id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("tenant", tenant.id.0.clone()))
    }

    async fn persist(&self, tenant: Tenant) -> Result<TenantProfile, ApplicationError> {
        let profile = TenantProfile::from(&tenant);
        let tenant_id = tenant.id.clone();
        self.store.tenants.save(tenant).await?;
        info!(event_name = "tenant.settings.updated", tenant_id = %tenant_id, "tenant settings updated");
        Ok(profile)
    }

    fn seal(&self, plaintext: &str) -> Result<SealedSecret, ApplicationError> {
        self.vault
            .encrypt(plaintext)
            .map_err(|error| ApplicationError::Integration(format!("sealing credential: {error}")))
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|character| character.is_ascii_hexdigit())
}
