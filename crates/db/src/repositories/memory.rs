use std::collections::HashMap;

use tokio::sync::RwLock;

use tourlead_core::domain::lead::{Lead, LeadId};
use tourlead_core::domain::message::Message;
use tourlead_core::domain::session::{Session, SessionId};
use tourlead_core::domain::tenant::{Tenant, TenantId};

use super::{
    LeadRepository, MessageRepository, RepositoryError, SessionRepository, TenantRepository,
};

#[derive(Default)]
pub struct InMemoryTenantRepository {
    tenants: RwLock<HashMap<String, Tenant>>,
}

#[async_trait::async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(&id.0).cloned())
    }

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Tenant>, RepositoryError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.values().find(|tenant| tenant.api_key == api_key).cloned())
    }

    async fn list(&self) -> Result<Vec<Tenant>, RepositoryError> {
        let tenants = self.tenants.read().await;
        let mut all: Vec<Tenant> = tenants.values().cloned().collect();
        all.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(all)
    }

    async fn save(&self, mut tenant: Tenant) -> Result<(), RepositoryError> {
        let mut tenants = self.tenants.write().await;
        let key_taken = tenants
            .values()
            .any(|existing| existing.api_key == tenant.api_key && existing.id != tenant.id);
        if key_taken {
            return Err(RepositoryError::Conflict(format!(
                "api key already assigned to another tenant than `{}`",
                tenant.id
            )));
        }
        if let Some(existing) = tenants.get(&tenant.id.0) {
            tenant.dialogs_used = existing.dialogs_used;
        }
        tenants.insert(tenant.id.0.clone(), tenant);
        Ok(())
    }

    async fn try_consume_dialog(&self, id: &TenantId) -> Result<bool, RepositoryError> {
        let mut tenants = self.tenants.write().await;
        match tenants.get_mut(&id.0) {
            Some(tenant) if tenant.dialogs_used < tenant.dialogs_limit => {
                tenant.dialogs_used += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id.0).cloned())
    }

    async fn save(&self, mut session: Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.get(&session.id.0).is_some_and(|existing| existing.completed) {
            session.completed = true;
        }
        sessions.insert(session.id.0.clone(), session);
        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        let mut owned: Vec<Session> =
            sessions.values().filter(|session| session.belongs_to(tenant_id)).cloned().collect();
        owned.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(owned)
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<HashMap<String, Vec<Message>>>,
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, message: Message) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        messages.entry(message.session_id.0.clone()).or_default().push(message);
        Ok(())
    }

    async fn list_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages.get(&session_id.0).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: RwLock<HashMap<String, Lead>>,
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let leads = self.leads.read().await;
        Ok(leads.get(&id.0).cloned())
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        let mut leads = self.leads.write().await;
        let duplicate =
            leads.values().any(|existing| existing.session_id == lead.session_id && existing.id != lead.id);
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "session `{}` already has a lead",
                lead.session_id
            )));
        }
        leads.insert(lead.id.0.clone(), lead);
        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Lead>, RepositoryError> {
        let leads = self.leads.read().await;
        let mut owned: Vec<Lead> =
            leads.values().filter(|lead| &lead.tenant_id == tenant_id).cloned().collect();
        owned.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use tourlead_core::domain::lead::{Lead, LeadId, LeadStatus};
    use tourlead_core::domain::message::{Message, MessageRole};
    use tourlead_core::domain::session::{Session, SessionId};
    use tourlead_core::domain::tenant::{PlanTier, Tenant};

    use crate::repositories::{
        InMemoryLeadRepository, InMemoryMessageRepository, InMemorySessionRepository,
        InMemoryTenantRepository, LeadRepository, MessageRepository, RepositoryError,
        SessionRepository, TenantRepository,
    };

    #[tokio::test]
    async fn dialog_charge_stops_at_quota() {
        let repo = InMemoryTenantRepository::default();
        let mut tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Pro);
        tenant.dialogs_limit = 2;
        repo.save(tenant.clone()).await.expect("save tenant");

        assert!(repo.try_consume_dialog(&tenant.id).await.expect("first"));
        assert!(repo.try_consume_dialog(&tenant.id).await.expect("second"));
        assert!(!repo.try_consume_dialog(&tenant.id).await.expect("third"));

        let stored = repo.find_by_id(&tenant.id).await.expect("find").expect("exists");
        assert_eq!(stored.dialogs_used, 2);
    }

    #[tokio::test]
    async fn concurrent_charges_never_exceed_quota() {
        let repo = Arc::new(InMemoryTenantRepository::default());
        let mut tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Hot);
        tenant.dialogs_limit = 5;
        repo.save(tenant.clone()).await.expect("save tenant");

        let attempts: Vec<_> = (0..20)
            .map(|_| {
                let repo = Arc::clone(&repo);
                let id = tenant.id.clone();
                tokio::spawn(async move { repo.try_consume_dialog(&id).await.expect("charge") })
            })
            .collect();
        let mut accepted = 0;
        for attempt in attempts {
            if attempt.await.expect("join") {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 5);
        let stored = repo.find_by_id(&tenant.id).await.expect("find").expect("exists");
        assert_eq!(stored.dialogs_used, 5);
    }

    #[tokio::test]
    async fn saving_settings_does_not_rewind_usage() {
        let repo = InMemoryTenantRepository::default();
        let tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Pro);
        repo.save(tenant.clone()).await.expect("save tenant");
        repo.try_consume_dialog(&tenant.id).await.expect("charge");

        let mut stale = tenant.clone();
        stale.custom_instructions = Some("Mention family rooms".to_string());
        repo.save(stale).await.expect("save settings");

        let stored = repo.find_by_api_key("tl_sunny").await.expect("find").expect("exists");
        assert_eq!(stored.dialogs_used, 1);
        assert_eq!(stored.custom_instructions.as_deref(), Some("Mention family rooms"));
    }

    #[tokio::test]
    async fn api_keys_stay_unique() {
        let repo = InMemoryTenantRepository::default();
        repo.save(Tenant::new("First", "tl_same", PlanTier::Basic)).await.expect("first");
        let error = repo
            .save(Tenant::new("Second", "tl_same", PlanTier::Basic))
            .await
            .expect_err("duplicate key");
        assert!(matches!(error, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn sessions_and_messages_keep_order() {
        let sessions = InMemorySessionRepository::default();
        let messages = InMemoryMessageRepository::default();
        let tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Pro);

        let mut older = Session::new(SessionId("S-1".to_string()), tenant.id.clone());
        older.created_at = Utc::now() - Duration::minutes(5);
        let newer = Session::new(SessionId("S-2".to_string()), tenant.id.clone());
        sessions.save(newer.clone()).await.expect("save newer");
        sessions.save(older.clone()).await.expect("save older");

        let listed = sessions.list_for_tenant(&tenant.id).await.expect("list");
        assert_eq!(listed, vec![older.clone(), newer]);

        for (role, content) in
            [(MessageRole::User, "Turkey please"), (MessageRole::Assistant, "Belek it is")]
        {
            messages.append(Message::new(older.id.clone(), role, content)).await.expect("append");
        }
        let turns = messages.list_for_session(&older.id).await.expect("turns");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, MessageRole::User);
        assert_eq!(turns[1].content, "Belek it is");
    }

    #[tokio::test]
    async fn one_lead_per_session() {
        let repo = InMemoryLeadRepository::default();
        let tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Pro);
        let lead = Lead {
            id: LeadId("L-1".to_string()),
            session_id: SessionId("S-1".to_string()),
            tenant_id: tenant.id.clone(),
            summary: "country: Turkey".to_string(),
            status: LeadStatus::New,
            created_at: Utc::now(),
        };
        repo.save(lead.clone()).await.expect("save lead");

        let mut done = lead.clone();
        done.status = LeadStatus::Done;
        repo.save(done).await.expect("status update reuses id");

        let second = Lead { id: LeadId("L-2".to_string()), ..lead };
        let error = repo.save(second).await.expect_err("second lead for session");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        let listed = repo.list_for_tenant(&tenant.id).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, LeadStatus::Done);
    }
}
