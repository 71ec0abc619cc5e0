use async_trait::async_trait;
use thiserror::Error;

use tourlead_core::domain::lead::{Lead, LeadId};
use tourlead_core::domain::message::Message;
use tourlead_core::domain::session::{Session, SessionId};
use tourlead_core::domain::tenant::{Tenant, TenantId};
use tourlead_core::errors::ApplicationError;

pub mod lead;
pub mod memory;
pub mod message;
pub mod session;
pub mod tenant;

pub use lead::SqlLeadRepository;
pub use memory::{
    InMemoryLeadRepository, InMemoryMessageRepository, InMemorySessionRepository,
    InMemoryTenantRepository,
};
pub use message::SqlMessageRepository;
pub use session::SqlSessionRepository;
pub use tenant::SqlTenantRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError>;
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Tenant>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Tenant>, RepositoryError>;

    /// Inserts or updates a tenant. The usage counter of an existing tenant is left alone;
    /// only `try_consume_dialog` moves it.
    async fn save(&self, tenant: Tenant) -> Result<(), RepositoryError>;

    /// Charges one dialog if usage is still below quota. Returns `false` when the quota
    /// is exhausted or the tenant does not exist.
    async fn try_consume_dialog(&self, id: &TenantId) -> Result<bool, RepositoryError>;

    /// Cheap round trip used by the health endpoint.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError>;
    async fn save(&self, session: Session) -> Result<(), RepositoryError>;
    /// Oldest first.
    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Session>, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(&self, message: Message) -> Result<(), RepositoryError>;
    /// In the order the turns were stored.
    async fn list_for_session(&self, session_id: &SessionId)
        -> Result<Vec<Message>, RepositoryError>;
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    /// Fails with `Conflict` when a different lead already exists for the same session.
    async fn save(&self, lead: Lead) -> Result<(), RepositoryError>;
    /// Newest first.
    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Lead>, RepositoryError>;
}
