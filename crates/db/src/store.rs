use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use tourlead_core::config::{DatabaseConfig, StorageBackend};

use crate::connection::{connect, DbPool};
use crate::migrations;
use crate::repositories::{
    InMemoryLeadRepository, InMemoryMessageRepository, InMemorySessionRepository,
    InMemoryTenantRepository, LeadRepository, MessageRepository, SessionRepository,
    SqlLeadRepository, SqlMessageRepository, SqlSessionRepository, SqlTenantRepository,
    TenantRepository,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not connect to database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("could not apply migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// One repository per entity behind a single handle, backed by one storage engine.
#[derive(Clone)]
pub struct Store {
    pub tenants: Arc<dyn TenantRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub leads: Arc<dyn LeadRepository>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            tenants: Arc::new(InMemoryTenantRepository::default()),
            sessions: Arc::new(InMemorySessionRepository::default()),
            messages: Arc::new(InMemoryMessageRepository::default()),
            leads: Arc::new(InMemoryLeadRepository::default()),
        }
    }

    pub fn sqlite(pool: DbPool) -> Self {
        Self {
            tenants: Arc::new(SqlTenantRepository::new(pool.clone())),
            sessions: Arc::new(SqlSessionRepository::new(pool.clone())),
            messages: Arc::new(SqlMessageRepository::new(pool.clone())),
            leads: Arc::new(SqlLeadRepository::new(pool)),
        }
    }

    /// Builds the backend named by configuration. SQLite stores are migrated before use.
    pub async fn open(database: &DatabaseConfig) -> Result<Self, StoreError> {
        match database.backend {
            StorageBackend::Memory => {
                info!(event_name = "store.opened", backend = "memory", "using in-memory store");
                Ok(Self::in_memory())
            }
            StorageBackend::Sqlite => {
                let pool = connect(database).await.map_err(StoreError::Connect)?;
                migrations::run_pending(&pool).await?;
                info!(
                    event_name = "store.opened",
                    backend = "sqlite",
                    url = %database.url,
                    "sqlite store ready"
                );
                Ok(Self::sqlite(pool))
            }
        }
    }
}
