use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use tourlead_agent::{AgencyService, AnthropicClient, ChatRuntime, RuntimeSettings};
use tourlead_core::config::{AppConfig, ConfigError};
use tourlead_core::vault::CredentialVault;
use tourlead_db::{Store, StoreError};
use tourlead_tours::{HotDeals, TourSearchAdapter};

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("model-service client could not be built: {0}")]
    ModelClient(String),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        backend = ?config.database.backend,
        "starting application bootstrap"
    );

    let store = Store::open(&config.database).await?;
    let vault = CredentialVault::new(&config.vault.secret);
    let llm = AnthropicClient::new(&config.llm)
        .map_err(|error| BootstrapError::ModelClient(format!("{error:#}")))?;
    if config.llm.api_key.is_none() {
        info!(
            event_name = "system.bootstrap.no_platform_key",
            correlation_id = "bootstrap",
            "no platform model key configured; only tenants with their own key get model replies"
        );
    }
    let tours = TourSearchAdapter::new(&config.search);

    let runtime = ChatRuntime::new(
        store.clone(),
        vault.clone(),
        Arc::new(llm),
        Arc::new(tours),
        RuntimeSettings::from_config(&config),
    );
    let state = AppState {
        store: store.clone(),
        runtime: Arc::new(runtime),
        agency: Arc::new(AgencyService::new(store, vault)),
        hot_deals: Arc::new(HotDeals::default()),
    };

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        model = %config.llm.model,
        "application bootstrap complete"
    );
    Ok(Application { config, state })
}
