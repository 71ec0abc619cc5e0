use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use tourlead_db::Store;

#[derive(Clone)]
pub struct HealthState {
    store: Store,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub checked_at: String,
}

pub fn router(store: Store) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { store })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.store).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "tourlead-server runtime initialized".to_string(),
        },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(store: &Store) -> HealthCheck {
    match store.tenants.ping().await {
        Ok(()) => HealthCheck { status: "ready", detail: "store round trip succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("store round trip failed: {error}") }
        }
    }
}
