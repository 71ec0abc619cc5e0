//! JSON routes for the chat widget and the agency dashboard.
//!
//! Every `/api/chat` and `/api/agency` route resolves its tenant from the `x-agency-key`
//! header. Hot-deal listings are public.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use tourlead_agent::{
    AgencyService, ChatReply, ChatRequest, ChatRuntime, PersonaUpdate, SessionHistory, SessionStart,
    TenantProfile, TenantStats,
};
use tourlead_core::domain::lead::{Lead, LeadId, LeadStatus};
use tourlead_core::domain::session::SessionId;
use tourlead_core::domain::slots::ClientSlots;
use tourlead_core::domain::tenant::{DestinationCatalog, Tenant};
use tourlead_core::errors::{ApplicationError, InterfaceError};
use tourlead_db::Store;
use tourlead_tours::{HotDeal, HotDealFilter, HotDealSelection, HotDeals};

pub const AGENCY_KEY_HEADER: &str = "x-agency-key";
const NEW_SESSION: &str = "new";

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub runtime: Arc<ChatRuntime>,
    pub agency: Arc<AgencyService>,
    pub hot_deals: Arc<HotDeals>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat/start", post(start_chat))
        .route("/api/chat/message", post(chat_message))
        .route("/api/chat/history/{session_id}", get(chat_history))
        .route("/api/agency/config", get(agency_config))
        .route("/api/agency/persona", put(update_persona))
        .route("/api/agency/tone", put(update_tone))
        .route("/api/agency/catalog", put(update_catalog))
        .route("/api/agency/credentials/model", post(store_model_key))
        .route("/api/agency/credentials/search", post(store_search_credentials))
        .route("/api/agency/leads", get(list_leads))
        .route("/api/agency/leads/{id}", patch(set_lead_status))
        .route("/api/agency/stats", get(agency_stats))
        .route("/api/hot-tours", get(hot_tours))
        .route("/api/hot-tours/{country}", get(hot_tours_for_country))
        .with_state(state)
}

/// Interface error rendered as a JSON body with the matching status code.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        match &error {
            ApplicationError::Persistence(_)
            | ApplicationError::Integration(_)
            | ApplicationError::Configuration(_) => error!(
                event_name = "http.request.failed",
                correlation_id = %correlation_id,
                error = %error,
                "request failed"
            ),
            _ => warn!(
                event_name = "http.request.rejected",
                correlation_id = %correlation_id,
                error = %error,
                "request rejected"
            ),
        }
        Self(error.into_interface(correlation_id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0;
        let (status, kind) = match &error {
            InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
            InterfaceError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "unauthorized"),
            InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            InterfaceError::QuotaExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "quota_exceeded"),
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let mut body = json!({
            "error": kind,
            "message": error.user_message(),
            "correlation_id": error.correlation_id(),
        });
        if let InterfaceError::QuotaExceeded { used, limit, plan, .. } = &error {
            body["used"] = json!(used);
            body["limit"] = json!(limit);
            body["plan"] = json!(plan);
        }
        if let InterfaceError::ServiceUnavailable { session_id: Some(session_id), .. } = &error {
            body["session_id"] = json!(session_id);
        }
        (status, Json(body)).into_response()
    }
}

/// Tenant resolved from the agency key header. Unknown or inactive keys are rejected.
pub struct AgencyTenant(pub Tenant);

impl FromRequestParts<AppState> for AgencyTenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(AGENCY_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ApplicationError::Unauthorized("missing agency key".to_string()))?;

        state
            .store
            .tenants
            .find_by_api_key(key)
            .await
            .map_err(ApplicationError::from)?
            .filter(|tenant| tenant.active)
            .map(AgencyTenant)
            .ok_or_else(|| ApplicationError::Unauthorized("unknown agency key".to_string()).into())
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageBody {
    pub session_id: Option<String>,
    pub message: String,
    pub client_data: Option<ClientSlots>,
    pub quick_action: Option<String>,
}

impl From<ChatMessageBody> for ChatRequest {
    fn from(body: ChatMessageBody) -> Self {
        let session_id = body
            .session_id
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty() && raw != NEW_SESSION)
            .map(SessionId);
        ChatRequest {
            session_id,
            message: body.message,
            client_data: body.client_data,
            quick_action: body.quick_action,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PersonaBody {
    pub bot_name: Option<String>,
    pub greeting: Option<String>,
    pub brand_color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToneBody {
    pub tone: String,
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogBody {
    pub catalog: DestinationCatalog,
}

#[derive(Deserialize)]
pub struct ModelKeyBody {
    pub api_key: String,
}

#[derive(Deserialize)]
pub struct SearchCredentialsBody {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LeadStatusBody {
    pub status: String,
}

async fn start_chat(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
) -> Result<Json<SessionStart>, ApiError> {
    Ok(Json(state.runtime.start_session(&tenant).await?))
}

async fn chat_message(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
    Json(body): Json<ChatMessageBody>,
) -> Result<Json<ChatReply>, ApiError> {
    Ok(Json(state.runtime.handle_message(&tenant, body.into()).await?))
}

async fn chat_history(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
    Path(session_id): Path<String>,
) -> Result<Json<SessionHistory>, ApiError> {
    Ok(Json(state.runtime.history(&tenant, &SessionId(session_id)).await?))
}

async fn agency_config(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
) -> Result<Json<TenantProfile>, ApiError> {
    Ok(Json(state.agency.tenant_profile(&tenant).await?))
}

async fn update_persona(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
    Json(body): Json<PersonaBody>,
) -> Result<Json<TenantProfile>, ApiError> {
    let update = PersonaUpdate {
        bot_name: body.bot_name,
        greeting: body.greeting,
        brand_color: body.brand_color,
    };
    Ok(Json(state.agency.update_persona(&tenant, update).await?))
}

async fn update_tone(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
    Json(body): Json<ToneBody>,
) -> Result<Json<TenantProfile>, ApiError> {
    Ok(Json(state.agency.update_tone(&tenant, &body.tone, body.custom_instructions).await?))
}

async fn update_catalog(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
    Json(body): Json<CatalogBody>,
) -> Result<Json<TenantProfile>, ApiError> {
    Ok(Json(state.agency.update_catalog(&tenant, body.catalog).await?))
}

async fn store_model_key(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
    Json(body): Json<ModelKeyBody>,
) -> Result<StatusCode, ApiError> {
    state.agency.store_model_key(&tenant, &SecretString::from(body.api_key)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn store_search_credentials(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
    Json(body): Json<SearchCredentialsBody>,
) -> Result<StatusCode, ApiError> {
    state
        .agency
        .store_search_credentials(
            &tenant,
            &SecretString::from(body.login),
            &SecretString::from(body.password),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_leads(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
) -> Result<Json<Vec<Lead>>, ApiError> {
    Ok(Json(state.agency.list_leads(&tenant).await?))
}

async fn set_lead_status(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
    Path(lead_id): Path<String>,
    Json(body): Json<LeadStatusBody>,
) -> Result<Json<Lead>, ApiError> {
    let status: LeadStatus = body.status.parse().map_err(ApplicationError::from)?;
    Ok(Json(state.agency.set_lead_status(&tenant, &LeadId(lead_id), status).await?))
}

async fn agency_stats(
    State(state): State<AppState>,
    AgencyTenant(tenant): AgencyTenant,
) -> Result<Json<TenantStats>, ApiError> {
    Ok(Json(state.agency.tenant_stats(&tenant).await?))
}

async fn hot_tours(
    State(state): State<AppState>,
    Query(filter): Query<HotDealFilter>,
) -> Json<Vec<HotDeal>> {
    Json(state.hot_deals.query(&filter))
}

async fn hot_tours_for_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
) -> Json<HotDealSelection> {
    Json(state.hot_deals.for_country(&country))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use tourlead_agent::{
        AgencyService, ChatRuntime, CompletionRequest, LlmClient, RuntimeSettings,
    };
    use tourlead_core::domain::tenant::{PlanTier, Tenant};
    use tourlead_core::vault::CredentialVault;
    use tourlead_db::Store;
    use tourlead_tours::{HotDeals, TourSearchAdapter};

    use super::{router, AppState, AGENCY_KEY_HEADER};

    struct HandOff;

    #[async_trait]
    impl LlmClient for HandOff {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            Ok("Our manager will call you. [ACTION:manager]".to_string())
        }
    }

    /// Fails its first call, then hands off like [`HandOff`].
    #[derive(Default)]
    struct OverloadedOnce {
        failed: AtomicBool,
    }

    #[async_trait]
    impl LlmClient for OverloadedOnce {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(anyhow!("upstream 529: overloaded"));
            }
            HandOff.complete(request).await
        }
    }

    async fn app(tenant: &Tenant) -> Router {
        app_with_model(tenant, Arc::new(HandOff)).await
    }

    async fn app_with_model(tenant: &Tenant, model: Arc<dyn LlmClient>) -> Router {
        let store = Store::in_memory();
        store.tenants.save(tenant.clone()).await.expect("seed tenant");
        let vault = CredentialVault::new(&SecretString::from("api-test-vault-secret".to_string()));
        let runtime = ChatRuntime::new(
            store.clone(),
            vault.clone(),
            model,
            Arc::new(TourSearchAdapter::synthetic_only(90)),
            RuntimeSettings::default(),
        );
        router(AppState {
            store: store.clone(),
            runtime: Arc::new(runtime),
            agency: Arc::new(AgencyService::new(store, vault)),
            hot_deals: Arc::new(HotDeals::default()),
        })
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            request = request.header(AGENCY_KEY_HEADER, key);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    #[tokio::test]
    async fn chat_routes_require_a_known_agency_key() {
        let tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Pro);
        let app = app(&tenant).await;

        let (status, body) = call(&app, "POST", "/api/chat/start", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
        assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));

        let (status, _) = call(&app, "POST", "/api/chat/start", Some("tl_wrong"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, "POST", "/api/chat/start", Some("tl_sunny"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bot_name"], "Roman");
    }

    #[tokio::test]
    async fn message_flow_creates_a_lead_visible_to_the_agency() {
        let tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Pro);
        let app = app(&tenant).await;

        let (status, reply) = call(
            &app,
            "POST",
            "/api/chat/message",
            Some("tl_sunny"),
            Some(json!({
                "session_id": "new",
                "message": "Book Turkey for us",
                "client_data": {"rest_type": "beach", "country": "Turkey", "budget": 150000}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["action"], "manager");
        assert_eq!(reply["lead_created"], true);
        assert_eq!(reply["reply"], "Our manager will call you.");

        let session_id = reply["session_id"].as_str().expect("session id").to_string();
        let (status, history) =
            call(&app, "GET", &format!("/api/chat/history/{session_id}"), Some("tl_sunny"), None)
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["messages"].as_array().map(Vec::len), Some(2));

        let (_, leads) = call(&app, "GET", "/api/agency/leads", Some("tl_sunny"), None).await;
        let lead_id = leads[0]["id"].as_str().expect("lead id").to_string();
        assert_eq!(leads[0]["status"], "new");

        let (status, updated) = call(
            &app,
            "PATCH",
            &format!("/api/agency/leads/{lead_id}"),
            Some("tl_sunny"),
            Some(json!({"status": "done"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "done");

        let (_, stats) = call(&app, "GET", "/api/agency/stats", Some("tl_sunny"), None).await;
        assert_eq!(stats["total_sessions"], 1);
        assert_eq!(stats["completed_sessions"], 1);
        assert_eq!(stats["dialogs_used"], 1);
    }

    #[tokio::test]
    async fn model_outage_reports_the_open_session_for_retry() {
        let tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Pro);
        let app = app_with_model(&tenant, Arc::new(OverloadedOnce::default())).await;

        let (status, failure) = call(
            &app,
            "POST",
            "/api/chat/message",
            Some("tl_sunny"),
            Some(json!({"session_id": "new", "message": "Hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(failure["error"], "service_unavailable");
        assert!(!failure.to_string().contains("529"));
        let session_id = failure["session_id"].as_str().expect("session id").to_string();

        let (status, reply) = call(
            &app,
            "POST",
            "/api/chat/message",
            Some("tl_sunny"),
            Some(json!({"session_id": session_id, "message": "Hi again"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["session_id"], session_id.as_str());

        let (_, stats) = call(&app, "GET", "/api/agency/stats", Some("tl_sunny"), None).await;
        assert_eq!(stats["total_sessions"], 1);
        assert_eq!(stats["dialogs_used"], 1);
    }

    #[tokio::test]
    async fn exhausted_quota_maps_to_too_many_requests() {
        let mut tenant = Tenant::new("Tiny Tours", "tl_tiny", PlanTier::Basic);
        tenant.dialogs_limit = 0;
        let app = app(&tenant).await;

        let (status, body) = call(&app, "POST", "/api/chat/start", Some("tl_tiny"), None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "quota_exceeded");
        assert_eq!(body["limit"], 0);
        assert_eq!(body["plan"], "basic");
    }

    #[tokio::test]
    async fn settings_routes_validate_and_never_echo_secrets() {
        let tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Premium);
        let app = app(&tenant).await;

        let (status, _) = call(
            &app,
            "POST",
            "/api/agency/credentials/model",
            Some("tl_sunny"),
            Some(json!({"api_key": "not-a-key"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            "POST",
            "/api/agency/credentials/model",
            Some("tl_sunny"),
            Some(json!({"api_key": "sk-ant-secret-value"})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, profile) = call(
            &app,
            "PUT",
            "/api/agency/tone",
            Some("tl_sunny"),
            Some(json!({"tone": "expert", "custom_instructions": "Mention visas."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["tone"], "expert");

        let (status, profile) = call(&app, "GET", "/api/agency/config", Some("tl_sunny"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["has_model_key"], true);
        assert!(!profile.to_string().contains("sk-ant-secret-value"));

        let (status, _) = call(
            &app,
            "PATCH",
            "/api/agency/leads/missing",
            Some("tl_sunny"),
            Some(json!({"status": "done"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn hot_tours_are_public_and_filterable() {
        let tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Hot);
        let app = app(&tenant).await;

        let (status, deals) =
            call(&app, "GET", "/api/hot-tours?budget=80000&nights=7&stars=5", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> =
            deals.as_array().expect("deals").iter().filter_map(|deal| deal["id"].as_str()).collect();
        assert_eq!(ids, vec!["ht4", "ht2"]);

        let (status, selection) = call(&app, "GET", "/api/hot-tours/Norway", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(selection["fallback"], true);
        assert_eq!(selection["deals"].as_array().map(Vec::len), Some(3));
    }
}
