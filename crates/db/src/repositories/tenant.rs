use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use tourlead_core::domain::tenant::{
    DestinationCatalog, Persona, PlanTier, Tenant, TenantCredentials, TenantId, Tone,
};
use tourlead_core::vault::SealedSecret;

use super::{RepositoryError, TenantRepository};
use crate::DbPool;

const TENANT_COLUMNS: &str = "id, name, api_key, plan, bot_name, greeting, brand_color, tone,
    custom_instructions, catalog_json, model_key_sealed, search_login_sealed,
    search_password_sealed, dialogs_used, dialogs_limit, active, created_at";

pub struct SqlTenantRepository {
    pool: DbPool,
}

impl SqlTenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TenantRepository for SqlTenantRepository {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM tenant WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(tenant_from_row).transpose()
    }

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Tenant>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM tenant WHERE api_key = ?"))
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(tenant_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Tenant>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenant ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(tenant_from_row).collect()
    }

    async fn save(&self, tenant: Tenant) -> Result<(), RepositoryError> {
        let catalog_json = serde_json::to_string(&tenant.catalog)
            .map_err(|error| RepositoryError::Decode(format!("catalog encode: {error}")))?;

        sqlx::query(
            "INSERT INTO tenant (
                id,
                name,
                api_key,
                plan,
                bot_name,
                greeting,
                brand_color,
                tone,
                custom_instructions,
                catalog_json,
                model_key_sealed,
                search_login_sealed,
                search_password_sealed,
                dialogs_used,
                dialogs_limit,
                active,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                api_key = excluded.api_key,
                plan = excluded.plan,
                bot_name = excluded.bot_name,
                greeting = excluded.greeting,
                brand_color = excluded.brand_color,
                tone = excluded.tone,
                custom_instructions = excluded.custom_instructions,
                catalog_json = excluded.catalog_json,
                model_key_sealed = excluded.model_key_sealed,
                search_login_sealed = excluded.search_login_sealed,
                search_password_sealed = excluded.search_password_sealed,
                dialogs_limit = excluded.dialogs_limit,
                active = excluded.active",
        )
        .bind(&tenant.id.0)
        .bind(&tenant.name)
        .bind(&tenant.api_key)
        .bind(tenant.plan.as_str())
        .bind(&tenant.persona.bot_name)
        .bind(tenant.persona.greeting.as_deref())
        .bind(&tenant.persona.brand_color)
        .bind(tenant.persona.tone.as_str())
        .bind(tenant.custom_instructions.as_deref())
        .bind(catalog_json)
        .bind(tenant.credentials.model_key.as_ref().map(SealedSecret::as_str))
        .bind(tenant.credentials.search_login.as_ref().map(SealedSecret::as_str))
        .bind(tenant.credentials.search_password.as_ref().map(SealedSecret::as_str))
        .bind(i64::from(tenant.dialogs_used))
        .bind(i64::from(tenant.dialogs_limit))
        .bind(tenant.active)
        .bind(format_timestamp(&tenant.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn try_consume_dialog(&self, id: &TenantId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE tenant
             SET dialogs_used = dialogs_used + 1
             WHERE id = ? AND dialogs_used < dialogs_limit",
        )
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

fn tenant_from_row(row: SqliteRow) -> Result<Tenant, RepositoryError> {
    let plan_raw = row.try_get::<String, _>("plan")?;
    let plan = plan_raw
        .parse::<PlanTier>()
        .map_err(|_| RepositoryError::Decode(format!("unknown plan `{plan_raw}`")))?;
    let tone_raw = row.try_get::<String, _>("tone")?;
    let tone = tone_raw
        .parse::<Tone>()
        .map_err(|_| RepositoryError::Decode(format!("unknown tone `{tone_raw}`")))?;
    let catalog_raw = row.try_get::<String, _>("catalog_json")?;
    let catalog = serde_json::from_str::<DestinationCatalog>(&catalog_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid catalog_json: {error}")))?;

    let sealed = |column: &str| -> Result<Option<SealedSecret>, RepositoryError> {
        Ok(row.try_get::<Option<String>, _>(column)?.map(SealedSecret))
    };

    Ok(Tenant {
        id: TenantId(row.try_get("id")?),
        name: row.try_get("name")?,
        api_key: row.try_get("api_key")?,
        plan,
        persona: Persona {
            bot_name: row.try_get("bot_name")?,
            greeting: row.try_get("greeting")?,
            brand_color: row.try_get("brand_color")?,
            tone,
        },
        custom_instructions: row.try_get("custom_instructions")?,
        catalog,
        credentials: TenantCredentials {
            model_key: sealed("model_key_sealed")?,
            search_login: sealed("search_login_sealed")?,
            search_password: sealed("search_password_sealed")?,
        },
        dialogs_used: parse_u32("dialogs_used", row.try_get("dialogs_used")?)?,
        dialogs_limit: parse_u32("dialogs_limit", row.try_get("dialogs_limit")?)?,
        active: row.try_get("active")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
