use sqlx::{sqlite::SqliteRow, Row};

use tourlead_core::domain::lead::{Lead, LeadId, LeadStatus};
use tourlead_core::domain::session::SessionId;
use tourlead_core::domain::tenant::TenantId;

use super::tenant::{format_timestamp, parse_timestamp};
use super::{LeadRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, session_id, tenant_id, summary, status, created_at
             FROM lead
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(lead_from_row).transpose()
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO lead (id, session_id, tenant_id, summary, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                summary = excluded.summary,
                status = excluded.status",
        )
        .bind(&lead.id.0)
        .bind(&lead.session_id.0)
        .bind(&lead.tenant_id.0)
        .bind(&lead.summary)
        .bind(lead.status.as_str())
        .bind(format_timestamp(&lead.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                Err(RepositoryError::Conflict(format!(
                    "session `{}` already has a lead",
                    lead.session_id
                )))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Lead>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, session_id, tenant_id, summary, status, created_at
             FROM lead
             WHERE tenant_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(lead_from_row).collect()
    }
}

fn lead_from_row(row: SqliteRow) -> Result<Lead, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = status_raw
        .parse::<LeadStatus>()
        .map_err(|_| RepositoryError::Decode(format!("unknown lead status `{status_raw}`")))?;

    Ok(Lead {
        id: LeadId(row.try_get("id")?),
        session_id: SessionId(row.try_get("session_id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        summary: row.try_get("summary")?,
        status,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use tourlead_core::domain::lead::{Lead, LeadId, LeadStatus};
    use tourlead_core::domain::session::{Session, SessionId};
    use tourlead_core::domain::tenant::{PlanTier, Tenant};

    use super::SqlLeadRepository;
    use crate::migrations;
    use crate::repositories::{
        LeadRepository, RepositoryError, SessionRepository, SqlSessionRepository,
        SqlTenantRepository, TenantRepository,
    };
    use crate::{connect_with_settings, DbPool};

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("timestamp").with_timezone(&Utc)
    }

    async fn setup() -> (DbPool, Tenant) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Pro);
        SqlTenantRepository::new(pool.clone()).save(tenant.clone()).await.expect("tenant");
        let sessions = SqlSessionRepository::new(pool.clone());
        for id in ["S-1", "S-2"] {
            sessions
                .save(Session::new(SessionId(id.to_string()), tenant.id.clone()))
                .await
                .expect("session");
        }
        (pool, tenant)
    }

    fn lead(id: &str, session: &str, tenant: &Tenant, at: &str) -> Lead {
        Lead {
            id: LeadId(id.to_string()),
            session_id: SessionId(session.to_string()),
            tenant_id: tenant.id.clone(),
            summary: "rest: Beach (beach) · country: Turkey".to_string(),
            status: LeadStatus::New,
            created_at: parse_ts(at),
        }
    }

    #[tokio::test]
    async fn sql_lead_repo_lists_newest_first_and_updates_status() {
        let (pool, tenant) = setup().await;
        let repo = SqlLeadRepository::new(pool.clone());

        let first = lead("L-1", "S-1", &tenant, "2026-03-01T10:00:00Z");
        let second = lead("L-2", "S-2", &tenant, "2026-03-02T10:00:00Z");
        repo.save(first.clone()).await.expect("first");
        repo.save(second.clone()).await.expect("second");

        let listed = repo.list_for_tenant(&tenant.id).await.expect("list");
        assert_eq!(listed, vec![second, first.clone()]);

        let done = Lead { status: LeadStatus::Done, ..first };
        repo.save(done.clone()).await.expect("status update");
        assert_eq!(repo.find_by_id(&done.id).await.expect("find"), Some(done));

        pool.close().await;
    }

    #[tokio::test]
    async fn second_lead_for_session_is_a_conflict() {
        let (pool, tenant) = setup().await;
        let repo = SqlLeadRepository::new(pool.clone());

        repo.save(lead("L-1", "S-1", &tenant, "2026-03-01T10:00:00Z")).await.expect("first");
        let error = repo
            .save(lead("L-9", "S-1", &tenant, "2026-03-01T10:05:00Z"))
            .await
            .expect_err("duplicate");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        pool.close().await;
    }
}
