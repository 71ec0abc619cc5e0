use sqlx::{sqlite::SqliteRow, Row};

use tourlead_core::domain::session::{Session, SessionId};
use tourlead_core::domain::slots::{MealPlan, RestType, Slots};
use tourlead_core::domain::tenant::TenantId;

use super::tenant::{format_timestamp, parse_timestamp, parse_u32};
use super::{RepositoryError, SessionRepository};
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, created_at, completed, rest_type, country, budget, stars, meal, wishes
             FROM chat_session
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_from_row).transpose()
    }

    async fn save(&self, session: Session) -> Result<(), RepositoryError> {
        let slots = &session.slots;
        sqlx::query(
            "INSERT INTO chat_session (
                id,
                tenant_id,
                created_at,
                completed,
                rest_type,
                country,
                budget,
                stars,
                meal,
                wishes
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                completed = MAX(chat_session.completed, excluded.completed),
                rest_type = excluded.rest_type,
                country = excluded.country,
                budget = excluded.budget,
                stars = excluded.stars,
                meal = excluded.meal,
                wishes = excluded.wishes",
        )
        .bind(&session.id.0)
        .bind(&session.tenant_id.0)
        .bind(format_timestamp(&session.created_at))
        .bind(session.completed)
        .bind(slots.rest_type.as_ref().map(RestType::as_str))
        .bind(slots.country.as_deref())
        .bind(slots.budget.map(i64::from))
        .bind(slots.stars.map(i64::from))
        .bind(slots.meal.as_ref().map(MealPlan::code))
        .bind(slots.wishes.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Session>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, created_at, completed, rest_type, country, budget, stars, meal, wishes
             FROM chat_session
             WHERE tenant_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(session_from_row).collect()
    }
}

fn session_from_row(row: SqliteRow) -> Result<Session, RepositoryError> {
    let rest_type = row
        .try_get::<Option<String>, _>("rest_type")?
        .map(|value| {
            value
                .parse::<RestType>()
                .map_err(|_| RepositoryError::Decode(format!("unknown rest_type `{value}`")))
        })
        .transpose()?;
    let meal = row
        .try_get::<Option<String>, _>("meal")?
        .map(|value| {
            value
                .parse::<MealPlan>()
                .map_err(|_| RepositoryError::Decode(format!("unknown meal `{value}`")))
        })
        .transpose()?;
    let stars = row
        .try_get::<Option<i64>, _>("stars")?
        .map(|value| {
            u8::try_from(value)
                .map_err(|_| RepositoryError::Decode(format!("invalid stars value {value}")))
        })
        .transpose()?;

    Ok(Session {
        id: SessionId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        completed: row.try_get("completed")?,
        slots: Slots {
            rest_type,
            country: row.try_get("country")?,
            budget: row
                .try_get::<Option<i64>, _>("budget")?
                .map(|value| parse_u32("budget", value))
                .transpose()?,
            stars,
            meal,
            wishes: row.try_get("wishes")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use tourlead_core::domain::session::{QualifyingSignal, Session, SessionId};
    use tourlead_core::domain::slots::{MealPlan, RestType, SlotPatch};
    use tourlead_core::domain::tenant::{PlanTier, Tenant};

    use super::SqlSessionRepository;
    use crate::migrations;
    use crate::repositories::{SessionRepository, SqlTenantRepository, TenantRepository};
    use crate::{connect_with_settings, DbPool};

    async fn setup() -> (DbPool, Tenant) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let tenant = Tenant::new("Sunny Travel", "tl_sunny", PlanTier::Pro);
        SqlTenantRepository::new(pool.clone()).save(tenant.clone()).await.expect("tenant");
        (pool, tenant)
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("timestamp").with_timezone(&Utc)
    }

    #[tokio::test]
    async fn sql_session_repo_round_trip_with_slots() {
        let (pool, tenant) = setup().await;
        let repo = SqlSessionRepository::new(pool.clone());

        let mut session = Session::new(SessionId("S-1".to_string()), tenant.id.clone());
        session.created_at = parse_ts("2026-03-02T10:00:00Z");
        repo.save(session.clone()).await.expect("save empty session");
        assert_eq!(repo.find_by_id(&session.id).await.expect("find"), Some(session.clone()));

        session.merge(&SlotPatch {
            rest_type: Some(RestType::Beach),
            country: Some("Turkey".to_string()),
            budget: Some(80_000),
            stars: Some(4),
            meal: Some(MealPlan::Uai),
            wishes: Some("quiet hotel".to_string()),
        });
        repo.save(session.clone()).await.expect("save merged session");
        assert_eq!(repo.find_by_id(&session.id).await.expect("find"), Some(session));

        pool.close().await;
    }

    #[tokio::test]
    async fn stored_completion_is_never_cleared() {
        let (pool, tenant) = setup().await;
        let repo = SqlSessionRepository::new(pool.clone());

        let mut session = Session::new(SessionId("S-2".to_string()), tenant.id.clone());
        session.created_at = parse_ts("2026-03-02T10:00:00Z");
        let stale = session.clone();
        session.complete(QualifyingSignal::Directive).expect("complete");
        repo.save(session.clone()).await.expect("save completed");

        repo.save(stale).await.expect("save stale copy");
        let stored = repo.find_by_id(&session.id).await.expect("find").expect("exists");
        assert!(stored.completed);

        pool.close().await;
    }

    #[tokio::test]
    async fn sessions_list_oldest_first_per_tenant() {
        let (pool, tenant) = setup().await;
        let other = Tenant::new("Other Travel", "tl_other", PlanTier::Basic);
        SqlTenantRepository::new(pool.clone()).save(other.clone()).await.expect("other tenant");
        let repo = SqlSessionRepository::new(pool.clone());

        for (id, owner, at) in [
            ("S-late", &tenant, "2026-03-03T10:00:00Z"),
            ("S-early", &tenant, "2026-03-01T10:00:00Z"),
            ("S-foreign", &other, "2026-03-02T10:00:00Z"),
        ] {
            let mut session = Session::new(SessionId(id.to_string()), owner.id.clone());
            session.created_at = parse_ts(at);
            repo.save(session).await.expect("save");
        }

        let ids: Vec<String> = repo
            .list_for_tenant(&tenant.id)
            .await
            .expect("list")
            .into_iter()
            .map(|session| session.id.0)
            .collect();
        assert_eq!(ids, vec!["S-early".to_string(), "S-late".to_string()]);

        pool.close().await;
    }
}
