use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use recert_application::CycleRepository;
use recert_core::{AppError, AppResult};
use recert_domain::{CycleId, RecertCycle};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed cycle repository.
#[derive(Clone)]
pub struct PostgresCycleRepository {
    pool: PgPool,
}

impl PostgresCycleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CycleRow {
    id: i64,
    title: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    enabled: bool,
}

impl CycleRow {
    fn into_domain(self) -> AppResult<RecertCycle> {
        RecertCycle::new(
            CycleId::new(self.id),
            self.title,
            self.started_at,
            self.ended_at,
            self.enabled,
        )
    }
}

#[async_trait]
impl CycleRepository for PostgresCycleRepository {
    async fn list_cycles(&self) -> AppResult<Vec<RecertCycle>> {
        let rows = sqlx::query_as::<_, CycleRow>(
            r#"
            SELECT id, title, started_at, ended_at, enabled
            FROM recert_cycles
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list cycles: {error}")))?;

        rows.into_iter().map(CycleRow::into_domain).collect()
    }

    async fn find_cycle(&self, id: CycleId) -> AppResult<Option<RecertCycle>> {
        let row = sqlx::query_as::<_, CycleRow>(
            r#"
            SELECT id, title, started_at, ended_at, enabled
            FROM recert_cycles
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find cycle: {error}")))?;

        row.map(CycleRow::into_domain).transpose()
    }

    async fn latest_cycle(&self) -> AppResult<Option<RecertCycle>> {
        let row = sqlx::query_as::<_, CycleRow>(
            r#"
            SELECT id, title, started_at, ended_at, enabled
            FROM recert_cycles
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find latest cycle: {error}")))?;

        row.map(CycleRow::into_domain).transpose()
    }

    async fn insert_cycle(
        &self,
        title: &str,
        enabled: bool,
        started_at: DateTime<Utc>,
    ) -> AppResult<RecertCycle> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO recert_cycles (title, started_at, enabled)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(started_at)
        .bind(enabled)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert cycle: {error}")))?;

        RecertCycle::new(CycleId::new(id), title, started_at, None, enabled)
    }

    async fn update_cycle(&self, cycle: RecertCycle) -> AppResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE recert_cycles
            SET title = $2, started_at = $3, ended_at = $4, enabled = $5
            WHERE id = $1
            "#,
        )
        .bind(cycle.id().as_i64())
        .bind(cycle.title())
        .bind(cycle.started_at())
        .bind(cycle.ended_at())
        .bind(cycle.enabled())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update cycle: {error}")))?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "cycle '{}' not found",
                cycle.id()
            )));
        }
        Ok(())
    }

    async fn delete_cycle(&self, id: CycleId) -> AppResult<()> {
        let deleted = sqlx::query("DELETE FROM recert_cycles WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete cycle: {error}")))?;

        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("cycle '{id}' not found")));
        }
        Ok(())
    }

    async fn start_new_cycle(
        &self,
        title: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> AppResult<RecertCycle> {
        // The flag resets and the new cycle land one tick after the close so
        // as-of reads at the closed boundary still see the pre-reset flags.
        let after_close = now + Duration::microseconds(1);

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            UPDATE recert_cycles
            SET ended_at = $1
            WHERE ended_at IS NULL
            "#,
        )
        .bind(now)
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to close current cycle: {error}")))?;

        let reset = sqlx::query(
            r#"
            UPDATE grant_versions
            SET effective_to = $1
            WHERE effective_to IS NULL
            "#,
        )
        .bind(after_close)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to close grant versions: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO grant_versions (
                grant_id, role_id,
                role_owner_privilege_id, role_owner_access_justification,
                role_owner_removal_impact, role_owner_is_revoked,
                role_owner_is_certified, role_owner_certified_at,
                service_owner_privilege_id, service_owner_access_justification,
                service_owner_removal_impact, service_owner_is_revoked,
                service_owner_is_certified, service_owner_certified_at,
                risk_impact, risk_likelihood, risk_notes, risk_assessed_at,
                risk_is_assessed, effective_from
            )
            SELECT
                grant_id, role_id,
                role_owner_privilege_id, role_owner_access_justification,
                role_owner_removal_impact, role_owner_is_revoked,
                FALSE, role_owner_certified_at,
                service_owner_privilege_id, service_owner_access_justification,
                service_owner_removal_impact, service_owner_is_revoked,
                FALSE, service_owner_certified_at,
                risk_impact, risk_likelihood, risk_notes, risk_assessed_at,
                FALSE, $1
            FROM grant_versions
            WHERE effective_to = $1
            "#,
        )
        .bind(after_close)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to reset grant flags: {error}"))
        })?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO recert_cycles (title, started_at, enabled)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(after_close)
        .bind(enabled)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert cycle: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        tracing::info!(cycle_id = id, grants_reset = reset.rows_affected(), "started new recertification cycle");

        RecertCycle::new(CycleId::new(id), title, after_close, None, enabled)
    }
}
