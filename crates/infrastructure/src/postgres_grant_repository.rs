use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recert_application::GrantRepository;
use recert_core::{AppError, AppResult};
use recert_domain::{
    Grant, GrantId, GrantInput, OwnerAttestation, PrivilegeId, RiskAssessment, RoleId,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::postgres_directory_repository::is_unique_violation;

/// PostgreSQL-backed grant repository over the `grant_versions` log.
///
/// A grant keeps its sequence-assigned id across versions; partial unique
/// indexes on the open versions enforce the two per-role privilege pairs.
#[derive(Clone)]
pub struct PostgresGrantRepository {
    pool: PgPool,
}

impl PostgresGrantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct GrantRow {
    grant_id: i64,
    role_id: String,

    role_owner_privilege_id: String,
    role_owner_access_justification: String,
    role_owner_removal_impact: String,
    role_owner_is_revoked: bool,
    role_owner_is_certified: bool,
    role_owner_certified_at: Option<DateTime<Utc>>,

    service_owner_privilege_id: String,
    service_owner_access_justification: String,
    service_owner_removal_impact: String,
    service_owner_is_revoked: bool,
    service_owner_is_certified: bool,
    service_owner_certified_at: Option<DateTime<Utc>>,

    risk_impact: Option<i32>,
    risk_likelihood: Option<i32>,
    risk_notes: String,
    risk_assessed_at: Option<DateTime<Utc>>,
    risk_is_assessed: bool,
}

impl GrantRow {
    pub(crate) fn into_domain(self) -> AppResult<Grant> {
        let input = GrantInput {
            role_id: RoleId::new(self.role_id)?,
            role_owner: OwnerAttestation {
                privilege_id: PrivilegeId::new(self.role_owner_privilege_id)?,
                access_justification: self.role_owner_access_justification,
                removal_impact: self.role_owner_removal_impact,
                is_revoked: self.role_owner_is_revoked,
                is_certified: self.role_owner_is_certified,
                certified_at: self.role_owner_certified_at,
            },
            service_owner: OwnerAttestation {
                privilege_id: PrivilegeId::new(self.service_owner_privilege_id)?,
                access_justification: self.service_owner_access_justification,
                removal_impact: self.service_owner_removal_impact,
                is_revoked: self.service_owner_is_revoked,
                is_certified: self.service_owner_is_certified,
                certified_at: self.service_owner_certified_at,
            },
            risk: RiskAssessment {
                impact: self.risk_impact,
                likelihood: self.risk_likelihood,
                notes: self.risk_notes,
                assessed_at: self.risk_assessed_at,
                is_assessed: self.risk_is_assessed,
            },
        };
        Grant::new(GrantId::new(self.grant_id), input)
    }
}

pub(crate) const GRANT_COLUMNS: &str = "grant_id, role_id, \
     role_owner_privilege_id, role_owner_access_justification, role_owner_removal_impact, \
     role_owner_is_revoked, role_owner_is_certified, role_owner_certified_at, \
     service_owner_privilege_id, service_owner_access_justification, service_owner_removal_impact, \
     service_owner_is_revoked, service_owner_is_certified, service_owner_certified_at, \
     risk_impact, risk_likelihood, risk_notes, risk_assessed_at, risk_is_assessed";

async fn insert_version(
    transaction: &mut Transaction<'_, Postgres>,
    grant: &Grant,
) -> Result<(), sqlx::Error> {
    let role_owner = grant.role_owner();
    let service_owner = grant.service_owner();
    let risk = grant.risk();

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
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
            $11, $12, $13, $14, $15, $16, $17, $18, $19, now()
        )
        "#,
    )
    .bind(grant.id().as_i64())
    .bind(grant.role_id().as_str())
    .bind(role_owner.privilege_id.as_str())
    .bind(role_owner.access_justification.as_str())
    .bind(role_owner.removal_impact.as_str())
    .bind(role_owner.is_revoked)
    .bind(role_owner.is_certified)
    .bind(role_owner.certified_at)
    .bind(service_owner.privilege_id.as_str())
    .bind(service_owner.access_justification.as_str())
    .bind(service_owner.removal_impact.as_str())
    .bind(service_owner.is_revoked)
    .bind(service_owner.is_certified)
    .bind(service_owner.certified_at)
    .bind(risk.impact)
    .bind(risk.likelihood)
    .bind(risk.notes.as_str())
    .bind(risk.assessed_at)
    .bind(risk.is_assessed)
    .execute(&mut **transaction)
    .await
    .map(|_| ())
}

fn pair_conflict(grant: &Grant) -> AppError {
    AppError::Conflict(format!(
        "role '{}' already links one of the named privileges",
        grant.role_id()
    ))
}

#[async_trait]
impl GrantRepository for PostgresGrantRepository {
    async fn list_grants(&self) -> AppResult<Vec<Grant>> {
        let rows = sqlx::query_as::<_, GrantRow>(&format!(
            "SELECT {GRANT_COLUMNS} FROM grant_versions WHERE effective_to IS NULL ORDER BY grant_id",
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list grants: {error}")))?;

        rows.into_iter().map(GrantRow::into_domain).collect()
    }

    async fn grants_for_role(&self, role_id: &RoleId) -> AppResult<Vec<Grant>> {
        let rows = sqlx::query_as::<_, GrantRow>(&format!(
            "SELECT {GRANT_COLUMNS} FROM grant_versions \
             WHERE role_id = $1 AND effective_to IS NULL ORDER BY grant_id",
        ))
        .bind(role_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list role grants: {error}")))?;

        rows.into_iter().map(GrantRow::into_domain).collect()
    }

    async fn find_grant(&self, id: GrantId) -> AppResult<Option<Grant>> {
        let row = sqlx::query_as::<_, GrantRow>(&format!(
            "SELECT {GRANT_COLUMNS} FROM grant_versions \
             WHERE grant_id = $1 AND effective_to IS NULL",
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find grant: {error}")))?;

        row.map(GrantRow::into_domain).transpose()
    }

    async fn insert_grant(&self, input: GrantInput) -> AppResult<Grant> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let id = sqlx::query_scalar::<_, i64>("SELECT nextval('grant_ids')")
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to assign grant id: {error}"))
            })?;

        let grant = Grant::new(GrantId::new(id), input)?;

        if let Err(error) = insert_version(&mut transaction, &grant).await {
            if is_unique_violation(&error) {
                return Err(pair_conflict(&grant));
            }
            return Err(AppError::Internal(format!(
                "failed to insert grant: {error}"
            )));
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(grant)
    }

    async fn update_grant(&self, grant: Grant) -> AppResult<Grant> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let closed = sqlx::query(
            r#"
            UPDATE grant_versions
            SET effective_to = now()
            WHERE grant_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(grant.id().as_i64())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to close grant version: {error}")))?;

        if closed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "grant '{}' not found",
                grant.id()
            )));
        }

        if let Err(error) = insert_version(&mut transaction, &grant).await {
            if is_unique_violation(&error) {
                return Err(pair_conflict(&grant));
            }
            return Err(AppError::Internal(format!(
                "failed to insert grant version: {error}"
            )));
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(grant)
    }

    async fn delete_grant(&self, id: GrantId) -> AppResult<()> {
        let closed = sqlx::query(
            r#"
            UPDATE grant_versions
            SET effective_to = now()
            WHERE grant_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete grant: {error}")))?;

        if closed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("grant '{id}' not found")));
        }
        Ok(())
    }

    async fn count_grants(&self) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM grant_versions WHERE effective_to IS NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count grants: {error}")))
    }
}
