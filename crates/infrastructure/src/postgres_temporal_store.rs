use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recert_application::TemporalStore;
use recert_core::{AppError, AppResult};
use recert_domain::{Grant, Privilege, Role, Service, User};
use sqlx::PgPool;

use crate::postgres_directory_repository::{
    PrivilegeRow, RoleRow, ServiceRow, UserRow, PRIVILEGE_COLUMNS, ROLE_COLUMNS, SERVICE_COLUMNS,
    USER_COLUMNS,
};
use crate::postgres_grant_repository::{GrantRow, GRANT_COLUMNS};

/// PostgreSQL-backed as-of reads over the version-log tables.
///
/// A version is visible at `at` when it became effective at or before that
/// instant and was closed strictly after it. The strict upper bound makes a
/// version's boundary instant belong to its successor.
#[derive(Clone)]
pub struct PostgresTemporalStore {
    pool: PgPool,
}

impl PostgresTemporalStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const AS_OF_PREDICATE: &str =
    "effective_from <= $1 AND (effective_to IS NULL OR effective_to > $1)";

#[async_trait]
impl TemporalStore for PostgresTemporalStore {
    async fn users_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM user_versions WHERE {AS_OF_PREDICATE} ORDER BY user_id",
        ))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read users as of: {error}")))?;

        rows.into_iter().map(UserRow::into_domain).collect()
    }

    async fn roles_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM role_versions WHERE {AS_OF_PREDICATE} ORDER BY role_id",
        ))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read roles as of: {error}")))?;

        rows.into_iter().map(RoleRow::into_domain).collect()
    }

    async fn services_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Service>> {
        let rows = sqlx::query_as::<_, ServiceRow>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM service_versions WHERE {AS_OF_PREDICATE} \
             ORDER BY service_id",
        ))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read services as of: {error}")))?;

        rows.into_iter().map(ServiceRow::into_domain).collect()
    }

    async fn privileges_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Privilege>> {
        let rows = sqlx::query_as::<_, PrivilegeRow>(&format!(
            "SELECT {PRIVILEGE_COLUMNS} FROM privilege_versions WHERE {AS_OF_PREDICATE} \
             ORDER BY privilege_id",
        ))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to read privileges as of: {error}"))
        })?;

        rows.into_iter().map(PrivilegeRow::into_domain).collect()
    }

    async fn grants_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Grant>> {
        let rows = sqlx::query_as::<_, GrantRow>(&format!(
            "SELECT {GRANT_COLUMNS} FROM grant_versions WHERE {AS_OF_PREDICATE} ORDER BY grant_id",
        ))
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read grants as of: {error}")))?;

        rows.into_iter().map(GrantRow::into_domain).collect()
    }
}
