use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recert_application::DirectoryRepository;
use recert_core::{AppError, AppResult};
use recert_domain::{
    Privilege, PrivilegeId, Role, RoleId, Service, ServiceId, User, UserId,
};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed directory repository over the version-log tables.
///
/// Writes never update a row's payload in place: the open version is closed
/// and a successor inserted in the same transaction, so both share one
/// boundary instant.
#[derive(Clone)]
pub struct PostgresDirectoryRepository {
    pool: PgPool,
}

impl PostgresDirectoryRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    user_id: String,
    full_name: String,
    role_id: String,
    last_certified_by: Option<String>,
    last_certified_at: Option<DateTime<Utc>>,
}

impl UserRow {
    pub(crate) fn into_domain(self) -> AppResult<User> {
        User::new(
            self.user_id,
            self.full_name,
            RoleId::new(self.role_id)?,
            self.last_certified_by,
            self.last_certified_at,
        )
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RoleRow {
    role_id: String,
    name: String,
    description: String,
    owner_role_id: Option<String>,
}

impl RoleRow {
    pub(crate) fn into_domain(self) -> AppResult<Role> {
        let owner = self.owner_role_id.map(RoleId::new).transpose()?;
        Role::new(self.role_id, self.name, self.description, owner)
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ServiceRow {
    service_id: String,
    name: String,
    description: String,
    owner_role_id: String,
}

impl ServiceRow {
    pub(crate) fn into_domain(self) -> AppResult<Service> {
        Service::new(
            self.service_id,
            self.name,
            self.description,
            RoleId::new(self.owner_role_id)?,
        )
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PrivilegeRow {
    privilege_id: String,
    service_id: String,
    permission_group: String,
    summary: String,
    credential_storage_method: Option<String>,
}

impl PrivilegeRow {
    pub(crate) fn into_domain(self) -> AppResult<Privilege> {
        Privilege::new(
            self.privilege_id,
            ServiceId::new(self.service_id)?,
            self.permission_group,
            self.summary,
            self.credential_storage_method,
        )
    }
}

pub(crate) const USER_COLUMNS: &str =
    "user_id, full_name, role_id, last_certified_by, last_certified_at";
pub(crate) const ROLE_COLUMNS: &str = "role_id, name, description, owner_role_id";
pub(crate) const SERVICE_COLUMNS: &str = "service_id, name, description, owner_role_id";
pub(crate) const PRIVILEGE_COLUMNS: &str =
    "privilege_id, service_id, permission_group, summary, credential_storage_method";

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(database_error) = error {
        return database_error.code().as_deref() == Some("23505");
    }
    false
}

#[async_trait]
impl DirectoryRepository for PostgresDirectoryRepository {
    async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, full_name, role_id, last_certified_by, last_certified_at
            FROM user_versions
            WHERE effective_to IS NULL
            ORDER BY user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list users: {error}")))?;

        rows.into_iter().map(UserRow::into_domain).collect()
    }

    async fn find_user(&self, id: &UserId) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, full_name, role_id, last_certified_by, last_certified_at
            FROM user_versions
            WHERE user_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user: {error}")))?;

        row.map(UserRow::into_domain).transpose()
    }

    async fn insert_user(&self, user: User) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_versions
                (user_id, full_name, role_id, last_certified_by, last_certified_at, effective_from)
            VALUES ($1, $2, $3, $4, $5, now())
            "#,
        )
        .bind(user.id().as_str())
        .bind(user.full_name())
        .bind(user.role_id().as_str())
        .bind(user.last_certified_by())
        .bind(user.last_certified_at())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if is_unique_violation(&error) {
                    return Err(AppError::Conflict(format!(
                        "user '{}' already exists",
                        user.id()
                    )));
                }
                Err(AppError::Internal(format!("failed to insert user: {error}")))
            }
        }
    }

    async fn update_user(&self, user: User) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let closed = sqlx::query(
            r#"
            UPDATE user_versions
            SET effective_to = now()
            WHERE user_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(user.id().as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to close user version: {error}")))?;

        if closed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user '{}' not found", user.id())));
        }

        sqlx::query(
            r#"
            INSERT INTO user_versions
                (user_id, full_name, role_id, last_certified_by, last_certified_at, effective_from)
            VALUES ($1, $2, $3, $4, $5, now())
            "#,
        )
        .bind(user.id().as_str())
        .bind(user.full_name())
        .bind(user.role_id().as_str())
        .bind(user.last_certified_by())
        .bind(user.last_certified_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert user version: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }

    async fn delete_user(&self, id: &UserId) -> AppResult<()> {
        let closed = sqlx::query(
            r#"
            UPDATE user_versions
            SET effective_to = now()
            WHERE user_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete user: {error}")))?;

        if closed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user '{id}' not found")));
        }
        Ok(())
    }

    async fn count_users(&self) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM user_versions WHERE effective_to IS NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count users: {error}")))
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT role_id, name, description, owner_role_id
            FROM role_versions
            WHERE effective_to IS NULL
            ORDER BY role_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter().map(RoleRow::into_domain).collect()
    }

    async fn find_role(&self, id: &RoleId) -> AppResult<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT role_id, name, description, owner_role_id
            FROM role_versions
            WHERE role_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?;

        row.map(RoleRow::into_domain).transpose()
    }

    async fn insert_role(&self, role: Role) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO role_versions (role_id, name, description, owner_role_id, effective_from)
            VALUES ($1, $2, $3, $4, now())
            "#,
        )
        .bind(role.id().as_str())
        .bind(role.name())
        .bind(role.description())
        .bind(role.owner_role_id().map(RoleId::as_str))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if is_unique_violation(&error) {
                    return Err(AppError::Conflict(format!(
                        "role '{}' already exists",
                        role.id()
                    )));
                }
                Err(AppError::Internal(format!("failed to insert role: {error}")))
            }
        }
    }

    async fn update_role(&self, role: Role) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let closed = sqlx::query(
            r#"
            UPDATE role_versions
            SET effective_to = now()
            WHERE role_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(role.id().as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to close role version: {error}")))?;

        if closed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role '{}' not found", role.id())));
        }

        sqlx::query(
            r#"
            INSERT INTO role_versions (role_id, name, description, owner_role_id, effective_from)
            VALUES ($1, $2, $3, $4, now())
            "#,
        )
        .bind(role.id().as_str())
        .bind(role.name())
        .bind(role.description())
        .bind(role.owner_role_id().map(RoleId::as_str))
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to insert role version: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }

    async fn delete_role(&self, id: &RoleId) -> AppResult<()> {
        let dependent_checks: [(&str, &str); 4] = [
            (
                "SELECT EXISTS(SELECT 1 FROM user_versions WHERE role_id = $1 AND effective_to IS NULL)",
                "is still assigned to users",
            ),
            (
                "SELECT EXISTS(SELECT 1 FROM service_versions WHERE owner_role_id = $1 AND effective_to IS NULL)",
                "still owns services",
            ),
            (
                "SELECT EXISTS(SELECT 1 FROM role_versions WHERE owner_role_id = $1 AND effective_to IS NULL)",
                "still owns roles",
            ),
            (
                "SELECT EXISTS(SELECT 1 FROM grant_versions WHERE role_id = $1 AND effective_to IS NULL)",
                "still holds grants",
            ),
        ];

        for (query, dependency) in dependent_checks {
            let blocked = sqlx::query_scalar::<_, bool>(query)
                .bind(id.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to check role dependents: {error}"))
                })?;
            if blocked {
                return Err(AppError::ReferentialIntegrity(format!(
                    "role '{id}' {dependency}"
                )));
            }
        }

        let closed = sqlx::query(
            r#"
            UPDATE role_versions
            SET effective_to = now()
            WHERE role_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        if closed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role '{id}' not found")));
        }
        Ok(())
    }

    async fn count_roles(&self) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM role_versions WHERE effective_to IS NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count roles: {error}")))
    }

    async fn roles_owned_by(&self, id: &RoleId) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT role_id, name, description, owner_role_id
            FROM role_versions
            WHERE owner_role_id = $1 AND effective_to IS NULL
            ORDER BY role_id
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list owned roles: {error}")))?;

        rows.into_iter().map(RoleRow::into_domain).collect()
    }

    async fn services_owned_by(&self, id: &RoleId) -> AppResult<Vec<Service>> {
        let rows = sqlx::query_as::<_, ServiceRow>(
            r#"
            SELECT service_id, name, description, owner_role_id
            FROM service_versions
            WHERE owner_role_id = $1 AND effective_to IS NULL
            ORDER BY service_id
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list owned services: {error}")))?;

        rows.into_iter().map(ServiceRow::into_domain).collect()
    }

    async fn list_services(&self) -> AppResult<Vec<Service>> {
        let rows = sqlx::query_as::<_, ServiceRow>(
            r#"
            SELECT service_id, name, description, owner_role_id
            FROM service_versions
            WHERE effective_to IS NULL
            ORDER BY service_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list services: {error}")))?;

        rows.into_iter().map(ServiceRow::into_domain).collect()
    }

    async fn find_service(&self, id: &ServiceId) -> AppResult<Option<Service>> {
        let row = sqlx::query_as::<_, ServiceRow>(
            r#"
            SELECT service_id, name, description, owner_role_id
            FROM service_versions
            WHERE service_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find service: {error}")))?;

        row.map(ServiceRow::into_domain).transpose()
    }

    async fn insert_service(&self, service: Service) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO service_versions
                (service_id, name, description, owner_role_id, effective_from)
            VALUES ($1, $2, $3, $4, now())
            "#,
        )
        .bind(service.id().as_str())
        .bind(service.name())
        .bind(service.description())
        .bind(service.owner_role_id().as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if is_unique_violation(&error) {
                    return Err(AppError::Conflict(format!(
                        "service '{}' already exists",
                        service.id()
                    )));
                }
                Err(AppError::Internal(format!(
                    "failed to insert service: {error}"
                )))
            }
        }
    }

    async fn update_service(&self, service: Service) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let closed = sqlx::query(
            r#"
            UPDATE service_versions
            SET effective_to = now()
            WHERE service_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(service.id().as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to close service version: {error}"))
        })?;

        if closed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "service '{}' not found",
                service.id()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO service_versions
                (service_id, name, description, owner_role_id, effective_from)
            VALUES ($1, $2, $3, $4, now())
            "#,
        )
        .bind(service.id().as_str())
        .bind(service.name())
        .bind(service.description())
        .bind(service.owner_role_id().as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to insert service version: {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }

    async fn delete_service(&self, id: &ServiceId) -> AppResult<()> {
        let blocked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM privilege_versions WHERE service_id = $1 AND effective_to IS NULL)",
        )
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to check service dependents: {error}"))
        })?;

        if blocked {
            return Err(AppError::ReferentialIntegrity(format!(
                "service '{id}' still has privileges"
            )));
        }

        let closed = sqlx::query(
            r#"
            UPDATE service_versions
            SET effective_to = now()
            WHERE service_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete service: {error}")))?;

        if closed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("service '{id}' not found")));
        }
        Ok(())
    }

    async fn count_services(&self) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM service_versions WHERE effective_to IS NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count services: {error}")))
    }

    async fn privileges_for_service(&self, id: &ServiceId) -> AppResult<Vec<Privilege>> {
        let rows = sqlx::query_as::<_, PrivilegeRow>(
            r#"
            SELECT privilege_id, service_id, permission_group, summary, credential_storage_method
            FROM privilege_versions
            WHERE service_id = $1 AND effective_to IS NULL
            ORDER BY permission_group, privilege_id
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list service privileges: {error}"))
        })?;

        rows.into_iter().map(PrivilegeRow::into_domain).collect()
    }

    async fn list_privileges(&self) -> AppResult<Vec<Privilege>> {
        let rows = sqlx::query_as::<_, PrivilegeRow>(
            r#"
            SELECT privilege_id, service_id, permission_group, summary, credential_storage_method
            FROM privilege_versions
            WHERE effective_to IS NULL
            ORDER BY privilege_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list privileges: {error}")))?;

        rows.into_iter().map(PrivilegeRow::into_domain).collect()
    }

    async fn find_privilege(&self, id: &PrivilegeId) -> AppResult<Option<Privilege>> {
        let row = sqlx::query_as::<_, PrivilegeRow>(
            r#"
            SELECT privilege_id, service_id, permission_group, summary, credential_storage_method
            FROM privilege_versions
            WHERE privilege_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find privilege: {error}")))?;

        row.map(PrivilegeRow::into_domain).transpose()
    }

    async fn insert_privilege(&self, privilege: Privilege) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO privilege_versions
                (privilege_id, service_id, permission_group, summary, credential_storage_method, effective_from)
            VALUES ($1, $2, $3, $4, $5, now())
            "#,
        )
        .bind(privilege.id().as_str())
        .bind(privilege.service_id().as_str())
        .bind(privilege.permission_group())
        .bind(privilege.summary())
        .bind(privilege.credential_storage_method())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                if is_unique_violation(&error) {
                    return Err(AppError::Conflict(format!(
                        "privilege '{}' already exists",
                        privilege.id()
                    )));
                }
                Err(AppError::Internal(format!(
                    "failed to insert privilege: {error}"
                )))
            }
        }
    }

    async fn update_privilege(&self, privilege: Privilege) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let closed = sqlx::query(
            r#"
            UPDATE privilege_versions
            SET effective_to = now()
            WHERE privilege_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(privilege.id().as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to close privilege version: {error}"))
        })?;

        if closed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "privilege '{}' not found",
                privilege.id()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO privilege_versions
                (privilege_id, service_id, permission_group, summary, credential_storage_method, effective_from)
            VALUES ($1, $2, $3, $4, $5, now())
            "#,
        )
        .bind(privilege.id().as_str())
        .bind(privilege.service_id().as_str())
        .bind(privilege.permission_group())
        .bind(privilege.summary())
        .bind(privilege.credential_storage_method())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to insert privilege version: {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }

    async fn delete_privilege(&self, id: &PrivilegeId) -> AppResult<()> {
        let blocked = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM grant_versions
                WHERE (role_owner_privilege_id = $1 OR service_owner_privilege_id = $1)
                  AND effective_to IS NULL
            )
            "#,
        )
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to check privilege dependents: {error}"))
        })?;

        if blocked {
            return Err(AppError::ReferentialIntegrity(format!(
                "privilege '{id}' is still granted"
            )));
        }

        let closed = sqlx::query(
            r#"
            UPDATE privilege_versions
            SET effective_to = now()
            WHERE privilege_id = $1 AND effective_to IS NULL
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete privilege: {error}")))?;

        if closed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("privilege '{id}' not found")));
        }
        Ok(())
    }

    async fn count_privileges(&self) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM privilege_versions WHERE effective_to IS NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count privileges: {error}")))
    }
}
