use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recert_core::AppResult;
use recert_domain::{Grant, Privilege, Role, Service, User};

/// Read-only port over the store's temporal (system-versioned) tables.
///
/// For any timestamp each method returns the version of each row that was
/// effective at that instant: created at-or-before it, and either never
/// superseded or superseded strictly after it. Rows that did not exist yet,
/// or had been deleted, are absent.
#[async_trait]
pub trait TemporalStore: Send + Sync {
    /// Users effective at the instant.
    async fn users_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<User>>;

    /// Roles effective at the instant.
    async fn roles_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Role>>;

    /// Services effective at the instant.
    async fn services_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Service>>;

    /// Privileges effective at the instant.
    async fn privileges_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Privilege>>;

    /// Grants effective at the instant.
    async fn grants_as_of(&self, at: DateTime<Utc>) -> AppResult<Vec<Grant>>;
}
