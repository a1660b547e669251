use async_trait::async_trait;
use recert_core::AppResult;
use recert_domain::{Grant, GrantId, GrantInput, RoleId};

/// Repository port for grants (role-privilege links).
///
/// Inserts and updates enforce the two per-role uniqueness invariants:
/// `(role, role-owner privilege)` and `(role, service-owner privilege)` must
/// each be unique across grants, failing with `AppError::Conflict`. Every
/// write records a new temporal version. Grant deletion is always permitted.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Lists all grants.
    async fn list_grants(&self) -> AppResult<Vec<Grant>>;

    /// Lists the grants held by a role.
    async fn grants_for_role(&self, role_id: &RoleId) -> AppResult<Vec<Grant>>;

    /// Looks up a grant by id.
    async fn find_grant(&self, id: GrantId) -> AppResult<Option<Grant>>;

    /// Inserts a grant, assigning the next sequential id.
    async fn insert_grant(&self, input: GrantInput) -> AppResult<Grant>;

    /// Replaces a grant row; unknown ids are not found.
    async fn update_grant(&self, grant: Grant) -> AppResult<Grant>;

    /// Deletes a grant.
    async fn delete_grant(&self, id: GrantId) -> AppResult<()>;

    /// Returns the grant population size.
    async fn count_grants(&self) -> AppResult<i64>;
}
