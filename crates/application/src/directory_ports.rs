use async_trait::async_trait;
use recert_core::AppResult;
use recert_domain::{Privilege, PrivilegeId, Role, RoleId, Service, ServiceId, User, UserId};

/// Repository port for the directory entities: users, roles, services and
/// privileges.
///
/// Every write records a new temporal version of the affected row so the
/// temporal store can answer as-of queries later. Deletes blocked by a
/// dependent row fail with `AppError::ReferentialIntegrity` naming the
/// likely dependent relation.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Lists all users.
    async fn list_users(&self) -> AppResult<Vec<User>>;

    /// Looks up a user by id.
    async fn find_user(&self, id: &UserId) -> AppResult<Option<User>>;

    /// Inserts a user; duplicate ids are a conflict.
    async fn insert_user(&self, user: User) -> AppResult<()>;

    /// Replaces a user row; unknown ids are not found.
    async fn update_user(&self, user: User) -> AppResult<()>;

    /// Deletes a user. Users have no dependents, so this always succeeds
    /// for a known id.
    async fn delete_user(&self, id: &UserId) -> AppResult<()>;

    /// Returns the user population size.
    async fn count_users(&self) -> AppResult<i64>;

    /// Lists all roles.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;

    /// Looks up a role by id.
    async fn find_role(&self, id: &RoleId) -> AppResult<Option<Role>>;

    /// Inserts a role; duplicate ids are a conflict.
    async fn insert_role(&self, role: Role) -> AppResult<()>;

    /// Replaces a role row; unknown ids are not found.
    async fn update_role(&self, role: Role) -> AppResult<()>;

    /// Deletes a role; fails with referential integrity while any user,
    /// service, role or grant still references it.
    async fn delete_role(&self, id: &RoleId) -> AppResult<()>;

    /// Returns the role population size.
    async fn count_roles(&self) -> AppResult<i64>;

    /// Lists the roles whose owner is the given role.
    async fn roles_owned_by(&self, id: &RoleId) -> AppResult<Vec<Role>>;

    /// Lists the services whose owner is the given role.
    async fn services_owned_by(&self, id: &RoleId) -> AppResult<Vec<Service>>;

    /// Lists all services.
    async fn list_services(&self) -> AppResult<Vec<Service>>;

    /// Looks up a service by id.
    async fn find_service(&self, id: &ServiceId) -> AppResult<Option<Service>>;

    /// Inserts a service; duplicate ids are a conflict.
    async fn insert_service(&self, service: Service) -> AppResult<()>;

    /// Replaces a service row; unknown ids are not found.
    async fn update_service(&self, service: Service) -> AppResult<()>;

    /// Deletes a service; fails with referential integrity while any
    /// privilege still references it.
    async fn delete_service(&self, id: &ServiceId) -> AppResult<()>;

    /// Returns the service population size.
    async fn count_services(&self) -> AppResult<i64>;

    /// Lists the privileges belonging to a service.
    async fn privileges_for_service(&self, id: &ServiceId) -> AppResult<Vec<Privilege>>;

    /// Lists all privileges.
    async fn list_privileges(&self) -> AppResult<Vec<Privilege>>;

    /// Looks up a privilege by id.
    async fn find_privilege(&self, id: &PrivilegeId) -> AppResult<Option<Privilege>>;

    /// Inserts a privilege; duplicate ids are a conflict.
    async fn insert_privilege(&self, privilege: Privilege) -> AppResult<()>;

    /// Replaces a privilege row; unknown ids are not found.
    async fn update_privilege(&self, privilege: Privilege) -> AppResult<()>;

    /// Deletes a privilege; fails with referential integrity while any
    /// grant still references it.
    async fn delete_privilege(&self, id: &PrivilegeId) -> AppResult<()>;

    /// Returns the privilege population size.
    async fn count_privileges(&self) -> AppResult<i64>;
}
