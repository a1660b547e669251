use std::sync::Arc;

use chrono::Utc;
use recert_core::{AppError, AppResult};
use recert_domain::{
    Grant, GrantId, GrantInput, OwnerAttestation, Privilege, PrivilegeId, RiskAssessment, Role,
    RoleId, Service, ServiceId, User, UserId,
};

use crate::directory_ports::DirectoryRepository;
use crate::grant_ports::GrantRepository;

/// Application service for directory and grant CRUD.
///
/// References are checked before writes so a dangling reference surfaces as
/// a validation error naming what is missing; delete-time dependency
/// violations come back from the repositories as referential-integrity
/// errors.
#[derive(Clone)]
pub struct DirectoryService {
    directory: Arc<dyn DirectoryRepository>,
    grants: Arc<dyn GrantRepository>,
}

impl DirectoryService {
    /// Creates the service from its repositories.
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryRepository>, grants: Arc<dyn GrantRepository>) -> Self {
        Self { directory, grants }
    }

    // Users ----------------------------------------------------------------

    /// Lists all users.
    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.directory.list_users().await
    }

    /// Returns one user by id.
    pub async fn get_user(&self, id: &UserId) -> AppResult<User> {
        self.directory
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{id}' not found")))
    }

    /// Creates a user after checking the referenced role exists.
    pub async fn create_user(&self, user: User) -> AppResult<User> {
        self.require_role_exists(user.role_id()).await?;
        self.directory.insert_user(user.clone()).await?;
        Ok(user)
    }

    /// Replaces a user after checking the referenced role exists.
    pub async fn update_user(&self, user: User) -> AppResult<User> {
        self.require_role_exists(user.role_id()).await?;
        self.directory.update_user(user.clone()).await?;
        Ok(user)
    }

    /// Deletes a user.
    pub async fn delete_user(&self, id: &UserId) -> AppResult<()> {
        self.directory.delete_user(id).await
    }

    // Roles ----------------------------------------------------------------

    /// Lists all roles.
    pub async fn list_roles(&self) -> AppResult<Vec<Role>> {
        self.directory.list_roles().await
    }

    /// Returns one role by id.
    pub async fn get_role(&self, id: &RoleId) -> AppResult<Role> {
        self.directory
            .find_role(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{id}' not found")))
    }

    /// Creates a role after checking any owning role exists.
    pub async fn create_role(&self, role: Role) -> AppResult<Role> {
        if let Some(owner) = role.owner_role_id() {
            self.require_role_exists(owner).await?;
        }
        self.directory.insert_role(role.clone()).await?;
        Ok(role)
    }

    /// Replaces a role after checking any owning role exists.
    pub async fn update_role(&self, role: Role) -> AppResult<Role> {
        if let Some(owner) = role.owner_role_id() {
            self.require_role_exists(owner).await?;
        }
        self.directory.update_role(role.clone()).await?;
        Ok(role)
    }

    /// Deletes a role; blocked while users, services, roles or grants still
    /// reference it.
    pub async fn delete_role(&self, id: &RoleId) -> AppResult<()> {
        self.directory.delete_role(id).await
    }

    // Services -------------------------------------------------------------

    /// Lists all services.
    pub async fn list_services(&self) -> AppResult<Vec<Service>> {
        self.directory.list_services().await
    }

    /// Returns one service by id.
    pub async fn get_service(&self, id: &ServiceId) -> AppResult<Service> {
        self.directory
            .find_service(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("service '{id}' not found")))
    }

    /// Creates a service after checking the owning role exists.
    pub async fn create_service(&self, service: Service) -> AppResult<Service> {
        self.require_role_exists(service.owner_role_id()).await?;
        self.directory.insert_service(service.clone()).await?;
        Ok(service)
    }

    /// Replaces a service after checking the owning role exists.
    pub async fn update_service(&self, service: Service) -> AppResult<Service> {
        self.require_role_exists(service.owner_role_id()).await?;
        self.directory.update_service(service.clone()).await?;
        Ok(service)
    }

    /// Deletes a service; blocked while privileges still reference it.
    pub async fn delete_service(&self, id: &ServiceId) -> AppResult<()> {
        self.directory.delete_service(id).await
    }

    /// Lists the privileges belonging to a service.
    pub async fn service_privileges(&self, id: &ServiceId) -> AppResult<Vec<Privilege>> {
        self.get_service(id).await?;
        self.directory.privileges_for_service(id).await
    }

    // Privileges -----------------------------------------------------------

    /// Lists all privileges.
    pub async fn list_privileges(&self) -> AppResult<Vec<Privilege>> {
        self.directory.list_privileges().await
    }

    /// Returns one privilege by id.
    pub async fn get_privilege(&self, id: &PrivilegeId) -> AppResult<Privilege> {
        self.directory
            .find_privilege(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("privilege '{id}' not found")))
    }

    /// Creates a privilege after checking the owning service exists.
    pub async fn create_privilege(&self, privilege: Privilege) -> AppResult<Privilege> {
        self.require_service_exists(privilege.service_id()).await?;
        self.directory.insert_privilege(privilege.clone()).await?;
        Ok(privilege)
    }

    /// Replaces a privilege after checking the owning service exists.
    pub async fn update_privilege(&self, privilege: Privilege) -> AppResult<Privilege> {
        self.require_service_exists(privilege.service_id()).await?;
        self.directory.update_privilege(privilege.clone()).await?;
        Ok(privilege)
    }

    /// Deletes a privilege; blocked while grants still reference it.
    pub async fn delete_privilege(&self, id: &PrivilegeId) -> AppResult<()> {
        self.directory.delete_privilege(id).await
    }

    // Grants ---------------------------------------------------------------

    /// Lists all grants.
    pub async fn list_grants(&self) -> AppResult<Vec<Grant>> {
        self.grants.list_grants().await
    }

    /// Lists the grants held by a role.
    pub async fn grants_for_role(&self, role_id: &RoleId) -> AppResult<Vec<Grant>> {
        self.require_role_exists(role_id).await?;
        self.grants.grants_for_role(role_id).await
    }

    /// Returns one grant by id.
    pub async fn get_grant(&self, id: GrantId) -> AppResult<Grant> {
        self.grants
            .find_grant(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("grant '{id}' not found")))
    }

    /// Creates a grant after checking the role and both named privileges
    /// exist. The repository enforces the per-role uniqueness pairs.
    pub async fn create_grant(&self, input: GrantInput) -> AppResult<Grant> {
        self.require_role_exists(&input.role_id).await?;
        self.require_privilege_exists(&input.role_owner.privilege_id)
            .await?;
        self.require_privilege_exists(&input.service_owner.privilege_id)
            .await?;

        self.grants.insert_grant(input).await
    }

    /// Replaces the mutable sides of a grant.
    ///
    /// When a certification or assessment flag turns true and the caller
    /// supplied no timestamp, the current instant is stamped in.
    pub async fn update_grant(
        &self,
        id: GrantId,
        mut role_owner: OwnerAttestation,
        mut service_owner: OwnerAttestation,
        mut risk: RiskAssessment,
    ) -> AppResult<Grant> {
        let existing = self.get_grant(id).await?;

        self.require_privilege_exists(&role_owner.privilege_id)
            .await?;
        self.require_privilege_exists(&service_owner.privilege_id)
            .await?;

        let now = Utc::now();
        if role_owner.is_certified && role_owner.certified_at.is_none() {
            role_owner.certified_at = Some(now);
        }
        if service_owner.is_certified && service_owner.certified_at.is_none() {
            service_owner.certified_at = Some(now);
        }
        if risk.is_assessed && risk.assessed_at.is_none() {
            risk.assessed_at = Some(now);
        }

        self.grants
            .update_grant(existing.with_update(role_owner, service_owner, risk))
            .await
    }

    /// Deletes a grant. Always permitted for a known id.
    pub async fn delete_grant(&self, id: GrantId) -> AppResult<()> {
        self.get_grant(id).await?;
        self.grants.delete_grant(id).await
    }

    // ----------------------------------------------------------------------

    async fn require_role_exists(&self, id: &RoleId) -> AppResult<()> {
        if self.directory.find_role(id).await?.is_none() {
            return Err(AppError::Validation(format!(
                "referenced role '{id}' does not exist"
            )));
        }
        Ok(())
    }

    async fn require_service_exists(&self, id: &ServiceId) -> AppResult<()> {
        if self.directory.find_service(id).await?.is_none() {
            return Err(AppError::Validation(format!(
                "referenced service '{id}' does not exist"
            )));
        }
        Ok(())
    }

    async fn require_privilege_exists(&self, id: &PrivilegeId) -> AppResult<()> {
        if self.directory.find_privilege(id).await?.is_none() {
            return Err(AppError::Validation(format!(
                "referenced privilege '{id}' does not exist"
            )));
        }
        Ok(())
    }
}
