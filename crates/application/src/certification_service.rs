use std::collections::HashSet;
use std::sync::Arc;

use recert_core::{AppError, AppResult};
use recert_domain::{Grant, Role, RoleId, Service, ServiceId};
use serde::Serialize;

use crate::directory_ports::DirectoryRepository;
use crate::grant_ports::GrantRepository;

/// A role paired with its certification roll-up.
#[derive(Debug, Clone, Serialize)]
pub struct RoleCertification {
    /// The role.
    pub role: Role,
    /// True when every live grant of the role is attested on the relevant
    /// side(s) and at least one grant exists.
    pub fully_certified: bool,
}

/// A service paired with its certification roll-up.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceCertification {
    /// The service.
    pub service: Service,
    /// True when every live grant against the service's privileges is
    /// attested by the service owner and at least one such grant exists.
    pub fully_certified: bool,
}

/// Application service computing certification roll-ups from live grants.
///
/// These are always computed against current data; the roll-ups are not
/// available as of a past timestamp.
#[derive(Clone)]
pub struct CertificationService {
    directory: Arc<dyn DirectoryRepository>,
    grants: Arc<dyn GrantRepository>,
}

impl CertificationService {
    /// Creates the service from its repositories.
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryRepository>, grants: Arc<dyn GrantRepository>) -> Self {
        Self { directory, grants }
    }

    /// True when every live grant of the role is certified by both owners.
    ///
    /// A role with no live grants is NOT fully certified: there is nothing
    /// to attest, and nothing must not pass vacuously.
    pub async fn is_role_fully_certified(&self, role_id: &RoleId) -> AppResult<bool> {
        self.require_role(role_id).await?;
        let grants = self.grants.grants_for_role(role_id).await?;

        Ok(role_grants_fully_certified(&grants))
    }

    /// True when every live grant whose service-owner privilege belongs to
    /// this service is certified by the service owner. Only the
    /// service-owner side counts here; a service with no such grants is not
    /// fully certified.
    pub async fn is_service_fully_certified(&self, service_id: &ServiceId) -> AppResult<bool> {
        self.directory
            .find_service(service_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("service '{service_id}' not found")))?;

        let privilege_ids: HashSet<String> = self
            .directory
            .privileges_for_service(service_id)
            .await?
            .iter()
            .map(|privilege| privilege.id().as_str().to_owned())
            .collect();

        let grants = self.grants.list_grants().await?;
        let service_grants: Vec<&Grant> = grants
            .iter()
            .filter(|grant| privilege_ids.contains(grant.service_owner().privilege_id.as_str()))
            .collect();

        Ok(!service_grants.is_empty()
            && service_grants
                .iter()
                .all(|grant| grant.service_owner().is_certified))
    }

    /// Every role with its both-sides certification roll-up, ordered by name.
    pub async fn roles_overview(&self) -> AppResult<Vec<RoleCertification>> {
        let mut roles = self.directory.list_roles().await?;
        roles.sort_by(|left, right| left.name().cmp(right.name()));

        let mut overview = Vec::with_capacity(roles.len());
        for role in roles {
            let grants = self.grants.grants_for_role(role.id()).await?;
            overview.push(RoleCertification {
                fully_certified: role_grants_fully_certified(&grants),
                role,
            });
        }

        Ok(overview)
    }

    /// Roles owned by the given role, each with the role-owner-side roll-up
    /// only (that is what this approver is responsible for).
    pub async fn owned_roles(&self, role_id: &RoleId) -> AppResult<Vec<RoleCertification>> {
        self.require_role(role_id).await?;

        let mut owned = self.directory.roles_owned_by(role_id).await?;
        owned.sort_by(|left, right| left.name().cmp(right.name()));

        let mut overview = Vec::with_capacity(owned.len());
        for role in owned {
            let grants = self.grants.grants_for_role(role.id()).await?;
            let fully_certified = !grants.is_empty()
                && grants.iter().all(|grant| grant.role_owner().is_certified);
            overview.push(RoleCertification {
                fully_certified,
                role,
            });
        }

        Ok(overview)
    }

    /// Services owned by the given role, each with the service-owner-side
    /// roll-up.
    pub async fn owned_services(&self, role_id: &RoleId) -> AppResult<Vec<ServiceCertification>> {
        self.require_role(role_id).await?;

        let mut owned = self.directory.services_owned_by(role_id).await?;
        owned.sort_by(|left, right| left.name().cmp(right.name()));

        let mut overview = Vec::with_capacity(owned.len());
        for service in owned {
            let fully_certified = self.is_service_fully_certified(service.id()).await?;
            overview.push(ServiceCertification {
                fully_certified,
                service,
            });
        }

        Ok(overview)
    }

    async fn require_role(&self, role_id: &RoleId) -> AppResult<Role> {
        self.directory
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))
    }
}

fn role_grants_fully_certified(grants: &[Grant]) -> bool {
    !grants.is_empty()
        && grants
            .iter()
            .all(|grant| grant.role_owner().is_certified && grant.service_owner().is_certified)
}
