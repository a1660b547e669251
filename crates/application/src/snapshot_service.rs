use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use recert_core::{AppError, AppResult};
use recert_domain::{
    Grant, GrantSnapshot, Privilege, PrivilegeSummary, Role, RoleId, RoleSnapshot, Service,
    ServicePrivView, UserSnapshot,
};
use serde::Serialize;

use crate::cycle_service::CycleService;
use crate::temporal_ports::TemporalStore;

/// A role with its point-in-time grant rows, for risk-assessment reports.
#[derive(Debug, Clone, Serialize)]
pub struct RoleRiskAssessment {
    /// The role as of the resolved instant.
    pub role: Role,
    /// The role's grant snapshot rows as of the same instant.
    pub grants: Vec<GrantSnapshot>,
}

/// Application service reconstructing point-in-time snapshots and computing
/// differences between them.
///
/// Reconstruction composes as-of reads across the five entity populations
/// and joins them in memory; a grant whose references dangle at the chosen
/// instant is dropped, matching inner-join semantics.
#[derive(Clone)]
pub struct SnapshotService {
    temporal: Arc<dyn TemporalStore>,
    cycle_service: CycleService,
}

impl SnapshotService {
    /// Creates the service from the temporal store and the cycle manager.
    #[must_use]
    pub fn new(temporal: Arc<dyn TemporalStore>, cycle_service: CycleService) -> Self {
        Self {
            temporal,
            cycle_service,
        }
    }

    /// Rebuilds every grant row as it existed at the instant.
    ///
    /// Ordered by role name ascending with grant id as the tiebreak so two
    /// reconstructions of the same instant always agree row-for-row.
    pub async fn grant_snapshots_at(&self, at: DateTime<Utc>) -> AppResult<Vec<GrantSnapshot>> {
        let grants = self.temporal.grants_as_of(at).await?;
        let roles = index_roles(self.temporal.roles_as_of(at).await?);
        let services = index_services(self.temporal.services_as_of(at).await?);
        let privileges = index_privileges(self.temporal.privileges_as_of(at).await?);

        let mut rows: Vec<GrantSnapshot> = grants
            .iter()
            .filter_map(|grant| compose_row(grant, &roles, &services, &privileges))
            .collect();

        rows.sort_by(|left, right| {
            left.role_name
                .cmp(&right.role_name)
                .then(left.grant_id.cmp(&right.grant_id))
        });

        Ok(rows)
    }

    /// Rebuilds every user row joined with their role as of the instant.
    pub async fn user_snapshots_at(&self, at: DateTime<Utc>) -> AppResult<Vec<UserSnapshot>> {
        let users = self.temporal.users_as_of(at).await?;
        let roles = index_roles(self.temporal.roles_as_of(at).await?);

        let mut rows: Vec<UserSnapshot> = users
            .iter()
            .filter_map(|user| {
                roles
                    .get(user.role_id().as_str())
                    .map(|role| UserSnapshot::compose(user, role))
            })
            .collect();

        rows.sort_by(|left, right| {
            left.role_name
                .cmp(&right.role_name)
                .then(left.user_id.cmp(&right.user_id))
        });

        Ok(rows)
    }

    /// Rebuilds one role's re-attestation view as of the instant: each grant
    /// with its service, the full privilege menu of that service, and the
    /// privilege recorded at the previous cycle's end (when one exists).
    pub async fn role_detail_at(
        &self,
        role_id: &RoleId,
        at: DateTime<Utc>,
    ) -> AppResult<RoleSnapshot> {
        let roles = self.temporal.roles_as_of(at).await?;
        let role = roles
            .iter()
            .find(|role| role.id() == role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))?;

        let services = index_services(self.temporal.services_as_of(at).await?);
        let privileges_rows = self.temporal.privileges_as_of(at).await?;
        let privileges = index_privileges(privileges_rows.clone());
        let grants = self.temporal.grants_as_of(at).await?;

        // Per-service privilege menus, ordered by permission group.
        let mut menus: HashMap<String, Vec<PrivilegeSummary>> = HashMap::new();
        for privilege in &privileges_rows {
            menus
                .entry(privilege.service_id().as_str().to_owned())
                .or_default()
                .push(PrivilegeSummary::from_privilege(privilege));
        }
        for menu in menus.values_mut() {
            menu.sort_by(|left, right| left.permission_group.cmp(&right.permission_group));
        }

        let previous = self.previous_cycle_privileges().await?;

        let mut service_privs = Vec::new();
        for grant in grants.iter().filter(|grant| grant.role_id() == role_id) {
            let attestation = grant.role_owner();
            let Some(privilege) = privileges.get(attestation.privilege_id.as_str()) else {
                continue;
            };
            let Some(service) = services.get(privilege.service_id().as_str()) else {
                continue;
            };

            service_privs.push(ServicePrivView {
                grant_id: grant.id().as_i64(),
                service_id: service.id().as_str().to_owned(),
                service_name: service.name().to_owned(),
                service_description: service.description().to_owned(),
                privilege: PrivilegeSummary::from_privilege(privilege),
                access_justification: attestation.access_justification.clone(),
                removal_impact: attestation.removal_impact.clone(),
                is_revoked: attestation.is_revoked,
                is_certified: attestation.is_certified,
                previous_privilege: previous
                    .as_ref()
                    .and_then(|lookup| lookup.get(&grant.id().as_i64()).cloned()),
                available_privileges: menus
                    .get(service.id().as_str())
                    .cloned()
                    .unwrap_or_default(),
            });
        }

        service_privs.sort_by(|left, right| {
            left.service_name
                .cmp(&right.service_name)
                .then(left.grant_id.cmp(&right.grant_id))
        });

        Ok(RoleSnapshot {
            role_id: role.id().as_str().to_owned(),
            role_name: role.name().to_owned(),
            role_description: role.description().to_owned(),
            owner_role_id: role
                .owner_role_id()
                .map(|id| id.as_str().to_owned())
                .unwrap_or_default(),
            service_privs,
        })
    }

    /// Resolves a cycle offset and rebuilds one role's grant rows as of it.
    pub async fn role_risk_assessment_at(
        &self,
        role_id: &RoleId,
        offset: i64,
    ) -> AppResult<RoleRiskAssessment> {
        let at = self.cycle_service.resolve_offset_to_timestamp(offset).await?;

        let role = self
            .temporal
            .roles_as_of(at)
            .await?
            .into_iter()
            .find(|role| role.id() == role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))?;

        let grants = self
            .grant_snapshots_at(at)
            .await?
            .into_iter()
            .filter(|row| row.role_id == role_id.as_str())
            .collect();

        Ok(RoleRiskAssessment { role, grants })
    }

    /// Filters a snapshot to the rows where role owner and service owner
    /// named different privileges -- the conflicts needing resolution.
    #[must_use]
    pub fn disagreements(&self, snapshot: Vec<GrantSnapshot>) -> Vec<GrantSnapshot> {
        snapshot
            .into_iter()
            .filter(GrantSnapshot::owners_disagree)
            .collect()
    }

    /// Set difference `kept \ removed` under the delta-key equality, which
    /// ignores the cycle-reset certification flags and the derived risk
    /// rating. Direction is the caller's: this is not a symmetric difference.
    #[must_use]
    pub fn delta(
        &self,
        kept: Vec<GrantSnapshot>,
        removed: &[GrantSnapshot],
    ) -> Vec<GrantSnapshot> {
        let removed_keys: HashSet<_> = removed.iter().map(GrantSnapshot::delta_key).collect();

        kept.into_iter()
            .filter(|row| !removed_keys.contains(&row.delta_key()))
            .collect()
    }

    /// Set difference `kept \ removed` for user rows, comparing every field.
    #[must_use]
    pub fn user_delta(
        &self,
        kept: Vec<UserSnapshot>,
        removed: &[UserSnapshot],
    ) -> Vec<UserSnapshot> {
        let removed_keys: HashSet<&UserSnapshot> = removed.iter().collect();

        kept.into_iter()
            .filter(|row| !removed_keys.contains(row))
            .collect()
    }

    /// Validates and orders a base/delta timestamp pair: identical instants
    /// are rejected, a reversed pair is swapped so base < delta.
    pub fn normalize_range(
        &self,
        base: DateTime<Utc>,
        delta: DateTime<Utc>,
    ) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
        if base == delta {
            return Err(AppError::Validation(
                "base and delta timestamps are identical".to_owned(),
            ));
        }

        if base > delta {
            return Ok((delta, base));
        }

        Ok((base, delta))
    }

    /// Grant rows that are present at the later instant but have no equal
    /// row at the earlier one: the role-oriented delta report.
    pub async fn grant_delta_between(
        &self,
        base: DateTime<Utc>,
        delta: DateTime<Utc>,
    ) -> AppResult<Vec<GrantSnapshot>> {
        let (base, delta) = self.normalize_range(base, delta)?;
        let base_rows = self.grant_snapshots_at(base).await?;
        let delta_rows = self.grant_snapshots_at(delta).await?;

        Ok(self.delta(delta_rows, &base_rows))
    }

    /// User rows that were present at the earlier instant but have no equal
    /// row at the later one: the user-oriented delta report.
    pub async fn user_delta_between(
        &self,
        base: DateTime<Utc>,
        delta: DateTime<Utc>,
    ) -> AppResult<Vec<UserSnapshot>> {
        let (base, delta) = self.normalize_range(base, delta)?;
        let base_rows = self.user_snapshots_at(base).await?;
        let delta_rows = self.user_snapshots_at(delta).await?;

        Ok(self.user_delta(base_rows, &delta_rows))
    }

    /// Privilege chosen per grant as of the previous cycle's end, `None`
    /// when no prior closed cycle exists.
    async fn previous_cycle_privileges(
        &self,
    ) -> AppResult<Option<HashMap<i64, PrivilegeSummary>>> {
        let previous_end = match self.cycle_service.resolve_offset_to_timestamp(1).await {
            Ok(timestamp) => timestamp,
            Err(AppError::NotFound(_)) => return Ok(None),
            Err(error) => return Err(error),
        };

        let privileges = index_privileges(self.temporal.privileges_as_of(previous_end).await?);
        let grants = self.temporal.grants_as_of(previous_end).await?;

        let mut lookup = HashMap::new();
        for grant in &grants {
            if let Some(privilege) = privileges.get(grant.role_owner().privilege_id.as_str()) {
                lookup.insert(
                    grant.id().as_i64(),
                    PrivilegeSummary::from_privilege(privilege),
                );
            }
        }

        Ok(Some(lookup))
    }
}

fn index_roles(roles: Vec<Role>) -> HashMap<String, Role> {
    roles
        .into_iter()
        .map(|role| (role.id().as_str().to_owned(), role))
        .collect()
}

fn index_services(services: Vec<Service>) -> HashMap<String, Service> {
    services
        .into_iter()
        .map(|service| (service.id().as_str().to_owned(), service))
        .collect()
}

fn index_privileges(privileges: Vec<Privilege>) -> HashMap<String, Privilege> {
    privileges
        .into_iter()
        .map(|privilege| (privilege.id().as_str().to_owned(), privilege))
        .collect()
}

fn compose_row(
    grant: &Grant,
    roles: &HashMap<String, Role>,
    services: &HashMap<String, Service>,
    privileges: &HashMap<String, Privilege>,
) -> Option<GrantSnapshot> {
    let role = roles.get(grant.role_id().as_str())?;

    let role_owner_privilege = privileges.get(grant.role_owner().privilege_id.as_str())?;
    let role_owner_service = services.get(role_owner_privilege.service_id().as_str())?;

    let service_owner_privilege = privileges.get(grant.service_owner().privilege_id.as_str())?;
    let service_owner_service = services.get(service_owner_privilege.service_id().as_str())?;

    Some(GrantSnapshot::compose(
        grant,
        role,
        role_owner_privilege,
        role_owner_service,
        service_owner_privilege,
        service_owner_service,
    ))
}

#[cfg(test)]
mod tests;
