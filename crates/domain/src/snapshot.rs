//! Point-in-time report rows reconstructed from temporal versions.
//!
//! Snapshot rows are flat projections: every nullable source field is
//! replaced with an empty-string or zero default at composition time so the
//! delta comparison never has to reason about nulls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grant::Grant;
use crate::privilege::Privilege;
use crate::role::Role;
use crate::service::Service;
use crate::user::User;

/// One grant as it existed at a reconstruction instant, with the role and
/// both owners' chosen privilege/service descriptive data flattened in.
///
/// Role owner and service owner may have named different privileges for the
/// same grant, so each side carries its own privilege and service fields;
/// a plain join would conflate them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSnapshot {
    /// Grant identity.
    pub grant_id: i64,

    /// Role holding the grant.
    pub role_id: String,
    /// Role name, the primary report ordering key.
    pub role_name: String,
    /// Role description.
    pub role_description: String,
    /// Owning role of the granted role, empty for top-level roles.
    pub owner_role_id: String,

    /// Privilege named by the role owner.
    pub role_owner_privilege_id: String,
    /// Permission group of that privilege.
    pub role_owner_permission_group: String,
    /// Summary of that privilege.
    pub role_owner_summary: String,
    /// Credential-storage tag of that privilege.
    pub role_owner_credential_storage_method: String,
    /// Service that privilege belongs to.
    pub role_owner_service_id: String,
    /// Name of that service.
    pub role_owner_service_name: String,
    /// Description of that service.
    pub role_owner_service_description: String,
    /// Role owner's access justification.
    pub role_owner_access_justification: String,
    /// Role owner's removal-impact note.
    pub role_owner_removal_impact: String,
    /// Role owner asked for revocation.
    pub role_owner_is_revoked: bool,
    /// Role owner certified during the cycle (cycle-reset, excluded from delta).
    pub role_owner_is_certified: bool,
    /// When the role owner certified.
    pub role_owner_certified_at: Option<DateTime<Utc>>,

    /// Privilege named by the service owner.
    pub service_owner_privilege_id: String,
    /// Permission group of that privilege.
    pub service_owner_permission_group: String,
    /// Summary of that privilege.
    pub service_owner_summary: String,
    /// Credential-storage tag of that privilege.
    pub service_owner_credential_storage_method: String,
    /// Service that privilege belongs to.
    pub service_owner_service_id: String,
    /// Name of that service.
    pub service_owner_service_name: String,
    /// Description of that service.
    pub service_owner_service_description: String,
    /// Service owner's access justification.
    pub service_owner_access_justification: String,
    /// Service owner's removal-impact note.
    pub service_owner_removal_impact: String,
    /// Service owner asked for revocation.
    pub service_owner_is_revoked: bool,
    /// Service owner certified during the cycle (cycle-reset, excluded from delta).
    pub service_owner_is_certified: bool,
    /// When the service owner certified.
    pub service_owner_certified_at: Option<DateTime<Utc>>,

    /// Risk impact score, zero when unassessed.
    pub risk_impact: i32,
    /// Risk likelihood score, zero when unassessed.
    pub risk_likelihood: i32,
    /// Derived impact x likelihood (never stored, excluded from delta).
    pub risk_rating: i32,
    /// Risk assessment notes.
    pub risk_notes: String,
    /// When the risk assessment was recorded.
    pub risk_assessed_at: Option<DateTime<Utc>>,
}

impl GrantSnapshot {
    /// Flattens one grant with its as-of joined role, privileges and
    /// services into a report row.
    #[must_use]
    pub fn compose(
        grant: &Grant,
        role: &Role,
        role_owner_privilege: &Privilege,
        role_owner_service: &Service,
        service_owner_privilege: &Privilege,
        service_owner_service: &Service,
    ) -> Self {
        let role_owner = grant.role_owner();
        let service_owner = grant.service_owner();
        let risk = grant.risk();

        Self {
            grant_id: grant.id().as_i64(),

            role_id: role.id().as_str().to_owned(),
            role_name: role.name().to_owned(),
            role_description: role.description().to_owned(),
            owner_role_id: role
                .owner_role_id()
                .map(|id| id.as_str().to_owned())
                .unwrap_or_default(),

            role_owner_privilege_id: role_owner.privilege_id.as_str().to_owned(),
            role_owner_permission_group: role_owner_privilege.permission_group().to_owned(),
            role_owner_summary: role_owner_privilege.summary().to_owned(),
            role_owner_credential_storage_method: role_owner_privilege
                .credential_storage_method()
                .unwrap_or_default()
                .to_owned(),
            role_owner_service_id: role_owner_service.id().as_str().to_owned(),
            role_owner_service_name: role_owner_service.name().to_owned(),
            role_owner_service_description: role_owner_service.description().to_owned(),
            role_owner_access_justification: role_owner.access_justification.clone(),
            role_owner_removal_impact: role_owner.removal_impact.clone(),
            role_owner_is_revoked: role_owner.is_revoked,
            role_owner_is_certified: role_owner.is_certified,
            role_owner_certified_at: role_owner.certified_at,

            service_owner_privilege_id: service_owner.privilege_id.as_str().to_owned(),
            service_owner_permission_group: service_owner_privilege.permission_group().to_owned(),
            service_owner_summary: service_owner_privilege.summary().to_owned(),
            service_owner_credential_storage_method: service_owner_privilege
                .credential_storage_method()
                .unwrap_or_default()
                .to_owned(),
            service_owner_service_id: service_owner_service.id().as_str().to_owned(),
            service_owner_service_name: service_owner_service.name().to_owned(),
            service_owner_service_description: service_owner_service.description().to_owned(),
            service_owner_access_justification: service_owner.access_justification.clone(),
            service_owner_removal_impact: service_owner.removal_impact.clone(),
            service_owner_is_revoked: service_owner.is_revoked,
            service_owner_is_certified: service_owner.is_certified,
            service_owner_certified_at: service_owner.certified_at,

            risk_impact: risk.impact.unwrap_or(0),
            risk_likelihood: risk.likelihood.unwrap_or(0),
            risk_rating: risk.rating().unwrap_or(0),
            risk_notes: risk.notes.clone(),
            risk_assessed_at: risk.assessed_at,
        }
    }

    /// True when role owner and service owner named different privileges.
    #[must_use]
    pub fn owners_disagree(&self) -> bool {
        self.role_owner_privilege_id != self.service_owner_privilege_id
    }

    /// Equality key for delta reports.
    ///
    /// Covers every field except the two certification flags, which are
    /// reset on every cycle transition and therefore carry no change signal,
    /// and the risk rating, which is derived from impact and likelihood.
    #[must_use]
    pub fn delta_key(&self) -> GrantDeltaKey {
        GrantDeltaKey {
            grant_id: self.grant_id,
            role_id: self.role_id.clone(),
            role_name: self.role_name.clone(),
            role_description: self.role_description.clone(),
            owner_role_id: self.owner_role_id.clone(),

            role_owner_privilege_id: self.role_owner_privilege_id.clone(),
            role_owner_permission_group: self.role_owner_permission_group.clone(),
            role_owner_summary: self.role_owner_summary.clone(),
            role_owner_credential_storage_method: self
                .role_owner_credential_storage_method
                .clone(),
            role_owner_service_id: self.role_owner_service_id.clone(),
            role_owner_service_name: self.role_owner_service_name.clone(),
            role_owner_service_description: self.role_owner_service_description.clone(),
            role_owner_access_justification: self.role_owner_access_justification.clone(),
            role_owner_removal_impact: self.role_owner_removal_impact.clone(),
            role_owner_is_revoked: self.role_owner_is_revoked,
            role_owner_certified_at: self.role_owner_certified_at,

            service_owner_privilege_id: self.service_owner_privilege_id.clone(),
            service_owner_permission_group: self.service_owner_permission_group.clone(),
            service_owner_summary: self.service_owner_summary.clone(),
            service_owner_credential_storage_method: self
                .service_owner_credential_storage_method
                .clone(),
            service_owner_service_id: self.service_owner_service_id.clone(),
            service_owner_service_name: self.service_owner_service_name.clone(),
            service_owner_service_description: self.service_owner_service_description.clone(),
            service_owner_access_justification: self.service_owner_access_justification.clone(),
            service_owner_removal_impact: self.service_owner_removal_impact.clone(),
            service_owner_is_revoked: self.service_owner_is_revoked,
            service_owner_certified_at: self.service_owner_certified_at,

            risk_impact: self.risk_impact,
            risk_likelihood: self.risk_likelihood,
            risk_notes: self.risk_notes.clone(),
            risk_assessed_at: self.risk_assessed_at,
        }
    }
}

/// Owned comparison key produced by [`GrantSnapshot::delta_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrantDeltaKey {
    grant_id: i64,
    role_id: String,
    role_name: String,
    role_description: String,
    owner_role_id: String,

    role_owner_privilege_id: String,
    role_owner_permission_group: String,
    role_owner_summary: String,
    role_owner_credential_storage_method: String,
    role_owner_service_id: String,
    role_owner_service_name: String,
    role_owner_service_description: String,
    role_owner_access_justification: String,
    role_owner_removal_impact: String,
    role_owner_is_revoked: bool,
    role_owner_certified_at: Option<DateTime<Utc>>,

    service_owner_privilege_id: String,
    service_owner_permission_group: String,
    service_owner_summary: String,
    service_owner_credential_storage_method: String,
    service_owner_service_id: String,
    service_owner_service_name: String,
    service_owner_service_description: String,
    service_owner_access_justification: String,
    service_owner_removal_impact: String,
    service_owner_is_revoked: bool,
    service_owner_certified_at: Option<DateTime<Utc>>,

    risk_impact: i32,
    risk_likelihood: i32,
    risk_notes: String,
    risk_assessed_at: Option<DateTime<Utc>>,
}

/// One user joined with their role as of a reconstruction instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserSnapshot {
    /// User identity.
    pub user_id: String,
    /// User full name.
    pub user_full_name: String,
    /// Role the user occupied.
    pub role_id: String,
    /// Name of that role.
    pub role_name: String,
    /// Description of that role.
    pub role_description: String,
    /// Owning role of that role, empty for top-level roles.
    pub owner_role_id: String,
    /// Who last attested the user's role assignment.
    pub last_certified_by: String,
    /// When the assignment was last attested.
    pub last_certified_at: Option<DateTime<Utc>>,
}

impl UserSnapshot {
    /// Flattens one user with their as-of joined role into a report row.
    #[must_use]
    pub fn compose(user: &User, role: &Role) -> Self {
        Self {
            user_id: user.id().as_str().to_owned(),
            user_full_name: user.full_name().to_owned(),
            role_id: role.id().as_str().to_owned(),
            role_name: role.name().to_owned(),
            role_description: role.description().to_owned(),
            owner_role_id: role
                .owner_role_id()
                .map(|id| id.as_str().to_owned())
                .unwrap_or_default(),
            last_certified_by: user.last_certified_by().unwrap_or_default().to_owned(),
            last_certified_at: user.last_certified_at(),
        }
    }
}

/// Descriptive fields of a privilege, used for choice lists and the
/// previous-cycle comparison inside [`RoleSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeSummary {
    /// Privilege identity.
    pub privilege_id: String,
    /// Permission group label.
    pub permission_group: String,
    /// Human-readable summary.
    pub summary: String,
    /// Credential-storage tag.
    pub credential_storage_method: String,
}

impl PrivilegeSummary {
    /// Projects the descriptive fields of a privilege.
    #[must_use]
    pub fn from_privilege(privilege: &Privilege) -> Self {
        Self {
            privilege_id: privilege.id().as_str().to_owned(),
            permission_group: privilege.permission_group().to_owned(),
            summary: privilege.summary().to_owned(),
            credential_storage_method: privilege
                .credential_storage_method()
                .unwrap_or_default()
                .to_owned(),
        }
    }
}

/// One grant of a role, viewed from the role-owner side, with the service it
/// lands on, the previous cycle's choice and the service's full privilege
/// menu for re-attestation UIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePrivView {
    /// Grant identity.
    pub grant_id: i64,
    /// Service the role-owner-chosen privilege belongs to.
    pub service_id: String,
    /// Name of that service.
    pub service_name: String,
    /// Description of that service.
    pub service_description: String,
    /// Role-owner-chosen privilege.
    pub privilege: PrivilegeSummary,
    /// Role owner's access justification.
    pub access_justification: String,
    /// Role owner's removal-impact note.
    pub removal_impact: String,
    /// Role owner asked for revocation.
    pub is_revoked: bool,
    /// Role owner certified during the current cycle.
    pub is_certified: bool,
    /// Privilege recorded at the previous cycle's end, `None` when no prior
    /// closed cycle exists or the grant did not exist then.
    pub previous_privilege: Option<PrivilegeSummary>,
    /// Every privilege available on the service, for choice UIs.
    pub available_privileges: Vec<PrivilegeSummary>,
}

/// A single role with its grants expanded for the re-attestation screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSnapshot {
    /// Role identity.
    pub role_id: String,
    /// Role name.
    pub role_name: String,
    /// Role description.
    pub role_description: String,
    /// Owning role, empty for top-level roles.
    pub owner_role_id: String,
    /// One entry per grant held by the role, ordered by service name.
    pub service_privs: Vec<ServicePrivView>,
}

#[cfg(test)]
mod tests {
    use super::GrantSnapshot;
    use chrono::{TimeZone, Utc};

    fn sample_snapshot() -> GrantSnapshot {
        GrantSnapshot {
            grant_id: 7,
            role_id: "backupOperator".to_owned(),
            role_name: "Backup Operator".to_owned(),
            role_description: "runs nightly backups".to_owned(),
            owner_role_id: "itManager".to_owned(),
            role_owner_privilege_id: "mf-admin".to_owned(),
            role_owner_permission_group: "Administrators".to_owned(),
            role_owner_summary: "full mainframe admin".to_owned(),
            role_owner_credential_storage_method: "vault".to_owned(),
            role_owner_service_id: "mainframe".to_owned(),
            role_owner_service_name: "Mainframe".to_owned(),
            role_owner_service_description: "core ledger host".to_owned(),
            role_owner_access_justification: "needs tape control".to_owned(),
            role_owner_removal_impact: "backups stop".to_owned(),
            role_owner_is_revoked: false,
            role_owner_is_certified: true,
            role_owner_certified_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().unwrap_or_default()),
            service_owner_privilege_id: "mf-admin".to_owned(),
            service_owner_permission_group: "Administrators".to_owned(),
            service_owner_summary: "full mainframe admin".to_owned(),
            service_owner_credential_storage_method: "vault".to_owned(),
            service_owner_service_id: "mainframe".to_owned(),
            service_owner_service_name: "Mainframe".to_owned(),
            service_owner_service_description: "core ledger host".to_owned(),
            service_owner_access_justification: "agreed".to_owned(),
            service_owner_removal_impact: "backups stop".to_owned(),
            service_owner_is_revoked: false,
            service_owner_is_certified: true,
            service_owner_certified_at: None,
            risk_impact: 3,
            risk_likelihood: 2,
            risk_rating: 6,
            risk_notes: String::new(),
            risk_assessed_at: None,
        }
    }

    #[test]
    fn certification_flags_do_not_affect_the_delta_key() {
        let certified = sample_snapshot();
        let mut reset = certified.clone();
        reset.role_owner_is_certified = false;
        reset.service_owner_is_certified = false;

        assert_eq!(certified.delta_key(), reset.delta_key());
    }

    #[test]
    fn derived_risk_rating_does_not_affect_the_delta_key() {
        let left = sample_snapshot();
        let mut right = left.clone();
        right.risk_rating = 0;

        assert_eq!(left.delta_key(), right.delta_key());
    }

    #[test]
    fn risk_scores_do_affect_the_delta_key() {
        let left = sample_snapshot();
        let mut right = left.clone();
        right.risk_impact = 5;

        assert_ne!(left.delta_key(), right.delta_key());
    }

    #[test]
    fn service_owner_justification_affects_the_delta_key() {
        let left = sample_snapshot();
        let mut right = left.clone();
        right.service_owner_access_justification = "disputed".to_owned();

        assert_ne!(left.delta_key(), right.delta_key());
    }

    #[test]
    fn role_owner_justification_affects_the_delta_key() {
        let left = sample_snapshot();
        let mut right = left.clone();
        right.role_owner_access_justification = "changed".to_owned();

        assert_ne!(left.delta_key(), right.delta_key());
    }

    #[test]
    fn matching_privileges_are_not_a_disagreement() {
        let snapshot = sample_snapshot();
        assert!(!snapshot.owners_disagree());

        let mut disagreeing = snapshot;
        disagreeing.service_owner_privilege_id = "mf-read".to_owned();
        assert!(disagreeing.owners_disagree());
    }
}
