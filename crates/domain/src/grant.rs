//! Grant entity: one role-privilege link, the unit of access being certified.

use chrono::{DateTime, Utc};
use recert_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::privilege::PrivilegeId;
use crate::role::RoleId;

/// Sequential identifier assigned to a grant by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantId(i64);

impl GrantId {
    /// Wraps a store-assigned sequential identifier.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for GrantId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// One approver side's view of a grant. Role owner and service owner each
/// record one of these independently; they may legitimately name different
/// privileges for the same grant during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerAttestation {
    /// Privilege this approver says applies.
    pub privilege_id: PrivilegeId,
    /// Why the role needs this access.
    pub access_justification: String,
    /// What breaks if the access is removed.
    pub removal_impact: String,
    /// Approver asked for the access to be revoked.
    pub is_revoked: bool,
    /// Approver attested the grant during the current cycle.
    pub is_certified: bool,
    /// When the attestation was recorded.
    pub certified_at: Option<DateTime<Utc>>,
}

impl OwnerAttestation {
    /// Creates an uncertified attestation naming a privilege.
    #[must_use]
    pub fn uncertified(privilege_id: PrivilegeId) -> Self {
        Self {
            privilege_id,
            access_justification: String::new(),
            removal_impact: String::new(),
            is_revoked: false,
            is_certified: false,
            certified_at: None,
        }
    }
}

/// Risk fields recorded against a grant. The rating is always derived from
/// impact and likelihood and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Impact score, typically 1-5.
    pub impact: Option<i32>,
    /// Likelihood score, typically 1-5.
    pub likelihood: Option<i32>,
    /// Free-text assessment notes.
    pub notes: String,
    /// When the assessment was recorded.
    pub assessed_at: Option<DateTime<Utc>>,
    /// Assessment completed during the current cycle.
    pub is_assessed: bool,
}

impl RiskAssessment {
    /// Derived risk rating: impact x likelihood, `None` until both are set.
    #[must_use]
    pub fn rating(&self) -> Option<i32> {
        match (self.impact, self.likelihood) {
            (Some(impact), Some(likelihood)) => Some(impact * likelihood),
            _ => None,
        }
    }
}

/// Input payload for creating or replacing a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantInput {
    /// Role holding the grant.
    pub role_id: RoleId,
    /// Role-owner side of the attestation.
    pub role_owner: OwnerAttestation,
    /// Service-owner side of the attestation.
    pub service_owner: OwnerAttestation,
    /// Risk fields.
    pub risk: RiskAssessment,
}

/// A role-privilege link. Every mutation to a grant is retained as a
/// temporal version so reports can be rebuilt as of any past instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    id: GrantId,
    role_id: RoleId,
    role_owner: OwnerAttestation,
    service_owner: OwnerAttestation,
    risk: RiskAssessment,
}

impl Grant {
    /// Creates a grant from a store-assigned id and an input payload.
    pub fn new(id: GrantId, input: GrantInput) -> AppResult<Self> {
        if let Some(impact) = input.risk.impact {
            if impact < 0 {
                return Err(AppError::Validation(
                    "risk impact must not be negative".to_owned(),
                ));
            }
        }
        if let Some(likelihood) = input.risk.likelihood {
            if likelihood < 0 {
                return Err(AppError::Validation(
                    "risk likelihood must not be negative".to_owned(),
                ));
            }
        }

        Ok(Self {
            id,
            role_id: input.role_id,
            role_owner: input.role_owner,
            service_owner: input.service_owner,
            risk: input.risk,
        })
    }

    /// Returns the grant identifier.
    #[must_use]
    pub fn id(&self) -> GrantId {
        self.id
    }

    /// Returns the role holding the grant.
    #[must_use]
    pub fn role_id(&self) -> &RoleId {
        &self.role_id
    }

    /// Returns the role-owner attestation.
    #[must_use]
    pub fn role_owner(&self) -> &OwnerAttestation {
        &self.role_owner
    }

    /// Returns the service-owner attestation.
    #[must_use]
    pub fn service_owner(&self) -> &OwnerAttestation {
        &self.service_owner
    }

    /// Returns the risk fields.
    #[must_use]
    pub fn risk(&self) -> &RiskAssessment {
        &self.risk
    }

    /// True when role owner and service owner named different privileges.
    #[must_use]
    pub fn owners_disagree(&self) -> bool {
        self.role_owner.privilege_id != self.service_owner.privilege_id
    }

    /// Returns a copy with the certification and risk-assessed flags cleared,
    /// as applied to every grant when a new cycle starts.
    #[must_use]
    pub fn with_flags_reset(&self) -> Self {
        let mut reset = self.clone();
        reset.role_owner.is_certified = false;
        reset.service_owner.is_certified = false;
        reset.risk.is_assessed = false;
        reset
    }

    /// Replaces the mutable sides of the grant, keeping id and role.
    #[must_use]
    pub fn with_update(
        &self,
        role_owner: OwnerAttestation,
        service_owner: OwnerAttestation,
        risk: RiskAssessment,
    ) -> Self {
        Self {
            id: self.id,
            role_id: self.role_id.clone(),
            role_owner,
            service_owner,
            risk,
        }
    }
}
