//! Request and response payloads for the HTTP surface.
//!
//! Report rows ([`recert_domain::GrantSnapshot`], [`recert_domain::UserSnapshot`]
//! and [`recert_domain::RoleSnapshot`]) are flat serializable projections
//! already and go over the wire as-is; only the directory entities and
//! roll-ups get dedicated payload types here.

use chrono::{DateTime, Utc};
use recert_application::{RoleCertification, RoleRiskAssessment, ServiceCertification};
use recert_core::AppResult;
use recert_domain::{
    Grant, GrantSnapshot, OwnerAttestation, Privilege, PrivilegeId, RecertCycle, RiskAssessment,
    Role, Service, User,
};
use serde::{Deserialize, Serialize};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// API representation of a user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub full_name: String,
    pub role_id: String,
    pub last_certified_by: Option<String>,
    pub last_certified_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id().as_str().to_owned(),
            full_name: user.full_name().to_owned(),
            role_id: user.role_id().as_str().to_owned(),
            last_certified_by: user.last_certified_by().map(str::to_owned),
            last_certified_at: user.last_certified_at(),
        }
    }
}

/// Incoming payload for user creation.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub id: String,
    pub full_name: String,
    pub role_id: String,
    pub last_certified_by: Option<String>,
    pub last_certified_at: Option<DateTime<Utc>>,
}

/// Incoming payload for user updates; the id comes from the path.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: String,
    pub role_id: String,
    pub last_certified_by: Option<String>,
    pub last_certified_at: Option<DateTime<Utc>>,
}

/// API representation of a role.
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_role_id: Option<String>,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            id: role.id().as_str().to_owned(),
            name: role.name().to_owned(),
            description: role.description().to_owned(),
            owner_role_id: role.owner_role_id().map(|id| id.as_str().to_owned()),
        }
    }
}

/// Incoming payload for role creation.
#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_role_id: Option<String>,
}

/// Incoming payload for role updates; the id comes from the path.
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_role_id: Option<String>,
}

/// API representation of a service.
#[derive(Debug, Serialize)]
pub struct ServiceResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_role_id: String,
}

impl From<Service> for ServiceResponse {
    fn from(service: Service) -> Self {
        Self {
            id: service.id().as_str().to_owned(),
            name: service.name().to_owned(),
            description: service.description().to_owned(),
            owner_role_id: service.owner_role_id().as_str().to_owned(),
        }
    }
}

/// Incoming payload for service creation.
#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_role_id: String,
}

/// Incoming payload for service updates; the id comes from the path.
#[derive(Debug, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_role_id: String,
}

/// API representation of a privilege.
#[derive(Debug, Serialize)]
pub struct PrivilegeResponse {
    pub id: String,
    pub service_id: String,
    pub permission_group: String,
    pub summary: String,
    pub credential_storage_method: Option<String>,
}

impl From<Privilege> for PrivilegeResponse {
    fn from(privilege: Privilege) -> Self {
        Self {
            id: privilege.id().as_str().to_owned(),
            service_id: privilege.service_id().as_str().to_owned(),
            permission_group: privilege.permission_group().to_owned(),
            summary: privilege.summary().to_owned(),
            credential_storage_method: privilege.credential_storage_method().map(str::to_owned),
        }
    }
}

/// Incoming payload for privilege creation.
#[derive(Debug, Deserialize)]
pub struct CreatePrivilegeRequest {
    pub id: String,
    pub service_id: String,
    pub permission_group: String,
    #[serde(default)]
    pub summary: String,
    pub credential_storage_method: Option<String>,
}

/// Incoming payload for privilege updates; the id comes from the path.
#[derive(Debug, Deserialize)]
pub struct UpdatePrivilegeRequest {
    pub service_id: String,
    pub permission_group: String,
    #[serde(default)]
    pub summary: String,
    pub credential_storage_method: Option<String>,
}

/// One owner side of a grant as it travels over the wire.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttestationDto {
    pub privilege_id: String,
    #[serde(default)]
    pub access_justification: String,
    #[serde(default)]
    pub removal_impact: String,
    #[serde(default)]
    pub is_revoked: bool,
    #[serde(default)]
    pub is_certified: bool,
    #[serde(default)]
    pub certified_at: Option<DateTime<Utc>>,
}

impl AttestationDto {
    pub fn into_domain(self) -> AppResult<OwnerAttestation> {
        Ok(OwnerAttestation {
            privilege_id: PrivilegeId::new(self.privilege_id)?,
            access_justification: self.access_justification,
            removal_impact: self.removal_impact,
            is_revoked: self.is_revoked,
            is_certified: self.is_certified,
            certified_at: self.certified_at,
        })
    }
}

impl From<&OwnerAttestation> for AttestationDto {
    fn from(attestation: &OwnerAttestation) -> Self {
        Self {
            privilege_id: attestation.privilege_id.as_str().to_owned(),
            access_justification: attestation.access_justification.clone(),
            removal_impact: attestation.removal_impact.clone(),
            is_revoked: attestation.is_revoked,
            is_certified: attestation.is_certified,
            certified_at: attestation.certified_at,
        }
    }
}

/// Risk fields of a grant as they travel over the wire. The rating is never
/// accepted as input; it is derived from impact and likelihood.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RiskDto {
    pub impact: Option<i32>,
    pub likelihood: Option<i32>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub assessed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_assessed: bool,
}

impl RiskDto {
    pub fn into_domain(self) -> RiskAssessment {
        RiskAssessment {
            impact: self.impact,
            likelihood: self.likelihood,
            notes: self.notes,
            assessed_at: self.assessed_at,
            is_assessed: self.is_assessed,
        }
    }
}

impl From<&RiskAssessment> for RiskDto {
    fn from(risk: &RiskAssessment) -> Self {
        Self {
            impact: risk.impact,
            likelihood: risk.likelihood,
            notes: risk.notes.clone(),
            assessed_at: risk.assessed_at,
            is_assessed: risk.is_assessed,
        }
    }
}

/// API representation of a grant.
#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub id: i64,
    pub role_id: String,
    pub role_owner: AttestationDto,
    pub service_owner: AttestationDto,
    pub risk: RiskDto,
    pub risk_rating: Option<i32>,
}

impl From<Grant> for GrantResponse {
    fn from(grant: Grant) -> Self {
        Self {
            id: grant.id().as_i64(),
            role_id: grant.role_id().as_str().to_owned(),
            role_owner: AttestationDto::from(grant.role_owner()),
            service_owner: AttestationDto::from(grant.service_owner()),
            risk: RiskDto::from(grant.risk()),
            risk_rating: grant.risk().rating(),
        }
    }
}

/// Incoming payload for grant creation.
#[derive(Debug, Deserialize)]
pub struct CreateGrantRequest {
    pub role_id: String,
    pub role_owner: AttestationDto,
    pub service_owner: AttestationDto,
    #[serde(default)]
    pub risk: RiskDto,
}

/// Incoming payload for grant updates; the grant keeps its role.
#[derive(Debug, Deserialize)]
pub struct UpdateGrantRequest {
    pub role_owner: AttestationDto,
    pub service_owner: AttestationDto,
    #[serde(default)]
    pub risk: RiskDto,
}

/// API representation of a recertification cycle.
#[derive(Debug, Serialize)]
pub struct CycleResponse {
    pub id: i64,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl From<RecertCycle> for CycleResponse {
    fn from(cycle: RecertCycle) -> Self {
        Self {
            id: cycle.id().as_i64(),
            title: cycle.title().to_owned(),
            started_at: cycle.started_at(),
            ended_at: cycle.ended_at(),
            enabled: cycle.enabled(),
        }
    }
}

/// Incoming payload for starting a new cycle.
#[derive(Debug, Deserialize)]
pub struct StartCycleRequest {
    pub title: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Incoming payload for cycle updates; lifecycle timestamps are not settable.
#[derive(Debug, Deserialize)]
pub struct UpdateCycleRequest {
    pub title: String,
    pub enabled: bool,
}

/// A role with its certification roll-up.
#[derive(Debug, Serialize)]
pub struct RoleCertificationResponse {
    pub role: RoleResponse,
    pub fully_certified: bool,
}

impl From<RoleCertification> for RoleCertificationResponse {
    fn from(certification: RoleCertification) -> Self {
        Self {
            role: RoleResponse::from(certification.role),
            fully_certified: certification.fully_certified,
        }
    }
}

/// A service with its certification roll-up.
#[derive(Debug, Serialize)]
pub struct ServiceCertificationResponse {
    pub service: ServiceResponse,
    pub fully_certified: bool,
}

impl From<ServiceCertification> for ServiceCertificationResponse {
    fn from(certification: ServiceCertification) -> Self {
        Self {
            service: ServiceResponse::from(certification.service),
            fully_certified: certification.fully_certified,
        }
    }
}

/// A role with its point-in-time grant rows for risk review.
#[derive(Debug, Serialize)]
pub struct RoleRiskAssessmentResponse {
    pub role: RoleResponse,
    pub grants: Vec<GrantSnapshot>,
}

impl From<RoleRiskAssessment> for RoleRiskAssessmentResponse {
    fn from(assessment: RoleRiskAssessment) -> Self {
        Self {
            role: RoleResponse::from(assessment.role),
            grants: assessment.grants,
        }
    }
}
