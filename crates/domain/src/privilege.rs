//! Privilege entity: one access level on a service.

use recert_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::service::ServiceId;

/// Identifier for a privilege, assigned by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrivilegeId(NonEmptyString);

impl PrivilegeId {
    /// Creates a validated privilege identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        Ok(Self(NonEmptyString::new(value)?))
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for PrivilegeId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A privilege is intrinsically tied to one service. The permission group is
/// the label operators pick from when attesting a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    id: PrivilegeId,
    service_id: ServiceId,
    permission_group: NonEmptyString,
    summary: String,
    credential_storage_method: Option<String>,
}

impl Privilege {
    /// Creates a privilege with validated identity fields.
    pub fn new(
        id: impl Into<String>,
        service_id: ServiceId,
        permission_group: impl Into<String>,
        summary: impl Into<String>,
        credential_storage_method: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: PrivilegeId::new(id)?,
            service_id,
            permission_group: NonEmptyString::new(permission_group)?,
            summary: summary.into(),
            credential_storage_method,
        })
    }

    /// Returns the privilege identifier.
    #[must_use]
    pub fn id(&self) -> &PrivilegeId {
        &self.id
    }

    /// Returns the owning service.
    #[must_use]
    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    /// Returns the permission-group label.
    #[must_use]
    pub fn permission_group(&self) -> &str {
        self.permission_group.as_str()
    }

    /// Returns the human-readable summary of what the privilege allows.
    #[must_use]
    pub fn summary(&self) -> &str {
        self.summary.as_str()
    }

    /// Returns the credential-storage-method tag, if recorded.
    #[must_use]
    pub fn credential_storage_method(&self) -> Option<&str> {
        self.credential_storage_method.as_deref()
    }
}
