//! Service entity: a system grouping the privileges that can be granted.

use recert_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::role::RoleId;

/// Identifier for a service, assigned by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(NonEmptyString);

impl ServiceId {
    /// Creates a validated service identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        Ok(Self(NonEmptyString::new(value)?))
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A service. Always owned by exactly one role, whose occupant acts as the
/// service-owner approver for grants against this service's privileges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    id: ServiceId,
    name: NonEmptyString,
    description: String,
    owner_role_id: RoleId,
}

impl Service {
    /// Creates a service with validated identity fields.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        owner_role_id: RoleId,
    ) -> AppResult<Self> {
        Ok(Self {
            id: ServiceId::new(id)?,
            name: NonEmptyString::new(name)?,
            description: description.into(),
            owner_role_id,
        })
    }

    /// Returns the service identifier.
    #[must_use]
    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    /// Returns the service name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the owning role.
    #[must_use]
    pub fn owner_role_id(&self) -> &RoleId {
        &self.owner_role_id
    }
}
