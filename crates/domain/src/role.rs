//! Role entity: the unit that holds grants and acts as an approver.

use recert_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Identifier for a role, assigned by the operator (e.g. `"riskDirector"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(NonEmptyString);

impl RoleId {
    /// Creates a validated role identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        Ok(Self(NonEmptyString::new(value)?))
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A job role. Roles own other roles and services, forming an ownership
/// graph with no enforced acyclicity, so traversals must carry a visited set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    name: NonEmptyString,
    description: String,
    owner_role_id: Option<RoleId>,
}

impl Role {
    /// Creates a role with validated identity fields.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        owner_role_id: Option<RoleId>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: RoleId::new(id)?,
            name: NonEmptyString::new(name)?,
            description: description.into(),
            owner_role_id,
        })
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn id(&self) -> &RoleId {
        &self.id
    }

    /// Returns the role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the owning role, if any. Top-level roles have none.
    #[must_use]
    pub fn owner_role_id(&self) -> Option<&RoleId> {
        self.owner_role_id.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn role_requires_non_empty_id_and_name() {
        assert!(Role::new("", "Payments", "", None).is_err());
        assert!(Role::new("payments", " ", "", None).is_err());
    }

    #[test]
    fn role_may_be_top_level() {
        let role = Role::new("ciso", "CISO", "information security officer", None);
        assert!(role.is_ok_and(|role| role.owner_role_id().is_none()));
    }
}
