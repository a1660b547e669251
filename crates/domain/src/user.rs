//! User entity: a person occupying exactly one role.

use chrono::{DateTime, Utc};
use recert_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::role::RoleId;

/// Identifier for a user, assigned by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(NonEmptyString);

impl UserId {
    /// Creates a validated user identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        Ok(Self(NonEmptyString::new(value)?))
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A user and the last human attestation of their role assignment. The
/// last-certification fields are informational only and not tied to a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    full_name: NonEmptyString,
    role_id: RoleId,
    last_certified_by: Option<String>,
    last_certified_at: Option<DateTime<Utc>>,
}

impl User {
    /// Creates a user with validated identity fields.
    pub fn new(
        id: impl Into<String>,
        full_name: impl Into<String>,
        role_id: RoleId,
        last_certified_by: Option<String>,
        last_certified_at: Option<DateTime<Utc>>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: UserId::new(id)?,
            full_name: NonEmptyString::new(full_name)?,
            role_id,
            last_certified_by,
            last_certified_at,
        })
    }

    /// Returns the user identifier.
    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Returns the user's full name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.full_name.as_str()
    }

    /// Returns the role this user occupies.
    #[must_use]
    pub fn role_id(&self) -> &RoleId {
        &self.role_id
    }

    /// Returns who last attested this user's role assignment.
    #[must_use]
    pub fn last_certified_by(&self) -> Option<&str> {
        self.last_certified_by.as_deref()
    }

    /// Returns when the role assignment was last attested.
    #[must_use]
    pub fn last_certified_at(&self) -> Option<DateTime<Utc>> {
        self.last_certified_at
    }
}
