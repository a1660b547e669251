//! Domain entities and invariants for the recertification tracker.

#![forbid(unsafe_code)]

mod cycle;
mod grant;
mod privilege;
mod role;
mod service;
mod snapshot;
mod user;

pub use cycle::{CycleId, INITIAL_CYCLE_TITLE, RecertCycle};
pub use grant::{Grant, GrantId, GrantInput, OwnerAttestation, RiskAssessment};
pub use privilege::{Privilege, PrivilegeId};
pub use role::{Role, RoleId};
pub use service::{Service, ServiceId};
pub use snapshot::{
    GrantDeltaKey, GrantSnapshot, PrivilegeSummary, RoleSnapshot, ServicePrivView, UserSnapshot,
};
pub use user::{User, UserId};
