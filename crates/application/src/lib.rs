//! Application services and ports for the recertification tracker.

#![forbid(unsafe_code)]

mod certification_service;
mod cycle_ports;
mod cycle_service;
mod directory_ports;
mod directory_service;
mod grant_ports;
mod snapshot_service;
mod temporal_ports;

#[cfg(test)]
mod test_support;

pub use certification_service::{CertificationService, RoleCertification, ServiceCertification};
pub use cycle_ports::CycleRepository;
pub use cycle_service::CycleService;
pub use directory_ports::DirectoryRepository;
pub use directory_service::DirectoryService;
pub use grant_ports::GrantRepository;
pub use snapshot_service::{RoleRiskAssessment, SnapshotService};
pub use temporal_ports::TemporalStore;
