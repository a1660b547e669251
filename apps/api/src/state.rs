use recert_application::{CertificationService, CycleService, DirectoryService, SnapshotService};

/// Shared handler state carrying the application services.
#[derive(Clone)]
pub struct AppState {
    pub directory_service: DirectoryService,
    pub cycle_service: CycleService,
    pub certification_service: CertificationService,
    pub snapshot_service: SnapshotService,
}
