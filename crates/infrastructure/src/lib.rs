//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_recert_repository;
mod postgres_cycle_repository;
mod postgres_directory_repository;
mod postgres_grant_repository;
mod postgres_temporal_store;

pub use in_memory_recert_repository::InMemoryRecertRepository;
pub use postgres_cycle_repository::PostgresCycleRepository;
pub use postgres_directory_repository::PostgresDirectoryRepository;
pub use postgres_grant_repository::PostgresGrantRepository;
pub use postgres_temporal_store::PostgresTemporalStore;
