use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recert_core::AppResult;
use recert_domain::{CycleId, RecertCycle};

/// Repository port for recertification cycles.
#[async_trait]
pub trait CycleRepository: Send + Sync {
    /// Lists cycles ordered by descending start (latest first).
    async fn list_cycles(&self) -> AppResult<Vec<RecertCycle>>;

    /// Looks up a cycle by id.
    async fn find_cycle(&self, id: CycleId) -> AppResult<Option<RecertCycle>>;

    /// Returns the most recently started cycle.
    async fn latest_cycle(&self) -> AppResult<Option<RecertCycle>>;

    /// Inserts an open cycle, assigning the next sequential id.
    async fn insert_cycle(
        &self,
        title: &str,
        enabled: bool,
        started_at: DateTime<Utc>,
    ) -> AppResult<RecertCycle>;

    /// Replaces a cycle row; unknown ids are not found.
    async fn update_cycle(&self, cycle: RecertCycle) -> AppResult<()>;

    /// Deletes a cycle; unknown ids are not found.
    async fn delete_cycle(&self, id: CycleId) -> AppResult<()>;

    /// Performs the cycle transition as one atomic unit: closes the current
    /// cycle at `now`, clears both certification flags and the risk-assessed
    /// flag on every grant (each reset recorded as a new temporal version),
    /// then inserts the new open cycle. Order matters: queries as of the
    /// just-closed cycle's end must still see the pre-reset flag values.
    async fn start_new_cycle(
        &self,
        title: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> AppResult<RecertCycle>;
}
