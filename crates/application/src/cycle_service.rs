use std::sync::Arc;

use chrono::{DateTime, Utc};
use recert_core::{AppError, AppResult};
use recert_domain::{CycleId, INITIAL_CYCLE_TITLE, RecertCycle};

use crate::cycle_ports::CycleRepository;
use crate::directory_ports::DirectoryRepository;
use crate::grant_ports::GrantRepository;

/// Application service owning the recertification-cycle lifecycle.
///
/// Any component needing "the current cycle" or an offset-to-timestamp
/// resolution goes through here rather than querying cycles directly.
#[derive(Clone)]
pub struct CycleService {
    cycles: Arc<dyn CycleRepository>,
    directory: Arc<dyn DirectoryRepository>,
    grants: Arc<dyn GrantRepository>,
}

impl CycleService {
    /// Creates the service from its repositories.
    #[must_use]
    pub fn new(
        cycles: Arc<dyn CycleRepository>,
        directory: Arc<dyn DirectoryRepository>,
        grants: Arc<dyn GrantRepository>,
    ) -> Self {
        Self {
            cycles,
            directory,
            grants,
        }
    }

    /// Seeds the disabled "Initial cycle" when no cycle exists yet, so the
    /// system always has exactly one open cycle from first startup.
    pub async fn ensure_initial_cycle(&self) -> AppResult<RecertCycle> {
        if let Some(existing) = self.cycles.latest_cycle().await? {
            return Ok(existing);
        }

        self.cycles
            .insert_cycle(INITIAL_CYCLE_TITLE, false, Utc::now())
            .await
    }

    /// Lists cycles, latest started first.
    pub async fn list_cycles(&self) -> AppResult<Vec<RecertCycle>> {
        self.cycles.list_cycles().await
    }

    /// Returns one cycle by id.
    pub async fn get_cycle(&self, id: CycleId) -> AppResult<RecertCycle> {
        self.cycles
            .find_cycle(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("cycle '{id}' not found")))
    }

    /// Returns the cycle `offset` positions back from the most recently
    /// started one: offset 0 is the current cycle, 1 the one before it.
    pub async fn cycle_at_offset(&self, offset: i64) -> AppResult<RecertCycle> {
        let offset = validate_offset(offset)?;

        self.cycles
            .list_cycles()
            .await?
            .into_iter()
            .nth(offset)
            .ok_or_else(|| AppError::NotFound(format!("no cycle at offset {offset}")))
    }

    /// Resolves a cycle offset to a report timestamp.
    ///
    /// Offset 0 means "now" (the live state). Offset >= 1 resolves to the
    /// end timestamp of the cycle that many positions back; a cycle without
    /// an end timestamp at that position is reported as not found.
    pub async fn resolve_offset_to_timestamp(&self, offset: i64) -> AppResult<DateTime<Utc>> {
        let offset = validate_offset(offset)?;

        if offset == 0 {
            return Ok(Utc::now());
        }

        let cycle = self
            .cycles
            .list_cycles()
            .await?
            .into_iter()
            .nth(offset)
            .ok_or_else(|| AppError::NotFound(format!("no cycle at offset {offset}")))?;

        cycle.ended_at().ok_or_else(|| {
            AppError::NotFound(format!("cycle at offset {offset} has no end timestamp"))
        })
    }

    /// Starts a new recertification cycle.
    ///
    /// Refuses while any of the five populations is empty, naming the first
    /// empty one in priority order (roles, services, privileges, grants,
    /// users) -- reporting over an empty schema would be meaningless. The
    /// transition itself (close current, reset grant flags, insert new) runs
    /// atomically inside the repository.
    pub async fn start_new_cycle(&self, title: &str, enabled: bool) -> AppResult<RecertCycle> {
        self.require_populated().await?;
        self.cycles.start_new_cycle(title, enabled, Utc::now()).await
    }

    /// Retitles a cycle and toggles its enabled flag. Lifecycle timestamps
    /// stay owned by the transition logic.
    pub async fn update_cycle(
        &self,
        id: CycleId,
        title: &str,
        enabled: bool,
    ) -> AppResult<RecertCycle> {
        let cycle = self.get_cycle(id).await?;
        let updated = cycle.retitled(title, enabled)?;
        self.cycles.update_cycle(updated.clone()).await?;
        Ok(updated)
    }

    /// Deletes a cycle by id.
    ///
    /// No guard defends the one-open-cycle invariant here; deleting the
    /// current cycle leaves the table without an open cycle until the next
    /// startup reseed.
    pub async fn delete_cycle(&self, id: CycleId) -> AppResult<()> {
        self.get_cycle(id).await?;
        self.cycles.delete_cycle(id).await
    }

    async fn require_populated(&self) -> AppResult<()> {
        let checks: [(&str, i64); 5] = [
            ("role", self.directory.count_roles().await?),
            ("service", self.directory.count_services().await?),
            ("privilege", self.directory.count_privileges().await?),
            ("grant", self.grants.count_grants().await?),
            ("user", self.directory.count_users().await?),
        ];

        for (table, count) in checks {
            if count == 0 {
                return Err(AppError::Precondition(format!(
                    "unable to begin a new recertification cycle: the {table} table is not populated"
                )));
            }
        }

        Ok(())
    }
}

fn validate_offset(offset: i64) -> AppResult<usize> {
    usize::try_from(offset)
        .map_err(|_| AppError::Validation("cycle offset must not be negative".to_owned()))
}

#[cfg(test)]
mod tests;
