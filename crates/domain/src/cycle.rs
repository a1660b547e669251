//! Recertification cycle: the bounded period certification flags accumulate in.

use chrono::{DateTime, Utc};
use recert_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Sequential identifier assigned to a cycle by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CycleId(i64);

impl CycleId {
    /// Wraps a store-assigned sequential identifier.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Title used for the cycle auto-seeded at startup.
pub const INITIAL_CYCLE_TITLE: &str = "Initial cycle";

/// A recertification cycle. The single cycle with no end timestamp is the
/// current one; closing it is part of starting the next cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecertCycle {
    id: CycleId,
    title: NonEmptyString,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    enabled: bool,
}

impl RecertCycle {
    /// Creates a cycle row with a validated title.
    pub fn new(
        id: CycleId,
        title: impl Into<String>,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
        enabled: bool,
    ) -> AppResult<Self> {
        if let Some(ended_at) = ended_at {
            if ended_at < started_at {
                return Err(AppError::Validation(
                    "cycle end must not precede its start".to_owned(),
                ));
            }
        }

        Ok(Self {
            id,
            title: NonEmptyString::new(title)?,
            started_at,
            ended_at,
            enabled,
        })
    }

    /// Returns the cycle identifier.
    #[must_use]
    pub fn id(&self) -> CycleId {
        self.id
    }

    /// Returns the cycle title.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    /// Returns when the cycle started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the cycle ended, `None` while it is the current cycle.
    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Returns whether attestation submissions are enabled for the cycle.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// True while the cycle has no end timestamp.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Returns a closed copy of the cycle.
    #[must_use]
    pub fn closed_at(&self, ended_at: DateTime<Utc>) -> Self {
        let mut closed = self.clone();
        closed.ended_at = Some(ended_at);
        closed
    }

    /// Returns a copy with a new title and enabled flag; lifecycle
    /// timestamps are not caller-editable.
    pub fn retitled(&self, title: impl Into<String>, enabled: bool) -> AppResult<Self> {
        Ok(Self {
            id: self.id,
            title: NonEmptyString::new(title)?,
            started_at: self.started_at,
            ended_at: self.ended_at,
            enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CycleId, RecertCycle};
    use chrono::{Duration, Utc};

    #[test]
    fn cycle_end_cannot_precede_start() {
        let started = Utc::now();
        let result = RecertCycle::new(
            CycleId::new(1),
            "Q1 review",
            started,
            Some(started - Duration::hours(1)),
            true,
        );
        assert!(result.is_err());
    }

    #[test]
    fn open_cycle_reports_open_until_closed() {
        let started = Utc::now();
        let Ok(cycle) = RecertCycle::new(CycleId::new(1), "Q1 review", started, None, true) else {
            panic!("cycle");
        };
        assert!(cycle.is_open());

        let closed = cycle.closed_at(started + Duration::days(90));
        assert!(!closed.is_open());
        assert_eq!(closed.started_at(), started);
    }
}
