//! HTTP handlers, one module per resource.

use chrono::{DateTime, Utc};
use recert_application::CycleService;
use recert_core::AppError;

use crate::error::ApiError;

pub mod cycles;
pub mod grants;
pub mod health;
pub mod privileges;
pub mod roles;
pub mod services;
pub mod users;

/// Resolves a report instant parameter that is either a cycle offset or an
/// ISO-8601 timestamp. A bare integer counts cycles back from the latest
/// (0 means now); anything else must parse as a timestamp.
pub(crate) async fn resolve_instant(
    cycles: &CycleService,
    raw: &str,
) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(offset) = raw.parse::<i64>() {
        return Ok(cycles.resolve_offset_to_timestamp(offset).await?);
    }

    let instant = raw.parse::<DateTime<Utc>>().map_err(|_| {
        AppError::Validation(format!("unparseable timestamp or offset '{raw}'"))
    })?;

    Ok(instant)
}

/// Like [`resolve_instant`], defaulting a missing parameter to offset 0,
/// the live state.
pub(crate) async fn resolve_optional_instant(
    cycles: &CycleService,
    raw: Option<&str>,
) -> Result<DateTime<Utc>, ApiError> {
    match raw {
        Some(raw) => resolve_instant(cycles, raw).await,
        None => Ok(cycles.resolve_offset_to_timestamp(0).await?),
    }
}
