use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use recert_domain::CycleId;

use crate::dto::{CycleResponse, StartCycleRequest, UpdateCycleRequest};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_cycles_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CycleResponse>>> {
    let cycles = state
        .cycle_service
        .list_cycles()
        .await?
        .into_iter()
        .map(CycleResponse::from)
        .collect();

    Ok(Json(cycles))
}

/// Closes the current cycle and opens the new one in a single transition;
/// refused with a precondition failure while any base table is empty.
pub async fn start_cycle_handler(
    State(state): State<AppState>,
    Json(payload): Json<StartCycleRequest>,
) -> ApiResult<(StatusCode, Json<CycleResponse>)> {
    let cycle = state
        .cycle_service
        .start_new_cycle(&payload.title, payload.enabled)
        .await?;

    Ok((StatusCode::CREATED, Json(CycleResponse::from(cycle))))
}

pub async fn get_cycle_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CycleResponse>> {
    let cycle = state.cycle_service.get_cycle(CycleId::new(id)).await?;

    Ok(Json(CycleResponse::from(cycle)))
}

pub async fn update_cycle_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCycleRequest>,
) -> ApiResult<Json<CycleResponse>> {
    let updated = state
        .cycle_service
        .update_cycle(CycleId::new(id), &payload.title, payload.enabled)
        .await?;

    Ok(Json(CycleResponse::from(updated)))
}

pub async fn delete_cycle_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.cycle_service.delete_cycle(CycleId::new(id)).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// The whole cycle row at the given offset back from the latest.
pub async fn latest_but_handler(
    State(state): State<AppState>,
    Path(offset): Path<i64>,
) -> ApiResult<Json<CycleResponse>> {
    let cycle = state.cycle_service.cycle_at_offset(offset).await?;

    Ok(Json(CycleResponse::from(cycle)))
}
