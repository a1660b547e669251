use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use recert_domain::{RoleId, User, UserId, UserSnapshot};
use serde::Deserialize;

use crate::dto::{CreateUserRequest, UpdateUserRequest, UserResponse};
use crate::error::ApiResult;
use crate::handlers::{resolve_instant, resolve_optional_instant};
use crate::state::AppState;

/// Query for point-in-time reports; `at` is a cycle offset or a timestamp.
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub at: Option<String>,
}

/// Query for delta reports; both bounds are cycle offsets or timestamps.
#[derive(Debug, Deserialize)]
pub struct DeltaQuery {
    pub base: String,
    pub delta: String,
}

pub async fn list_users_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state
        .directory_service
        .list_users()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(users))
}

pub async fn create_user_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let user = User::new(
        payload.id,
        payload.full_name,
        RoleId::new(payload.role_id)?,
        payload.last_certified_by,
        payload.last_certified_at,
    )?;
    let created = state.directory_service.create_user(user).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user = state.directory_service.get_user(&UserId::new(id)?).await?;

    Ok(Json(UserResponse::from(user)))
}

pub async fn update_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = User::new(
        id,
        payload.full_name,
        RoleId::new(payload.role_id)?,
        payload.last_certified_by,
        payload.last_certified_at,
    )?;
    let updated = state.directory_service.update_user(user).await?;

    Ok(Json(UserResponse::from(updated)))
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.directory_service.delete_user(&UserId::new(id)?).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// All user-role assignment rows as of the requested instant.
pub async fn user_report_handler(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Vec<UserSnapshot>>> {
    let at = resolve_optional_instant(&state.cycle_service, query.at.as_deref()).await?;
    let rows = state.snapshot_service.user_snapshots_at(at).await?;

    Ok(Json(rows))
}

/// User rows present at the earlier bound but gone or changed by the later
/// one, for leaver and mover review.
pub async fn user_report_delta_handler(
    State(state): State<AppState>,
    Query(query): Query<DeltaQuery>,
) -> ApiResult<Json<Vec<UserSnapshot>>> {
    let base = resolve_instant(&state.cycle_service, &query.base).await?;
    let delta = resolve_instant(&state.cycle_service, &query.delta).await?;
    let rows = state.snapshot_service.user_delta_between(base, delta).await?;

    Ok(Json(rows))
}
