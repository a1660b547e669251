use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use recert_domain::{Privilege, PrivilegeId, ServiceId};

use crate::dto::{CreatePrivilegeRequest, PrivilegeResponse, UpdatePrivilegeRequest};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_privileges_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PrivilegeResponse>>> {
    let privileges = state
        .directory_service
        .list_privileges()
        .await?
        .into_iter()
        .map(PrivilegeResponse::from)
        .collect();

    Ok(Json(privileges))
}

pub async fn create_privilege_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreatePrivilegeRequest>,
) -> ApiResult<(StatusCode, Json<PrivilegeResponse>)> {
    let privilege = Privilege::new(
        payload.id,
        ServiceId::new(payload.service_id)?,
        payload.permission_group,
        payload.summary,
        payload.credential_storage_method,
    )?;
    let created = state.directory_service.create_privilege(privilege).await?;

    Ok((StatusCode::CREATED, Json(PrivilegeResponse::from(created))))
}

pub async fn get_privilege_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PrivilegeResponse>> {
    let privilege = state
        .directory_service
        .get_privilege(&PrivilegeId::new(id)?)
        .await?;

    Ok(Json(PrivilegeResponse::from(privilege)))
}

pub async fn update_privilege_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePrivilegeRequest>,
) -> ApiResult<Json<PrivilegeResponse>> {
    let privilege = Privilege::new(
        id,
        ServiceId::new(payload.service_id)?,
        payload.permission_group,
        payload.summary,
        payload.credential_storage_method,
    )?;
    let updated = state.directory_service.update_privilege(privilege).await?;

    Ok(Json(PrivilegeResponse::from(updated)))
}

pub async fn delete_privilege_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .directory_service
        .delete_privilege(&PrivilegeId::new(id)?)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
