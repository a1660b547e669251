use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use recert_domain::{RoleId, Service, ServiceId};

use crate::dto::{CreateServiceRequest, PrivilegeResponse, ServiceResponse, UpdateServiceRequest};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_services_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ServiceResponse>>> {
    let services = state
        .directory_service
        .list_services()
        .await?
        .into_iter()
        .map(ServiceResponse::from)
        .collect();

    Ok(Json(services))
}

pub async fn create_service_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateServiceRequest>,
) -> ApiResult<(StatusCode, Json<ServiceResponse>)> {
    let service = Service::new(
        payload.id,
        payload.name,
        payload.description,
        RoleId::new(payload.owner_role_id)?,
    )?;
    let created = state.directory_service.create_service(service).await?;

    Ok((StatusCode::CREATED, Json(ServiceResponse::from(created))))
}

pub async fn get_service_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ServiceResponse>> {
    let service = state
        .directory_service
        .get_service(&ServiceId::new(id)?)
        .await?;

    Ok(Json(ServiceResponse::from(service)))
}

pub async fn update_service_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateServiceRequest>,
) -> ApiResult<Json<ServiceResponse>> {
    let service = Service::new(
        id,
        payload.name,
        payload.description,
        RoleId::new(payload.owner_role_id)?,
    )?;
    let updated = state.directory_service.update_service(service).await?;

    Ok(Json(ServiceResponse::from(updated)))
}

pub async fn delete_service_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .directory_service
        .delete_service(&ServiceId::new(id)?)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// The privilege menu of one service, ordered by permission group.
pub async fn service_privileges_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PrivilegeResponse>>> {
    let privileges = state
        .directory_service
        .service_privileges(&ServiceId::new(id)?)
        .await?
        .into_iter()
        .map(PrivilegeResponse::from)
        .collect();

    Ok(Json(privileges))
}
