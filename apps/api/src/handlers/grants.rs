use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use recert_domain::{GrantId, GrantInput, RoleId};

use crate::dto::{CreateGrantRequest, GrantResponse, UpdateGrantRequest};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_grants_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<GrantResponse>>> {
    let grants = state
        .directory_service
        .list_grants()
        .await?
        .into_iter()
        .map(GrantResponse::from)
        .collect();

    Ok(Json(grants))
}

pub async fn create_grant_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateGrantRequest>,
) -> ApiResult<(StatusCode, Json<GrantResponse>)> {
    let input = GrantInput {
        role_id: RoleId::new(payload.role_id)?,
        role_owner: payload.role_owner.into_domain()?,
        service_owner: payload.service_owner.into_domain()?,
        risk: payload.risk.into_domain(),
    };
    let created = state.directory_service.create_grant(input).await?;

    Ok((StatusCode::CREATED, Json(GrantResponse::from(created))))
}

pub async fn get_grant_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<GrantResponse>> {
    let grant = state.directory_service.get_grant(GrantId::new(id)).await?;

    Ok(Json(GrantResponse::from(grant)))
}

pub async fn update_grant_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateGrantRequest>,
) -> ApiResult<Json<GrantResponse>> {
    let updated = state
        .directory_service
        .update_grant(
            GrantId::new(id),
            payload.role_owner.into_domain()?,
            payload.service_owner.into_domain()?,
            payload.risk.into_domain(),
        )
        .await?;

    Ok(Json(GrantResponse::from(updated)))
}

pub async fn delete_grant_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.directory_service.delete_grant(GrantId::new(id)).await?;

    Ok(StatusCode::NO_CONTENT)
}
