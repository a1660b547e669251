use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use recert_domain::{GrantSnapshot, Role, RoleId, RoleSnapshot};

use crate::dto::{
    CreateRoleRequest, RoleCertificationResponse, RoleResponse, RoleRiskAssessmentResponse,
    ServiceCertificationResponse, UpdateRoleRequest,
};
use crate::error::ApiResult;
use crate::handlers::users::{DeltaQuery, ReportQuery};
use crate::handlers::{resolve_instant, resolve_optional_instant};
use crate::state::AppState;

pub async fn list_roles_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .directory_service
        .list_roles()
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let owner_role_id = payload.owner_role_id.map(RoleId::new).transpose()?;
    let role = Role::new(payload.id, payload.name, payload.description, owner_role_id)?;
    let created = state.directory_service.create_role(role).await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(created))))
}

pub async fn get_role_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state.directory_service.get_role(&RoleId::new(id)?).await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let owner_role_id = payload.owner_role_id.map(RoleId::new).transpose()?;
    let role = Role::new(id, payload.name, payload.description, owner_role_id)?;
    let updated = state.directory_service.update_role(role).await?;

    Ok(Json(RoleResponse::from(updated)))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.directory_service.delete_role(&RoleId::new(id)?).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Every role with its certification roll-up, the review landing list.
pub async fn roles_overview_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<RoleCertificationResponse>>> {
    let overview = state
        .certification_service
        .roles_overview()
        .await?
        .into_iter()
        .map(RoleCertificationResponse::from)
        .collect();

    Ok(Json(overview))
}

/// Roles owned by the given role, each with its roll-up.
pub async fn owned_roles_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<RoleCertificationResponse>>> {
    let owned = state
        .certification_service
        .owned_roles(&RoleId::new(id)?)
        .await?
        .into_iter()
        .map(RoleCertificationResponse::from)
        .collect();

    Ok(Json(owned))
}

/// Services owned by the given role, each with its roll-up.
pub async fn owned_services_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ServiceCertificationResponse>>> {
    let owned = state
        .certification_service
        .owned_services(&RoleId::new(id)?)
        .await?
        .into_iter()
        .map(ServiceCertificationResponse::from)
        .collect();

    Ok(Json(owned))
}

/// One role's re-attestation view as of the requested instant: its grants,
/// their services, the full privilege menus and the previous cycle's choice.
pub async fn service_privs_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<RoleSnapshot>> {
    let at = resolve_optional_instant(&state.cycle_service, query.at.as_deref()).await?;
    let detail = state
        .snapshot_service
        .role_detail_at(&RoleId::new(id)?, at)
        .await?;

    Ok(Json(detail))
}

/// One role's grant rows as of the cycle at the given offset, for risk review.
pub async fn risk_assessment_handler(
    State(state): State<AppState>,
    Path((id, offset)): Path<(String, i64)>,
) -> ApiResult<Json<RoleRiskAssessmentResponse>> {
    let assessment = state
        .snapshot_service
        .role_risk_assessment_at(&RoleId::new(id)?, offset)
        .await?;

    Ok(Json(RoleRiskAssessmentResponse::from(assessment)))
}

/// All grant rows as of the requested instant, the full recertification report.
pub async fn role_report_handler(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Vec<GrantSnapshot>>> {
    let at = resolve_optional_instant(&state.cycle_service, query.at.as_deref()).await?;
    let rows = state.snapshot_service.grant_snapshots_at(at).await?;

    Ok(Json(rows))
}

/// Grant rows where role owner and service owner named different privileges.
pub async fn role_report_differs_handler(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<Vec<GrantSnapshot>>> {
    let at = resolve_optional_instant(&state.cycle_service, query.at.as_deref()).await?;
    let rows = state.snapshot_service.grant_snapshots_at(at).await?;

    Ok(Json(state.snapshot_service.disagreements(rows)))
}

/// Grant rows present at the later bound with no equal row at the earlier
/// one, for joiner and change review.
pub async fn role_report_delta_handler(
    State(state): State<AppState>,
    Query(query): Query<DeltaQuery>,
) -> ApiResult<Json<Vec<GrantSnapshot>>> {
    let base = resolve_instant(&state.cycle_service, &query.base).await?;
    let delta = resolve_instant(&state.cycle_service, &query.delta).await?;
    let rows = state.snapshot_service.grant_delta_between(base, delta).await?;

    Ok(Json(rows))
}
