//! Recertification tracker API composition root.

#![forbid(unsafe_code)]

mod dto;
mod error;
mod handlers;
mod state;

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use recert_application::{CertificationService, CycleService, DirectoryService, SnapshotService};
use recert_core::AppError;
use recert_infrastructure::{
    PostgresCycleRepository, PostgresDirectoryRepository, PostgresGrantRepository,
    PostgresTemporalStore,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

    let database_url = required_env("DATABASE_URL")?;
    let frontend_url =
        env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
    let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let api_port = env::var("API_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3001);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to postgres: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if migrate_only {
        info!("migrations applied, exiting");
        return Ok(());
    }

    let directory_repository = Arc::new(PostgresDirectoryRepository::new(pool.clone()));
    let grant_repository = Arc::new(PostgresGrantRepository::new(pool.clone()));
    let cycle_repository = Arc::new(PostgresCycleRepository::new(pool.clone()));
    let temporal_store = Arc::new(PostgresTemporalStore::new(pool));

    let cycle_service = CycleService::new(
        cycle_repository,
        directory_repository.clone(),
        grant_repository.clone(),
    );
    let directory_service =
        DirectoryService::new(directory_repository.clone(), grant_repository.clone());
    let certification_service = CertificationService::new(directory_repository, grant_repository);
    let snapshot_service = SnapshotService::new(temporal_store, cycle_service.clone());

    // The store must always hold exactly one open cycle.
    let current = cycle_service.ensure_initial_cycle().await?;
    info!(cycle_id = current.id().as_i64(), "current recertification cycle ready");

    let app_state = AppState {
        directory_service,
        cycle_service,
        certification_service,
        snapshot_service,
    };

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route(
            "/api/v1/users",
            get(handlers::users::list_users_handler).post(handlers::users::create_user_handler),
        )
        .route(
            "/api/v1/users/report",
            get(handlers::users::user_report_handler),
        )
        .route(
            "/api/v1/users/report/delta",
            get(handlers::users::user_report_delta_handler),
        )
        .route(
            "/api/v1/users/{id}",
            get(handlers::users::get_user_handler)
                .put(handlers::users::update_user_handler)
                .delete(handlers::users::delete_user_handler),
        )
        .route(
            "/api/v1/roles",
            get(handlers::roles::list_roles_handler).post(handlers::roles::create_role_handler),
        )
        .route(
            "/api/v1/roles/overview",
            get(handlers::roles::roles_overview_handler),
        )
        .route(
            "/api/v1/roles/report",
            get(handlers::roles::role_report_handler),
        )
        .route(
            "/api/v1/roles/report/differs",
            get(handlers::roles::role_report_differs_handler),
        )
        .route(
            "/api/v1/roles/report/delta",
            get(handlers::roles::role_report_delta_handler),
        )
        .route(
            "/api/v1/roles/{id}",
            get(handlers::roles::get_role_handler)
                .put(handlers::roles::update_role_handler)
                .delete(handlers::roles::delete_role_handler),
        )
        .route(
            "/api/v1/roles/{id}/owned-roles",
            get(handlers::roles::owned_roles_handler),
        )
        .route(
            "/api/v1/roles/{id}/owned-services",
            get(handlers::roles::owned_services_handler),
        )
        .route(
            "/api/v1/roles/{id}/service-privs",
            get(handlers::roles::service_privs_handler),
        )
        .route(
            "/api/v1/roles/{id}/risk-assessment/{offset}",
            get(handlers::roles::risk_assessment_handler),
        )
        .route(
            "/api/v1/services",
            get(handlers::services::list_services_handler)
                .post(handlers::services::create_service_handler),
        )
        .route(
            "/api/v1/services/{id}",
            get(handlers::services::get_service_handler)
                .put(handlers::services::update_service_handler)
                .delete(handlers::services::delete_service_handler),
        )
        .route(
            "/api/v1/services/{id}/privileges",
            get(handlers::services::service_privileges_handler),
        )
        .route(
            "/api/v1/privileges",
            get(handlers::privileges::list_privileges_handler)
                .post(handlers::privileges::create_privilege_handler),
        )
        .route(
            "/api/v1/privileges/{id}",
            get(handlers::privileges::get_privilege_handler)
                .put(handlers::privileges::update_privilege_handler)
                .delete(handlers::privileges::delete_privilege_handler),
        )
        .route(
            "/api/v1/grants",
            get(handlers::grants::list_grants_handler).post(handlers::grants::create_grant_handler),
        )
        .route(
            "/api/v1/grants/{id}",
            get(handlers::grants::get_grant_handler)
                .put(handlers::grants::update_grant_handler)
                .delete(handlers::grants::delete_grant_handler),
        )
        .route(
            "/api/v1/cycles",
            get(handlers::cycles::list_cycles_handler).post(handlers::cycles::start_cycle_handler),
        )
        .route(
            "/api/v1/cycles/latest-but/{offset}",
            get(handlers::cycles::latest_but_handler),
        )
        .route(
            "/api/v1/cycles/{id}",
            get(handlers::cycles::get_cycle_handler)
                .put(handlers::cycles::update_cycle_handler)
                .delete(handlers::cycles::delete_cycle_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    let host = IpAddr::from_str(&api_host)
        .map_err(|error| AppError::Internal(format!("invalid API_HOST '{api_host}': {error}")))?;
    let address = SocketAddr::from((host, api_port));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "recert-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}
