use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use recert_core::AppError;
use serde::Serialize;
use tracing::error;

/// JSON body carried by every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Wrapper mapping [`AppError`] kinds onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Precondition(message) => (StatusCode::PRECONDITION_FAILED, message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message),
            AppError::ReferentialIntegrity(message) => (StatusCode::CONFLICT, message),
            AppError::Internal(message) => {
                // Detail stays in the log; the response body is generic.
                error!(%message, "internal error while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
