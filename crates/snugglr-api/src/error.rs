use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use snugglr_engine::EngineError;

static EXPOSE_STACK: AtomicBool = AtomicBool::new(false);

/// Include the error chain of internal failures in responses. Development only.
pub fn expose_error_stacks(enabled: bool) {
    EXPOSE_STACK.store(enabled, Ordering::Relaxed);
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Engine(EngineError::Internal(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected request body: {}", rejection.body_text());
        Self::Validation("Malformed request body".into())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(format!("Invalid id: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(format!("Invalid query: {}", rejection.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut stack = None;
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Engine(err) => match err {
                EngineError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
                EngineError::IneligibleTarget(msg) => (StatusCode::FORBIDDEN, msg),
                EngineError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
                EngineError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
                EngineError::AlreadyRevealed => (StatusCode::BAD_REQUEST, EngineError::AlreadyRevealed.to_string()),
                EngineError::Internal(e) => {
                    error!("Internal error: {:#}", e);
                    if EXPOSE_STACK.load(Ordering::Relaxed) {
                        stack = Some(format!("{:?}", e));
                    }
                    (StatusCode::INTERNAL_SERVER_ERROR, "Server Error".to_string())
                }
            },
        };

        (status, Json(ErrorBody { success: false, message, stack })).into_response()
    }
}
