//! Typed errors and HTTP mapping.

use crate::model::ModelError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("route {route}: unknown model {model}")]
    MissingModel { route: String, model: String },
    #[error("route {route}: unknown field {field}")]
    UnknownField { route: String, field: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Request-level failures. Save failures map onto the three-way body
/// taxonomy (`validation_error` / `model_error` / `unknown_error`), all of
/// them answered with 400; the remaining variants carry empty bodies.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found")]
    NotFound,
    #[error("bad request")]
    BadRequest,
    #[error("unsupported media type")]
    UnsupportedMediaType,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("not implemented")]
    NotImplemented,
    #[error("{message}")]
    Validation { message: String, errors: serde_json::Value },
    #[error("{0}")]
    Model(String),
    #[error("{0}")]
    Unknown(String),
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Validation { message, errors } => ApiError::Validation { message, errors },
            ModelError::Domain(message) => ApiError::Model(message),
            // Unclassified persistence failures stay client-facing 400s.
            ModelError::Db(e) => ApiError::Unknown(format!("database: {e}")),
            ModelError::Other(message) => ApiError::Unknown(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Config(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::BadRequest => StatusCode::BAD_REQUEST.into_response(),
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response(),
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
            ApiError::NotImplemented => StatusCode::NOT_IMPLEMENTED.into_response(),
            ApiError::Validation { message, errors } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "validation_error",
                    "message": message,
                    "errors": errors,
                })),
            )
                .into_response(),
            ApiError::Model(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "model_error", "message": message})),
            )
                .into_response(),
            ApiError::Unknown(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "unknown_error", "message": message})),
            )
                .into_response(),
        }
    }
}
