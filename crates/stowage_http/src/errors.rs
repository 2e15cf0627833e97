use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror;

use stowage_core::Error as CoreError;

use super::response::ApiResponse;

pub type Result<T> = std::result::Result<T, Error>;

const API_NAMESPACE: &str = "api_upload";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} is required")]
    MissingHeader(&'static str),

    #[error("missing multipart field: {0}")]
    MissingFormField(&'static str),

    #[error("invalid multipart field: {0}")]
    InvalidFormField(&'static str),

    #[error(transparent)]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("error serializing response: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::MissingHeader(_)
            | Error::MissingFormField(_)
            | Error::InvalidFormField(_) => {
                ApiResponse::error(StatusCode::BAD_REQUEST, format!("{}", self), Value::Null)
            }
            Error::Multipart(e) => {
                ApiResponse::error(StatusCode::BAD_REQUEST, format!("{}", e), Value::Null)
            }
            Error::SerdeJson(e) => internal_error(&e),
            Error::Core(e) => core_error_to_response(e),
        }
        .into_response()
    }
}

fn core_error_to_response(e: CoreError) -> ApiResponse {
    match e {
        CoreError::InvalidJobType(_) => {
            ApiResponse::error(StatusCode::BAD_REQUEST, e.to_string(), Value::Null)
        }
        CoreError::ProjectNotFound(_) => {
            ApiResponse::error(StatusCode::NOT_FOUND, e.to_string(), Value::Null)
        }
        CoreError::Conflict { kind, failed } => {
            let error_msg = match kind {
                stowage_core::ConflictKind::File => {
                    "[Invalid File] File Name has already taken by other resources(file/folder)"
                }
                stowage_core::ConflictKind::Folder => {
                    "[Invalid Folder] Folder Name has already taken by other resources(file/folder)"
                }
            };
            ApiResponse::error(
                StatusCode::CONFLICT,
                error_msg,
                json!({ "failed": failed }),
            )
        }
        CoreError::ResourceLocked(_) => {
            ApiResponse::error(StatusCode::CONFLICT, e.to_string(), Value::Null)
        }
        CoreError::Token(_) => {
            ApiResponse::error(StatusCode::BAD_REQUEST, e.to_string(), Value::Null)
        }
        CoreError::JobNotFound(_) => {
            ApiResponse::error(StatusCode::BAD_REQUEST, e.to_string(), Value::Null)
        }
        CoreError::PreconditionMissing(_)
        | CoreError::IllegalTransition { .. }
        | CoreError::CombineNotAllowed { .. } => {
            ApiResponse::error(StatusCode::BAD_REQUEST, e.to_string(), Value::Null)
        }
        CoreError::Backend(_) => internal_error(&e),
    }
}

fn internal_error(e: &dyn std::fmt::Display) -> ApiResponse {
    tracing::error!("internal error: {e}");
    ApiResponse::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("[Internal] {API_NAMESPACE} {e}"),
        Value::Null,
    )
}
