//! The response envelope shared by every endpoint.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::Value;

/// `{code, error_msg, page, total, num_of_pages, result}`: the envelope clients
/// expect on success and failure alike. `code` mirrors the HTTP status.
#[derive(Clone, Debug, Serialize)]
pub struct ApiResponse {
    pub code: u16,
    pub error_msg: String,
    pub page: u32,
    pub total: u32,
    pub num_of_pages: u32,
    pub result: Value,
}

impl ApiResponse {
    pub fn success(result: Value) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            error_msg: String::new(),
            page: 0,
            total: 1,
            num_of_pages: 1,
            result,
        }
    }

    pub fn error(status: StatusCode, error_msg: impl Into<String>, result: Value) -> Self {
        Self {
            code: status.as_u16(),
            error_msg: error_msg.into(),
            page: 0,
            total: 1,
            num_of_pages: 1,
            result,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
