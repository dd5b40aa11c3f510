use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::ApiError;

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Success";

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Uniform success envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    /// A blank message falls back to `"Success"`.
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_SUCCESS_MESSAGE.to_string()
        } else {
            message
        };
        Self {
            status_code: status.as_u16(),
            data,
            message,
            success: status.as_u16() < 400,
        }
    }

    pub fn with_status(status: StatusCode, data: T, message: impl Into<String>) -> ApiResult<T> {
        Ok(Self::new(status, data, message))
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Wire form of [`ApiError`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope<'a> {
    pub status_code: u16,
    pub data: Option<()>,
    pub message: &'a str,
    pub success: bool,
    pub errors: &'a [String],
}

impl<'a> From<&'a ApiError> for ErrorEnvelope<'a> {
    fn from(err: &'a ApiError) -> Self {
        Self {
            status_code: err.status().as_u16(),
            data: None,
            message: err.message(),
            success: false,
            errors: err.errors(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            log_api_error(&self);
        } else {
            tracing::debug!(
                kind = ?self.kind(),
                status = %self.status(),
                error = %self.message(),
                "request rejected"
            );
        }
        (self.status(), Json(ErrorEnvelope::from(&self))).into_response()
    }
}

pub(crate) fn log_api_error(err: &ApiError) {
    match err.stack() {
        Some(stack) => tracing::error!(
            kind = ?err.kind(),
            status = %err.status(),
            error = %err.message(),
            stack = %stack,
            "request failed"
        ),
        None => tracing::error!(
            kind = ?err.kind(),
            status = %err.status(),
            error = %err.message(),
            "request failed"
        ),
    }
}
