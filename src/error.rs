use std::backtrace::{Backtrace, BacktraceStatus};

use axum::http::StatusCode;

use crate::users::repo_types::RepoError;

pub const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong!";

/// Failure category carried by every [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Auth,
    Upload,
    Internal,
}

/// Structured request failure. Rendered as the error envelope by `IntoResponse` in
/// `crate::response`.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ErrorKind,
    status: StatusCode,
    message: String,
    errors: Vec<String>,
    stack: Option<String>,
}

impl ApiError {
    /// Builds an error for an arbitrary status, picking the kind from the status class.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let kind = match status {
            StatusCode::CONFLICT => ErrorKind::Conflict,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Auth,
            s if s.is_server_error() => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        };
        Self::with_kind(kind, status, message)
    }

    fn with_kind(kind: ErrorKind, status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_ERROR_MESSAGE.to_string()
        } else {
            message
        };
        let backtrace = Backtrace::capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };
        Self {
            kind,
            status,
            message,
            errors: Vec::new(),
            stack,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Validation, StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Conflict, StatusCode::CONFLICT, message)
    }

    /// Credentials refer to no known account.
    pub fn unknown_user(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Auth, StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Auth, StatusCode::UNAUTHORIZED, message)
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Upload, StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_kind(
            ErrorKind::Internal,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
        )
    }

    pub fn with_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors = errors.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the captured stack with one supplied by the caller.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate => {
                ApiError::conflict("A user with this email or username already exists")
            }
            RepoError::Other(e) => ApiError::internal(e.to_string()),
        }
    }
}
