use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    Validation,
    NotReady,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Maps the server's `{status, message}` answer. The server only emits it for
    /// rejected tokens and form errors, so a non-zero status with an
    /// authentication message is reported as `Unauthorized`.
    pub fn from_generic(response: &GenericResponse) -> Self {
        let lower = response.message.to_ascii_lowercase();
        let code = if lower.contains("token")
            || lower.contains("credential")
            || lower.contains("signature")
        {
            ErrorCode::Unauthorized
        } else {
            ErrorCode::Internal
        };
        Self::new(code, response.message.clone())
    }
}

/// Generic answer of the API when a call cannot produce its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericResponse {
    pub status: i32,
    #[serde(default)]
    pub message: String,
}

impl GenericResponse {
    pub fn is_failure(&self) -> bool {
        self.status != 0
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ApiException> for ApiError {
    fn from(value: ApiException) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}

impl From<ApiError> for ApiException {
    fn from(value: ApiError) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}
