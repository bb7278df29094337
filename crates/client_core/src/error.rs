use shared::{domain::AnalysisStatus, error::ApiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status} for {url}: {body}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },
    #[error("server rejected the request: {}", .0.message)]
    Api(ApiError),
    #[error("invalid response payload: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("analysis {id} is not completed (status: {status})")]
    NotReady { id: String, status: AnalysisStatus },
    #[error("server did not redirect to the new analysis")]
    MissingRedirect,
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("chart rendering failed: {0}")]
    Chart(String),
}

impl<E> From<plotters::drawing::DrawingAreaErrorKind<E>> for ClientError
where
    E: std::error::Error + Send + Sync,
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        Self::Chart(value.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<base64::DecodeError> for ClientError {
    fn from(value: base64::DecodeError) -> Self {
        Self::Decode(format!("invalid base64 image body: {value}"))
    }
}

impl From<shared::error::ApiException> for ClientError {
    fn from(value: shared::error::ApiException) -> Self {
        Self::Invalid(value.message)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
