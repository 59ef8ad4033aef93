use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use branch_llm::LLMError;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("GROQ_API_KEY missing")]
    MissingApiKey,

    #[error("{0}")]
    BadRequest(String),

    /// Upstream rejected the request; its status is relayed unchanged.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Network error contacting upstream: {0}")]
    Network(String),

    /// Upstream JSON error body, relayed as it was received.
    #[error("{body}")]
    UpstreamBody { status: StatusCode, body: Value },

    #[error("Stream error: {0}")]
    Stream(String),
}

fn relayed_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

impl From<LLMError> for AppError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Api { status, message } => AppError::Upstream {
                status: relayed_status(status),
                message,
            },
            LLMError::UpstreamBody { status, body } => AppError::UpstreamBody {
                status: relayed_status(status),
                body,
            },
            LLMError::Http(err) => AppError::Network(err.to_string()),
            other => AppError::Stream(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct JsonError {
    error: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream { status, .. } | AppError::UpstreamBody { status, .. } => *status,
            AppError::Network(_) => StatusCode::BAD_GATEWAY,
            AppError::Stream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::UpstreamBody { body, .. } = self {
            return HttpResponse::build(self.status_code()).json(body);
        }
        HttpResponse::build(self.status_code()).json(JsonError {
            error: self.to_string(),
        })
    }
}
