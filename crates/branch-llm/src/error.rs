use branch_core::BranchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Upstream error body that is JSON but carries no `error.message`.
    #[error("API error ({status}): {body}")]
    UpstreamBody { status: u16, body: serde_json::Value },

    #[error("Decode error: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;

impl From<LLMError> for BranchError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Decode(detail) => BranchError::StreamDecodeFailure(detail),
            LLMError::Api { status, message } => {
                BranchError::remote(format!("HTTP {status}: {message}"))
            }
            LLMError::UpstreamBody { status, body } => {
                BranchError::remote(format!("HTTP {status}: {body}"))
            }
            other => BranchError::remote(other.to_string()),
        }
    }
}
