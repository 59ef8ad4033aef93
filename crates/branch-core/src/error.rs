use thiserror::Error;

use crate::MAX_DEPTH;

pub type Result<T, E = BranchError> = std::result::Result<T, E>;

/// Errors raised by workspace operations.
///
/// The structural variants are returned before any request is built and
/// leave every buffer untouched. `RemoteFailure` and `StreamDecodeFailure`
/// come back from the network side and are recorded on the target entry or
/// node instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BranchError {
    #[error("input is empty")]
    EmptyInput,

    #[error("branch depth limit reached: parent is at depth {depth} (max {MAX_DEPTH}); merge or close a nested branch first")]
    DepthExceeded { depth: u32 },

    #[error("branch still has {children} open child branch(es); merge or close them first")]
    HasLiveChildren { children: usize },

    #[error("branch has nothing to merge")]
    NothingToMerge,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already has a request in flight")]
    Busy(String),

    #[error("{message}")]
    RemoteFailure { message: String },

    #[error("failed to decode response stream: {0}")]
    StreamDecodeFailure(String),
}

impl BranchError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteFailure {
            message: message.into(),
        }
    }

    /// Structural errors are rejected up front and never reach the network.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Self::RemoteFailure { .. } | Self::StreamDecodeFailure(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_are_not_structural() {
        assert!(!BranchError::remote("boom").is_structural());
        assert!(!BranchError::StreamDecodeFailure("bad byte".into()).is_structural());
        assert!(BranchError::EmptyInput.is_structural());
        assert!(BranchError::HasLiveChildren { children: 2 }.is_structural());
    }

    #[test]
    fn remote_failure_displays_message_verbatim() {
        assert_eq!(
            BranchError::remote("rate limited").to_string(),
            "rate limited"
        );
    }
}
