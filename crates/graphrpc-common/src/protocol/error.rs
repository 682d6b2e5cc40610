use super::messages::{ErrorCode, ErrorResponse};
use crate::codec::CodecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphRpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Endpoint {0} is offline")]
    Offline(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Remote error {code}: {message}")]
    Remote {
        code: ErrorCode,
        message: String,
        data: Option<String>,
    },

    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),

    #[error("'{0}' is not supported for remote stores")]
    NotSupportedRemotely(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphRpcError {
    /// Transport-level failures, retried by the client's policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GraphRpcError::Transport(_) | GraphRpcError::Timeout(_) | GraphRpcError::Io(_)
        )
    }

    /// Failures a fault-tolerant read may absorb into a default result.
    /// Errors reported by the remote side are never absorbed.
    pub fn is_degradable(&self) -> bool {
        self.is_retryable()
            || matches!(
                self,
                GraphRpcError::Offline(_)
                    | GraphRpcError::Codec(_)
                    | GraphRpcError::UnexpectedPayload(_)
            )
    }

    /// The reserved error code, for remote failures.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            GraphRpcError::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<ErrorResponse> for GraphRpcError {
    fn from(e: ErrorResponse) -> Self {
        GraphRpcError::Remote {
            code: e.code,
            message: e.message,
            data: e.data,
        }
    }
}

/// Result type used across GraphRPC
pub type Result<T> = std::result::Result<T, GraphRpcError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_retry_classification() {
        assert!(GraphRpcError::Transport("reset".into()).is_retryable());
        assert!(GraphRpcError::Timeout(100).is_retryable());
        assert!(!GraphRpcError::Offline("http://x".into()).is_retryable());
        assert!(!GraphRpcError::Codec(CodecError::MissingId("{}".into())).is_retryable());
    }

    #[test]
    fn test_remote_errors_do_not_degrade() {
        let remote: GraphRpcError =
            ErrorResponse::method_not_found(Uuid::new_v4(), "doesnotexist").into();
        assert!(!remote.is_degradable());
        assert_eq!(remote.code(), Some(ErrorCode::MethodNotFound));
        assert!(remote.to_string().contains("-32601"));

        assert!(GraphRpcError::Offline("http://x".into()).is_degradable());
        assert!(!GraphRpcError::NotSupportedRemotely("create_container".into()).is_degradable());
    }
}
