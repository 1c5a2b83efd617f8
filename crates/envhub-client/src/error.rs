use thiserror::Error;

/// Errors returned by [`crate::EnvhubClient`].
///
/// Every variant names the client operation that failed. Nothing is retried.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{operation}: request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: server responded {status}: {error}")]
    Status {
        operation: &'static str,
        status: u16,
        error: String,
    },

    #[error("{operation}: failed to decode response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation}: environment '{name}' not found")]
    NotFound {
        operation: &'static str,
        name: String,
    },

    #[error("{operation}: key '{key}' not found")]
    KeyNotFound {
        operation: &'static str,
        key: String,
    },

    #[error("{operation}: invalid url '{url}': {reason}")]
    InvalidUrl {
        operation: &'static str,
        url: String,
        reason: String,
    },

    #[error("{operation}: '{key}' cannot be exported as a process variable")]
    InvalidVariable {
        operation: &'static str,
        key: String,
    },
}

impl ClientError {
    /// True for a missing environment or key, including a 404 from the server.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ClientError::NotFound { .. }
                | ClientError::KeyNotFound { .. }
                | ClientError::Status { status: 404, .. }
        )
    }

    pub fn operation(&self) -> &'static str {
        match self {
            ClientError::Transport { operation, .. }
            | ClientError::Status { operation, .. }
            | ClientError::Decode { operation, .. }
            | ClientError::NotFound { operation, .. }
            | ClientError::KeyNotFound { operation, .. }
            | ClientError::InvalidUrl { operation, .. }
            | ClientError::InvalidVariable { operation, .. } => operation,
        }
    }
}
