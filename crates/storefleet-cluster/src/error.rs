//! Cluster client error types

use thiserror::Error;

/// Cluster client errors
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Kubernetes API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Cluster connection failed: {0}")]
    Connection(String),

    #[error("Kubernetes client configuration failed: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(e) => ClusterError::Api {
                code: e.code,
                message: e.message,
            },
            other => ClusterError::Connection(other.to_string()),
        }
    }
}
