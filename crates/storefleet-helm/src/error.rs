//! helm wrapper error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelmError {
    #[error("helm CLI not found. Please install Helm first")]
    HelmNotFound,

    #[error("helm command failed: {stderr}")]
    CommandFailed { stderr: String, stdout: String },

    #[error("helm command timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Release not found: {0}")]
    ReleaseNotFound(String),

    #[error("WooCommerce chart not found. Please create a WooCommerce Helm chart at {path}")]
    ChartNotFound { path: PathBuf },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HelmError>;
