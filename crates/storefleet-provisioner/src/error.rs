//! Provisioning engine error types

use thiserror::Error;

/// Provisioning engine errors
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Invalid store type: {0}. Must be 'woocommerce'")]
    UnsupportedType(String),

    #[error("Store '{0}' already exists")]
    StoreExists(String),

    #[error("Store '{0}' not found")]
    StoreNotFound(String),

    #[error("Store '{0}' is still provisioning. Use force=true to delete anyway")]
    StillProvisioning(String),

    #[error("Failed to install Helm release: {0}")]
    Install(String),

    #[error("Deletion failed: {0}")]
    DeletionFailed(String),

    #[error("Cluster error: {0}")]
    Cluster(#[from] storefleet_cluster::ClusterError),

    #[error("helm error: {0}")]
    Helm(#[from] storefleet_helm::HelmError),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
