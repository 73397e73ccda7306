//! Trait seams over the cluster client and the package installer
//!
//! The engine orchestrates through these traits so the state machine can
//! be exercised against in-memory fakes.

use async_trait::async_trait;

use storefleet_cluster::{
    ClusterClient, ClusterError, ConnectionStatus, DeleteOutcome, ManagedNamespace, QuotaLimits,
    StoreResources,
};
use storefleet_helm::{
    Helm, HelmError, ReleaseScope, ReleaseSummary, UninstallOutcome, WooInstallRequest,
};

use crate::store::{Credentials, StoreType};

/// Cluster-side operations the engine needs
#[async_trait]
pub trait ClusterOps: Send + Sync {
    async fn create_namespace(&self, store: &str) -> Result<(), ClusterError>;

    async fn apply_quota(&self, namespace: &str) -> Result<(), ClusterError>;

    async fn delete_namespace(&self, store: &str) -> Result<DeleteOutcome, ClusterError>;

    async fn list_store_namespaces(&self) -> Result<Vec<ManagedNamespace>, ClusterError>;

    async fn store_resources(&self, store: &str) -> Result<StoreResources, ClusterError>;

    async fn check_connection(&self) -> ConnectionStatus;
}

/// Install parameters the engine hands to the installer
#[derive(Debug, Clone)]
pub struct StoreInstallRequest {
    pub store: String,
    pub store_type: StoreType,
    pub namespace: String,
    pub admin_email: String,
    pub ingress_host: String,
}

/// Result of a successful workload install
#[derive(Debug, Clone)]
pub struct StoreInstallOutcome {
    pub release: String,
    pub credentials: Credentials,
}

/// Package-installer operations the engine needs
#[async_trait]
pub trait StoreInstaller: Send + Sync {
    async fn install(&self, request: &StoreInstallRequest)
        -> Result<StoreInstallOutcome, HelmError>;

    async fn uninstall(
        &self,
        store: &str,
        store_type: StoreType,
        namespace: &str,
    ) -> Result<UninstallOutcome, HelmError>;

    async fn list_releases(&self, scope: &ReleaseScope) -> Result<Vec<ReleaseSummary>, HelmError>;
}

#[async_trait]
impl ClusterOps for ClusterClient {
    async fn create_namespace(&self, store: &str) -> Result<(), ClusterError> {
        ClusterClient::create_namespace(self, store).await.map(|_| ())
    }

    async fn apply_quota(&self, namespace: &str) -> Result<(), ClusterError> {
        self.create_resource_quota(namespace, &QuotaLimits::default())
            .await
            .map(|_| ())
    }

    async fn delete_namespace(&self, store: &str) -> Result<DeleteOutcome, ClusterError> {
        ClusterClient::delete_namespace(self, store).await
    }

    async fn list_store_namespaces(&self) -> Result<Vec<ManagedNamespace>, ClusterError> {
        ClusterClient::list_store_namespaces(self).await
    }

    async fn store_resources(&self, store: &str) -> Result<StoreResources, ClusterError> {
        ClusterClient::store_resources(self, store).await
    }

    async fn check_connection(&self) -> ConnectionStatus {
        ClusterClient::check_connection(self).await
    }
}

#[async_trait]
impl StoreInstaller for Helm {
    async fn install(
        &self,
        request: &StoreInstallRequest,
    ) -> Result<StoreInstallOutcome, HelmError> {
        match request.store_type {
            StoreType::Woocommerce => {
                let mut woo = WooInstallRequest::new(&request.store, &request.namespace);
                woo.admin_email = request.admin_email.clone();
                woo.ingress_host = Some(request.ingress_host.clone());
                // The engine creates and labels the namespace itself
                woo.create_namespace = false;

                let install = self.install_woocommerce(&woo).await?;
                Ok(StoreInstallOutcome {
                    release: install.release,
                    credentials: install.credentials.into(),
                })
            }
        }
    }

    async fn uninstall(
        &self,
        store: &str,
        store_type: StoreType,
        namespace: &str,
    ) -> Result<UninstallOutcome, HelmError> {
        match store_type {
            StoreType::Woocommerce => self.uninstall_store(store, namespace).await,
        }
    }

    async fn list_releases(&self, scope: &ReleaseScope) -> Result<Vec<ReleaseSummary>, HelmError> {
        Helm::list_releases(self, scope).await
    }
}
