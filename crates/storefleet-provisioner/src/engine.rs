//! Provisioning engine
//!
//! Turns a single create request into the sequence of asynchronous,
//! partially-idempotent infrastructure steps that realize a store, while
//! keeping the registry's view of store state consistent with the cluster.

use std::sync::Arc;

use serde::Serialize;

use storefleet_cluster::{ConnectionStatus, StoreResources};
use storefleet_helm::{ReleaseScope, ReleaseSummary};

use crate::error::{ProvisionError, Result};
use crate::ops::{ClusterOps, StoreInstallRequest, StoreInstaller};
use crate::registry::{Registry, StatusPatch};
use crate::store::{
    normalize_store_name, store_namespace, StoreRecord, StoreStatus, StoreType,
};

const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";

/// A create request as it arrives from the API layer
#[derive(Debug, Clone)]
pub struct CreateStore {
    pub name: String,
    /// Raw type string, validated against the supported set
    pub store_type: String,
    pub admin_email: Option<String>,
    /// Run the provisioning steps inline instead of in a background task
    pub synchronous: bool,
}

impl CreateStore {
    pub fn new(name: impl Into<String>, store_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store_type: store_type.into(),
            admin_email: None,
            synchronous: false,
        }
    }
}

/// A store record plus best-effort live cluster state
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatusReport {
    #[serde(flatten)]
    pub store: StoreRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<StoreResources>,
}

/// Health of the engine's two collaborators
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub orchestrator: ConnectionStatus,
    pub package_tool: PackageToolStatus,
    pub healthy: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageToolStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub releases_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The provisioning engine; cheap to clone, shared across request handlers
#[derive(Clone)]
pub struct Provisioner {
    registry: Arc<Registry>,
    cluster: Arc<dyn ClusterOps>,
    installer: Arc<dyn StoreInstaller>,
    domain_suffix: String,
}

impl Provisioner {
    pub fn new(
        cluster: Arc<dyn ClusterOps>,
        installer: Arc<dyn StoreInstaller>,
        domain_suffix: impl Into<String>,
    ) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            cluster,
            installer,
            domain_suffix: domain_suffix.into(),
        }
    }

    fn store_url(&self, name: &str) -> String {
        format!("http://{}{}", name, self.domain_suffix)
    }

    /// Register a store and launch its provisioning task.
    ///
    /// Returns the freshly inserted record immediately; callers observe
    /// `pending`/`provisioning` and poll status until the task settles.
    pub async fn create_store(&self, request: CreateStore) -> Result<StoreRecord> {
        let store_type: StoreType = request.store_type.parse()?;
        let name = normalize_store_name(&request.name);
        let admin_email = request
            .admin_email
            .unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string());

        let record = StoreRecord::new(&name, store_type, &admin_email);
        self.registry.try_insert(record.clone())?;

        let engine = self.clone();
        if request.synchronous {
            engine.run_provision(name).await;
        } else {
            tokio::spawn(async move {
                engine.run_provision(name).await;
            });
        }

        Ok(record)
    }

    /// Task body shared by the synchronous and background paths.
    ///
    /// Every failure funnels into the same transition call the success
    /// path uses; nothing escapes the task uncaught.
    async fn run_provision(&self, name: String) {
        if let Err(err) = self.provision(&name).await {
            let message = err.to_string();
            tracing::error!(store = %name, error = %message, "Failed to provision store");
            self.registry.transition(
                &name,
                StoreStatus::Failed,
                StatusPatch::none().with_error(message),
            );
        }
    }

    async fn provision(&self, name: &str) -> Result<()> {
        let Some(record) = self.registry.get(name) else {
            // Deleted out from under us before the task started
            return Ok(());
        };

        self.registry
            .transition(name, StoreStatus::Provisioning, StatusPatch::none());
        tracing::info!(store = %name, "Starting provisioning");

        let namespace = store_namespace(name);
        self.cluster.create_namespace(name).await?;
        self.cluster.apply_quota(&namespace).await?;

        let ingress_host = format!("{}{}", name, self.domain_suffix);
        let outcome = self
            .installer
            .install(&StoreInstallRequest {
                store: name.to_string(),
                store_type: record.store_type,
                namespace,
                admin_email: record.admin_email,
                ingress_host: ingress_host.clone(),
            })
            .await
            .map_err(|err| ProvisionError::Install(err.to_string()))?;

        let url = format!("http://{ingress_host}");
        self.registry.transition(
            name,
            StoreStatus::Ready,
            StatusPatch::none()
                .with_url(url.clone())
                .with_credentials(outcome.credentials),
        );
        tracing::info!(store = %name, url = %url, "Store provisioned");
        Ok(())
    }

    pub fn get_store(&self, name: &str) -> Option<StoreRecord> {
        self.registry.get(&normalize_store_name(name))
    }

    pub fn list_stores(&self) -> Vec<StoreRecord> {
        self.registry.list()
    }

    /// Record plus live cluster resources for provisioning/ready stores.
    ///
    /// A failed enumeration must not fail the status call; it only omits
    /// the resources field.
    pub async fn store_status(&self, name: &str) -> Result<StoreStatusReport> {
        let name = normalize_store_name(name);
        let store = self
            .registry
            .get(&name)
            .ok_or_else(|| ProvisionError::StoreNotFound(name.clone()))?;

        let resources = if matches!(
            store.status,
            StoreStatus::Provisioning | StoreStatus::Ready
        ) {
            match self.cluster.store_resources(&name).await {
                Ok(resources) => Some(resources),
                Err(err) => {
                    tracing::warn!(store = %name, error = %err, "Failed to enumerate store resources");
                    None
                }
            }
        } else {
            None
        };

        Ok(StoreStatusReport { store, resources })
    }

    /// Tear a store down and evict it from the registry.
    ///
    /// Uninstall and namespace deletion both treat "already gone" as
    /// success; a hard failure leaves the record behind as `failed` so the
    /// failure stays inspectable.
    pub async fn delete_store(&self, name: &str, force: bool) -> Result<String> {
        let name = normalize_store_name(name);
        let store = self
            .registry
            .get(&name)
            .ok_or_else(|| ProvisionError::StoreNotFound(name.clone()))?;

        if store.status == StoreStatus::Provisioning && !force {
            return Err(ProvisionError::StillProvisioning(name));
        }

        self.registry
            .transition(&name, StoreStatus::Deleting, StatusPatch::none());

        match self.teardown(&name, store.store_type).await {
            Ok(()) => {
                self.registry
                    .transition(&name, StoreStatus::Deleted, StatusPatch::none());
                self.registry.remove(&name);
                tracing::info!(store = %name, "Store deleted");
                Ok(format!("Store '{name}' deleted successfully"))
            }
            Err(err) => {
                let message = err.to_string();
                tracing::error!(store = %name, error = %message, "Failed to delete store");
                self.registry.transition(
                    &name,
                    StoreStatus::Failed,
                    StatusPatch::none().with_error(format!("Deletion failed: {message}")),
                );
                Err(ProvisionError::DeletionFailed(message))
            }
        }
    }

    async fn teardown(&self, name: &str, store_type: StoreType) -> Result<()> {
        let namespace = store_namespace(name);

        tracing::info!(store = %name, "Uninstalling release");
        match self.installer.uninstall(name, store_type, &namespace).await {
            Ok(outcome) if outcome.already_deleted => {
                tracing::debug!(store = %name, "Release already deleted");
            }
            Ok(_) => {}
            // A dangling release is cleaned up with the namespace below
            Err(err) => {
                tracing::warn!(store = %name, error = %err, "Release uninstall may have failed");
            }
        }

        tracing::info!(namespace = %namespace, "Deleting namespace");
        let deletion = self.cluster.delete_namespace(name).await?;
        if deletion.already_deleted {
            tracing::debug!(namespace = %namespace, "Namespace already deleted");
        }
        Ok(())
    }

    /// Rebuild the registry from observed cluster state.
    ///
    /// Invoked once at process startup, before serving requests. Returns
    /// the number of stores restored.
    pub async fn reconcile(&self) -> Result<usize> {
        tracing::info!("Syncing stores from cluster");
        let namespaces = self.cluster.list_store_namespaces().await?;

        let mut restored = 0;
        for ns in namespaces {
            let Some(store_name) = ns.store else {
                continue;
            };

            let releases = match self
                .installer
                .list_releases(&ReleaseScope::Namespace(ns.name.clone()))
                .await
            {
                Ok(releases) => releases,
                Err(err) => {
                    tracing::warn!(namespace = %ns.name, error = %err, "Failed to list releases");
                    continue;
                }
            };

            let Some(store_type) = infer_store_type(&releases) else {
                tracing::warn!(
                    store = %store_name,
                    namespace = %ns.name,
                    "Could not determine store type, skipping"
                );
                continue;
            };

            let record = StoreRecord::reconciled(
                &store_name,
                store_type,
                self.store_url(&store_name),
                ns.created_at,
            );
            self.registry.insert(record);
            restored += 1;
            tracing::info!(store = %store_name, r#type = %store_type, "Restored store from cluster");
        }

        Ok(restored)
    }

    /// Probe both collaborators; reports rather than fails
    pub async fn cluster_health(&self) -> HealthReport {
        let orchestrator = self.cluster.check_connection().await;

        let package_tool = match self
            .installer
            .list_releases(&ReleaseScope::AllNamespaces)
            .await
        {
            Ok(releases) => PackageToolStatus {
                connected: true,
                releases_count: Some(releases.len()),
                error: None,
            },
            Err(err) => PackageToolStatus {
                connected: false,
                releases_count: None,
                error: Some(err.to_string()),
            },
        };

        let healthy = orchestrator.connected && package_tool.connected;
        HealthReport {
            orchestrator,
            package_tool,
            healthy,
        }
    }
}

/// Infer a store's type from the releases installed in its namespace
fn infer_store_type(releases: &[ReleaseSummary]) -> Option<StoreType> {
    for release in releases {
        let chart = release.chart.as_deref().unwrap_or("").to_lowercase();
        if chart.contains("woocommerce") || release.name.starts_with("woo-") {
            return Some(StoreType::Woocommerce);
        }
    }
    None
}
