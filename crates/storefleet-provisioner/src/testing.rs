//! In-memory fakes for exercising the engine without a cluster.
//!
//! Available to dependent crates through the `test-utils` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use storefleet_cluster::{
    ClusterError, ConnectionStatus, DeleteOutcome, ManagedNamespace, StoreResources,
};
use storefleet_helm::{HelmError, ReleaseScope, ReleaseSummary, UninstallOutcome};

use crate::ops::{ClusterOps, StoreInstallRequest, StoreInstallOutcome, StoreInstaller};
use crate::store::{store_namespace, Credentials};

/// Cluster fake: records calls, serves canned namespaces
#[derive(Default)]
pub struct FakeCluster {
    namespaces: Mutex<Vec<ManagedNamespace>>,
    pub deleted_namespaces: Mutex<Vec<String>>,
    fail_delete: AtomicBool,
    missing: AtomicBool,
    fail_resources: AtomicBool,
}

impl FakeCluster {
    /// Seed a namespace for `list_store_namespaces`
    pub fn add_namespace(&self, namespace: ManagedNamespace) {
        self.namespaces
            .lock()
            .expect("fake lock poisoned")
            .push(namespace);
    }

    /// Make `delete_namespace` fail with a server error
    pub fn fail_namespace_delete(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    /// Make `delete_namespace` report the namespace as already gone
    pub fn namespace_missing(&self) {
        self.missing.store(true, Ordering::SeqCst);
    }

    /// Make `store_resources` fail
    pub fn fail_resources(&self) {
        self.fail_resources.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClusterOps for FakeCluster {
    async fn create_namespace(&self, _store: &str) -> Result<(), ClusterError> {
        Ok(())
    }

    async fn apply_quota(&self, _namespace: &str) -> Result<(), ClusterError> {
        Ok(())
    }

    async fn delete_namespace(&self, store: &str) -> Result<DeleteOutcome, ClusterError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ClusterError::Api {
                code: 500,
                message: "namespace deletion refused".to_string(),
            });
        }
        self.deleted_namespaces
            .lock()
            .expect("fake lock poisoned")
            .push(store.to_string());
        Ok(DeleteOutcome {
            name: store_namespace(store),
            already_deleted: self.missing.load(Ordering::SeqCst),
        })
    }

    async fn list_store_namespaces(&self) -> Result<Vec<ManagedNamespace>, ClusterError> {
        Ok(self.namespaces.lock().expect("fake lock poisoned").clone())
    }

    async fn store_resources(&self, store: &str) -> Result<StoreResources, ClusterError> {
        if self.fail_resources.load(Ordering::SeqCst) {
            return Err(ClusterError::Connection(
                "apiserver unreachable".to_string(),
            ));
        }
        let namespace = store_namespace(store);
        Ok(StoreResources {
            namespace,
            deployments: vec![format!("woo-{store}-wordpress")],
            services: vec![format!("woo-{store}-wordpress")],
            ingresses: vec![format!("woo-{store}-wordpress")],
            pvcs: vec![format!("data-woo-{store}-mariadb-0")],
        })
    }

    async fn check_connection(&self) -> ConnectionStatus {
        ConnectionStatus::ok("v1.30.0-fake", "fake/amd64")
    }
}

/// Installer fake: records calls, hands out canned releases and credentials
#[derive(Default)]
pub struct FakeInstaller {
    pub installed: Mutex<Vec<String>>,
    pub uninstalled: Mutex<Vec<String>>,
    releases: Mutex<HashMap<String, Vec<ReleaseSummary>>>,
    fail_install_with: Mutex<Option<String>>,
    fail_list_with: Mutex<Option<String>>,
    release_missing: AtomicBool,
}

impl FakeInstaller {
    /// Make `install` fail with the given message
    pub fn fail_install(&self, message: &str) {
        *self.fail_install_with.lock().expect("fake lock poisoned") = Some(message.to_string());
    }

    /// Clear any injected install failure
    pub fn succeed(&self) {
        *self.fail_install_with.lock().expect("fake lock poisoned") = None;
    }

    /// Make `uninstall` report the release as already gone
    pub fn release_not_found(&self) {
        self.release_missing.store(true, Ordering::SeqCst);
    }

    /// Make `list_releases` fail with the given message
    pub fn fail_list(&self, message: &str) {
        *self.fail_list_with.lock().expect("fake lock poisoned") = Some(message.to_string());
    }

    /// Seed a release for `list_releases`
    pub fn add_release(&self, namespace: &str, release: ReleaseSummary) {
        self.releases
            .lock()
            .expect("fake lock poisoned")
            .entry(namespace.to_string())
            .or_default()
            .push(release);
    }
}

#[async_trait]
impl StoreInstaller for FakeInstaller {
    async fn install(
        &self,
        request: &StoreInstallRequest,
    ) -> Result<StoreInstallOutcome, HelmError> {
        if let Some(message) = self
            .fail_install_with
            .lock()
            .expect("fake lock poisoned")
            .clone()
        {
            return Err(HelmError::CommandFailed {
                stderr: message,
                stdout: String::new(),
            });
        }

        self.installed
            .lock()
            .expect("fake lock poisoned")
            .push(request.store.clone());
        Ok(StoreInstallOutcome {
            release: format!("woo-{}", request.store),
            credentials: Credentials {
                admin_user: "admin".to_string(),
                admin_password: "fake-admin-password".to_string(),
                db_password: "fake-db-password".to_string(),
                ingress_host: request.ingress_host.clone(),
            },
        })
    }

    async fn uninstall(
        &self,
        store: &str,
        _store_type: crate::store::StoreType,
        _namespace: &str,
    ) -> Result<UninstallOutcome, HelmError> {
        self.uninstalled
            .lock()
            .expect("fake lock poisoned")
            .push(store.to_string());
        Ok(UninstallOutcome {
            release: format!("woo-{store}"),
            already_deleted: self.release_missing.load(Ordering::SeqCst),
        })
    }

    async fn list_releases(&self, scope: &ReleaseScope) -> Result<Vec<ReleaseSummary>, HelmError> {
        if let Some(message) = self
            .fail_list_with
            .lock()
            .expect("fake lock poisoned")
            .clone()
        {
            return Err(HelmError::CommandFailed {
                stderr: message,
                stdout: String::new(),
            });
        }

        let releases = self.releases.lock().expect("fake lock poisoned");
        Ok(match scope {
            ReleaseScope::Namespace(namespace) => {
                releases.get(namespace).cloned().unwrap_or_default()
            }
            ReleaseScope::AllNamespaces => releases.values().flatten().cloned().collect(),
        })
    }
}
