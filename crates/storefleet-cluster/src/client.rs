//! Kubernetes cluster client
//!
//! Wraps the primitive cluster operations the platform needs, scoped under
//! the deterministic `store-<name>` namespace. Every create treats
//! "already exists" as success and every delete treats "not found" as
//! success; genuine failures (permission, validation, connectivity) come
//! back as `ClusterError`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Namespace, PersistentVolumeClaim, ResourceQuota, Secret, Service,
};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use serde::Serialize;

use crate::error::{ClusterError, Result};
use crate::labels::{managed_selector, store_namespace, STORE_LABEL};
use crate::objects::{
    deployment_object, ingress_object, namespace_object, pvc_object, quota_object, secret_object,
    service_object, url_for_service, DeploymentConfig, IngressConfig, QuotaLimits, ServiceConfig,
};

/// Settings for connecting to the cluster
#[derive(Debug, Clone, Default)]
pub struct ClusterSettings {
    /// Manual API server URL override, for local development setups
    pub api_url_override: Option<String>,
}

/// Outcome of an idempotent create
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub name: String,
    pub already_exists: bool,
}

/// Outcome of an idempotent delete
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub name: String,
    pub already_deleted: bool,
}

/// Outcome of a secret apply; on conflict the secret is replaced
#[derive(Debug, Clone)]
pub struct SecretOutcome {
    pub name: String,
    pub updated: bool,
}

/// Basic namespace metadata
#[derive(Debug, Clone)]
pub struct NamespaceInfo {
    pub name: String,
    pub phase: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
}

/// A namespace carrying the platform's management label
#[derive(Debug, Clone)]
pub struct ManagedNamespace {
    pub name: String,
    pub store: Option<String>,
    pub phase: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Replica counts for a store deployment
#[derive(Debug, Clone)]
pub struct DeploymentHealth {
    pub name: String,
    pub replicas: i32,
    pub ready_replicas: i32,
    pub available_replicas: i32,
    pub is_ready: bool,
}

/// Names of the live objects in a store's namespace
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreResources {
    pub namespace: String,
    pub deployments: Vec<String>,
    pub services: Vec<String>,
    pub ingresses: Vec<String>,
    pub pvcs: Vec<String>,
}

/// Result of the connectivity probe; never an error
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn ok(server_version: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            connected: true,
            server_version: Some(server_version.into()),
            platform: Some(platform.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            server_version: None,
            platform: None,
            error: Some(error.into()),
        }
    }
}

/// Cluster client
#[derive(Clone)]
pub struct ClusterClient {
    client: kube::Client,
}

impl ClusterClient {
    /// Connect using the standard config chain (in-cluster service account,
    /// then kubeconfig), honoring an explicit API URL override.
    pub async fn connect(settings: &ClusterSettings) -> Result<Self> {
        let mut config = match kube::Config::infer().await {
            Ok(config) => config,
            Err(err) if settings.api_url_override.is_some() => {
                tracing::warn!(
                    error = %err,
                    "Standard Kubernetes configuration unavailable, relying on API URL override"
                );
                kube::Config::new(
                    settings
                        .api_url_override
                        .as_deref()
                        .expect("override checked above")
                        .parse()
                        .map_err(|e| ClusterError::Config(format!("invalid API URL: {e}")))?,
                )
            }
            Err(err) => return Err(ClusterError::Config(err.to_string())),
        };

        if let Some(url) = &settings.api_url_override {
            tracing::info!(url = %url, "Overriding Kubernetes API URL");
            config.cluster_url = url
                .parse()
                .map_err(|e| ClusterError::Config(format!("invalid API URL: {e}")))?;

            // Local development clusters use self-signed certs
            if url.contains("localhost") || url.contains("127.0.0.1") {
                config.accept_invalid_certs = true;
            }
        }

        let client =
            kube::Client::try_from(config).map_err(|e| ClusterError::Config(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already-built kube client
    pub fn from_client(client: kube::Client) -> Self {
        Self { client }
    }

    /// Create the labeled namespace for a store
    pub async fn create_namespace(&self, store: &str) -> Result<CreateOutcome> {
        let name = store_namespace(store);
        let api: Api<Namespace> = Api::all(self.client.clone());

        match api.create(&PostParams::default(), &namespace_object(store)).await {
            Ok(_) => {
                tracing::info!(namespace = %name, "Created namespace");
                Ok(CreateOutcome {
                    name,
                    already_exists: false,
                })
            }
            Err(kube::Error::Api(e)) if e.code == 409 => {
                tracing::debug!(namespace = %name, "Namespace already exists");
                Ok(CreateOutcome {
                    name,
                    already_exists: true,
                })
            }
            Err(err) => {
                tracing::error!(namespace = %name, error = %err, "Failed to create namespace");
                Err(err.into())
            }
        }
    }

    /// Delete a store's namespace with foreground propagation
    pub async fn delete_namespace(&self, store: &str) -> Result<DeleteOutcome> {
        let name = store_namespace(store);
        let api: Api<Namespace> = Api::all(self.client.clone());

        match api.delete(&name, &DeleteParams::foreground()).await {
            Ok(_) => Ok(DeleteOutcome {
                name,
                already_deleted: false,
            }),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                tracing::debug!(namespace = %name, "Namespace already deleted");
                Ok(DeleteOutcome {
                    name,
                    already_deleted: true,
                })
            }
            Err(err) => {
                tracing::error!(namespace = %name, error = %err, "Failed to delete namespace");
                Err(err.into())
            }
        }
    }

    /// Read a store's namespace, `None` when it does not exist
    pub async fn get_namespace(&self, store: &str) -> Result<Option<NamespaceInfo>> {
        let name = store_namespace(store);
        let api: Api<Namespace> = Api::all(self.client.clone());

        match api.get(&name).await {
            Ok(ns) => Ok(Some(NamespaceInfo {
                name,
                phase: ns.status.and_then(|s| s.phase),
                created_at: ns.metadata.creation_timestamp.map(|t| t.0),
                labels: ns.metadata.labels.unwrap_or_default(),
            })),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Create or replace an opaque secret
    pub async fn create_secret(
        &self,
        name: &str,
        namespace: &str,
        store: &str,
        data: BTreeMap<String, String>,
    ) -> Result<SecretOutcome> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let object = secret_object(name, namespace, store, data);

        match api.create(&PostParams::default(), &object).await {
            Ok(_) => Ok(SecretOutcome {
                name: name.to_string(),
                updated: false,
            }),
            Err(kube::Error::Api(e)) if e.code == 409 => {
                // Replace needs the live resourceVersion
                let existing = api.get(name).await?;
                let mut replacement = object;
                replacement.metadata.resource_version = existing.metadata.resource_version;
                api.replace(name, &PostParams::default(), &replacement)
                    .await?;
                Ok(SecretOutcome {
                    name: name.to_string(),
                    updated: true,
                })
            }
            Err(err) => {
                tracing::error!(secret = %name, error = %err, "Failed to create secret");
                Err(err.into())
            }
        }
    }

    /// Create a persistent volume claim
    pub async fn create_pvc(
        &self,
        name: &str,
        namespace: &str,
        store: &str,
        storage_size: &str,
        storage_class: Option<&str>,
    ) -> Result<CreateOutcome> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        let object = pvc_object(
            name,
            namespace,
            store,
            storage_size,
            storage_class,
            vec!["ReadWriteOnce".to_string()],
        );

        match api.create(&PostParams::default(), &object).await {
            Ok(_) => Ok(CreateOutcome {
                name: name.to_string(),
                already_exists: false,
            }),
            Err(kube::Error::Api(e)) if e.code == 409 => Ok(CreateOutcome {
                name: name.to_string(),
                already_exists: true,
            }),
            Err(err) => {
                tracing::error!(pvc = %name, error = %err, "Failed to create PVC");
                Err(err.into())
            }
        }
    }

    /// Create a store workload deployment with HTTP liveness/readiness probes
    pub async fn create_deployment(&self, config: &DeploymentConfig) -> Result<CreateOutcome> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &config.namespace);

        match api
            .create(&PostParams::default(), &deployment_object(config))
            .await
        {
            Ok(_) => Ok(CreateOutcome {
                name: config.name.clone(),
                already_exists: false,
            }),
            Err(kube::Error::Api(e)) if e.code == 409 => Ok(CreateOutcome {
                name: config.name.clone(),
                already_exists: true,
            }),
            Err(err) => {
                tracing::error!(deployment = %config.name, error = %err, "Failed to create deployment");
                Err(err.into())
            }
        }
    }

    /// Replica health of a deployment, `None` when it does not exist
    pub async fn deployment_status(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<DeploymentHealth>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);

        match api.get(name).await {
            Ok(deployment) => {
                let desired = deployment
                    .spec
                    .as_ref()
                    .and_then(|s| s.replicas)
                    .unwrap_or(1);
                let status = deployment.status.unwrap_or_default();
                let ready = status.ready_replicas.unwrap_or(0);
                Ok(Some(DeploymentHealth {
                    name: name.to_string(),
                    replicas: status.replicas.unwrap_or(0),
                    ready_replicas: ready,
                    available_replicas: status.available_replicas.unwrap_or(0),
                    is_ready: ready >= desired,
                }))
            }
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Create a service for a store workload
    pub async fn create_service(&self, config: &ServiceConfig) -> Result<CreateOutcome> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), &config.namespace);

        match api
            .create(&PostParams::default(), &service_object(config))
            .await
        {
            Ok(_) => Ok(CreateOutcome {
                name: config.name.clone(),
                already_exists: false,
            }),
            Err(kube::Error::Api(e)) if e.code == 409 => Ok(CreateOutcome {
                name: config.name.clone(),
                already_exists: true,
            }),
            Err(err) => {
                tracing::error!(service = %config.name, error = %err, "Failed to create service");
                Err(err.into())
            }
        }
    }

    /// Best-effort external URL for a service; diagnostic only
    pub async fn service_url(&self, name: &str, namespace: &str) -> Option<String> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);

        match api.get(name).await {
            Ok(service) => url_for_service(&service),
            Err(err) => {
                tracing::warn!(service = %name, error = %err, "Failed to resolve service URL");
                None
            }
        }
    }

    /// Create an ingress for a store workload
    pub async fn create_ingress(&self, config: &IngressConfig) -> Result<CreateOutcome> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), &config.namespace);

        match api
            .create(&PostParams::default(), &ingress_object(config))
            .await
        {
            Ok(_) => Ok(CreateOutcome {
                name: config.name.clone(),
                already_exists: false,
            }),
            Err(kube::Error::Api(e)) if e.code == 409 => Ok(CreateOutcome {
                name: config.name.clone(),
                already_exists: true,
            }),
            Err(err) => {
                tracing::error!(ingress = %config.name, error = %err, "Failed to create ingress");
                Err(err.into())
            }
        }
    }

    /// Apply the per-store resource quota
    pub async fn create_resource_quota(
        &self,
        namespace: &str,
        limits: &QuotaLimits,
    ) -> Result<CreateOutcome> {
        let api: Api<ResourceQuota> = Api::namespaced(self.client.clone(), namespace);

        match api
            .create(&PostParams::default(), &quota_object(namespace, limits))
            .await
        {
            Ok(_) => Ok(CreateOutcome {
                name: "store-quota".to_string(),
                already_exists: false,
            }),
            Err(kube::Error::Api(e)) if e.code == 409 => Ok(CreateOutcome {
                name: "store-quota".to_string(),
                already_exists: true,
            }),
            Err(err) => {
                tracing::error!(namespace = %namespace, error = %err, "Failed to create resource quota");
                Err(err.into())
            }
        }
    }

    /// Enumerate every namespace carrying the platform's management label
    pub async fn list_store_namespaces(&self) -> Result<Vec<ManagedNamespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let params = ListParams::default().labels(&managed_selector());

        let namespaces = api.list(&params).await?;
        Ok(namespaces
            .items
            .into_iter()
            .map(|ns| ManagedNamespace {
                name: ns.metadata.name.unwrap_or_default(),
                store: ns
                    .metadata
                    .labels
                    .as_ref()
                    .and_then(|labels| labels.get(STORE_LABEL).cloned()),
                phase: ns.status.and_then(|s| s.phase),
                created_at: ns.metadata.creation_timestamp.map(|t| t.0),
            })
            .collect())
    }

    /// Enumerate the live objects in a store's namespace
    pub async fn store_resources(&self, store: &str) -> Result<StoreResources> {
        let namespace = store_namespace(store);
        let params = ListParams::default();

        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &namespace);
        let services: Api<Service> = Api::namespaced(self.client.clone(), &namespace);
        let ingresses: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
        let pvcs: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), &namespace);

        Ok(StoreResources {
            namespace,
            deployments: names_of(deployments.list(&params).await?.items.into_iter()),
            services: names_of(services.list(&params).await?.items.into_iter()),
            ingresses: names_of(ingresses.list(&params).await?.items.into_iter()),
            pvcs: names_of(pvcs.list(&params).await?.items.into_iter()),
        })
    }

    /// Probe the API server; reports rather than fails
    pub async fn check_connection(&self) -> ConnectionStatus {
        match self.client.apiserver_version().await {
            Ok(info) => ConnectionStatus::ok(info.git_version, info.platform),
            Err(err) => {
                tracing::error!(error = %err, "Failed to connect to Kubernetes cluster");
                ConnectionStatus::failed(err.to_string())
            }
        }
    }
}

fn names_of<T: kube::Resource>(items: impl Iterator<Item = T>) -> Vec<String> {
    items
        .filter_map(|item| item.meta().name.clone())
        .collect()
}
