//! Kubernetes object construction
//!
//! Pure builders for every object the client submits, so labeling, probe
//! wiring, and port mapping stay testable without a cluster.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvFromSource, EnvVar, HTTPGetAction, Namespace,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, Probe, ResourceQuota, ResourceQuotaSpec, ResourceRequirements, Secret,
    SecretEnvSource, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::labels::{managed_labels, store_namespace, PURPOSE_LABEL, PURPOSE_VALUE};

// Fixed probe defaults for store workloads
const LIVENESS_INITIAL_DELAY_SECS: i32 = 30;
const LIVENESS_PERIOD_SECS: i32 = 10;
const READINESS_INITIAL_DELAY_SECS: i32 = 5;
const READINESS_PERIOD_SECS: i32 = 5;

const DATA_VOLUME_NAME: &str = "data-volume";
const DATA_VOLUME_MOUNT_PATH: &str = "/var/lib/data";

/// Deployment configuration for a store workload
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub name: String,
    pub namespace: String,
    pub store: String,
    pub image: String,
    pub replicas: i32,
    pub ports: Vec<i32>,
    pub env: BTreeMap<String, String>,
    pub env_from_secrets: Vec<String>,
    pub pvc_name: Option<String>,
    pub resources: Option<ResourceRequirements>,
}

impl DeploymentConfig {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        store: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            store: store.into(),
            image: image.into(),
            replicas: 1,
            ports: vec![80],
            env: BTreeMap::new(),
            env_from_secrets: Vec::new(),
            pvc_name: None,
            resources: None,
        }
    }
}

/// Service configuration for a store workload
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub namespace: String,
    pub store: String,
    pub ports: Vec<ServicePortConfig>,
    pub selector: BTreeMap<String, String>,
    pub service_type: String,
}

#[derive(Debug, Clone)]
pub struct ServicePortConfig {
    pub name: Option<String>,
    pub port: i32,
    pub target_port: Option<i32>,
}

/// Ingress configuration for a store workload
#[derive(Debug, Clone)]
pub struct IngressConfig {
    pub name: String,
    pub namespace: String,
    pub store: String,
    pub host: String,
    pub service_name: String,
    pub service_port: i32,
    pub tls_secret: Option<String>,
    pub annotations: BTreeMap<String, String>,
}

/// Resource quota limits applied to every store namespace
#[derive(Debug, Clone)]
pub struct QuotaLimits {
    pub cpu: String,
    pub memory: String,
    pub storage: String,
    pub max_pods: u32,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            cpu: "4".to_string(),
            memory: "8Gi".to_string(),
            storage: "20Gi".to_string(),
            max_pods: 20,
        }
    }
}

pub fn namespace_object(store: &str) -> Namespace {
    let mut labels = managed_labels(store);
    labels.insert(PURPOSE_LABEL.to_string(), PURPOSE_VALUE.to_string());

    Namespace {
        metadata: ObjectMeta {
            name: Some(store_namespace(store)),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn secret_object(
    name: &str,
    namespace: &str,
    store: &str,
    data: BTreeMap<String, String>,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(managed_labels(store)),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        // string_data lets the API server handle base64 encoding
        string_data: Some(data),
        ..Default::default()
    }
}

pub fn pvc_object(
    name: &str,
    namespace: &str,
    store: &str,
    storage_size: &str,
    storage_class: Option<&str>,
    access_modes: Vec<String>,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(managed_labels(store)),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(access_modes),
            storage_class_name: storage_class.map(str::to_string),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(storage_size.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn http_probe(port: i32, initial_delay: i32, period: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some("/".to_string()),
            port: IntOrString::Int(port),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(period),
        ..Default::default()
    }
}

pub fn deployment_object(config: &DeploymentConfig) -> Deployment {
    let probe_port = config.ports.first().copied().unwrap_or(80);

    let env: Vec<EnvVar> = config
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect();

    let env_from: Vec<EnvFromSource> = config
        .env_from_secrets
        .iter()
        .map(|secret| EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: secret.clone(),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();

    let mut volumes = Vec::new();
    let mut volume_mounts = Vec::new();
    if let Some(pvc) = &config.pvc_name {
        volumes.push(Volume {
            name: DATA_VOLUME_NAME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: pvc.clone(),
                ..Default::default()
            }),
            ..Default::default()
        });
        volume_mounts.push(VolumeMount {
            name: DATA_VOLUME_NAME.to_string(),
            mount_path: DATA_VOLUME_MOUNT_PATH.to_string(),
            ..Default::default()
        });
    }

    let container = Container {
        name: config.name.clone(),
        image: Some(config.image.clone()),
        ports: Some(
            config
                .ports
                .iter()
                .map(|&port| ContainerPort {
                    container_port: port,
                    ..Default::default()
                })
                .collect(),
        ),
        env: (!env.is_empty()).then_some(env),
        env_from: (!env_from.is_empty()).then_some(env_from),
        volume_mounts: (!volume_mounts.is_empty()).then_some(volume_mounts),
        resources: config.resources.clone(),
        liveness_probe: Some(http_probe(
            probe_port,
            LIVENESS_INITIAL_DELAY_SECS,
            LIVENESS_PERIOD_SECS,
        )),
        readiness_probe: Some(http_probe(
            probe_port,
            READINESS_INITIAL_DELAY_SECS,
            READINESS_PERIOD_SECS,
        )),
        ..Default::default()
    };

    let app_labels = BTreeMap::from([("app".to_string(), config.name.clone())]);
    let mut labels = managed_labels(&config.store);
    labels.insert("app".to_string(), config.name.clone());

    Deployment {
        metadata: ObjectMeta {
            name: Some(config.name.clone()),
            namespace: Some(config.namespace.clone()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(config.replicas),
            selector: LabelSelector {
                match_labels: Some(app_labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(app_labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: (!volumes.is_empty()).then_some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn service_object(config: &ServiceConfig) -> Service {
    let ports: Vec<ServicePort> = config
        .ports
        .iter()
        .map(|p| ServicePort {
            name: Some(
                p.name
                    .clone()
                    .unwrap_or_else(|| format!("port-{}", p.port)),
            ),
            port: p.port,
            target_port: Some(IntOrString::Int(p.target_port.unwrap_or(p.port))),
            ..Default::default()
        })
        .collect();

    Service {
        metadata: ObjectMeta {
            name: Some(config.name.clone()),
            namespace: Some(config.namespace.clone()),
            labels: Some(managed_labels(&config.store)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(config.service_type.clone()),
            ports: Some(ports),
            selector: Some(config.selector.clone()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn ingress_object(config: &IngressConfig) -> Ingress {
    let mut annotations = BTreeMap::from([
        (
            "kubernetes.io/ingress.class".to_string(),
            "nginx".to_string(),
        ),
        (
            "nginx.ingress.kubernetes.io/proxy-body-size".to_string(),
            "50m".to_string(),
        ),
    ]);
    annotations.extend(config.annotations.clone());

    let rule = IngressRule {
        host: Some(config.host.clone()),
        http: Some(HTTPIngressRuleValue {
            paths: vec![HTTPIngressPath {
                path: Some("/".to_string()),
                path_type: "Prefix".to_string(),
                backend: IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: config.service_name.clone(),
                        port: Some(ServiceBackendPort {
                            number: Some(config.service_port),
                            ..Default::default()
                        }),
                    }),
                    ..Default::default()
                },
            }],
        }),
    };

    let tls = config.tls_secret.as_ref().map(|secret| {
        vec![IngressTLS {
            hosts: Some(vec![config.host.clone()]),
            secret_name: Some(secret.clone()),
        }]
    });

    Ingress {
        metadata: ObjectMeta {
            name: Some(config.name.clone()),
            namespace: Some(config.namespace.clone()),
            labels: Some(managed_labels(&config.store)),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            rules: Some(vec![rule]),
            tls,
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn quota_object(namespace: &str, limits: &QuotaLimits) -> ResourceQuota {
    ResourceQuota {
        metadata: ObjectMeta {
            name: Some("store-quota".to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ResourceQuotaSpec {
            hard: Some(BTreeMap::from([
                ("limits.cpu".to_string(), Quantity(limits.cpu.clone())),
                ("limits.memory".to_string(), Quantity(limits.memory.clone())),
                (
                    "requests.storage".to_string(),
                    Quantity(limits.storage.clone()),
                ),
                ("pods".to_string(), Quantity(limits.max_pods.to_string())),
            ])),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Resolve an externally reachable URL for a service, if any.
///
/// NodePort maps to localhost, LoadBalancer to the external ip/hostname,
/// ClusterIP falls back to the internal address. Best-effort diagnostic
/// info only; the address is not guaranteed reachable.
pub fn url_for_service(service: &Service) -> Option<String> {
    let spec = service.spec.as_ref()?;
    let first_port = spec.ports.as_ref().and_then(|ports| ports.first());

    match spec.type_.as_deref() {
        Some("NodePort") => {
            let node_port = first_port.and_then(|p| p.node_port)?;
            Some(format!("http://127.0.0.1:{node_port}"))
        }
        Some("LoadBalancer") => {
            let ingress = service
                .status
                .as_ref()?
                .load_balancer
                .as_ref()?
                .ingress
                .as_ref()?
                .first()?;
            let host = ingress.ip.clone().or_else(|| ingress.hostname.clone())?;
            let port = first_port.map(|p| p.port).unwrap_or(80);
            Some(format!("http://{host}:{port}"))
        }
        Some("ClusterIP") => {
            let cluster_ip = spec.cluster_ip.as_deref().filter(|ip| *ip != "None")?;
            let port = first_port.map(|p| p.port).unwrap_or(80);
            Some(format!("http://{cluster_ip}:{port}"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{MANAGED_BY_LABEL, MANAGED_BY_VALUE, STORE_LABEL};
    use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, ServiceStatus};

    #[test]
    fn test_namespace_is_labeled_for_reconciliation() {
        let ns = namespace_object("acme-shop");
        assert_eq!(ns.metadata.name.as_deref(), Some("store-acme-shop"));

        let labels = ns.metadata.labels.unwrap();
        assert_eq!(labels.get(MANAGED_BY_LABEL).unwrap(), MANAGED_BY_VALUE);
        assert_eq!(labels.get(STORE_LABEL).unwrap(), "acme-shop");
        assert_eq!(labels.get(PURPOSE_LABEL).unwrap(), PURPOSE_VALUE);
    }

    #[test]
    fn test_deployment_probe_defaults() {
        let config = DeploymentConfig::new("shop", "store-acme", "acme", "nginx:latest");
        let deployment = deployment_object(&config);

        let container = &deployment.spec.unwrap().template.spec.unwrap().containers[0];

        let liveness = container.liveness_probe.as_ref().unwrap();
        assert_eq!(liveness.initial_delay_seconds, Some(30));
        assert_eq!(liveness.period_seconds, Some(10));

        let readiness = container.readiness_probe.as_ref().unwrap();
        assert_eq!(readiness.initial_delay_seconds, Some(5));
        assert_eq!(readiness.period_seconds, Some(5));

        let http_get = liveness.http_get.as_ref().unwrap();
        assert_eq!(http_get.port, IntOrString::Int(80));
    }

    #[test]
    fn test_deployment_mounts_pvc_when_configured() {
        let mut config = DeploymentConfig::new("shop", "store-acme", "acme", "nginx:latest");
        config.pvc_name = Some("shop-data".to_string());

        let deployment = deployment_object(&config);
        let pod = deployment.spec.unwrap().template.spec.unwrap();

        let volume = &pod.volumes.unwrap()[0];
        assert_eq!(
            volume
                .persistent_volume_claim
                .as_ref()
                .unwrap()
                .claim_name,
            "shop-data"
        );

        let mount = &pod.containers[0].volume_mounts.as_ref().unwrap()[0];
        assert_eq!(mount.mount_path, "/var/lib/data");
    }

    #[test]
    fn test_ingress_default_annotations() {
        let config = IngressConfig {
            name: "shop".to_string(),
            namespace: "store-acme".to_string(),
            store: "acme".to_string(),
            host: "acme.local".to_string(),
            service_name: "shop".to_string(),
            service_port: 80,
            tls_secret: None,
            annotations: BTreeMap::new(),
        };

        let ingress = ingress_object(&config);
        let annotations = ingress.metadata.annotations.unwrap();
        assert_eq!(annotations.get("kubernetes.io/ingress.class").unwrap(), "nginx");

        let spec = ingress.spec.unwrap();
        assert!(spec.tls.is_none());
        assert_eq!(
            spec.rules.unwrap()[0].host.as_deref(),
            Some("acme.local")
        );
    }

    #[test]
    fn test_quota_defaults() {
        let quota = quota_object("store-acme", &QuotaLimits::default());
        let hard = quota.spec.unwrap().hard.unwrap();
        assert_eq!(hard.get("limits.cpu").unwrap().0, "4");
        assert_eq!(hard.get("limits.memory").unwrap().0, "8Gi");
        assert_eq!(hard.get("requests.storage").unwrap().0, "20Gi");
        assert_eq!(hard.get("pods").unwrap().0, "20");
    }

    fn service_with(type_: &str, port: ServicePort, status: Option<ServiceStatus>) -> Service {
        Service {
            spec: Some(ServiceSpec {
                type_: Some(type_.to_string()),
                ports: Some(vec![port]),
                cluster_ip: Some("10.0.0.5".to_string()),
                ..Default::default()
            }),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_service_url_node_port() {
        let service = service_with(
            "NodePort",
            ServicePort {
                port: 80,
                node_port: Some(30080),
                ..Default::default()
            },
            None,
        );
        assert_eq!(
            url_for_service(&service),
            Some("http://127.0.0.1:30080".to_string())
        );
    }

    #[test]
    fn test_service_url_load_balancer() {
        let status = ServiceStatus {
            load_balancer: Some(LoadBalancerStatus {
                ingress: Some(vec![LoadBalancerIngress {
                    ip: Some("203.0.113.9".to_string()),
                    ..Default::default()
                }]),
            }),
            ..Default::default()
        };
        let service = service_with(
            "LoadBalancer",
            ServicePort {
                port: 8080,
                ..Default::default()
            },
            Some(status),
        );
        assert_eq!(
            url_for_service(&service),
            Some("http://203.0.113.9:8080".to_string())
        );
    }

    #[test]
    fn test_service_url_cluster_ip_fallback() {
        let service = service_with(
            "ClusterIP",
            ServicePort {
                port: 80,
                ..Default::default()
            },
            None,
        );
        assert_eq!(
            url_for_service(&service),
            Some("http://10.0.0.5:80".to_string())
        );
    }

    #[test]
    fn test_service_url_none_without_external_path() {
        // NodePort service that never got a node port assigned
        let service = service_with(
            "NodePort",
            ServicePort {
                port: 80,
                ..Default::default()
            },
            None,
        );
        assert_eq!(url_for_service(&service), None);
    }
}
