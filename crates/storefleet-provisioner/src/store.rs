//! Store records and the status/type model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ProvisionError;

/// Status of a store within its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
    Pending,
    Provisioning,
    Ready,
    Failed,
    Deleting,
    Deleted,
}

impl StoreStatus {
    /// Whether a record under this status blocks re-creation of the name.
    ///
    /// `failed` and `deleted` stores may be recreated under the same name;
    /// everything else holds the name.
    pub fn is_active(&self) -> bool {
        !matches!(self, StoreStatus::Deleted | StoreStatus::Failed)
    }
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreStatus::Pending => write!(f, "pending"),
            StoreStatus::Provisioning => write!(f, "provisioning"),
            StoreStatus::Ready => write!(f, "ready"),
            StoreStatus::Failed => write!(f, "failed"),
            StoreStatus::Deleting => write!(f, "deleting"),
            StoreStatus::Deleted => write!(f, "deleted"),
        }
    }
}

/// Supported workload templates; a closed set with one variant today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    Woocommerce,
}

impl FromStr for StoreType {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "woocommerce" => Ok(StoreType::Woocommerce),
            other => Err(ProvisionError::UnsupportedType(other.to_string())),
        }
    }
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::Woocommerce => write!(f, "woocommerce"),
        }
    }
}

/// Normalize a store name so every entry point resolves the same record.
///
/// Lowercase, with spaces and underscores mapped to hyphens: "My Store",
/// "my_store", and "my-store" are all the same store.
pub fn normalize_store_name(name: &str) -> String {
    name.to_lowercase().replace([' ', '_'], "-")
}

/// Deterministic namespace name for a store
pub fn store_namespace(name: &str) -> String {
    storefleet_cluster::store_namespace(name)
}

/// Admin and database credentials captured from a successful install
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub admin_user: String,
    pub admin_password: String,
    pub db_password: String,
    pub ingress_host: String,
}

impl From<storefleet_helm::WooCredentials> for Credentials {
    fn from(c: storefleet_helm::WooCredentials) -> Self {
        Self {
            admin_user: c.admin_user,
            admin_password: c.admin_password,
            db_password: c.db_password,
            ingress_host: c.ingress_host,
        }
    }
}

/// The central store entity
#[derive(Debug, Clone, Serialize)]
pub struct StoreRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub store_type: StoreType,
    pub status: StoreStatus,
    pub url: Option<String>,
    pub namespace: String,
    pub admin_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
    pub credentials: Option<Credentials>,
}

impl StoreRecord {
    /// Fresh record for a newly requested store
    pub fn new(name: &str, store_type: StoreType, admin_email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            store_type,
            status: StoreStatus::Pending,
            url: None,
            namespace: store_namespace(name),
            admin_email: admin_email.to_string(),
            created_at: now,
            updated_at: now,
            error: None,
            credentials: None,
        }
    }

    /// Record synthesized from observed cluster state during reconciliation.
    ///
    /// The identity is derived deterministically from the store name so a
    /// restart reproduces the same id. Credentials are unrecoverable and the
    /// admin email is unknown.
    pub fn reconciled(
        name: &str,
        store_type: StoreType,
        url: String,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        let created_at = created_at.unwrap_or_else(Utc::now);
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes()).to_string(),
            name: name.to_string(),
            store_type,
            status: StoreStatus::Ready,
            url: Some(url),
            namespace: store_namespace(name),
            admin_email: "unknown@example.com".to_string(),
            created_at,
            updated_at: created_at,
            error: None,
            credentials: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_is_idempotent_and_collision_preserving() {
        assert_eq!(normalize_store_name("My Store"), "my-store");
        assert_eq!(normalize_store_name("my_store"), "my-store");
        assert_eq!(normalize_store_name("my-store"), "my-store");
        assert_eq!(
            normalize_store_name(&normalize_store_name("My Store")),
            "my-store"
        );
    }

    #[test]
    fn test_store_type_parsing() {
        assert_eq!(
            "woocommerce".parse::<StoreType>().unwrap(),
            StoreType::Woocommerce
        );
        assert_eq!(
            "WooCommerce".parse::<StoreType>().unwrap(),
            StoreType::Woocommerce
        );
        assert!(matches!(
            "shopify".parse::<StoreType>(),
            Err(ProvisionError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_active_statuses_block_recreation() {
        assert!(StoreStatus::Pending.is_active());
        assert!(StoreStatus::Provisioning.is_active());
        assert!(StoreStatus::Ready.is_active());
        assert!(StoreStatus::Deleting.is_active());
        assert!(!StoreStatus::Failed.is_active());
        assert!(!StoreStatus::Deleted.is_active());
    }

    #[test]
    fn test_new_record_defaults() {
        let record = StoreRecord::new("acme-shop", StoreType::Woocommerce, "ops@acme.dev");
        assert_eq!(record.status, StoreStatus::Pending);
        assert_eq!(record.namespace, "store-acme-shop");
        assert!(record.url.is_none());
        assert!(record.error.is_none());
        assert!(record.credentials.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_reconciled_identity_is_deterministic() {
        let a = StoreRecord::reconciled("legacy", StoreType::Woocommerce, "u".into(), None);
        let b = StoreRecord::reconciled("legacy", StoreType::Woocommerce, "u".into(), None);
        assert_eq!(a.id, b.id);

        let other = StoreRecord::reconciled("other", StoreType::Woocommerce, "u".into(), None);
        assert_ne!(a.id, other.id);
    }
}
