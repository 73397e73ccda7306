//! Management labels and namespace naming
//!
//! Every object created by the platform carries the managed-by label plus a
//! store-identifying label, so reconciliation and bulk queries can find the
//! platform's resources later.

use std::collections::BTreeMap;

/// Label key marking objects owned by the platform
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Label value identifying this platform as the owner
pub const MANAGED_BY_VALUE: &str = "storefleet";

/// Label key carrying the (normalized) store name
pub const STORE_LABEL: &str = "storefleet.io/store";

/// Label key describing the workload purpose
pub const PURPOSE_LABEL: &str = "purpose";

/// Label value for store namespaces
pub const PURPOSE_VALUE: &str = "ecommerce-store";

/// Deterministic namespace name for a store
pub fn store_namespace(store: &str) -> String {
    format!("store-{store}")
}

/// Labels attached to every object created for a store
pub fn managed_labels(store: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
        (STORE_LABEL.to_string(), store.to_string()),
    ])
}

/// Label selector matching every namespace the platform manages
pub fn managed_selector() -> String {
    format!("{MANAGED_BY_LABEL}={MANAGED_BY_VALUE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_namespace() {
        assert_eq!(store_namespace("acme-shop"), "store-acme-shop");
    }

    #[test]
    fn test_managed_labels_carry_store_name() {
        let labels = managed_labels("acme-shop");
        assert_eq!(labels.get(MANAGED_BY_LABEL).unwrap(), MANAGED_BY_VALUE);
        assert_eq!(labels.get(STORE_LABEL).unwrap(), "acme-shop");
    }

    #[test]
    fn test_managed_selector() {
        assert_eq!(
            managed_selector(),
            "app.kubernetes.io/managed-by=storefleet"
        );
    }
}
