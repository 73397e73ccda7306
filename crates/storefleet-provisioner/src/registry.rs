//! In-memory store registry
//!
//! Process-wide mapping of normalized store name to record, guarded by a
//! mutex held only for the duration of the in-memory mutation — never
//! across a cluster or subprocess call.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{ProvisionError, Result};
use crate::store::{Credentials, StoreRecord, StoreStatus};

/// Optional fields applied alongside a status transition.
///
/// `error` is only ever set, never cleared; a fresh cycle after recreation
/// starts with a brand-new record.
#[derive(Debug, Default)]
pub struct StatusPatch {
    pub url: Option<String>,
    pub error: Option<String>,
    pub credentials: Option<Credentials>,
}

impl StatusPatch {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Lock-guarded registry of store records keyed by normalized name
#[derive(Default)]
pub struct Registry {
    stores: Mutex<HashMap<String, StoreRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing whatever was there (reconciliation path)
    pub fn insert(&self, record: StoreRecord) {
        let mut stores = self.stores.lock().expect("registry lock poisoned");
        stores.insert(record.name.clone(), record);
    }

    /// Insert a record unless an active record already holds the name.
    ///
    /// A prior `failed` or `deleted` record does not block: recreation
    /// always allocates a fresh record.
    pub fn try_insert(&self, record: StoreRecord) -> Result<()> {
        let mut stores = self.stores.lock().expect("registry lock poisoned");
        if let Some(existing) = stores.get(&record.name) {
            if existing.status.is_active() {
                return Err(ProvisionError::StoreExists(record.name.clone()));
            }
        }
        stores.insert(record.name.clone(), record);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<StoreRecord> {
        let stores = self.stores.lock().expect("registry lock poisoned");
        stores.get(name).cloned()
    }

    /// Snapshot of all records, ordered by name
    pub fn list(&self) -> Vec<StoreRecord> {
        let stores = self.stores.lock().expect("registry lock poisoned");
        let mut records: Vec<StoreRecord> = stores.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    pub fn remove(&self, name: &str) -> Option<StoreRecord> {
        let mut stores = self.stores.lock().expect("registry lock poisoned");
        stores.remove(name)
    }

    /// The single status-update entry point.
    ///
    /// Refreshes `updated_at` on every call and applies the patch fields
    /// that are present. Returns the updated record, or `None` when the
    /// store is no longer registered.
    pub fn transition(
        &self,
        name: &str,
        status: StoreStatus,
        patch: StatusPatch,
    ) -> Option<StoreRecord> {
        let mut stores = self.stores.lock().expect("registry lock poisoned");
        let record = stores.get_mut(name)?;

        record.status = status;
        record.updated_at = Utc::now();
        if let Some(url) = patch.url {
            record.url = Some(url);
        }
        if let Some(error) = patch.error {
            record.error = Some(error);
        }
        if let Some(credentials) = patch.credentials {
            record.credentials = Some(credentials);
        }
        Some(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreType;

    fn record(name: &str) -> StoreRecord {
        StoreRecord::new(name, StoreType::Woocommerce, "admin@example.com")
    }

    #[test]
    fn test_try_insert_rejects_active_duplicate() {
        let registry = Registry::new();
        registry.try_insert(record("acme")).unwrap();

        for status in [
            StoreStatus::Pending,
            StoreStatus::Provisioning,
            StoreStatus::Ready,
            StoreStatus::Deleting,
        ] {
            registry.transition("acme", status, StatusPatch::none());
            assert!(matches!(
                registry.try_insert(record("acme")),
                Err(ProvisionError::StoreExists(_))
            ));
        }
    }

    #[test]
    fn test_try_insert_allows_recreate_after_failure() {
        let registry = Registry::new();
        registry.try_insert(record("acme")).unwrap();
        registry.transition(
            "acme",
            StoreStatus::Failed,
            StatusPatch::none().with_error("install blew up"),
        );

        let old_id = registry.get("acme").unwrap().id;
        registry.try_insert(record("acme")).unwrap();

        let fresh = registry.get("acme").unwrap();
        assert_ne!(fresh.id, old_id);
        assert!(fresh.error.is_none());
        assert_eq!(fresh.status, StoreStatus::Pending);
    }

    #[test]
    fn test_transition_refreshes_updated_at() {
        let registry = Registry::new();
        registry.try_insert(record("acme")).unwrap();
        let before = registry.get("acme").unwrap();

        let after = registry
            .transition("acme", StoreStatus::Provisioning, StatusPatch::none())
            .unwrap();
        assert!(after.updated_at >= before.updated_at);
        assert!(after.updated_at >= after.created_at);
    }

    #[test]
    fn test_transition_never_clears_error() {
        let registry = Registry::new();
        registry.try_insert(record("acme")).unwrap();
        registry.transition(
            "acme",
            StoreStatus::Failed,
            StatusPatch::none().with_error("boom"),
        );

        let record = registry
            .transition("acme", StoreStatus::Ready, StatusPatch::none().with_url("http://x"))
            .unwrap();
        assert_eq!(record.error.as_deref(), Some("boom"));
        assert_eq!(record.url.as_deref(), Some("http://x"));
    }

    #[test]
    fn test_transition_missing_store() {
        let registry = Registry::new();
        assert!(registry
            .transition("ghost", StoreStatus::Ready, StatusPatch::none())
            .is_none());
    }

    #[test]
    fn test_list_is_sorted_and_remove_evicts() {
        let registry = Registry::new();
        registry.try_insert(record("zeta")).unwrap();
        registry.try_insert(record("acme")).unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["acme", "zeta"]);

        registry.remove("acme");
        assert!(registry.get("acme").is_none());
        assert_eq!(registry.list().len(), 1);
    }
}
