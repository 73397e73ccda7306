//! WooCommerce store template
//!
//! The one supported workload template: a WooCommerce chart installed per
//! store, with generated admin and database credentials.

use std::collections::BTreeMap;
use std::path::PathBuf;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use serde::Serialize;

use crate::error::{HelmError, Result};
use crate::helm::{Helm, InstallRequest};
use crate::UninstallOutcome;

const CHART_NAME: &str = "woocommerce-store";
const LOCAL_VALUES_FILE: &str = "values-local.yaml";
const INSTALL_TIMEOUT: &str = "15m";
const TOKEN_BYTES: usize = 16;

/// Release name for a store's WooCommerce install
pub fn release_name(store: &str) -> String {
    format!("woo-{store}")
}

/// Cryptographically random URL-safe token for generated credentials
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Parameters for a WooCommerce install
#[derive(Debug, Clone)]
pub struct WooInstallRequest {
    pub store: String,
    pub namespace: String,
    pub admin_user: String,
    /// Generated when not supplied
    pub admin_password: Option<String>,
    pub admin_email: String,
    pub site_title: String,
    pub persistence_size: String,
    /// Generated when not supplied
    pub db_password: Option<String>,
    /// Defaults to `<store>.local` when not supplied
    pub ingress_host: Option<String>,
    pub values_file: Option<PathBuf>,
    pub create_namespace: bool,
}

impl WooInstallRequest {
    pub fn new(store: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            namespace: namespace.into(),
            admin_user: "admin".to_string(),
            admin_password: None,
            admin_email: "admin@example.com".to_string(),
            site_title: "My Store".to_string(),
            persistence_size: "5Gi".to_string(),
            db_password: None,
            ingress_host: None,
            values_file: None,
            create_namespace: true,
        }
    }
}

/// Credentials echoed back to the caller exactly once
#[derive(Debug, Clone, Serialize)]
pub struct WooCredentials {
    pub admin_user: String,
    pub admin_password: String,
    pub db_password: String,
    pub ingress_host: String,
}

/// Result of a successful WooCommerce install
#[derive(Debug, Clone)]
pub struct WooInstall {
    pub release: String,
    pub credentials: WooCredentials,
}

fn woocommerce_values(
    request: &WooInstallRequest,
    credentials: &WooCredentials,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "wordpress.adminUser".to_string(),
            credentials.admin_user.clone(),
        ),
        (
            "wordpress.adminPassword".to_string(),
            credentials.admin_password.clone(),
        ),
        (
            "wordpress.adminEmail".to_string(),
            request.admin_email.clone(),
        ),
        (
            "wordpress.siteTitle".to_string(),
            request.site_title.clone(),
        ),
        (
            "wordpress.persistence.size".to_string(),
            request.persistence_size.clone(),
        ),
        (
            "mariadb.auth.rootPassword".to_string(),
            credentials.db_password.clone(),
        ),
        (
            "mariadb.auth.password".to_string(),
            credentials.db_password.clone(),
        ),
        ("ingress.host".to_string(), credentials.ingress_host.clone()),
    ])
}

impl Helm {
    /// Install the WooCommerce template for a store.
    ///
    /// Missing credentials are generated and echoed back in the result so
    /// the caller can persist them; they are not recoverable afterwards.
    pub async fn install_woocommerce(&self, request: &WooInstallRequest) -> Result<WooInstall> {
        let chart_path = self.charts_dir().join(CHART_NAME);
        if !chart_path.exists() {
            tracing::error!(path = %chart_path.display(), "WooCommerce chart not found");
            return Err(HelmError::ChartNotFound { path: chart_path });
        }

        let credentials = WooCredentials {
            admin_user: request.admin_user.clone(),
            admin_password: request
                .admin_password
                .clone()
                .unwrap_or_else(generate_token),
            db_password: request.db_password.clone().unwrap_or_else(generate_token),
            ingress_host: request
                .ingress_host
                .clone()
                .unwrap_or_else(|| format!("{}.local", request.store)),
        };

        let values_file = request.values_file.clone().or_else(|| {
            let local_values = chart_path.join(LOCAL_VALUES_FILE);
            local_values.exists().then_some(local_values)
        });

        let release = release_name(&request.store);
        let install = InstallRequest {
            release: release.clone(),
            chart: chart_path.display().to_string(),
            namespace: request.namespace.clone(),
            values: woocommerce_values(request, &credentials),
            values_file,
            timeout: INSTALL_TIMEOUT.to_string(),
            create_namespace: request.create_namespace,
            wait: true,
        };

        self.install_release(&install).await?;
        Ok(WooInstall {
            release,
            credentials,
        })
    }

    /// Uninstall a store's release, whatever its template
    pub async fn uninstall_store(&self, store: &str, namespace: &str) -> Result<UninstallOutcome> {
        // Single template today; every store maps to a woo- release
        self.uninstall_release(&release_name(store), namespace, true)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_name() {
        assert_eq!(release_name("acme-shop"), "woo-acme-shop");
    }

    #[test]
    fn test_generated_tokens_are_url_safe_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(!a.is_empty());
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_values_wire_credentials_through() {
        let request = WooInstallRequest::new("acme", "store-acme");
        let credentials = WooCredentials {
            admin_user: "admin".to_string(),
            admin_password: "pw".to_string(),
            db_password: "dbpw".to_string(),
            ingress_host: "acme.local".to_string(),
        };

        let values = woocommerce_values(&request, &credentials);
        assert_eq!(values.get("wordpress.adminPassword").unwrap(), "pw");
        assert_eq!(values.get("mariadb.auth.rootPassword").unwrap(), "dbpw");
        assert_eq!(values.get("mariadb.auth.password").unwrap(), "dbpw");
        assert_eq!(values.get("ingress.host").unwrap(), "acme.local");
        assert_eq!(
            values.get("wordpress.adminEmail").unwrap(),
            "admin@example.com"
        );
    }

    #[test]
    fn test_request_defaults() {
        let request = WooInstallRequest::new("acme", "store-acme");
        assert_eq!(request.admin_user, "admin");
        assert_eq!(request.site_title, "My Store");
        assert_eq!(request.persistence_size, "5Gi");
        assert!(request.admin_password.is_none());
        assert!(request.ingress_host.is_none());
    }
}
