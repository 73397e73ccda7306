//! storefleetd — Storefleet API server
//!
//! Bootstraps the cluster client and the helm wrapper, syncs the store
//! registry from the cluster, then serves the REST API.

mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use storefleet_cluster::{ClusterClient, ClusterSettings};
use storefleet_helm::Helm;
use storefleet_provisioner::Provisioner;

#[derive(Parser, Debug)]
#[command(name = "storefleetd", version, about = "Multi-tenant store provisioning API")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Domain suffix appended to store names to form ingress hosts
    #[arg(long, env = "STORE_DOMAIN_SUFFIX", default_value = ".localhost")]
    domain_suffix: String,

    /// Kubeconfig path handed to helm
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Kubernetes API URL override, for local development clusters
    #[arg(long, env = "STOREFLEET_API_URL")]
    api_url: Option<String>,

    /// Directory holding the chart templates
    #[arg(long, env = "STOREFLEET_CHARTS_DIR")]
    charts_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(long, env = "STOREFLEET_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    tracing::info!("storefleetd v{} starting", env!("CARGO_PKG_VERSION"));

    let cluster = ClusterClient::connect(&ClusterSettings {
        api_url_override: args.api_url.clone(),
    })
    .await?;

    let mut helm = Helm::new();
    if let Some(kubeconfig) = &args.kubeconfig {
        helm = helm.with_kubeconfig(kubeconfig);
    }
    if let Some(charts_dir) = &args.charts_dir {
        helm = helm.with_charts_dir(charts_dir);
    }
    helm.verify_installed().await?;

    let provisioner = Provisioner::new(Arc::new(cluster), Arc::new(helm), args.domain_suffix);

    // Rebuild the registry before accepting requests, so stores that
    // survived a restart are immediately visible.
    let restored = provisioner.reconcile().await?;
    tracing::info!(restored, "Synced stores from cluster");

    let app = routes::router(routes::AppState { provisioner });
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
