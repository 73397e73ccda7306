//! REST surface over the provisioning engine

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use storefleet_cluster::{ClusterError, StoreResources};
use storefleet_provisioner::{CreateStore, ProvisionError, Provisioner, StoreRecord};

#[derive(Clone)]
pub struct AppState {
    pub provisioner: Provisioner,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/stores", get(list_stores).post(create_store))
        .route("/stores/{name}", get(get_store).delete(delete_store))
        .route("/stores/{name}/status", get(store_status))
        .route("/cluster/health", get(cluster_health))
        .with_state(state)
}

/// Engine error mapped onto an HTTP response with an `{error}` body
struct ApiError(ProvisionError);

impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ProvisionError::UnsupportedType(_) => StatusCode::BAD_REQUEST,
            ProvisionError::StoreNotFound(_) => StatusCode::NOT_FOUND,
            ProvisionError::StoreExists(_) | ProvisionError::StillProvisioning(_) => {
                StatusCode::CONFLICT
            }
            ProvisionError::Cluster(
                ClusterError::Connection(_) | ClusterError::Config(_),
            ) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Public store representation; credentials and admin email stay internal
#[derive(Debug, Serialize)]
struct StoreSummary {
    id: String,
    name: String,
    #[serde(rename = "type")]
    store_type: String,
    status: String,
    url: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: String,
    namespace: String,
    error: Option<String>,
}

impl From<&StoreRecord> for StoreSummary {
    fn from(record: &StoreRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            store_type: record.store_type.to_string(),
            status: record.status.to_string(),
            url: record.url.clone(),
            created_at: record.created_at.to_rfc3339(),
            namespace: record.namespace.clone(),
            error: record.error.clone(),
        }
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Storefleet store provisioning API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_stores(State(state): State<AppState>) -> Json<Vec<StoreSummary>> {
    let summaries = state
        .provisioner
        .list_stores()
        .iter()
        .map(StoreSummary::from)
        .collect();
    Json(summaries)
}

#[derive(Debug, Deserialize)]
struct CreateStoreBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default = "default_store_type")]
    store_type: String,
    #[serde(default)]
    admin_email: Option<String>,
}

fn default_store_type() -> String {
    "woocommerce".to_string()
}

async fn create_store(
    State(state): State<AppState>,
    Json(body): Json<CreateStoreBody>,
) -> Result<(StatusCode, Json<StoreSummary>), Response> {
    let name = match body.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Store name is required" })),
            )
                .into_response());
        }
    };

    let mut request = CreateStore::new(name, body.store_type);
    request.admin_email = body.admin_email;

    let record = state
        .provisioner
        .create_store(request)
        .await
        .map_err(|err| ApiError(err).into_response())?;
    Ok((StatusCode::CREATED, Json(StoreSummary::from(&record))))
}

async fn get_store(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StoreSummary>, ApiError> {
    let record = state
        .provisioner
        .get_store(&name)
        .ok_or(ProvisionError::StoreNotFound(name))?;
    Ok(Json(StoreSummary::from(&record)))
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    #[serde(default)]
    force: bool,
}

async fn delete_store(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let message = state.provisioner.delete_store(&name, params.force).await?;
    Ok(Json(json!({ "message": message })))
}

#[derive(Debug, Serialize)]
struct StatusBody {
    name: String,
    status: String,
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resources: Option<StoreResources>,
}

async fn store_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StatusBody>, ApiError> {
    let report = state.provisioner.store_status(&name).await?;
    Ok(Json(StatusBody {
        name: report.store.name,
        status: report.store.status.to_string(),
        url: report.store.url,
        resources: report.resources,
    }))
}

/// Always 200; failures surface as `healthy: false` in the body
async fn cluster_health(
    State(state): State<AppState>,
) -> Json<storefleet_provisioner::HealthReport> {
    Json(state.provisioner.cluster_health().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use storefleet_provisioner::testing::{FakeCluster, FakeInstaller};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let cluster = Arc::new(FakeCluster::default());
        let installer = Arc::new(FakeInstaller::default());
        AppState {
            provisioner: Provisioner::new(cluster, installer, ".test"),
        }
    }

    async fn ready_store(state: &AppState, name: &str) {
        let mut request = CreateStore::new(name, "woocommerce");
        request.synchronous = true;
        state.provisioner.create_store(request).await.unwrap();
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_root_banner() {
        let app = router(test_state());
        let response = app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "running");
    }

    #[tokio::test]
    async fn test_create_store_returns_summary() {
        let app = router(test_state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/stores",
                json!({"name": "Acme Shop", "type": "woocommerce"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["name"], "acme-shop");
        assert_eq!(body["type"], "woocommerce");
        assert_eq!(body["status"], "pending");
        assert_eq!(body["namespace"], "store-acme-shop");
        assert!(body["createdAt"].is_string());
        // Credentials never leave the process through summaries
        assert!(body.get("credentials").is_none());
    }

    #[tokio::test]
    async fn test_create_store_requires_name() {
        for body in [json!({}), json!({"name": "  "})] {
            let app = router(test_state());
            let response = app
                .oneshot(json_request("POST", "/stores", body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            assert_eq!(body["error"], "Store name is required");
        }
    }

    #[tokio::test]
    async fn test_create_store_rejects_unknown_type() {
        let app = router(test_state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/stores",
                json!({"name": "acme", "type": "shopify"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Invalid store type"));
    }

    #[tokio::test]
    async fn test_create_duplicate_conflicts() {
        let state = test_state();
        ready_store(&state, "acme").await;

        let app = router(state);
        let response = app
            .oneshot(json_request("POST", "/stores", json!({"name": "acme"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_list_stores() {
        let state = test_state();
        ready_store(&state, "acme").await;
        ready_store(&state, "zeta").await;

        let app = router(state);
        let response = app.oneshot(get_request("/stores")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["acme", "zeta"]);
    }

    #[tokio::test]
    async fn test_get_store_not_found() {
        let app = router(test_state());
        let response = app.oneshot(get_request("/stores/ghost")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_get_store_after_provisioning() {
        let state = test_state();
        ready_store(&state, "acme").await;

        let app = router(state);
        let response = app.oneshot(get_request("/stores/acme")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["url"], "http://acme.test");
    }

    #[tokio::test]
    async fn test_status_includes_resources() {
        let state = test_state();
        ready_store(&state, "acme").await;

        let app = router(state);
        let response = app
            .oneshot(get_request("/stores/acme/status"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "acme");
        assert_eq!(body["status"], "ready");
        assert_eq!(body["resources"]["namespace"], "store-acme");
    }

    #[tokio::test]
    async fn test_delete_store() {
        let state = test_state();
        ready_store(&state, "acme").await;

        let app = router(state.clone());
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/stores/acme")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("deleted"));
        assert!(state.provisioner.get_store("acme").is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_store() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/stores/ghost?force=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cluster_health() {
        let app = router(test_state());
        let response = app.oneshot(get_request("/cluster/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["healthy"], true);
        assert_eq!(body["orchestrator"]["connected"], true);
        assert_eq!(body["packageTool"]["connected"], true);
    }
}
