/**
 * API REST FIELDWATCH - Serveur HTTP du kernel
 *
 * RÔLE :
 * Expose le registre des noeuds et les statistiques au dashboard, qui les
 * interroge toutes les 5 secondes.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, CORS permissif (dashboard servi à part)
 * - Routes : /health, /system/health, /api/nodes, /api/stats
 * - Erreurs toujours en JSON `{ "error": ... }` (404, 409, 422, 500)
 * - Un panic dans un handler devient un 500, le serveur continue
 */

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::ApiError;
use crate::health::{HealthTracker, KernelHealth};
use crate::models::{NewNode, Node, StatusUpdate};
use crate::registry::NodeRegistry;
use crate::stats::NodeStats;

#[derive(Clone)]
pub struct AppState {
    pub registry: NodeRegistry,
    pub health_tracker: HealthTracker,
}

#[derive(Debug, Deserialize)]
struct ListParams { status: Option<String> }

#[derive(Debug, Deserialize)]
struct SearchParams { q: Option<String> }

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/api/nodes", get(list_nodes).post(create_node))
        .route("/api/nodes/search", get(search_nodes))
        .route("/api/nodes/stats", get(get_stats))
        .route("/api/stats", get(get_stats))
        .route("/api/nodes/{id}", get(get_node))
        .route("/api/nodes/{id}/status", put(update_node_status))
        .with_state(app_state)
        .layer(CatchPanicLayer::custom(panic_to_500))
        .layer(CorsLayer::permissive())
}

fn panic_to_500(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("Internal Server Error: {detail}")).into_response()
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(&app.registry))
}

// GET /api/nodes?status=online|offline|all (liste triée par identifiant)
async fn list_nodes(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Node>>, ApiError> {
    let wanted = match params.status.as_deref() {
        None | Some("all") => None,
        Some("online") => Some(true),
        Some("offline") => Some(false),
        Some(other) => {
            return Err(ApiError::Unprocessable(format!("unknown status filter: {other}")));
        }
    };
    let nodes = app
        .registry
        .all_nodes()
        .into_iter()
        .filter(|n| wanted.map_or(true, |online| n.is_online == online))
        .collect();
    Ok(Json(nodes))
}

// GET /api/nodes/search?q=
async fn search_nodes(
    State(app): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Node>> {
    Json(app.registry.search_nodes(params.q.as_deref().unwrap_or("")))
}

// GET /api/stats et /api/nodes/stats
async fn get_stats(State(app): State<AppState>) -> Json<NodeStats> {
    Json(NodeStats::collect(&app.registry))
}

// GET /api/nodes/{id} (id numérique, sinon identifiant "Node-A1-001")
async fn get_node(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Node>, ApiError> {
    let node = match id.parse::<u64>() {
        Ok(numeric) => app.registry.node_by_id(numeric),
        Err(_) => app.registry.node_by_identifier(&id),
    };
    node.map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Node {id} not found")))
}

// POST /api/nodes
async fn create_node(
    State(app): State<AppState>,
    payload: Result<Json<NewNode>, JsonRejection>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let Json(new) = payload.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    new.validate()?;
    let node = app.registry.create_node(new)?;
    info!("node {} created via API (id {})", node.node_id, node.id);
    Ok((StatusCode::CREATED, Json(node)))
}

// PUT /api/nodes/{nodeId}/status
async fn update_node_status(
    State(app): State<AppState>,
    Path(node_id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Node>, ApiError> {
    let Json(update) = payload.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    app.registry
        .update_node_status(&node_id, update.is_online, update.temperature, update.humidity)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Node {node_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldConfig;
    use crate::field::generate_field_nodes;
    use axum::body::{self, Body};
    use axum::http::{header, Method, Request};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::{json, Value};
    use tower::ServiceExt; // pour `oneshot`

    fn app_state() -> AppState {
        let registry = NodeRegistry::new();
        registry.seed(generate_field_nodes(&FieldConfig::default(), &mut StdRng::seed_from_u64(11)));
        AppState { registry, health_tracker: HealthTracker::new() }
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_list_nodes_sorted() {
        let (status, body) = send(build_router(app_state()), Method::GET, "/api/nodes", None).await;
        assert_eq!(status, StatusCode::OK);

        let ids: Vec<&str> = body.as_array().unwrap().iter().map(|n| n["nodeId"].as_str().unwrap()).collect();
        assert_eq!(ids.len(), 24);
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn test_list_nodes_status_filter() {
        let state = app_state();
        let online = state.registry.all_nodes().iter().filter(|n| n.is_online).count();

        let (_, body) = send(build_router(state.clone()), Method::GET, "/api/nodes?status=online", None).await;
        let nodes = body.as_array().unwrap();
        assert_eq!(nodes.len(), online);
        assert!(nodes.iter().all(|n| n["status"] == "Online"));

        let (status, body) = send(build_router(state), Method::GET, "/api/nodes?status=maybe", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("maybe"));
    }

    #[tokio::test]
    async fn test_stats_on_both_paths() {
        let state = app_state();
        let expected = serde_json::to_value(NodeStats::collect(&state.registry)).unwrap();

        for uri in ["/api/stats", "/api/nodes/stats"] {
            let (status, body) = send(build_router(state.clone()), Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, expected);
            assert_eq!(body["totalNodes"], 24);
        }
    }

    #[tokio::test]
    async fn test_search() {
        let (status, body) = send(build_router(app_state()), Method::GET, "/api/nodes/search?q=a1", None).await;
        assert_eq!(status, StatusCode::OK);
        let nodes = body.as_array().unwrap();
        assert_eq!(nodes.len(), 4);
        assert!(nodes.iter().all(|n| n["section"] == "A1"));
    }

    #[tokio::test]
    async fn test_get_node_by_id() {
        let state = app_state();
        let (status, body) = send(build_router(state.clone()), Method::GET, "/api/nodes/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodeId"], "Node-A1-001");

        let (status, body) = send(build_router(state.clone()), Method::GET, "/api/nodes/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Node 999 not found");

        let (status, body) = send(build_router(state.clone()), Method::GET, "/api/nodes/Node-C1-002", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 18);

        let (status, _) = send(build_router(state), Method::GET, "/api/nodes/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_node() {
        let state = app_state();
        let payload = json!({
            "nodeId": "Node-D1-001",
            "location": "Section D1, Row 1",
            "section": "D1",
            "row": "1",
            "isOnline": true,
            "temperature": 24.0,
            "humidity": 66.0,
            "signalStrength": 3,
            "batteryLevel": 90.0
        });

        let (status, body) = send(build_router(state.clone()), Method::POST, "/api/nodes", Some(payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 25);
        assert_eq!(body["status"], "Online");

        let (status, body) = send(build_router(state.clone()), Method::POST, "/api/nodes", Some(payload)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("Node-D1-001"));

        let (status, _) =
            send(build_router(state.clone()), Method::POST, "/api/nodes", Some(json!({"nodeId": "x"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.registry.len(), 25);
    }

    #[tokio::test]
    async fn test_update_status() {
        let state = app_state();
        let (status, body) = send(
            build_router(state.clone()),
            Method::PUT,
            "/api/nodes/Node-B2-003/status",
            Some(json!({"isOnline": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Offline");
        assert_eq!(body["signalStrength"], 0);
        assert!(!state.registry.node_by_identifier("Node-B2-003").unwrap().is_online);

        let (status, body) = send(
            build_router(state.clone()),
            Method::PUT,
            "/api/nodes/Node-Z9-001/status",
            Some(json!({"isOnline": true})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
        assert_eq!(state.registry.len(), 24);
    }

    #[tokio::test]
    async fn test_health_routes() {
        let state = app_state();
        let resp = build_router(state.clone())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let (status, body) = send(build_router(state), Method::GET, "/system/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes_tracked"], 24);
        assert_eq!(body["telemetry_passes"], 0);
    }

    #[tokio::test]
    async fn test_panic_maps_to_500() {
        let resp = panic_to_500(Box::new("registry poisoned"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal Server Error: registry poisoned");
    }
}
