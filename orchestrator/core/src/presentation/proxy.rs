// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The HTTP surface bridging external callers to a specific MCP's stdio
//! transport, plus the aggregated tool catalog and per-MCP log tail reads
//! consumed by the UI.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::stream;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::application::sandbox_manager::SandboxManager;
use crate::domain::errors::ProxyError;

pub struct AppState {
    pub manager: Arc<SandboxManager>,
}

pub fn router(manager: Arc<SandboxManager>) -> Router {
    let state = Arc::new(AppState { manager });
    Router::new()
        .route("/mcp_proxy/{id}", post(proxy_request))
        .route("/mcp_proxy/{id}/logs", get(proxy_logs))
        .route("/api/mcp_server/tools", get(aggregated_tools))
        .route("/healthz", get(healthz))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ProxyRequestQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    #[serde(rename = "mcpSessionId")]
    mcp_session_id: Option<String>,
}

/// `POST /mcp_proxy/{id}`. Looks up the target MCP first, so a 404 or a
/// direct-connect rejection can still be reported as a plain HTTP status.
/// Once a target is resolved the response is hijacked: status 200 with
/// `content-type: application/json` and `Cache-Control: no-cache` go out
/// immediately, and the body streams in once bridging to the container's
/// stdio transport completes. Errors past this point are folded into a
/// JSON-RPC error envelope written into that same body rather than a
/// bare HTTP failure, since the status line is already on the wire.
async fn proxy_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ProxyRequestQuery>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let wrapper = match state.manager.resolve_proxy_target(&id).await {
        Ok(wrapper) => wrapper,
        Err(ProxyError::UnknownMcp(id)) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": format!("no MCP registered under id {id}") }))).into_response();
        }
        Err(e @ ProxyError::DirectConnectRequired(_)) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response();
        }
    };

    let session_id = query.session_id.or(query.mcp_session_id);
    let manager = state.manager.clone();
    let body_stream = stream::once(async move {
        let response = manager.bridge_proxy_request(wrapper, &id, body, session_id).await;
        Ok::<Bytes, Infallible>(Bytes::from(serde_json::to_vec(&response).unwrap_or_default()))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream))
        .expect("status/headers/body are all statically valid")
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    lines: Option<usize>,
}

const DEFAULT_LOG_LINES: usize = 100;

/// `GET /mcp_proxy/{id}/logs?lines=N`.
async fn proxy_logs(State(state): State<Arc<AppState>>, Path(id): Path<String>, Query(query): Query<LogsQuery>) -> impl IntoResponse {
    let n_lines = query.lines.unwrap_or(DEFAULT_LOG_LINES);
    match state.manager.mcp_logs(&id, n_lines).await {
        Ok((logs, container_name)) => Json(json!({ "logs": logs, "containerName": container_name })).into_response(),
        Err(ProxyError::UnknownMcp(id)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": format!("no MCP registered under id {id}") }))).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

/// `GET /api/mcp_server/tools`.
async fn aggregated_tools(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tools = state.manager.available_tools_list().await;
    Json(json!({ "tools": tools }))
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let summary = state.manager.status_summary().await;
    let mcp_counts_by_state = summary.mcp_counts_by_state();
    Json(json!({ "runtime": summary.runtime, "mcpCountsByState": mcp_counts_by_state }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupervisorConfig;
    use crate::infrastructure::event_bus::SandboxEventBus;
    use crate::infrastructure::persistence_memory::InMemoryInstalledMcpStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let persistence = Arc::new(InMemoryInstalledMcpStore::new());
        let events = Arc::new(SandboxEventBus::with_default_capacity());
        let manager = Arc::new(SandboxManager::new(Arc::new(SupervisorConfig::default()), persistence, events));
        router(manager)
    }

    #[tokio::test]
    async fn proxy_request_for_unknown_mcp_is_404() {
        let app = test_router();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp_proxy/missing")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn aggregated_tools_is_empty_with_no_registered_mcps() {
        let app = test_router();
        let response = app.oneshot(Request::builder().uri("/api/mcp_server/tools").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
