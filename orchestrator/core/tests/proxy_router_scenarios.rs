// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use mcp_sandbox_core::application::SandboxManager;
use mcp_sandbox_core::config::SupervisorConfig;
use mcp_sandbox_core::infrastructure::event_bus::SandboxEventBus;
use mcp_sandbox_core::infrastructure::persistence_memory::InMemoryInstalledMcpStore;
use mcp_sandbox_core::presentation;
use tower::ServiceExt;

fn fresh_router() -> axum::Router {
    let persistence = Arc::new(InMemoryInstalledMcpStore::new());
    let events = Arc::new(SandboxEventBus::with_default_capacity());
    let manager = Arc::new(SandboxManager::new(Arc::new(SupervisorConfig::default()), persistence, events));
    presentation::router(manager)
}

#[tokio::test]
async fn logs_for_unregistered_mcp_is_not_found() {
    let response = fresh_router()
        .oneshot(Request::builder().uri("/mcp_proxy/missing/logs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn healthz_reports_not_installed_runtime_before_any_start() {
    let response = fresh_router()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["runtime"]["status"], "not_installed");
    assert_eq!(value["mcpCountsByState"], serde_json::json!({}));
}

#[tokio::test]
async fn aggregated_tools_shape_is_a_bare_tools_array() {
    let response = fresh_router()
        .oneshot(Request::builder().uri("/api/mcp_server/tools").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(value["tools"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn proxy_request_body_with_malformed_json_is_rejected_before_reaching_the_manager() {
    let response = fresh_router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp_proxy/anything")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
