// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use mcp_sandbox_core::domain::errors::ConnectorError;
use mcp_sandbox_core::domain::installed_mcp::OAuthTokens;
use mcp_sandbox_core::infrastructure::remote_connector::RemoteMcpConnector;

fn fresh_tokens() -> OAuthTokens {
    OAuthTokens {
        access_token: "xyz-token".into(),
        token_type: None,
        expires_in: Some(3600),
        issued_at: Some(chrono::Utc::now()),
    }
}

#[tokio::test]
async fn connect_then_list_tools_round_trips_over_bearer_auth() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("authorization", "Bearer xyz-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":"tools-list","result":{"tools":[{"name":"search"}]}}"#)
        .expect_at_least(2)
        .create_async()
        .await;

    let connector = RemoteMcpConnector::connect(&server.url(), &fresh_tokens())
        .await
        .expect("probe should succeed against the mock server");

    let response = connector.list_tools().await.expect("list_tools should succeed");
    assert_eq!(response["result"]["tools"][0]["name"], "search");

    mock.assert_async().await;
}

#[tokio::test]
async fn connect_exhausts_retries_against_an_unreachable_host() {
    // Port 0 never has a listener bound to it, so every attempt hits a
    // connection-level error rather than an HTTP status.
    let result = RemoteMcpConnector::connect("http://127.0.0.1:0", &fresh_tokens()).await;

    match result {
        Err(ConnectorError::ConnectFailed { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected ConnectFailed after exhausting retries, got {other:?}"),
    }
}

#[tokio::test]
async fn call_surfaces_non_success_status_as_remote_error() {
    let mut server = mockito::Server::new_async().await;
    server.mock("POST", "/").with_status(403).create_async().await;

    // `probe` only inspects transport-level errors, so the 403 does not
    // prevent `connect` from succeeding; the status only matters once a
    // real JSON-RPC call goes through `call`.
    let connector = RemoteMcpConnector::connect(&server.url(), &fresh_tokens())
        .await
        .expect("connect should succeed since probe ignores response status");

    let result = connector.list_tools().await;
    match result {
        Err(ConnectorError::RemoteError(message)) => assert!(message.contains("403")),
        other => panic!("expected RemoteError carrying the status, got {other:?}"),
    }
}
