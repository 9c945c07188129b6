//! Authentication and authorization pipeline in front of resource routes

mod common;

use axum::http::StatusCode;
use common::*;
use opendif_dx_auth::{
    AccessConfig, AppState, AuditEventType, AuditLogger, AuthorizationMode, InMemoryCredentialStore,
    MemoryAuditSink,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_public_paths_bypass_access_control() {
    let app = app(&state());

    for path in ["/health", "/debug/ping"] {
        let response = send(&app, get_request(path, None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
async fn test_missing_or_malformed_header_is_401() {
    let app = app(&state());

    let response = send(&app, get_request("/api/v1/schemas", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"error": "unauthorized", "message": "Authentication required"})
    );

    let request = axum::http::Request::builder()
        .uri("/api/v1/schemas")
        .header("authorization", "Basic dXNlcjpwYXNz")
        .body(axum::body::Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, get_request("/api/v1/schemas", Some("not-a-known-token"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_permission_table_enforced() {
    let app = app(&state());

    let response = send(&app, get_request("/api/v1/schemas", Some(&member_token()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["subject"], "idp-user-1");
    assert_eq!(body["ownership_required"], false);

    let response = send(&app, get_request("/api/v1/schemas/s-42", Some(&member_token()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ownership_required"], true);

    // Members cannot create members
    let response = send(
        &app,
        json_request("POST", "/api/v1/members", Some(&member_token()), json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "forbidden");

    // Internal services are read-only
    let response = send(
        &app,
        json_request("POST", "/api/v1/schemas", Some(&system_token()), json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        json_request("POST", "/api/v1/members", Some(&admin_token()), json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_undefined_route_follows_default_mode() {
    let app = app(&state());
    let path = "/api/v1/reports/usage";

    let response = send(&app, get_request(path, Some(&admin_token()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ownership_required"], false);

    let response = send(&app, get_request(path, Some(&system_token()))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get_request(path, Some(&member_token()))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_fail_closed_mode_denies_undefined_routes() {
    let mut config = AccessConfig::default();
    config.rbac.mode = AuthorizationMode::FailClosed;
    let state = AppState::new(config)
        .unwrap()
        .with_jwt_validator(preloaded_validator());
    let app = app(&state);

    let response = send(&app, get_request("/api/v1/reports/usage", Some(&admin_token()))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Table entries are unaffected
    let response = send(&app, get_request("/api/v1/schemas", Some(&admin_token()))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_oauth_token_limited_to_granted_scopes() {
    let state = state();
    let app = app(&state);
    let client = register_client(&state).await;
    let code = authorize_code(&app, &client.client.client_id, &member_token()).await;

    let tokens = body_json(
        send(
            &app,
            form_request(
                "/oauth2/token",
                &[
                    ("grant_type", "authorization_code"),
                    ("code", &code),
                    ("redirect_uri", REDIRECT_URI),
                    ("client_id", &client.client.client_id),
                    ("client_secret", &client.client_secret),
                ],
            ),
        )
        .await,
    )
    .await;
    let access_token = tokens["access_token"].as_str().unwrap();

    // Granted scope is read:data only, which names no table permission
    let response = send(&app, get_request("/api/v1/schemas", Some(access_token))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // OAuth identities carry no role, so undefined routes are closed to them
    let response = send(&app, get_request("/api/v1/reports/usage", Some(access_token))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_denials_are_audited() {
    let sink = Arc::new(MemoryAuditSink::default());
    let state = AppState::with_store(
        AccessConfig::default(),
        Arc::new(InMemoryCredentialStore::new()),
        AuditLogger::new(sink.clone()),
    )
    .unwrap()
    .with_jwt_validator(preloaded_validator());
    let app = app(&state);

    let response = send(&app, get_request("/api/v1/reports/usage", Some(&member_token()))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = send(&app, get_request("/api/v1/schemas", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Audit delivery is detached from the request
    let mut events = Vec::new();
    for _ in 0..50 {
        events = sink.events();
        if events.len() >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let kinds: Vec<AuditEventType> = events.iter().map(|e| e.event_type).collect();
    assert!(kinds.contains(&AuditEventType::AccessDenied), "{kinds:?}");
    assert!(kinds.contains(&AuditEventType::AuthFailure), "{kinds:?}");
}
