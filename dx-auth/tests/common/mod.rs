//! Shared helpers for the integration tests
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use opendif_dx_auth::jwks::{Jwks, usable_keys};
use opendif_dx_auth::oauth::{CreateClientRequest, RegisteredClient};
use opendif_dx_auth::rbac::Decision;
use opendif_dx_auth::{
    AccessConfig, AppState, AuthenticatedIdentity, JwtConfig, JwtValidator, KeyCache, build_router,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tower::ServiceExt;

pub const PRIMARY_PEM: &[u8] = include_bytes!("../fixtures/primary_rsa.pem");
pub const ROTATED_PEM: &[u8] = include_bytes!("../fixtures/rotated_rsa.pem");
pub const REDIRECT_URI: &str = "https://consumer.example.gov/callback";

pub fn rsa_components() -> Value {
    serde_json::from_str(include_str!("../fixtures/rsa_components.json")).unwrap()
}

/// JWK for one of the fixture keys (`"primary"` or `"rotated"`)
pub fn jwk(kid: &str, which: &str) -> Value {
    let c = rsa_components();
    json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "alg": "RS256",
        "n": c[which]["n"],
        "e": c[which]["e"],
    })
}

pub fn user_claims(roles: &[&str]) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": "idp-user-1",
        "email": "officer@agency.example.gov",
        "roles": roles,
        "org_name": "opendif",
        "iss": "https://idp.example.gov",
        "aud": "dx-gateway",
        "iat": now,
        "exp": now + 3600,
    })
}

pub fn sign(claims: &Value, kid: &str, pem: &[u8]) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
}

/// Validator preloaded with the primary key under kid `k1`
pub fn preloaded_validator() -> Arc<JwtValidator> {
    let config = JwtConfig {
        fetch_timeout_secs: 1,
        ..JwtConfig::new("http://127.0.0.1:9/jwks.json")
    };
    let jwks: Jwks = serde_json::from_value(json!({ "keys": [jwk("k1", "primary")] })).unwrap();
    let cache = KeyCache::with_keys(&config, usable_keys(&jwks).unwrap()).unwrap();
    Arc::new(JwtValidator::with_cache(config, cache))
}

pub fn admin_token() -> String {
    sign(&user_claims(&["OpenDIF_Admin"]), "k1", PRIMARY_PEM)
}

pub fn member_token() -> String {
    sign(&user_claims(&["OpenDIF_Member"]), "k1", PRIMARY_PEM)
}

pub fn system_token() -> String {
    sign(&user_claims(&["OpenDIF_System"]), "k1", PRIMARY_PEM)
}

async fn echo_identity(
    Extension(identity): Extension<AuthenticatedIdentity>,
    decision: Option<Extension<Decision>>,
) -> Json<Value> {
    Json(json!({
        "subject": identity.subject,
        "ownership_required": decision.map(|Extension(d)| d.ownership_required()),
    }))
}

/// Protected resource routes used by the pipeline tests
pub fn resources() -> Router {
    Router::new()
        .route("/api/v1/schemas", get(echo_identity).post(echo_identity))
        .route("/api/v1/schemas/:id", get(echo_identity))
        .route("/api/v1/members", post(echo_identity))
        .route("/api/v1/reports/usage", get(echo_identity))
        .route("/debug/ping", get(|| async { "pong" }))
}

pub fn state() -> AppState {
    AppState::new(AccessConfig::default())
        .unwrap()
        .with_jwt_validator(preloaded_validator())
}

pub fn app(state: &AppState) -> Router {
    build_router(state.clone(), resources())
}

pub async fn register_client(state: &AppState) -> RegisteredClient {
    state
        .oauth
        .create_client(CreateClientRequest {
            name: "Consumer Portal".into(),
            description: "integration test client".into(),
            redirect_uri: REDIRECT_URI.into(),
            scopes: vec!["read:data".into(), "schema:read".into()],
        })
        .await
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(json!({}))
}

pub fn get_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form_request(uri: &str, params: &[(&str, &str)]) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(serde_json::to_vec(&body).unwrap())).unwrap()
}

/// Run the authorize step as `bearer` and return the issued code
pub async fn authorize_code(app: &Router, client_id: &str, bearer: &str) -> String {
    let uri = format!(
        "/oauth2/authorize?response_type=code&client_id={client_id}&redirect_uri={}&scope=read:data&state=xyz",
        urlencode(REDIRECT_URI)
    );
    let response = send(app, get_request(&uri, Some(bearer))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    code_from_location(&response)
}

pub fn code_from_location(response: &Response) -> String {
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    let url = url::Url::parse(location).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

pub fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Local JWKS endpoint whose key set can be swapped during a test
#[derive(Clone)]
pub struct JwksServer {
    pub url: String,
    keys: Arc<RwLock<Value>>,
    hits: Arc<AtomicUsize>,
}

impl JwksServer {
    pub async fn start(initial: Value) -> Self {
        let keys = Arc::new(RwLock::new(initial));
        let hits = Arc::new(AtomicUsize::new(0));

        let served = Arc::clone(&keys);
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/jwks.json",
            get(move || {
                let served = Arc::clone(&served);
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let body = served.read().await.clone();
                    if body.is_null() {
                        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({}))).into_response()
                    } else {
                        (StatusCode::OK, Json(body)).into_response()
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/jwks.json"),
            keys,
            hits,
        }
    }

    pub async fn set_keys(&self, keys: Value) {
        *self.keys.write().await = keys;
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}
