//! Token, refresh and revocation endpoints

use super::engine::{CodeExchange, OAuthEngineError, RefreshExchange};
use super::models::{OAuthError, OAuthRejection, RevokeRequest, TokenRequest, TokenResponse};
use crate::app::AppState;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use tracing::{debug, warn};

/// POST /oauth2/token
///
/// Supports three grant types:
/// 1. `authorization_code` - code, redirect_uri, client_id, client_secret,
///    and code_verifier when the code was issued with a PKCE challenge
/// 2. `refresh_token` - refresh_token, client_id, client_secret
/// 3. `client_credentials` - client_id, client_secret
///
/// # Response
/// ```json
/// {
///   "access_token": "...",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "refresh_token": "...",
///   "scope": "read:data"
/// }
/// ```
pub async fn token(
    State(state): State<AppState>,
    Form(request): Form<TokenRequest>,
) -> Result<Response, OAuthRejection> {
    match request.grant_type.as_str() {
        "authorization_code" => authorization_code_grant(&state, request).await,
        "refresh_token" => refresh_token_grant(&state, request).await,
        "client_credentials" => client_credentials_grant(&state, request).await,
        "" => Err(OAuthError::invalid_request("grant_type is required").into_rejection()),
        other => {
            debug!(grant_type = %other, "Unsupported grant type");
            Err(OAuthError::unsupported_grant_type(format!(
                "grant_type '{other}' not supported"
            ))
            .into_rejection())
        }
    }
}

/// POST /oauth2/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Form(request): Form<TokenRequest>,
) -> Result<Response, OAuthRejection> {
    if !request.grant_type.is_empty() && request.grant_type != "refresh_token" {
        return Err(OAuthError::unsupported_grant_type(
            "Only 'refresh_token' is accepted on this endpoint",
        )
        .into_rejection());
    }
    refresh_token_grant(&state, request).await
}

/// POST /oauth2/revoke (RFC 7009)
///
/// Answers 200 whether or not the token was known.
pub async fn revoke(
    State(state): State<AppState>,
    Form(request): Form<RevokeRequest>,
) -> Result<StatusCode, OAuthRejection> {
    if request.token.is_empty() {
        return Err(OAuthError::invalid_request("token is required").into_rejection());
    }
    let client_id = required(request.client_id, "client_id")?;
    let client_secret = required(request.client_secret, "client_secret")?;

    let revoked = state
        .oauth
        .revoke_client_token(&client_id, &client_secret, &request.token)
        .await
        .map_err(|e| failure("revoke", &client_id, e))?;

    debug!(client_id = %client_id, revoked, "Revocation processed");
    Ok(StatusCode::OK)
}

async fn authorization_code_grant(
    state: &AppState,
    request: TokenRequest,
) -> Result<Response, OAuthRejection> {
    let code = required(request.code, "code")?;
    let redirect_uri = required(request.redirect_uri, "redirect_uri")?;
    let client_id = required(request.client_id, "client_id")?;
    let client_secret = required(request.client_secret, "client_secret")?;

    let issued = state
        .oauth
        .exchange_code(CodeExchange {
            code: &code,
            client_id: &client_id,
            client_secret: &client_secret,
            redirect_uri: &redirect_uri,
            code_verifier: request.code_verifier.as_deref(),
        })
        .await
        .map_err(|e| failure("authorization_code", &client_id, e))?;

    Ok(token_response(issued.into_response()))
}

async fn refresh_token_grant(
    state: &AppState,
    request: TokenRequest,
) -> Result<Response, OAuthRejection> {
    let refresh_token = required(request.refresh_token, "refresh_token")?;
    let client_id = required(request.client_id, "client_id")?;
    let client_secret = required(request.client_secret, "client_secret")?;

    let issued = state
        .oauth
        .refresh(RefreshExchange {
            refresh_token: &refresh_token,
            client_id: &client_id,
            client_secret: &client_secret,
        })
        .await
        .map_err(|e| failure("refresh_token", &client_id, e))?;

    Ok(token_response(issued.into_response()))
}

async fn client_credentials_grant(
    state: &AppState,
    request: TokenRequest,
) -> Result<Response, OAuthRejection> {
    let client_id = required(request.client_id, "client_id")?;
    let client_secret = required(request.client_secret, "client_secret")?;

    let issued = state
        .oauth
        .client_credentials(&client_id, &client_secret)
        .await
        .map_err(|e| failure("client_credentials", &client_id, e))?;

    Ok(token_response(issued.into_response()))
}

fn required(value: Option<String>, name: &str) -> Result<String, OAuthRejection> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::invalid_request(format!("{name} is required")).into_rejection())
}

fn failure(grant_type: &str, client_id: &str, error: OAuthEngineError) -> OAuthRejection {
    warn!(grant_type = %grant_type, client_id = %client_id, "Token request failed: {}", error);
    error.to_oauth_error().into_rejection()
}

/// Token responses must not be cached (RFC 6749 §5.1)
fn token_response(body: TokenResponse) -> Response {
    let mut response = Json(body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}
