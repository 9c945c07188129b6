//! Authorization endpoint
//!
//! `GET /oauth2/authorize` issues a code for the signed-in end user and
//! redirects back to the client. The end user is taken from an identity an
//! outer layer already placed in request extensions, or else from the
//! request's bearer token.

use super::models::{AuthorizeRequest, OAuthError, OAuthRejection};
use crate::app::AppState;
use crate::config::OAuthConfig;
use crate::middleware::extract_bearer;
use crate::models::AuthenticatedIdentity;
use axum::Extension;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};
use url::Url;

/// GET /oauth2/authorize
///
/// # Query Parameters
/// - `response_type`: Must be "code"
/// - `client_id`: Registered client identifier
/// - `redirect_uri`: Must equal the client's registered URI
/// - `scope`: (Optional) Space-separated scopes
/// - `state`: (Optional) Echoed back on the redirect
/// - `code_challenge`, `code_challenge_method`: (Optional) PKCE, S256 only
pub async fn authorize(
    State(state): State<AppState>,
    identity: Option<Extension<AuthenticatedIdentity>>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeRequest>,
) -> Result<Response, OAuthRejection> {
    let reject = |error: OAuthError| error.with_state(params.state.clone()).into_rejection();

    let authorization = state
        .oauth
        .validate_authorization(&params)
        .await
        .map_err(|e| {
            warn!(client_id = %params.client_id, "Authorization request rejected: {}", e);
            reject(e.to_oauth_error())
        })?;

    let user = match identity {
        Some(Extension(identity)) => Some(identity),
        None => resolve_user(&state, &headers).await,
    };

    let Some(user) = user else {
        if let Some(login) = login_redirect(&state.config.oauth, &params, &headers) {
            debug!(client_id = %params.client_id, "No end user, redirecting to login");
            return Ok(found(login.as_str()));
        }
        return Err(reject(OAuthError::access_denied(
            "User authentication required",
        )));
    };

    let redirect = state
        .oauth
        .issue_code(authorization, &user.subject, params.state.as_deref())
        .await
        .map_err(|e| reject(e.to_oauth_error()))?;

    Ok(found(redirect.as_str()))
}

async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Option<AuthenticatedIdentity> {
    let token = extract_bearer(headers).ok()?;
    match state.authenticator.authenticate_token(token).await {
        Ok((identity, _)) => Some(identity),
        Err(e) => {
            debug!("Bearer token on authorize request not accepted: {}", e);
            None
        }
    }
}

/// Login page URL for browser requests, when one is configured
fn login_redirect(config: &OAuthConfig, params: &AuthorizeRequest, headers: &HeaderMap) -> Option<Url> {
    let accepts_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"));
    if !accepts_html {
        return None;
    }

    let mut url = Url::parse(config.login_url.as_deref()?).ok()?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", &params.client_id);
        query.append_pair("redirect_uri", &params.redirect_uri);
        if let Some(state) = params.state.as_deref().filter(|s| !s.is_empty()) {
            query.append_pair("state", state);
        }
        if let Some(scope) = params.scope.as_deref().filter(|s| !s.is_empty()) {
            query.append_pair("scope", scope);
        }
    }
    Some(url)
}

/// 302 Found
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn params() -> AuthorizeRequest {
        AuthorizeRequest {
            response_type: "code".into(),
            client_id: "client_1".into(),
            redirect_uri: "https://app.example/cb".into(),
            scope: Some("read:data".into()),
            state: Some("xyz".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_login_redirect_requires_html_and_url() {
        let config = OAuthConfig {
            login_url: Some("https://portal.example/login".into()),
            ..OAuthConfig::default()
        };
        let mut html = HeaderMap::new();
        html.insert(header::ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));

        let url = login_redirect(&config, &params(), &html).unwrap();
        assert_eq!(url.host_str(), Some("portal.example"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "client_1".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
        assert!(pairs.contains(&("redirect_uri".into(), "https://app.example/cb".into())));

        assert!(login_redirect(&config, &params(), &HeaderMap::new()).is_none());
        assert!(login_redirect(&OAuthConfig::default(), &params(), &html).is_none());
    }
}
