//! Access control configuration
//!
//! Defaults are production values. [`AccessConfig::from_env`] applies `DX_*`
//! environment overrides on top of them.

use crate::rbac::AuthorizationMode;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Upper bound for credential lifetimes (ten years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Top-level access control configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Authorization server settings
    pub oauth: OAuthConfig,
    /// Federated JWT validation; `None` disables the JWT validator
    pub jwt: Option<JwtConfig>,
    /// Route authorization settings
    pub rbac: RbacConfig,
}

/// OAuth2 authorization server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Authorization code lifetime in seconds
    pub code_ttl_secs: u64,
    /// Access token lifetime in seconds
    pub access_token_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl_secs: u64,
    /// Scopes assigned to clients registered without any
    pub default_scopes: Vec<String>,
    /// Login page for browser requests to `/oauth2/authorize` without a user
    pub login_url: Option<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: 600,              // 10 minutes
            access_token_ttl_secs: 3600,     // 1 hour
            refresh_token_ttl_secs: 2592000, // 30 days
            default_scopes: vec!["read:data".to_string()],
            login_url: None,
        }
    }
}

impl OAuthConfig {
    pub fn code_ttl(&self) -> Duration {
        seconds(self.code_ttl_secs)
    }

    pub fn access_token_ttl(&self) -> Duration {
        seconds(self.access_token_ttl_secs)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        seconds(self.refresh_token_ttl_secs)
    }
}

/// Federated identity provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// JWKS endpoint of the identity provider
    pub jwks_url: String,
    /// Required `iss`, if set
    pub expected_issuer: Option<String>,
    /// Required member of `aud`, if set
    pub expected_audience: Option<String>,
    /// Required `org_name`, if set
    pub expected_org: Option<String>,
    /// Timeout for a single JWKS fetch
    pub fetch_timeout_secs: u64,
    /// Age after which cached keys are refetched
    pub cache_ttl_secs: u64,
    /// Clock skew tolerated on `exp`/`nbf`
    pub leeway_secs: u64,
}

impl JwtConfig {
    /// Config for `jwks_url` with default timings and no claim expectations
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            expected_issuer: None,
            expected_audience: None,
            expected_org: None,
            fetch_timeout_secs: 10,
            cache_ttl_secs: 3600,
            leeway_secs: 0,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected_audience = Some(audience.into());
        self
    }

    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.expected_org = Some(org.into());
        self
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Route authorization settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbacConfig {
    /// Policy for routes missing from the endpoint table
    pub mode: AuthorizationMode,
    /// Log every hit on an undefined route
    pub strict_mode: bool,
}

impl AccessConfig {
    /// Defaults overridden by process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, which maps variable names to values
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.load_overrides(&lookup)?;
        Ok(config)
    }

    fn load_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // OAuth2
        if let Some(v) = parse_ttl(lookup, "DX_OAUTH_CODE_TTL_SECS")? {
            self.oauth.code_ttl_secs = v;
        }
        if let Some(v) = parse_ttl(lookup, "DX_OAUTH_ACCESS_TTL_SECS")? {
            self.oauth.access_token_ttl_secs = v;
        }
        if let Some(v) = parse_ttl(lookup, "DX_OAUTH_REFRESH_TTL_SECS")? {
            self.oauth.refresh_token_ttl_secs = v;
        }
        if let Some(scopes) = lookup("DX_OAUTH_DEFAULT_SCOPES") {
            self.oauth.default_scopes = scopes.split_whitespace().map(String::from).collect();
        }
        if let Some(login_url) = lookup("DX_OAUTH_LOGIN_URL").filter(|v| !v.is_empty()) {
            url::Url::parse(&login_url).map_err(|_| ConfigError::InvalidValue {
                key: "DX_OAUTH_LOGIN_URL".to_string(),
                value: login_url.clone(),
            })?;
            self.oauth.login_url = Some(login_url);
        }

        // Federated JWT
        if let Some(jwks_url) = lookup("DX_JWKS_URL").filter(|v| !v.is_empty()) {
            let mut jwt = JwtConfig::new(jwks_url);
            jwt.expected_issuer = lookup("DX_JWT_ISSUER").filter(|v| !v.is_empty());
            jwt.expected_audience = lookup("DX_JWT_AUDIENCE").filter(|v| !v.is_empty());
            jwt.expected_org = lookup("DX_JWT_ORG").filter(|v| !v.is_empty());
            if let Some(v) = parse_var(lookup, "DX_JWKS_TIMEOUT_SECS")? {
                jwt.fetch_timeout_secs = v;
            }
            if let Some(v) = parse_var(lookup, "DX_JWKS_CACHE_TTL_SECS")? {
                jwt.cache_ttl_secs = v;
            }
            if let Some(v) = parse_var(lookup, "DX_JWT_LEEWAY_SECS")? {
                jwt.leeway_secs = v;
            }
            self.jwt = Some(jwt);
        }

        // RBAC
        if let Some(mode) = lookup("DX_AUTHZ_MODE") {
            self.rbac.mode = AuthorizationMode::parse_lenient(&mode);
        }
        if let Some(strict) = lookup("DX_AUTHZ_STRICT") {
            self.rbac.strict_mode = matches!(strict.as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }
}

fn parse_var<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

/// TTL parse bounded to `1..=MAX_TTL_SECS`
fn parse_ttl<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_var(lookup, key)? {
        Some(v) if v == 0 || v > MAX_TTL_SECS => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: v.to_string(),
        }),
        other => Ok(other),
    }
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_TTL_SECS) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AccessConfig::default();

        assert_eq!(config.oauth.code_ttl(), Duration::minutes(10));
        assert_eq!(config.oauth.access_token_ttl(), Duration::hours(1));
        assert_eq!(config.oauth.refresh_token_ttl(), Duration::days(30));
        assert_eq!(config.oauth.default_scopes, vec!["read:data"]);
        assert!(config.jwt.is_none());
        assert_eq!(config.rbac.mode, AuthorizationMode::FailOpenAdminSystem);
        assert!(!config.rbac.strict_mode);
    }

    #[test]
    fn test_env_overrides() {
        let config = AccessConfig::from_lookup(lookup_from(&[
            ("DX_OAUTH_ACCESS_TTL_SECS", "120"),
            ("DX_OAUTH_DEFAULT_SCOPES", "read:data schema:read"),
            ("DX_JWKS_URL", "https://idp.example/oauth2/jwks"),
            ("DX_JWT_ISSUER", "https://idp.example/oauth2/token"),
            ("DX_JWT_AUDIENCE", ""),
            ("DX_AUTHZ_MODE", "fail_closed"),
            ("DX_AUTHZ_STRICT", "true"),
        ]))
        .unwrap();

        assert_eq!(config.oauth.access_token_ttl_secs, 120);
        assert_eq!(config.oauth.default_scopes, vec!["read:data", "schema:read"]);

        let jwt = config.jwt.unwrap();
        assert_eq!(jwt.jwks_url, "https://idp.example/oauth2/jwks");
        assert_eq!(
            jwt.expected_issuer.as_deref(),
            Some("https://idp.example/oauth2/token")
        );
        assert!(jwt.expected_audience.is_none());
        assert_eq!(jwt.fetch_timeout_secs, 10);

        assert_eq!(config.rbac.mode, AuthorizationMode::FailClosed);
        assert!(config.rbac.strict_mode);
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = AccessConfig::from_lookup(lookup_from(&[("DX_OAUTH_CODE_TTL_SECS", "ten")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "DX_OAUTH_CODE_TTL_SECS"));
    }

    #[test]
    fn test_ttl_bounds_enforced() {
        for raw in ["0", "18446744073709551615", "315360001"] {
            let err = AccessConfig::from_lookup(lookup_from(&[("DX_OAUTH_ACCESS_TTL_SECS", raw)]))
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "DX_OAUTH_ACCESS_TTL_SECS"),
                "{raw}"
            );
        }

        let config =
            AccessConfig::from_lookup(lookup_from(&[("DX_OAUTH_REFRESH_TTL_SECS", "315360000")]))
                .unwrap();
        assert_eq!(config.oauth.refresh_token_ttl(), Duration::days(3650));

        // Values set in code are clamped rather than overflowing
        let oauth = OAuthConfig {
            access_token_ttl_secs: u64::MAX,
            ..OAuthConfig::default()
        };
        assert_eq!(oauth.access_token_ttl(), Duration::seconds(MAX_TTL_SECS as i64));
    }

    #[test]
    fn test_invalid_login_url_rejected() {
        assert!(AccessConfig::from_lookup(lookup_from(&[("DX_OAUTH_LOGIN_URL", "not a url")])).is_err());
    }
}
