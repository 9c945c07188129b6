//! Federated JWT validation
//!
//! Tokens issued by the identity provider are verified against its JWKS and
//! reduced to an [`AuthenticatedIdentity`]. Every rejection has its own
//! [`JwtError`] variant for the logs; callers answer a generic 401.

use crate::config::JwtConfig;
use crate::jwks::{JwksError, KeyCache};
use crate::models::{AuthContext, AuthenticatedIdentity};
use crate::rbac::Role;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

/// JWT validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Unsupported signing algorithm: {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    #[error("Token header has no kid")]
    MissingKeyId,

    #[error("Signing key unavailable: {0}")]
    Key(#[from] JwksError),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Token not yet valid")]
    NotYetValid,

    #[error("Issuer mismatch: {0}")]
    IssuerMismatch(String),

    #[error("Audience mismatch")]
    AudienceMismatch,

    #[error("Organisation mismatch: {0}")]
    OrgMismatch(String),

    #[error("Missing subject claim")]
    MissingSubject,

    #[error("Missing email claim")]
    MissingEmail,

    #[error("No recognised role in token")]
    NoRecognisedRole,
}

impl JwtError {
    /// Whether the failure came from the identity provider being unreachable
    /// rather than from the token
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            JwtError::Key(JwksError::Fetch(_) | JwksError::Client(_))
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::ImmatureSignature => JwtError::NotYetValid,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            _ => JwtError::Malformed(err.to_string()),
        }
    }
}

/// Claims read from identity-provider tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    #[serde(default)]
    pub sub: String,

    #[serde(default)]
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(default, deserialize_with = "string_or_seq")]
    pub roles: Vec<String>,

    #[serde(default, deserialize_with = "string_or_seq")]
    pub groups: Vec<String>,

    #[serde(default)]
    pub org_name: String,

    #[serde(default)]
    pub iss: String,

    #[serde(default, deserialize_with = "string_or_seq")]
    pub aud: Vec<String>,

    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl UserClaims {
    /// Recognised roles, unknown names dropped
    pub fn recognised_roles(&self) -> Vec<Role> {
        let mut roles = Vec::new();
        for name in &self.roles {
            match name.parse::<Role>() {
                Ok(role) if !roles.contains(&role) => roles.push(role),
                Ok(_) => {}
                Err(_) => debug!(role = %name, "Ignoring unrecognised role"),
            }
        }
        roles
    }
}

/// Identity providers emit `roles`, `groups` and `aud` as either a string or
/// an array of strings
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrSeq {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<StringOrSeq>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(StringOrSeq::One(s)) if s.is_empty() => Vec::new(),
        Some(StringOrSeq::One(s)) => vec![s],
        Some(StringOrSeq::Many(v)) => v,
    })
}

/// Compact JWS shape: three non-empty dot-separated segments
pub fn looks_like_jwt(token: &str) -> bool {
    let mut parts = token.split('.');
    let shape = (parts.next(), parts.next(), parts.next(), parts.next());
    matches!(shape, (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty())
}

const RSA_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Verifies identity-provider tokens against the provider's JWKS
#[derive(Debug)]
pub struct JwtValidator {
    config: JwtConfig,
    keys: KeyCache,
}

impl JwtValidator {
    pub fn new(config: JwtConfig) -> Result<Self, JwksError> {
        let keys = KeyCache::new(&config)?;
        Ok(Self { config, keys })
    }

    /// Validator over an existing key cache
    pub fn with_cache(config: JwtConfig, keys: KeyCache) -> Self {
        Self { config, keys }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyCache {
        &self.keys
    }

    pub async fn validate_token(
        &self,
        raw: &str,
    ) -> Result<(AuthenticatedIdentity, AuthContext), JwtError> {
        let header = decode_header(raw)?;
        if !RSA_ALGORITHMS.contains(&header.alg) {
            return Err(JwtError::UnsupportedAlgorithm(header.alg));
        }
        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or(JwtError::MissingKeyId)?;

        let key = self.keys.get_key(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.validate_nbf = true;
        validation.leeway = self.config.leeway_secs;
        // Audience and issuer are optional and checked below
        validation.validate_aud = false;

        let claims = decode::<UserClaims>(raw, &key, &validation)?.claims;
        self.check_claims(&claims)?;

        let roles = claims.recognised_roles();
        if roles.is_empty() {
            return Err(JwtError::NoRecognisedRole);
        }

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| JwtError::Malformed("exp out of range".to_string()))?;

        let mut identity = AuthenticatedIdentity::from_roles(claims.sub.clone(), roles, expires_at)
            .with_email(claims.email.clone())
            .with_groups(claims.groups.clone());
        if !claims.org_name.is_empty() {
            identity = identity.with_org(claims.org_name.clone());
        }

        let context = AuthContext {
            permissions: identity.permissions.clone(),
            identity: identity.clone(),
            token: raw.to_string(),
            issued_by: claims.iss,
            audience: claims.aud,
        };

        Ok((identity, context))
    }

    fn check_claims(&self, claims: &UserClaims) -> Result<(), JwtError> {
        if let Some(expected) = &self.config.expected_issuer {
            if &claims.iss != expected {
                return Err(JwtError::IssuerMismatch(claims.iss.clone()));
            }
        }
        if let Some(expected) = &self.config.expected_audience {
            if !claims.aud.iter().any(|aud| aud == expected) {
                return Err(JwtError::AudienceMismatch);
            }
        }
        if let Some(expected) = &self.config.expected_org {
            if &claims.org_name != expected {
                return Err(JwtError::OrgMismatch(claims.org_name.clone()));
            }
        }
        if claims.sub.trim().is_empty() {
            return Err(JwtError::MissingSubject);
        }
        if claims.email.trim().is_empty() {
            return Err(JwtError::MissingEmail);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwks::{Jwks, usable_keys};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};

    const PRIMARY_PEM: &[u8] = include_bytes!("../tests/fixtures/primary_rsa.pem");
    const ROTATED_PEM: &[u8] = include_bytes!("../tests/fixtures/rotated_rsa.pem");

    fn validator(config: JwtConfig) -> JwtValidator {
        let c: Value =
            serde_json::from_str(include_str!("../tests/fixtures/rsa_components.json")).unwrap();
        let jwks: Jwks = serde_json::from_value(json!({
            "keys": [{"kty": "RSA", "kid": "k1", "use": "sig", "n": c["primary"]["n"], "e": c["primary"]["e"]}]
        }))
        .unwrap();
        let keys = KeyCache::with_keys(&config, usable_keys(&jwks).unwrap()).unwrap();
        JwtValidator::with_cache(config, keys)
    }

    fn config() -> JwtConfig {
        // Nothing listens here; any refetch fails fast
        JwtConfig {
            fetch_timeout_secs: 1,
            ..JwtConfig::new("http://127.0.0.1:9/jwks.json")
        }
    }

    fn claims() -> Value {
        let now = Utc::now().timestamp();
        json!({
            "sub": "user-123",
            "email": "member@example.gov",
            "roles": ["OpenDIF_Member", "Unrelated_Role"],
            "groups": "data-stewards",
            "org_name": "opendif",
            "iss": "https://idp.example.gov",
            "aud": ["dx-gateway", "other"],
            "iat": now,
            "exp": now + 3600,
        })
    }

    fn sign(claims: &Value, kid: Option<&str>, pem: &[u8]) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token() {
        let v = validator(
            config()
                .with_issuer("https://idp.example.gov")
                .with_audience("dx-gateway")
                .with_org("opendif"),
        );
        let token = sign(&claims(), Some("k1"), PRIMARY_PEM);

        let (identity, context) = v.validate_token(&token).await.unwrap();
        assert_eq!(identity.subject, "user-123");
        assert_eq!(identity.email.as_deref(), Some("member@example.gov"));
        assert_eq!(identity.roles, vec![Role::Member]);
        assert_eq!(identity.groups, vec!["data-stewards"]);
        assert_eq!(identity.org_name.as_deref(), Some("opendif"));
        assert_eq!(context.issued_by, "https://idp.example.gov");
        assert_eq!(context.audience, vec!["dx-gateway", "other"]);
        assert_eq!(context.token, token);
    }

    #[tokio::test]
    async fn test_audience_as_string() {
        let v = validator(config().with_audience("dx-gateway"));
        let mut c = claims();
        c["aud"] = json!("dx-gateway");
        assert!(v.validate_token(&sign(&c, Some("k1"), PRIMARY_PEM)).await.is_ok());

        c["aud"] = json!("someone-else");
        assert!(matches!(
            v.validate_token(&sign(&c, Some("k1"), PRIMARY_PEM)).await,
            Err(JwtError::AudienceMismatch)
        ));
    }

    #[tokio::test]
    async fn test_time_claims() {
        let v = validator(config());
        let now = Utc::now().timestamp();

        let mut c = claims();
        c["exp"] = json!(now - 3600);
        assert!(matches!(
            v.validate_token(&sign(&c, Some("k1"), PRIMARY_PEM)).await,
            Err(JwtError::Expired)
        ));

        let mut c = claims();
        c["nbf"] = json!(now + 600);
        assert!(matches!(
            v.validate_token(&sign(&c, Some("k1"), PRIMARY_PEM)).await,
            Err(JwtError::NotYetValid)
        ));
    }

    #[tokio::test]
    async fn test_claim_expectations() {
        let v = validator(config().with_issuer("https://idp.example.gov").with_org("opendif"));

        let mut c = claims();
        c["iss"] = json!("https://evil.example");
        assert!(matches!(
            v.validate_token(&sign(&c, Some("k1"), PRIMARY_PEM)).await,
            Err(JwtError::IssuerMismatch(_))
        ));

        let mut c = claims();
        c["org_name"] = json!("another-org");
        assert!(matches!(
            v.validate_token(&sign(&c, Some("k1"), PRIMARY_PEM)).await,
            Err(JwtError::OrgMismatch(_))
        ));

        let mut c = claims();
        c["email"] = json!("");
        assert!(matches!(
            v.validate_token(&sign(&c, Some("k1"), PRIMARY_PEM)).await,
            Err(JwtError::MissingEmail)
        ));

        let mut c = claims();
        c.as_object_mut().unwrap().remove("sub");
        assert!(matches!(
            v.validate_token(&sign(&c, Some("k1"), PRIMARY_PEM)).await,
            Err(JwtError::MissingSubject)
        ));

        let mut c = claims();
        c["roles"] = json!("Unrelated_Role");
        assert!(matches!(
            v.validate_token(&sign(&c, Some("k1"), PRIMARY_PEM)).await,
            Err(JwtError::NoRecognisedRole)
        ));
    }

    #[tokio::test]
    async fn test_header_and_signature_checks() {
        let v = validator(config());

        assert!(matches!(
            v.validate_token(&sign(&claims(), None, PRIMARY_PEM)).await,
            Err(JwtError::MissingKeyId)
        ));

        // kid points at the primary key but the rotated key signed it
        assert!(matches!(
            v.validate_token(&sign(&claims(), Some("k1"), ROTATED_PEM)).await,
            Err(JwtError::InvalidSignature)
        ));

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("k1".into());
        let hs = encode(&header, &claims(), &EncodingKey::from_secret(b"shared")).unwrap();
        assert!(matches!(
            v.validate_token(&hs).await,
            Err(JwtError::UnsupportedAlgorithm(Algorithm::HS256))
        ));

        assert!(matches!(
            v.validate_token("not-a-token").await,
            Err(JwtError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_kid_with_unreachable_provider() {
        let v = validator(config());
        let err = v
            .validate_token(&sign(&claims(), Some("unknown"), PRIMARY_PEM))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_looks_like_jwt() {
        assert!(looks_like_jwt("a.b.c"));
        assert!(!looks_like_jwt("a.b"));
        assert!(!looks_like_jwt("a..c"));
        assert!(!looks_like_jwt("a.b.c.d"));
        assert!(!looks_like_jwt("dGhpcyBpcyBvcGFxdWU"));
    }
}
