use std::collections::HashMap;
use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

// ============================================================================
// Bearer-token authentication
// ============================================================================
//
// Tokens are issued by the identity provider's realm. The subject is the
// external identity reference stored on the customer; realm roles come from
// the `realm_access.roles` claim.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn from_claim(value: &str) -> Option<Self> {
        match value.trim_start_matches("ROLE_").to_ascii_uppercase().as_str() {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Caller lacks a permitted role")]
    Forbidden,

    #[error("Token verification is not configured")]
    Unconfigured,

    #[error("Failed to load verification keys: {0}")]
    KeyFetch(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default)]
    pub realm_access: RealmAccess,
}

/// Who is calling: token subject plus the realm roles we recognise.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub subject: String,
    pub roles: Vec<Role>,
}

impl AuthContext {
    pub fn from_claims(claims: Claims) -> Self {
        let roles = claims
            .realm_access
            .roles
            .iter()
            .filter_map(|r| Role::from_claim(r))
            .collect();
        Self {
            subject: claims.sub,
            roles,
        }
    }

    pub fn has_any(&self, permitted: &[Role]) -> bool {
        self.roles.iter().any(|r| permitted.contains(r))
    }
}

pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthContext, AuthError>;
}

// ============================================================================
// JWT verifier
// ============================================================================

enum KeySource {
    /// HS256 shared secret, for local runs and tests.
    Shared(DecodingKey),
    /// RS256 realm keys indexed by `kid`.
    Jwks(HashMap<String, DecodingKey>),
}

pub struct JwtVerifier {
    keys: KeySource,
    issuer: Option<String>,
}

impl JwtVerifier {
    pub fn from_secret(secret: &[u8], issuer: Option<String>) -> Self {
        Self {
            keys: KeySource::Shared(DecodingKey::from_secret(secret)),
            issuer,
        }
    }

    pub fn from_jwks(jwks: &JwkSet, issuer: Option<String>) -> Result<Self, AuthError> {
        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => tracing::warn!(kid = %kid, error = %e, "Skipping unusable realm key"),
            }
        }

        if keys.is_empty() {
            return Err(AuthError::KeyFetch("realm published no usable keys".to_string()));
        }

        Ok(Self {
            keys: KeySource::Jwks(keys),
            issuer,
        })
    }

    /// Loads the realm keys from `{issuer}/protocol/openid-connect/certs`.
    pub async fn discover(client: &reqwest::Client, issuer: &str) -> Result<Self, AuthError> {
        let url = format!("{}/protocol/openid-connect/certs", issuer.trim_end_matches('/'));
        tracing::info!(url = %url, "Fetching realm verification keys");

        let jwks: JwkSet = client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        Self::from_jwks(&jwks, Some(issuer.to_string()))
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<AuthContext, AuthError> {
        let header =
            decode_header(token).map_err(|e| AuthError::InvalidToken(format!("header: {}", e)))?;

        let (key, algorithm) = match &self.keys {
            KeySource::Shared(key) => (key, Algorithm::HS256),
            KeySource::Jwks(keys) => {
                let kid = header
                    .kid
                    .as_deref()
                    .ok_or_else(|| AuthError::InvalidToken("missing kid".to_string()))?;
                let key = keys
                    .get(kid)
                    .ok_or_else(|| AuthError::InvalidToken(format!("unknown kid '{}'", kid)))?;
                (key, Algorithm::RS256)
            }
        };

        if header.alg != algorithm {
            return Err(AuthError::InvalidToken(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(algorithm);
        // Keycloak access tokens target the `account` audience, not this service
        validation.validate_aud = false;
        if let Some(issuer) = &self.issuer {
            // `set_issuer` alone accepts tokens that omit `iss`
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        }

        let data = decode::<Claims>(token, key, &validation).map_err(|e| {
            tracing::warn!(error = %e, "Bearer token rejected");
            AuthError::InvalidToken(e.to_string())
        })?;

        Ok(AuthContext::from_claims(data.claims))
    }
}

// ============================================================================
// actix-web extractor
// ============================================================================

/// Roles allowed on every authenticated endpoint.
pub const CUSTOMER_ROLES: [Role; 2] = [Role::User, Role::Admin];

pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingToken)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

fn authenticate(req: &HttpRequest) -> Result<AuthContext, AuthError> {
    let verifier = req
        .app_data::<web::Data<dyn TokenVerifier>>()
        .ok_or(AuthError::Unconfigured)?;

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let context = verifier.verify(bearer_token(header)?)?;
    if !context.has_any(&CUSTOMER_ROLES) {
        tracing::warn!(subject = %context.subject, "Authenticated caller without USER/ADMIN role");
        return Err(AuthError::Forbidden);
    }
    Ok(context)
}

impl FromRequest for AuthContext {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}
