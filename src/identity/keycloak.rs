use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{IdentityProvider, IdentityProviderError, DEFAULT_ROLE};

// ============================================================================
// Keycloak admin REST adapter
// ============================================================================
//
// Authenticates with client credentials against the realm token endpoint
// and caches the admin token until shortly before it expires. Every call
// goes through one `reqwest::Client` carrying the configured timeout.
//
// ============================================================================

/// Refresh the admin token this long before Keycloak says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    pub base_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct KeycloakIdentityProvider {
    config: KeycloakConfig,
    client: Client,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewUser<'a> {
    username: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    enabled: bool,
    credentials: Vec<Credential<'a>>,
}

#[derive(Debug, Serialize)]
struct Credential<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
    temporary: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NameChange<'a> {
    first_name: &'a str,
    last_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExistingUser {
    id: String,
}

impl KeycloakIdentityProvider {
    pub fn new(config: KeycloakConfig) -> Result<Self, IdentityProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            client,
            token: Mutex::new(None),
        })
    }

    fn admin_url(&self, path: &str) -> String {
        format!(
            "{}/admin/realms/{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.realm,
            path
        )
    }

    fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.config.base_url.trim_end_matches('/'),
            self.config.realm
        )
    }

    async fn access_token(&self) -> Result<String, IdentityProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        tracing::debug!(realm = %self.config.realm, "Requesting Keycloak admin token");

        let response = self
            .client
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityProviderError::Authentication(format!("{}: {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    async fn find_user_id(&self, email: &str) -> Result<Option<String>, IdentityProviderError> {
        tracing::debug!(email = %email, "Looking up Keycloak user by email");

        let token = self.access_token().await?;
        let response = self
            .client
            .get(self.admin_url("/users"))
            .bearer_auth(token)
            .query(&[("email", email), ("exact", "true")])
            .send()
            .await?;

        let response = expect_success(response, "search user").await?;
        let existing: Vec<ExistingUser> = response.json().await?;
        Ok(existing.into_iter().next().map(|user| user.id))
    }
}

/// Turns a non-2xx answer into `IdentityProviderError::Status`.
async fn expect_success(
    response: Response,
    operation: &'static str,
) -> Result<Response, IdentityProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(IdentityProviderError::Status {
        operation,
        status,
        body,
    })
}

/// Keycloak answers a create with `Location: .../users/{id}`.
fn created_id(response: &Response) -> Option<String> {
    let location = response.headers().get(reqwest::header::LOCATION)?.to_str().ok()?;
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl IdentityProvider for KeycloakIdentityProvider {
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        last_name: &str,
        password: &str,
    ) -> Result<String, IdentityProviderError> {
        tracing::info!(email = %email, "Creating Keycloak user");

        // A user left behind by an earlier attempt is adopted, so a redelivery
        // after a failed role grant or link still settles.
        if let Some(user_id) = self.find_user_id(email).await? {
            tracing::warn!(email = %email, external_id = %user_id, "Adopting existing Keycloak user");
            self.assign_role(&user_id, DEFAULT_ROLE).await?;
            return Ok(user_id);
        }

        let user = NewUser {
            username: email,
            email,
            first_name: name,
            last_name,
            enabled: true,
            credentials: vec![Credential {
                kind: "password",
                value: password,
                temporary: false,
            }],
        };

        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.admin_url("/users"))
            .bearer_auth(token)
            .json(&user)
            .send()
            .await?;

        let user_id = if response.status() == StatusCode::CONFLICT {
            // Lost a race with another writer; the search must see it now
            let user_id = self
                .find_user_id(email)
                .await?
                .ok_or_else(|| IdentityProviderError::Conflict(email.to_string()))?;
            tracing::warn!(email = %email, external_id = %user_id, "Keycloak user created concurrently, adopting it");
            user_id
        } else {
            let response = expect_success(response, "create user").await?;
            let user_id = created_id(&response).ok_or(IdentityProviderError::MissingUserId)?;
            tracing::info!(email = %email, external_id = %user_id, "✅ Keycloak user created");
            user_id
        };

        self.assign_role(&user_id, DEFAULT_ROLE).await?;
        Ok(user_id)
    }

    async fn edit_user(
        &self,
        external_id: &str,
        name: &str,
        last_name: &str,
    ) -> Result<(), IdentityProviderError> {
        tracing::info!(external_id = %external_id, "Editing Keycloak user");

        let token = self.access_token().await?;
        let response = self
            .client
            .put(self.admin_url(&format!("/users/{}", external_id)))
            .bearer_auth(token)
            .json(&NameChange {
                first_name: name,
                last_name,
            })
            .send()
            .await?;

        expect_success(response, "edit user").await?;
        tracing::info!(external_id = %external_id, "Keycloak user updated");
        Ok(())
    }

    async fn delete_user(&self, external_id: &str) -> Result<(), IdentityProviderError> {
        tracing::info!(external_id = %external_id, "Deleting Keycloak user");

        let token = self.access_token().await?;
        let response = self
            .client
            .delete(self.admin_url(&format!("/users/{}", external_id)))
            .bearer_auth(token)
            .send()
            .await?;

        // Already gone counts as deleted so redeliveries settle
        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!(external_id = %external_id, "Keycloak user already absent");
            return Ok(());
        }

        expect_success(response, "delete user").await?;
        tracing::info!(external_id = %external_id, "Keycloak user deleted");
        Ok(())
    }

    async fn assign_role(&self, external_id: &str, role: &str) -> Result<(), IdentityProviderError> {
        tracing::info!(external_id = %external_id, role = %role, "Assigning realm role");

        let token = self.access_token().await?;
        let response = self
            .client
            .get(self.admin_url(&format!("/roles/{}", role)))
            .bearer_auth(&token)
            .send()
            .await?;
        let representation: serde_json::Value =
            expect_success(response, "load role").await?.json().await?;

        let response = self
            .client
            .post(self.admin_url(&format!("/users/{}/role-mappings/realm", external_id)))
            .bearer_auth(&token)
            .json(&[representation])
            .send()
            .await?;

        expect_success(response, "assign role").await?;
        Ok(())
    }
}
