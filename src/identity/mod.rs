use async_trait::async_trait;

// ============================================================================
// Identity Provider port
// ============================================================================
//
// Remote store of login identities. The reconciliation consumer is the only
// caller: customer mutations commit first, then the provider catches up.
//
// ============================================================================

mod keycloak;

#[cfg(test)]
pub(crate) mod fake;

pub use keycloak::{KeycloakConfig, KeycloakIdentityProvider};

/// Realm role granted to every self-registered customer.
pub const DEFAULT_ROLE: &str = "USER";

#[derive(Debug, thiserror::Error)]
pub enum IdentityProviderError {
    #[error("User already exists in identity provider: {0}")]
    Conflict(String),

    #[error("Identity provider rejected {operation} with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Identity provider did not return the created user id")]
    MissingUserId,

    #[error("Identity provider authentication failed: {0}")]
    Authentication(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provision a login and return its external id.
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        last_name: &str,
        password: &str,
    ) -> Result<String, IdentityProviderError>;

    async fn edit_user(
        &self,
        external_id: &str,
        name: &str,
        last_name: &str,
    ) -> Result<(), IdentityProviderError>;

    async fn delete_user(&self, external_id: &str) -> Result<(), IdentityProviderError>;

    async fn assign_role(&self, external_id: &str, role: &str) -> Result<(), IdentityProviderError>;
}
