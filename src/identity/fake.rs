use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{IdentityProvider, IdentityProviderError};

/// Records every call; optionally fails the first `failures` calls.
#[derive(Default)]
pub struct RecordingIdentityProvider {
    calls: Mutex<Vec<String>>,
    failures: AtomicUsize,
}

impl RecordingIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), IdentityProviderError> {
        self.calls.lock().unwrap().push(call);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(IdentityProviderError::Status {
                operation: "fake",
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for RecordingIdentityProvider {
    async fn create_user(
        &self,
        email: &str,
        _name: &str,
        _last_name: &str,
        _password: &str,
    ) -> Result<String, IdentityProviderError> {
        self.record(format!("create:{}", email))?;
        Ok(format!("kc-{}", email))
    }

    async fn edit_user(
        &self,
        external_id: &str,
        name: &str,
        last_name: &str,
    ) -> Result<(), IdentityProviderError> {
        self.record(format!("edit:{}:{} {}", external_id, name, last_name))
    }

    async fn delete_user(&self, external_id: &str) -> Result<(), IdentityProviderError> {
        self.record(format!("delete:{}", external_id))
    }

    async fn assign_role(&self, external_id: &str, role: &str) -> Result<(), IdentityProviderError> {
        self.record(format!("role:{}:{}", external_id, role))
    }
}
