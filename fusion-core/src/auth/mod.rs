//! Credential verification.
//!
//! [`Authenticator`] is what the login endpoint and the request gate talk to:
//! it wraps the configured [`CredentialBackend`] with a time bound and owns
//! the API-key [`ClientRegistry`].

pub mod backend;
pub mod clients;

pub use backend::{
    AuthFailure, BackendError, BackendStrategy, BackendUser, BasicBackend,
    CredentialBackend, DigestError, hash_secret, hash_secret_with_params,
    validate_digest,
};
pub use clients::{
    ClientKey, ClientKeyError, ClientRegistry, digest_api_key,
    generate_api_key,
};

use std::time::Duration;
use tracing::{info, warn};

use crate::identity::{Credential, Identity};

#[derive(Debug, Clone)]
pub struct Authenticator {
    backend: CredentialBackend,
    clients: ClientRegistry,
    verify_timeout: Duration,
}

impl Authenticator {
    pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(backend: CredentialBackend) -> Self {
        Self {
            backend,
            clients: ClientRegistry::default(),
            verify_timeout: Self::DEFAULT_VERIFY_TIMEOUT,
        }
    }

    pub fn with_clients(mut self, clients: ClientRegistry) -> Self {
        self.clients = clients;
        self
    }

    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &CredentialBackend {
        &self.backend
    }

    /// Verify a login credential, bounded by the configured timeout.
    ///
    /// A timeout is a backend failure, never a silent retry.
    pub async fn login(
        &self,
        credential: &Credential,
    ) -> Result<Identity, AuthFailure> {
        let outcome =
            tokio::time::timeout(self.verify_timeout, self.backend.verify(credential))
                .await;

        match outcome {
            Ok(Ok(identity)) => {
                info!(subject = %identity.subject, strategy = %self.backend.strategy(), "credential verified");
                Ok(identity)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                warn!(
                    timeout_ms = self.verify_timeout.as_millis() as u64,
                    "credential verification timed out"
                );
                Err(AuthFailure::Backend(
                    "credential verification timed out".to_string(),
                ))
            }
        }
    }

    /// Resolve an `X-Api-Key` value to a client identity.
    pub fn client(&self, api_key: &str) -> Option<Identity> {
        self.clients.resolve(api_key)
    }
}
