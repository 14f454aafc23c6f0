use argon2::{
    Algorithm, Argon2, Params, ParamsBuilder, Version,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
};
use password_hash::Error as PasswordHashError;
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::identity::{Credential, Identity};

/// Login failure as seen by callers.
///
/// Unknown usernames and wrong secrets both surface as
/// [`AuthFailure::InvalidCredentials`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("unsupported algorithm `{0}`")]
    UnsupportedAlgorithm(String),
    #[error("invalid Argon2 parameters: {0}")]
    InvalidParams(String),
    #[error("password hashing error: {0}")]
    Hashing(String),
}

impl From<PasswordHashError> for DigestError {
    fn from(err: PasswordHashError) -> Self {
        DigestError::Hashing(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("users[{index}].username: must not be empty")]
    EmptyUsername { index: usize },
    #[error("users[{index}].username: duplicate user `{username}`")]
    DuplicateUser { index: usize, username: String },
    #[error("users[{index}].digest: {source}")]
    Digest {
        index: usize,
        #[source]
        source: DigestError,
    },
}

/// A configured account for the basic strategy.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendUser {
    pub username: String,
    /// Argon2 PHC string (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`)
    pub digest: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl fmt::Debug for BackendUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendUser")
            .field("username", &self.username)
            .field("digest", &"<redacted>")
            .field("groups", &self.groups)
            .finish()
    }
}

/// Supported credential verification strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStrategy {
    Basic,
}

impl BackendStrategy {
    pub const ALL: &'static [BackendStrategy] = &[BackendStrategy::Basic];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendStrategy::Basic => "basic",
        }
    }
}

impl FromStr for BackendStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        BackendStrategy::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.as_str() == value)
            .ok_or_else(|| {
                let known: Vec<&str> =
                    BackendStrategy::ALL.iter().map(BackendStrategy::as_str).collect();
                format!("unknown strategy `{value}` (expected one of: {})", known.join(", "))
            })
    }
}

impl fmt::Display for BackendStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential backend, polymorphic over the configured strategy.
#[derive(Debug, Clone)]
pub enum CredentialBackend {
    Basic(BasicBackend),
}

impl CredentialBackend {
    pub fn strategy(&self) -> BackendStrategy {
        match self {
            CredentialBackend::Basic(_) => BackendStrategy::Basic,
        }
    }

    pub async fn verify(
        &self,
        credential: &Credential,
    ) -> Result<Identity, AuthFailure> {
        match self {
            CredentialBackend::Basic(backend) => backend.verify(credential).await,
        }
    }
}

/// Username/digest table loaded once at startup.
#[derive(Clone)]
pub struct BasicBackend {
    users: Arc<HashMap<String, BackendUser>>,
    /// Verified against when the username is unknown so that lookups of
    /// missing accounts cost the same as a wrong secret.
    decoy_digest: Option<Arc<str>>,
}

impl fmt::Debug for BasicBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicBackend")
            .field("users", &self.users.len())
            .finish_non_exhaustive()
    }
}

impl BasicBackend {
    pub fn new(
        users: impl IntoIterator<Item = BackendUser>,
    ) -> Result<Self, BackendError> {
        let mut table = HashMap::new();
        let mut decoy_digest = None;

        for (index, user) in users.into_iter().enumerate() {
            if user.username.trim().is_empty() {
                return Err(BackendError::EmptyUsername { index });
            }
            validate_digest(&user.digest)
                .map_err(|source| BackendError::Digest { index, source })?;
            if table.contains_key(&user.username) {
                return Err(BackendError::DuplicateUser {
                    index,
                    username: user.username,
                });
            }
            if decoy_digest.is_none() {
                decoy_digest = Some(Arc::from(user.digest.as_str()));
            }
            table.insert(user.username.clone(), user);
        }

        Ok(Self {
            users: Arc::new(table),
            decoy_digest,
        })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub async fn verify(
        &self,
        credential: &Credential,
    ) -> Result<Identity, AuthFailure> {
        if credential.username.is_empty() || credential.secret.is_empty() {
            debug!("rejecting credential with empty username or secret");
            return Err(AuthFailure::InvalidCredentials);
        }

        let user = self.users.get(&credential.username);
        let digest: Arc<str> = match (user, &self.decoy_digest) {
            (Some(user), _) => Arc::from(user.digest.as_str()),
            (None, Some(decoy)) => decoy.clone(),
            (None, None) => {
                debug!(username = %credential.username, "unknown user");
                return Err(AuthFailure::InvalidCredentials);
            }
        };

        let secret = credential.secret.clone();
        let matched = tokio::task::spawn_blocking(move || {
            verify_digest(secret.as_bytes(), &digest)
        })
        .await
        .map_err(|err| {
            AuthFailure::Backend(format!("digest verification task failed: {err}"))
        })?;

        match user {
            Some(user) if matched => Ok(Identity {
                subject: user.username.clone(),
                groups: user.groups.clone(),
            }),
            Some(_) => {
                debug!(username = %credential.username, "secret mismatch");
                Err(AuthFailure::InvalidCredentials)
            }
            None => {
                debug!(username = %credential.username, "unknown user");
                Err(AuthFailure::InvalidCredentials)
            }
        }
    }
}

/// Check that `digest` is a well-formed Argon2 PHC string.
pub fn validate_digest(digest: &str) -> Result<(), DigestError> {
    let parsed = PasswordHash::new(digest)
        .map_err(|err| DigestError::InvalidFormat(err.to_string()))?;
    let ident = parsed.algorithm.as_str();
    if !matches!(ident, "argon2id" | "argon2i" | "argon2d") {
        return Err(DigestError::UnsupportedAlgorithm(ident.to_string()));
    }
    if parsed.salt.is_none() || parsed.hash.is_none() {
        return Err(DigestError::InvalidFormat(
            "missing salt or hash".to_string(),
        ));
    }
    Params::try_from(&parsed)
        .map_err(|err| DigestError::InvalidParams(err.to_string()))?;
    Ok(())
}

fn verify_digest(secret: &[u8], digest: &str) -> bool {
    let parsed = match PasswordHash::new(digest) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "stored digest failed to parse");
            return false;
        }
    };
    // Parameters, salt and algorithm come from the PHC string; the output
    // comparison inside the verifier is constant time.
    Argon2::default().verify_password(secret, &parsed).is_ok()
}

/// Recommended defaults target ~64 MiB memory and 3 iterations.
const DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
const DEFAULT_ITERATIONS: u32 = 3;
const DEFAULT_PARALLELISM: u32 = 4;
const SALT_LENGTH: usize = password_hash::Salt::RECOMMENDED_LENGTH;

pub fn default_params() -> Result<Params, DigestError> {
    ParamsBuilder::new()
        .m_cost(DEFAULT_MEMORY_KIB)
        .t_cost(DEFAULT_ITERATIONS)
        .p_cost(DEFAULT_PARALLELISM)
        .output_len(32)
        .build()
        .map_err(|err| DigestError::InvalidParams(err.to_string()))
}

/// Produce an Argon2id digest suitable for a `BackendUser`.
pub fn hash_secret(secret: &str) -> Result<String, DigestError> {
    hash_secret_with_params(secret, default_params()?)
}

/// Same as [`hash_secret`] with caller-specified parameters (tests and
/// constrained environments).
pub fn hash_secret_with_params(
    secret: &str,
    params: Params,
) -> Result<String, DigestError> {
    let mut salt_bytes = [0u8; SALT_LENGTH];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|err| DigestError::Hashing(err.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    Ok(argon2.hash_password(secret.as_bytes(), &salt)?.to_string())
}

#[cfg(test)]
pub(crate) fn cheap_params() -> Params {
    Params::new(8, 1, 1, None).unwrap()
}
