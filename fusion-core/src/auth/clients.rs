use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use constant_time_eq::constant_time_eq;
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::identity::Identity;

const KEY_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ClientKeyError {
    #[error("clients[{index}].name: must not be empty")]
    EmptyName { index: usize },
    #[error("clients[{index}].key_digest: expected 64 hex characters")]
    InvalidDigest { index: usize },
    #[error("clients[{index}].name: duplicate client `{name}`")]
    DuplicateName { index: usize, name: String },
    #[error("key generation failed: {0}")]
    Generation(String),
}

/// A non-interactive client authenticating with a static API key.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientKey {
    pub name: String,
    /// Lowercase hex SHA-256 of the API key
    pub key_digest: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientKey")
            .field("name", &self.name)
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}

struct RegisteredClient {
    identity: Identity,
    digest: [u8; 32],
}

/// Immutable table of API-key clients.
#[derive(Clone)]
pub struct ClientRegistry {
    clients: Arc<[RegisteredClient]>,
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.clients.len())
            .finish()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self {
            clients: Arc::from(Vec::new()),
        }
    }
}

impl ClientRegistry {
    pub fn new(
        clients: impl IntoIterator<Item = ClientKey>,
    ) -> Result<Self, ClientKeyError> {
        let mut registered: Vec<RegisteredClient> = Vec::new();
        for (index, client) in clients.into_iter().enumerate() {
            if client.name.trim().is_empty() {
                return Err(ClientKeyError::EmptyName { index });
            }
            if registered.iter().any(|c| c.identity.subject == client.name) {
                return Err(ClientKeyError::DuplicateName {
                    index,
                    name: client.name,
                });
            }
            let digest = parse_key_digest(&client.key_digest)
                .ok_or(ClientKeyError::InvalidDigest { index })?;
            registered.push(RegisteredClient {
                identity: Identity {
                    subject: client.name,
                    groups: client.groups,
                },
                digest,
            });
        }
        Ok(Self {
            clients: registered.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Resolve a presented API key to its client identity.
    ///
    /// Every registered digest is compared so the scan does not stop early on
    /// a match.
    pub fn resolve(&self, api_key: &str) -> Option<Identity> {
        if api_key.is_empty() {
            return None;
        }
        let presented = Sha256::digest(api_key.as_bytes());
        let mut found = None;
        for client in self.clients.iter() {
            if constant_time_eq(presented.as_slice(), &client.digest) && found.is_none() {
                found = Some(client.identity.clone());
            }
        }
        found
    }
}

/// Digest form of an API key as it appears in configuration.
pub fn digest_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// Generate a fresh random API key (URL-safe base64, 256 bits).
pub fn generate_api_key() -> Result<String, ClientKeyError> {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| ClientKeyError::Generation(err.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub fn parse_key_digest(value: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(value.trim().to_ascii_lowercase()).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ClientRegistry {
        ClientRegistry::new([
            ClientKey {
                name: "collector".to_string(),
                key_digest: digest_api_key("collector-key"),
                groups: ["TEST".to_string()].into(),
            },
            ClientKey {
                name: "reporter".to_string(),
                key_digest: digest_api_key("reporter-key"),
                groups: BTreeSet::new(),
            },
        ])
        .unwrap()
    }

    #[test]
    fn resolves_matching_key() {
        let identity = registry().resolve("collector-key").unwrap();
        assert_eq!(identity.subject, "collector");
        assert!(identity.in_group("TEST"));
        assert_eq!(registry().resolve("reporter-key").unwrap().subject, "reporter");
    }

    #[test]
    fn unknown_or_empty_key_resolves_to_none() {
        assert!(registry().resolve("nope").is_none());
        assert!(registry().resolve("").is_none());
    }

    #[test]
    fn rejects_invalid_configuration() {
        let err = ClientRegistry::new([ClientKey {
            name: "bad".to_string(),
            key_digest: "abcd".to_string(),
            groups: BTreeSet::new(),
        }])
        .unwrap_err();
        assert!(matches!(err, ClientKeyError::InvalidDigest { index: 0 }));
    }

    #[test]
    fn generated_keys_are_unique() {
        let a = generate_api_key().unwrap();
        let b = generate_api_key().unwrap();
        assert_ne!(a, b);
        assert_eq!(digest_api_key(&a).len(), 64);
    }
}
