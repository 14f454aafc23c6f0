//! Authenticated encryption of session identities into opaque tokens.
//!
//! Token layout: `v1.` followed by URL-safe base64 (no padding) of
//! `nonce (12 bytes) || AES-256-GCM ciphertext || tag (16 bytes)`.
//! The plaintext is a small JSON document carrying the subject, groups,
//! issue time and expiry.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::identity::Identity;

const TOKEN_PREFIX: &str = "v1.";
const NONCE_LEN: usize = 12;
const ASSOCIATED_DATA: &[u8] = b"fusion-session-v1";
const KDF_SALT: &[u8] = b"fusion-seal-key-v1";
const KDF_MEMORY_KIB: u32 = 19 * 1024;
const KDF_ITERATIONS: u32 = 2;
const KDF_PARALLELISM: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SealError {
    /// Undecodable, tampered, wrongly keyed or expired token. Which of these
    /// applied is deliberately not reported.
    #[error("invalid session token")]
    Invalid,
    #[error("failed to seal session")]
    Sealing,
}

#[derive(Debug, Error)]
pub enum SealerKeyError {
    #[error("sealing key must not be empty")]
    EmptyKey,
    #[error("sealing key derivation failed: {0}")]
    Derivation(String),
}

/// Encoded, sealed session as carried by cookies and headers.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedToken(String);

impl SealedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for SealedToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for SealedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SealedToken(<redacted>)")
    }
}

#[derive(Serialize, Deserialize)]
struct SealedPayload {
    sub: String,
    #[serde(default)]
    groups: BTreeSet<String>,
    /// Milliseconds since the Unix epoch
    iat: i64,
    exp: i64,
}

/// Seals identities under one deployment-wide key.
pub struct SessionSealer {
    cipher: Aes256Gcm,
}

impl fmt::Debug for SessionSealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSealer").finish_non_exhaustive()
    }
}

impl SessionSealer {
    /// Derive the AES-256 key from configured key material with Argon2id.
    ///
    /// Derivation is deterministic so every instance of a deployment sharing
    /// the same material can open each other's tokens.
    pub fn new(key_material: impl AsRef<[u8]>) -> Result<Self, SealerKeyError> {
        let material = key_material.as_ref();
        if material.is_empty() {
            return Err(SealerKeyError::EmptyKey);
        }

        let params = Params::new(
            KDF_MEMORY_KIB,
            KDF_ITERATIONS,
            KDF_PARALLELISM,
            Some(32),
        )
        .map_err(|e| SealerKeyError::Derivation(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut output = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(material, KDF_SALT, &mut output[..])
            .map_err(|e| SealerKeyError::Derivation(e.to_string()))?;

        Ok(Self::from_key(&output))
    }

    /// Use an already-derived 256-bit key.
    pub fn from_key(key: &[u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn seal(
        &self,
        identity: &Identity,
        expires_at: DateTime<Utc>,
    ) -> Result<SealedToken, SealError> {
        let payload = SealedPayload {
            sub: identity.subject.clone(),
            groups: identity.groups.clone(),
            iat: Utc::now().timestamp_millis(),
            exp: expires_at.timestamp_millis(),
        };
        let plaintext = Zeroizing::new(
            serde_json::to_vec(&payload).map_err(|_| SealError::Sealing)?,
        );

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext.as_slice(),
                    aad: ASSOCIATED_DATA,
                },
            )
            .map_err(|_| SealError::Sealing)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(nonce.as_slice());
        blob.extend_from_slice(&ciphertext);

        Ok(SealedToken(format!(
            "{TOKEN_PREFIX}{}",
            URL_SAFE_NO_PAD.encode(blob)
        )))
    }

    pub fn unseal(&self, token: &str) -> Result<Identity, SealError> {
        self.unseal_at(token, Utc::now())
    }

    /// Unseal against an explicit clock.
    pub fn unseal_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, SealError> {
        let encoded = token
            .strip_prefix(TOKEN_PREFIX)
            .ok_or(SealError::Invalid)?;
        let blob = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| SealError::Invalid)?;
        if blob.len() <= NONCE_LEN {
            return Err(SealError::Invalid);
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        // The tag is checked before any plaintext is released.
        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(
                    Nonce::from_slice(nonce),
                    Payload {
                        msg: ciphertext,
                        aad: ASSOCIATED_DATA,
                    },
                )
                .map_err(|_| SealError::Invalid)?,
        );

        let payload: SealedPayload = serde_json::from_slice(&plaintext)
            .map_err(|_| SealError::Invalid)?;
        if payload.exp <= now.timestamp_millis() || payload.sub.is_empty() {
            return Err(SealError::Invalid);
        }

        Ok(Identity {
            subject: payload.sub,
            groups: payload.groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sealer() -> SessionSealer {
        SessionSealer::from_key(&[7u8; 32])
    }

    fn identity() -> Identity {
        Identity::new("test", ["TEST", "OPS"])
    }

    #[test]
    fn round_trips_before_expiry() {
        let sealer = sealer();
        let token = sealer
            .seal(&identity(), Utc::now() + Duration::hours(1))
            .unwrap();
        let opened = sealer.unseal(token.as_str()).unwrap();
        assert_eq!(opened, identity());
        assert_eq!(opened.groups, identity().groups);
    }

    #[test]
    fn rejects_after_expiry() {
        let sealer = sealer();
        let expires_at = Utc::now() + Duration::minutes(5);
        let token = sealer.seal(&identity(), expires_at).unwrap();

        assert!(sealer
            .unseal_at(token.as_str(), expires_at - Duration::seconds(1))
            .is_ok());
        assert_eq!(
            sealer.unseal_at(token.as_str(), expires_at),
            Err(SealError::Invalid)
        );
        assert_eq!(
            sealer.unseal_at(token.as_str(), expires_at + Duration::days(1)),
            Err(SealError::Invalid)
        );
    }

    #[test]
    fn any_single_bit_flip_is_rejected() {
        let sealer = sealer();
        let token = sealer
            .seal(&identity(), Utc::now() + Duration::hours(1))
            .unwrap()
            .into_string();
        let bytes = token.as_bytes();

        for index in 0..bytes.len() {
            for bit in 0..7 {
                let mut tampered = bytes.to_vec();
                tampered[index] ^= 1 << bit;
                let tampered = String::from_utf8(tampered).unwrap();
                assert_eq!(
                    sealer.unseal(&tampered),
                    Err(SealError::Invalid),
                    "flip of bit {bit} at byte {index} was accepted"
                );
            }
        }
    }

    #[test]
    fn rejects_foreign_key() {
        let token = sealer()
            .seal(&identity(), Utc::now() + Duration::hours(1))
            .unwrap();
        let other = SessionSealer::from_key(&[8u8; 32]);
        assert_eq!(other.unseal(token.as_str()), Err(SealError::Invalid));
    }

    #[test]
    fn rejects_garbage() {
        let sealer = sealer();
        for token in ["", "v1.", "v1.AAAA", "v2.abc", "not a token"] {
            assert_eq!(sealer.unseal(token), Err(SealError::Invalid));
        }
    }

    #[test]
    fn derived_keys_are_deterministic() {
        let a = SessionSealer::new("test").unwrap();
        let b = SessionSealer::new("test").unwrap();
        let token = a
            .seal(&identity(), Utc::now() + Duration::hours(1))
            .unwrap();
        assert_eq!(b.unseal(token.as_str()).unwrap(), identity());

        let c = SessionSealer::new("rotated").unwrap();
        assert_eq!(c.unseal(token.as_str()), Err(SealError::Invalid));
    }

    #[test]
    fn empty_key_material_is_rejected() {
        assert!(matches!(
            SessionSealer::new(""),
            Err(SealerKeyError::EmptyKey)
        ));
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = sealer()
            .seal(&identity(), Utc::now() + Duration::hours(1))
            .unwrap();
        assert!(!format!("{token:?}").contains(token.as_str()));
    }
}
