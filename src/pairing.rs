//! # Pairing Key Codec
//!
//! This module encodes, decodes, and validates the shareable pairing key
//! that lets a remote clonr instance begin a handshake with this one.
//!
//! A pairing key is issued once per `init`/`rotate` and is immutable after
//! that. It travels in one of two interchangeable forms:
//! - a compact single-line token, safe to copy-paste or send over chat
//! - structured JSON for file export
//!
//! Both forms decode to the identical key. Keys carry a hard expiry
//! (hours, not months) to bound the blast radius of an intercepted token.

use crate::config::Store;
use crate::crypto;
use crate::error::{Result, StandaloneError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Capability required for the standalone sync handshake.
pub const CAPABILITY_SYNC: &str = "standalone-sync";

/// Token format marker, bumped on breaking changes to the encoding.
const TOKEN_PREFIX: &str = "clonr1.";

/// Store key for the singleton server-side pairing configuration.
const PAIRING_CONFIG_KEY: &str = "server_pairing";

/// A shareable pairing key.
///
/// Carries everything a remote instance needs to reach this one and start
/// the handshake: address, short-lived API credentials, and the
/// capability set the credentials are good for. The `key_hint` is a
/// one-way derivation for human disambiguation, never the credential
/// itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingKey {
    pub instance_id: Uuid,
    pub host: String,
    pub port: u16,
    pub api_credential: String,
    pub refresh_credential: String,
    pub key_hint: String,
    pub capabilities: BTreeSet<String>,
    pub expires_at: DateTime<Utc>,
}

/// Persisted server-side record of the currently issued pairing key.
///
/// Created by `init`, superseded by `rotate`, deleted by `disable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPairingConfig {
    pub enabled: bool,
    pub instance_id: Uuid,
    pub port: u16,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub capabilities: BTreeSet<String>,
    pub is_server: bool,
}

impl PairingKey {
    /// Generate a fresh pairing key and its matching server config.
    pub fn generate(host: &str, port: u16, lifetime: Duration) -> (Self, ServerPairingConfig) {
        let now = Utc::now();
        let instance_id = Uuid::new_v4();
        let api_credential = random_credential();
        let refresh_credential = random_credential();
        let key_hint = crypto::key_hint(&api_credential);

        let mut capabilities = BTreeSet::new();
        capabilities.insert(CAPABILITY_SYNC.to_string());

        let key = Self {
            instance_id,
            host: host.to_string(),
            port,
            api_credential,
            refresh_credential,
            key_hint,
            capabilities: capabilities.clone(),
            expires_at: now + lifetime,
        };

        let config = ServerPairingConfig {
            enabled: true,
            instance_id,
            port,
            created_at: now,
            expires_at: key.expires_at,
            capabilities,
            is_server: true,
        };

        (key, config)
    }

    /// Encode as the compact single-line token.
    pub fn encode(&self) -> String {
        // Serializing a fully-owned struct cannot fail
        let json = serde_json::to_vec(self).expect("pairing key serialization");
        format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode a compact token back into a key.
    pub fn decode(token: &str) -> Result<Self> {
        let token = token.trim();
        let payload = token
            .strip_prefix(TOKEN_PREFIX)
            .ok_or_else(|| StandaloneError::Decode("unrecognized token format".to_string()))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| StandaloneError::Decode("invalid token encoding".to_string()))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| StandaloneError::Decode(format!("corrupt token payload: {}", e)))
    }

    /// Structured form for `--output FILE` export.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("pairing key serialization")
    }

    /// Parse the structured file form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| StandaloneError::Decode(format!("invalid pairing key file: {}", e)))
    }

    /// Check that the key is usable right now.
    ///
    /// Expiry is a hard failure, not a warning; the handshake must not
    /// proceed past this check.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if now >= self.expires_at {
            return Err(StandaloneError::Expired {
                expired_at: self.expires_at,
            });
        }
        if !self.capabilities.contains(CAPABILITY_SYNC) {
            return Err(StandaloneError::CapabilityMismatch(CAPABILITY_SYNC.to_string()));
        }
        Ok(())
    }
}

impl ServerPairingConfig {
    pub fn load(store: &Store) -> Result<Option<Self>> {
        store.get(PAIRING_CONFIG_KEY)
    }

    pub fn save(&self, store: &Store) -> Result<()> {
        store.put(PAIRING_CONFIG_KEY, self)
    }

    pub fn delete(store: &Store) -> Result<bool> {
        store.delete(PAIRING_CONFIG_KEY)
    }

    /// Time remaining before the issued key expires.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

fn random_credential() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
