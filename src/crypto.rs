//! # Cryptographic Primitives
//!
//! This module provides the cryptographic building blocks shared by the
//! pairing, sync, and archive subsystems:
//! - Argon2id password-based key derivation
//! - AES-256-GCM authenticated encryption
//! - HKDF-SHA256 secret-to-key expansion for per-client keys
//! - Pairing secrets and one-way key hints
//!
//! All cryptographic operations use industry-standard algorithms:
//! - Argon2id for memory-hard password hashing (RFC 9106)
//! - AES-256-GCM for authenticated encryption
//! - OS-provided random number generation

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

/// Number of characters in the human-transcribed pairing secret.
pub const PAIRING_SECRET_LEN: usize = 16;

/// Number of characters in a key hint.
pub const KEY_HINT_LEN: usize = 8;

/// Errors from cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KdfFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("authentication failed - data is corrupt or the key is wrong")]
    AuthenticationFailed,
}

pub type Result<T> = std::result::Result<T, CryptoError>;

/// Parameters for Argon2id key derivation.
///
/// The salt is generated fresh for every derivation context and persisted
/// alongside whatever the derived key protects, so the same key can be
/// re-derived later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Salt for key derivation (16 bytes)
    pub salt: [u8; 16],
    /// Memory cost in KiB
    pub mem_cost: u32,
    /// Time cost (number of iterations)
    pub time_cost: u32,
    /// Parallelism (number of lanes)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt: generate_salt(),
            mem_cost: 19_456, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify that parameters are within acceptable ranges.
    pub fn validate(&self) -> Result<()> {
        if self.mem_cost < 8_192 {
            return Err(CryptoError::KdfFailed(
                "memory cost too low (minimum: 8 MiB)".to_string(),
            ));
        }
        if self.time_cost < 1 {
            return Err(CryptoError::KdfFailed(
                "time cost too low (minimum: 1)".to_string(),
            ));
        }
        if self.parallelism < 1 {
            return Err(CryptoError::KdfFailed(
                "parallelism too low (minimum: 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// A 256-bit symmetric key.
///
/// Key material is zeroized on drop. Keys are derived, never persisted;
/// what lands on disk is always the salt and parameters needed to
/// re-derive them.
#[derive(Clone)]
pub struct SymmetricKey {
    key: [u8; 32],
}

impl SymmetricKey {
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey").field("key", &"<redacted>").finish()
    }
}

/// Ciphertext plus the nonce it was sealed with.
///
/// The 16-byte GCM authentication tag is appended to the ciphertext, so
/// decryption fails loudly on tampering or a wrong key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encrypted {
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

/// Generate a random 16-byte salt.
pub fn generate_salt() -> [u8; 16] {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a symmetric key from a password using Argon2id.
///
/// This is the slow, memory-hard derivation used for archive passwords,
/// the client-side local password, and the at-rest server encryption key.
///
/// # Errors
///
/// Returns an error if the parameters fail validation or the Argon2
/// computation is rejected.
pub fn derive_password_key(password: &[u8], params: &KdfParams) -> Result<SymmetricKey> {
    params.validate()?;

    let argon_params = Params::new(params.mem_cost, params.time_cost, params.parallelism, Some(32))
        .map_err(|e| CryptoError::KdfFailed(format!("invalid parameters: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password, &params.salt, &mut key)
        .map_err(|e| CryptoError::KdfFailed(format!("hashing failed: {}", e)))?;

    Ok(SymmetricKey::from_bytes(key))
}

/// Expand a pairing secret into a per-client encryption key via HKDF-SHA256.
///
/// Both sides of a pairing hold the transcribed secret; with the same salt
/// they derive the same key. The info string domain-separates this use
/// from every other derivation in the codebase.
pub fn derive_client_key(secret: &str, salt: &[u8]) -> Result<SymmetricKey> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), secret.as_bytes());
    let mut key = [0u8; 32];
    hkdf.expand(b"clonr-sync-v1", &mut key)
        .map_err(|e| CryptoError::KdfFailed(format!("HKDF expand failed: {}", e)))?;
    Ok(SymmetricKey::from_bytes(key))
}

/// Encrypt data using AES-256-GCM with a fresh random nonce.
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Encrypted> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

    Ok(Encrypted {
        nonce: nonce.into(),
        ciphertext,
    })
}

/// Decrypt data using AES-256-GCM.
///
/// # Errors
///
/// Returns `CryptoError::AuthenticationFailed` if the authentication tag
/// does not verify - the data was tampered with or the key is wrong.
pub fn decrypt(key: &SymmetricKey, encrypted: &Encrypted) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from(encrypted.nonce);

    cipher
        .decrypt(&nonce, encrypted.ciphertext.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Generate a fresh pairing secret in its human-presentable form.
///
/// The secret is what the operator reads off the client's screen and
/// retypes on the server: 16 lowercase hex characters derived from 32
/// bytes of OS randomness. Fixed length, single alphabet, no characters
/// that are easy to mistype.
pub fn generate_pairing_secret() -> String {
    let mut entropy = [0u8; 32];
    OsRng.fill_bytes(&mut entropy);

    let digest = Sha256::digest(entropy);
    entropy.zeroize();
    hex::encode(&digest[..PAIRING_SECRET_LEN / 2])
}

/// Derive the non-reversible hint for a secret.
///
/// Hints are for human disambiguation only ("which key is this record
/// for?") and reveal nothing usable about the secret itself.
pub fn key_hint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"clonr-hint-v1");
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..KEY_HINT_LEN / 2])
}

/// Constant-time comparison of two key hints.
pub fn hints_match(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}
