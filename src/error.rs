//! # Error Taxonomy
//!
//! Domain errors for the standalone pairing and sync subsystem. Command
//! handlers convert these into operator-facing messages; the variants are
//! deliberately specific so every failure can tell the operator what to do
//! next.

use crate::crypto::CryptoError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by the pairing, registry, sync, and archive components.
#[derive(Error, Debug)]
pub enum StandaloneError {
    /// The pairing key token is malformed or corrupt.
    #[error("invalid pairing key: {0}")]
    Decode(String),

    /// The pairing key is past its expiry and must not be accepted.
    #[error("pairing key expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    /// The pairing key lacks a capability this operation requires.
    #[error("pairing key is missing required capability: {0}")]
    CapabilityMismatch(String),

    /// More than one pending client matched and no explicit selector was
    /// given. Selection must fail closed, never guess.
    #[error("{count} pending clients match; select one explicitly with --client")]
    AmbiguousSelection { count: usize },

    #[error("{0}")]
    NotFound(String),

    /// Authenticated decryption or a checksum failed.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Key derivation succeeded but the derived key does not open the
    /// payload. Reported distinctly from generic I/O failures.
    #[error("wrong password")]
    WrongPassword,

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("client {0} is already registered")]
    AlreadyRegistered(String),

    /// The registry is the single authority for sync eligibility; anything
    /// but an active status fails here.
    #[error("client {client_id} is not active (status: {status})")]
    ClientNotActive { client_id: String, status: String },

    #[error("standalone mode is not initialized: {0}")]
    NotInitialized(String),

    /// A handshake step was driven out of order.
    #[error("handshake step out of sequence: {0}")]
    OutOfSequence(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("persistence error: {0}")]
    Persistence(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StandaloneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_actionable() {
        let err = StandaloneError::NotFound("no pending client found with ID prefix: ab12".into());
        assert!(err.to_string().contains("ab12"));

        let err = StandaloneError::AmbiguousSelection { count: 3 };
        assert!(err.to_string().contains("--client"));

        let err = StandaloneError::ClientNotActive {
            client_id: "c1".into(),
            status: "revoked".into(),
        };
        assert!(err.to_string().contains("revoked"));
    }
}
