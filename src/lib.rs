//! # clonr
//!
//! Repository management CLI with a standalone secure-pairing and
//! encrypted-sync subsystem.
//!
//! Two independent clonr instances establish mutual trust without a
//! pre-shared channel: one issues a short-lived pairing key, the other
//! displays a fresh secret that an operator transcribes back to the
//! source. From there, sensitive synced data is encrypted per client, and
//! whole repositories can be packed into password-protected,
//! integrity-checked archives.
//!
//! ## Core Modules
//!
//! - [`pairing`] - pairing key codec: generate, encode, decode, validate
//! - [`crypto`] - Argon2id derivation, AES-256-GCM, HKDF, key hints
//! - [`handshake`] - the two-sided trust-on-first-use pairing protocol
//! - [`registry`] - registered/pending clients and access control
//! - [`payload`] - per-client encryption of synced data items
//! - [`archive`] - encrypted `.clonr` repository archives
//! - [`lifecycle`] - key expiry, rotation, and the background scheduler
//! - [`cli`] - command-line interface and user interaction
//! - [`config`] - instance configuration and the entity store
//!
//! ## Quick Start
//!
//! ```bash
//! # On the source instance
//! clonr standalone encrypt setup
//! clonr standalone init --port 50052
//!
//! # On the connecting instance, with the printed key
//! clonr standalone connect <key> --name home-server
//!
//! # Back on the source, with the secret the client displayed
//! clonr standalone accept <secret>
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handshake;
pub mod lifecycle;
pub mod pairing;
pub mod payload;
pub mod registry;
pub mod terminal;

pub use config::Config;
pub use error::StandaloneError;
pub use pairing::PairingKey;
