//! # Configuration Management
//!
//! This module handles clonr's configuration system, including:
//! - TOML-based instance configuration
//! - Repository records used by the archive selectors
//! - The JSON document store backing all standalone-mode entities
//!
//! The configuration is stored in a platform-appropriate directory
//! (e.g., `~/.config/clonr/` on Linux). Every persisted entity is one JSON
//! document keyed by its natural identifier, written atomically via a
//! temporary file and rename so concurrent invocations see either the old
//! or the new record, never a torn one.

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for a clonr instance.
///
/// Holds the tunable policy knobs of the standalone subsystem and the
/// repository records that the archive selectors (`--all`, `--favorites`,
/// `--workspace`) resolve against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Default host written into generated pairing keys.
    pub default_host: String,
    /// Default port written into generated pairing keys.
    pub default_port: u16,
    /// Pairing key lifetime in hours. Bounded by design: hours, not months.
    pub pairing_key_lifetime_hours: i64,
    /// Maximum age of the at-rest encryption key before the background
    /// scheduler rotates it.
    pub encryption_key_max_age_days: i64,
    /// Known repositories, used by archive path selectors.
    #[serde(default)]
    pub repositories: Vec<RepoRecord>,

    #[serde(skip)]
    pub config_file_path: PathBuf,
}

/// A repository known to this instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepoRecord {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub workspace: Option<String>,
}

impl Config {
    /// Load the instance configuration, creating a default one on first use.
    pub async fn load_or_init() -> Result<Self> {
        let config_dir = Self::config_dir()?;
        tokio::fs::create_dir_all(&config_dir).await?;

        let config_file = config_dir.join("config.toml");
        if config_file.exists() {
            let content = tokio::fs::read_to_string(&config_file).await?;
            let mut config: Config = toml::from_str(&content)?;
            config.config_file_path = config_file;
            Ok(config)
        } else {
            let config = Self {
                default_host: "127.0.0.1".to_string(),
                default_port: 50052,
                pairing_key_lifetime_hours: 24,
                encryption_key_max_age_days: 90,
                repositories: Vec::new(),
                config_file_path: config_file,
            };
            config.save().await?;
            Ok(config)
        }
    }

    pub async fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(&self.config_file_path, content).await?;
        Ok(())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_file_path
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("standalone"))
    }

    /// Open the entity store rooted in this instance's data directory.
    pub fn store(&self) -> Result<Store> {
        Ok(Store::open(self.data_dir()?)?)
    }

    fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("CLONR_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("clonr");
        Ok(config_dir)
    }
}

/// JSON document store for standalone-mode entities.
///
/// One document per entity, keyed by natural identifier:
/// `server_pairing.json` and `server_encryption.json` singletons at the
/// root, plus `pending/<client_id>.json`, `clients/<client_id>.json`,
/// `connections/<name>.json`, and `synced/<connection>/<type>-<name>.json`.
#[derive(Clone, Debug)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn open(root: PathBuf) -> crate::error::Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a document atomically: serialize to a sibling temporary file,
    /// then rename into place.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> crate::error::Result<()> {
        let path = self.document_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Read a document, returning `None` if it does not exist.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> crate::error::Result<Option<T>> {
        let path = self.document_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Delete a document. Returns whether it existed.
    pub fn delete(&self, key: &str) -> crate::error::Result<bool> {
        let path = self.document_path(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// List all documents in a collection directory, deserialized.
    pub fn list<T: DeserializeOwned>(&self, collection: &str) -> crate::error::Result<Vec<T>> {
        let dir = self.root.join(collection);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        let mut entries: Vec<_> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        entries.sort();

        for path in entries {
            let content = std::fs::read_to_string(&path)?;
            items.push(serde_json::from_str(&content)?);
        }
        Ok(items)
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

/// Validate a user-supplied entity name before it becomes a file name.
///
/// Connection names key documents on disk, so path separators and other
/// surprises are rejected up front.
pub fn validate_entity_name(name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("Name must not be empty");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        anyhow::bail!(
            "Invalid name '{}': only letters, digits, '-', '_' and '.' are allowed",
            name
        );
    }
    Ok(())
}
