//! Configuration module for Folio.

use serde::Deserialize;
use std::path::Path;

use crate::{FolioError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/folio.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for document payloads.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    "data/objects".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Document handling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsConfig {
    /// Path prefix for derived download locators.
    #[serde(default = "default_download_base")]
    pub download_base: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Office binary used for PDF conversion.
    #[serde(default = "default_office_binary")]
    pub office_binary: String,
}

fn default_download_base() -> String {
    "/dms".to_string()
}

fn default_max_upload_size() -> u64 {
    50
}

fn default_office_binary() -> String {
    "soffice".to_string()
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            download_base: default_download_base(),
            max_upload_size_mb: default_max_upload_size(),
            office_binary: default_office_binary(),
        }
    }
}

/// Policy applied when deleting a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Refuse to delete a folder that has sub-folders or documents.
    #[default]
    Strict,
    /// Remove the whole subtree, payloads first.
    Cascade,
}

impl DeletePolicy {
    /// Configuration string for the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletePolicy::Strict => "strict",
            DeletePolicy::Cascade => "cascade",
        }
    }
}

/// Folder tree configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FoldersConfig {
    /// Folder delete policy.
    #[serde(default)]
    pub delete_policy: DeletePolicy,
    /// Attempts at name resolution when a sibling-name constraint races.
    #[serde(default = "default_name_retries")]
    pub name_retries: u32,
}

fn default_name_retries() -> u32 {
    3
}

impl Default for FoldersConfig {
    fn default() -> Self {
        Self {
            delete_policy: DeletePolicy::default(),
            name_retries: default_name_retries(),
        }
    }
}

/// Access configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// Role names that bypass folder visibility groups (case-insensitive).
    #[serde(default = "default_elevated_roles")]
    pub elevated_roles: Vec<String>,
}

fn default_elevated_roles() -> Vec<String> {
    vec!["admin".to_string(), "lecturer".to_string()]
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            elevated_roles: default_elevated_roles(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/folio.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Document handling configuration.
    #[serde(default)]
    pub documents: DocumentsConfig,
    /// Folder tree configuration.
    #[serde(default)]
    pub folders: FoldersConfig,
    /// Access configuration.
    #[serde(default)]
    pub access: AccessConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FolioError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FolioError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FOLIO_DATABASE_PATH`: Override the database file path
    /// - `FOLIO_STORAGE_PATH`: Override the object storage directory
    /// - `FOLIO_OFFICE_BINARY`: Override the conversion binary
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = non_empty_env("FOLIO_DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(path) = non_empty_env("FOLIO_STORAGE_PATH") {
            self.storage.path = path;
        }
        if let Some(binary) = non_empty_env("FOLIO_OFFICE_BINARY") {
            self.documents.office_binary = binary;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(FolioError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.documents.max_upload_size_mb == 0 {
            return Err(FolioError::Config(
                "documents.max_upload_size_mb must be at least 1".to_string(),
            ));
        }
        if self.folders.name_retries == 0 {
            return Err(FolioError::Config(
                "folders.name_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Maximum upload size in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.documents.max_upload_size_mb.saturating_mul(1024 * 1024)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
