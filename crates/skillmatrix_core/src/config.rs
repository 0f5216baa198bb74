//! Application configuration and connector wiring.
//!
//! # Responsibility
//! - Load the JSON configuration file with defaults for omitted keys.
//! - Build the process-lifetime connector instances callers share.
//!
//! # Invariants
//! - A loaded `AppConfig` always has a section for its primary backend.
//! - Connectors are created once and handed out as `Arc<dyn DataAccess>`.
//!
//! # Wide-column wiring
//! The crate ships no cluster driver. A `wide_column` primary is built by
//! `connect_primary_with_session`, which takes the caller's `CqlSession`;
//! `connect_primary` rejects that backend.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::logging::default_log_level;
use crate::store::filesystem::FilesystemConnector;
use crate::store::object::{LocalObjectBackend, ObjectStoreConnector, PublicEndpoint};
use crate::store::relational::{RelationalConnector, Relationship, Relationships};
use crate::store::wide_column::{CqlSession, WideColumnConnector, DEFAULT_KEY_COLUMN};
use crate::store::{BackendKind, DataAccess, StoreError, StoreResult};

/// Backend used for structured records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryBackend {
    #[default]
    Filesystem,
    Relational,
    WideColumn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemConfig {
    #[serde(default = "default_data_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationalConfig {
    /// SQLite database file; `:memory:` opens a private in-memory database.
    pub path: PathBuf,
    /// DDL batch applied at connect, for pre-provisioning.
    #[serde(default)]
    pub schema: Option<PathBuf>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideColumnConfig {
    pub keyspace: String,
    #[serde(default = "default_key_column")]
    pub key_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Directory buckets live under.
    pub root: PathBuf,
    pub bucket: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub primary: PrimaryBackend,
    #[serde(default)]
    pub filesystem: Option<FilesystemConfig>,
    #[serde(default)]
    pub relational: Option<RelationalConfig>,
    #[serde(default)]
    pub wide_column: Option<WideColumnConfig>,
    #[serde(default)]
    pub object_store: Option<ObjectStoreConfig>,
}

fn default_level() -> String {
    default_log_level().to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_key_column() -> String {
    DEFAULT_KEY_COLUMN.to_string()
}

fn default_protocol() -> String {
    "https".to_string()
}

/// Configuration loading failures.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl AppConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(text)?;
        if config.primary == PrimaryBackend::Filesystem && config.filesystem.is_none() {
            config.filesystem = Some(FilesystemConfig {
                root: default_data_root(),
            });
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.primary {
            PrimaryBackend::Filesystem if self.filesystem.is_none() => {
                return Err(ConfigError::Invalid(
                    "primary backend `filesystem` has no `filesystem` section".to_string(),
                ));
            }
            PrimaryBackend::Relational if self.relational.is_none() => {
                return Err(ConfigError::Invalid(
                    "primary backend `relational` has no `relational` section".to_string(),
                ));
            }
            PrimaryBackend::WideColumn if self.wide_column.is_none() => {
                return Err(ConfigError::Invalid(
                    "primary backend `wide_column` has no `wide_column` section".to_string(),
                ));
            }
            _ => {}
        }
        if let Some(object_store) = &self.object_store {
            if object_store.bucket.trim().is_empty() || object_store.host.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "object_store requires non-empty `bucket` and `host`".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Connects the configured primary backend.
///
/// # Errors
/// - `Backend` when the selected backend has no configuration section.
/// - `Backend` for `wide_column`, which needs `connect_primary_with_session`.
/// - Any connector construction error, unchanged.
pub fn connect_primary(config: &AppConfig) -> StoreResult<Arc<dyn DataAccess>> {
    connect_primary_with_session(config, None)
}

/// Connects the configured primary backend, using `session` for a
/// `wide_column` primary. Other backends ignore `session`.
pub fn connect_primary_with_session(
    config: &AppConfig,
    session: Option<Arc<dyn CqlSession>>,
) -> StoreResult<Arc<dyn DataAccess>> {
    let store: Arc<dyn DataAccess> = match config.primary {
        PrimaryBackend::Filesystem => {
            let section = config
                .filesystem
                .as_ref()
                .ok_or_else(|| missing_section(BackendKind::Filesystem))?;
            Arc::new(FilesystemConnector::connect(&section.root)?)
        }
        PrimaryBackend::Relational => {
            let section = config
                .relational
                .as_ref()
                .ok_or_else(|| missing_section(BackendKind::Relational))?;
            Arc::new(connect_relational(section)?)
        }
        PrimaryBackend::WideColumn => {
            let section = config
                .wide_column
                .as_ref()
                .ok_or_else(|| missing_section(BackendKind::WideColumn))?;
            let session = session.ok_or_else(|| {
                StoreError::backend(
                    BackendKind::WideColumn,
                    "no CQL session supplied; use connect_primary_with_session",
                )
            })?;
            Arc::new(WideColumnConnector::connect_with_key(
                session,
                &section.keyspace,
                &section.key_column,
            )?)
        }
    };
    info!(
        "event=primary_ready module=config status=ok backend={}",
        store.backend().as_str()
    );
    Ok(store)
}

/// Connects the object store when one is configured.
pub fn connect_object_store(config: &AppConfig) -> StoreResult<Option<ObjectStoreConnector>> {
    let Some(section) = &config.object_store else {
        return Ok(None);
    };
    let backend = Arc::new(LocalObjectBackend::new(&section.root));
    let endpoint = PublicEndpoint::new(&section.protocol, &section.host);
    ObjectStoreConnector::connect(backend, &section.bucket, endpoint).map(Some)
}

fn connect_relational(section: &RelationalConfig) -> StoreResult<RelationalConnector> {
    let connector = if section.path == Path::new(":memory:") {
        RelationalConnector::connect_in_memory()?
    } else {
        RelationalConnector::connect(&section.path)?
    };
    if let Some(schema) = &section.schema {
        connector.provision(&fs::read_to_string(schema)?)?;
    }
    let relationships = section.relationships.iter().cloned().collect::<Relationships>();
    Ok(connector.with_relationships(relationships))
}

fn missing_section(backend: BackendKind) -> StoreError {
    StoreError::backend(
        backend,
        format!("no `{}` section configured", backend.as_str()),
    )
}
