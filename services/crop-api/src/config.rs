//! Service configuration.
//!
//! Loaded from environment variables (with `.env` support in the binary), or
//! from a YAML file whose missing fields take the same defaults.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slab_store::ObjectStoreConfig;
use subset::CropConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where source files are read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Local directory or POSIX mount; locators are relative to `root`.
    Filesystem { root: PathBuf },
    /// S3-compatible bucket; locators are object key prefixes.
    ObjectStore(ObjectStoreConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            root: PathBuf::from("./data"),
        }
    }
}

/// Top-level crop-api configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CropApiConfig {
    /// HTTP listen address
    pub listen: String,

    /// PostgreSQL catalog; the in-memory catalog is used when unset
    pub database_url: Option<String>,

    pub database_max_connections: u32,

    /// JSON or YAML manifest seeding the in-memory catalog
    pub catalog_manifest: Option<PathBuf>,

    pub storage: StorageConfig,

    /// Per-job timeout applied by the HTTP service
    pub job_timeout_secs: Option<u64>,

    pub crop: CropConfig,
}

impl Default for CropApiConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8090".to_string(),
            database_url: None,
            database_max_connections: 10,
            catalog_manifest: None,
            storage: StorageConfig::default(),
            job_timeout_secs: None,
            crop: CropConfig::default(),
        }
    }
}

impl CropApiConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            crop: CropConfig::from_env(),
            ..Self::default()
        };

        if let Ok(val) = env::var("CROP_API_LISTEN") {
            config.listen = val;
        }

        config.database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        if let Ok(val) = env::var("DATABASE_MAX_CONNECTIONS") {
            if let Ok(n) = val.parse() {
                config.database_max_connections = n;
            }
        }

        config.catalog_manifest = env::var("CATALOG_MANIFEST").ok().map(PathBuf::from);

        match env::var("STORAGE_BACKEND").as_deref() {
            Ok("object_store") | Ok("s3") => {
                config.storage = StorageConfig::ObjectStore(ObjectStoreConfig::from_env());
            }
            _ => {
                if let Ok(root) = env::var("STORAGE_ROOT") {
                    config.storage = StorageConfig::Filesystem {
                        root: PathBuf::from(root),
                    };
                }
            }
        }

        if let Ok(val) = env::var("CROP_JOB_TIMEOUT_SECS") {
            config.job_timeout_secs = val.parse().ok().filter(|&secs| secs > 0);
        }

        config
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// YAML file if given, environment otherwise. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_yaml(path)?,
            None => Self::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "listen address '{}' is not a socket address",
                self.listen
            )));
        }
        if self.database_max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database_max_connections must be > 0".to_string(),
            ));
        }
        if self.job_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "job_timeout_secs must be > 0".to_string(),
            ));
        }
        self.crop.validate().map_err(ConfigError::Invalid)
    }
}
