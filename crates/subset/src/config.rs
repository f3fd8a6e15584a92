//! Configuration for the subsetting engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use slab_store::{Compression, WriterConfig};

use crate::inference::DataGroupPolicy;

/// Engine options shared by every crop job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Directory receiving outputs when a request names none.
    pub output_dir: PathBuf,

    /// Datasets copied concurrently within one job.
    pub max_concurrent_reads: usize,

    /// Maximum chunk extent per axis of output arrays.
    pub output_chunk_size: u64,

    pub compression: Compression,

    /// Compression level (1-9).
    pub compression_level: u8,

    pub data_group_policy: DataGroupPolicy,
}

impl Default for CropConfig {
    fn default() -> Self {
        let writer = WriterConfig::default();
        Self {
            output_dir: PathBuf::from("./out"),
            max_concurrent_reads: 4,
            output_chunk_size: writer.chunk_size,
            compression: writer.compression,
            compression_level: writer.compression_level,
            data_group_policy: DataGroupPolicy::SameAsCoordinates,
        }
    }
}

impl CropConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CROP_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("CROP_MAX_CONCURRENT_READS") {
            if let Ok(n) = val.parse() {
                config.max_concurrent_reads = n;
            }
        }

        if let Ok(val) = std::env::var("OUTPUT_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.output_chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("OUTPUT_COMPRESSION") {
            config.compression = Compression::from_str(&val);
        }

        if let Ok(val) = std::env::var("OUTPUT_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("CROP_DATA_GROUP") {
            if !val.trim().is_empty() {
                config.data_group_policy = DataGroupPolicy::Explicit(val);
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_reads == 0 {
            return Err("max_concurrent_reads must be > 0".to_string());
        }

        self.writer_config().validate()
    }

    /// Settings for the output writer.
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            chunk_size: self.output_chunk_size,
            compression: self.compression,
            compression_level: self.compression_level,
            ..WriterConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CropConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("./out"));
        assert_eq!(config.max_concurrent_reads, 4);
        assert_eq!(config.output_chunk_size, 256);
        assert_eq!(config.compression, Compression::BloscZstd);
        assert_eq!(config.compression_level, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CropConfig::default();
        config.max_concurrent_reads = 0;
        assert!(config.validate().is_err());

        config = CropConfig::default();
        config.output_chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CropConfig = serde_json::from_value(serde_json::json!({
            "output_dir": "/data/out",
            "compression": "none",
            "data_group_policy": { "policy": "explicit", "group": "/FS/SLV" }
        }))
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/data/out"));
        assert_eq!(config.compression, Compression::None);
        assert_eq!(config.max_concurrent_reads, 4);
        assert_eq!(
            config.data_group_policy,
            DataGroupPolicy::Explicit("/FS/SLV".to_string())
        );
    }
}
