//! Output writer configuration.

use serde::{Deserialize, Serialize};

/// Settings for arrays written by [`crate::SlabWriter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Maximum chunk extent per axis.
    pub chunk_size: u64,

    pub compression: Compression,

    /// Compression level (1-9).
    pub compression_level: u8,

    /// Enable byte shuffle before compression.
    pub shuffle: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            compression: Compression::BloscZstd,
            compression_level: 4,
            shuffle: true,
        }
    }
}

impl WriterConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("OUTPUT_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.chunk_size = size;
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

        if let Ok(val) = std::env::var("OUTPUT_SHUFFLE") {
            config.shuffle = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("output chunk_size must be > 0".to_string());
        }

        if self.compression != Compression::None
            && (self.compression_level == 0 || self.compression_level > 9)
        {
            return Err("compression_level must be 1-9".to_string());
        }

        Ok(())
    }

    /// Chunk shape for an array: the configured size, capped by each extent.
    pub fn chunk_shape(&self, shape: &[u64]) -> Vec<u64> {
        shape
            .iter()
            .map(|&extent| self.chunk_size.min(extent).max(1))
            .collect()
    }
}

/// Compression codec for output arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    None,
    BloscLz4,
    #[default]
    BloscZstd,
}

impl Compression {
    /// Parse from string (case-insensitive). Unknown names fall back to blosc_zstd.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "lz4" | "blosc_lz4" => Self::BloscLz4,
            _ => Self::BloscZstd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
