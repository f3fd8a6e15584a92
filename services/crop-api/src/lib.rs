//! Crop API service library.
//!
//! HTTP surface, configuration and job tracking around the subsetting
//! engine. The `crop-api` binary adds the command line.

pub mod config;
pub mod server;
pub mod state;
pub mod tracker;

pub use config::{ConfigError, CropApiConfig, StorageConfig};
pub use server::{build_router, start_server, CropErrorBody, CropRequest, CropResponse};
pub use state::AppState;
pub use tracker::{JobOutcome, JobTracker};
