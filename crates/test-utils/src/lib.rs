//! Shared test utilities for the geo-subset workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Zarr file fixtures registered in an in-memory catalog
//! - Coordinate and data generators with predictable values
//! - Slab reader doubles for counting, failing and slow reads
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then build a store in your tests:
//!
//! ```ignore
//! use test_utils::{swath_fixture, FixtureStore};
//!
//! let store = FixtureStore::new();
//! store.install(&swath_fixture(), 1).await;
//! ```

pub mod env;
pub mod fixtures;
pub mod generators;
pub mod readers;

// Re-export commonly used items at the crate root
pub use env::*;
pub use fixtures::*;
pub use generators::*;
pub use readers::*;
