//! Slab reader doubles wrapping a real reader.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use slab_store::{AttributeMap, Slab, SlabRange, SlabReader, SlabStoreError};

/// Records every slab read before delegating.
pub struct CountingSlabReader {
    inner: Arc<dyn SlabReader>,
    reads: Mutex<Vec<(String, SlabRange)>>,
}

impl CountingSlabReader {
    pub fn new(inner: Arc<dyn SlabReader>) -> Self {
        Self {
            inner,
            reads: Mutex::new(Vec::new()),
        }
    }

    /// Dataset paths and ranges read so far, in call order.
    pub fn reads(&self) -> Vec<(String, SlabRange)> {
        self.reads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Ranges read from one dataset.
    pub fn reads_of(&self, dataset_path: &str) -> Vec<SlabRange> {
        self.reads()
            .into_iter()
            .filter(|(path, _)| path == dataset_path)
            .map(|(_, range)| range)
            .collect()
    }

    /// Total elements requested across all reads.
    pub fn elements_read(&self) -> u64 {
        self.reads().iter().map(|(_, r)| r.num_elements()).sum()
    }
}

#[async_trait]
impl SlabReader for CountingSlabReader {
    async fn read_slab(
        &self,
        locator: &str,
        dataset_path: &str,
        range: &SlabRange,
    ) -> slab_store::Result<Slab> {
        self.reads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((dataset_path.to_string(), range.clone()));
        self.inner.read_slab(locator, dataset_path, range).await
    }

    async fn read_attributes(
        &self,
        locator: &str,
        node_path: &str,
    ) -> slab_store::Result<AttributeMap> {
        self.inner.read_attributes(locator, node_path).await
    }
}

/// Fails slab reads of one dataset, optionally after a delay.
pub struct FailingSlabReader {
    inner: Arc<dyn SlabReader>,
    fail_path: String,
    delay: Option<Duration>,
}

impl FailingSlabReader {
    pub fn new(inner: Arc<dyn SlabReader>, fail_path: impl Into<String>) -> Self {
        Self {
            inner,
            fail_path: fail_path.into(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SlabReader for FailingSlabReader {
    async fn read_slab(
        &self,
        locator: &str,
        dataset_path: &str,
        range: &SlabRange,
    ) -> slab_store::Result<Slab> {
        if dataset_path == self.fail_path {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            return Err(SlabStoreError::read_failed(dataset_path, "injected read failure"));
        }
        self.inner.read_slab(locator, dataset_path, range).await
    }

    async fn read_attributes(
        &self,
        locator: &str,
        node_path: &str,
    ) -> slab_store::Result<AttributeMap> {
        self.inner.read_attributes(locator, node_path).await
    }
}

/// Delays every slab read; used to drive timeouts.
pub struct SlowSlabReader {
    inner: Arc<dyn SlabReader>,
    delay: Duration,
}

impl SlowSlabReader {
    pub fn new(inner: Arc<dyn SlabReader>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl SlabReader for SlowSlabReader {
    async fn read_slab(
        &self,
        locator: &str,
        dataset_path: &str,
        range: &SlabRange,
    ) -> slab_store::Result<Slab> {
        tokio::time::sleep(self.delay).await;
        self.inner.read_slab(locator, dataset_path, range).await
    }

    async fn read_attributes(
        &self,
        locator: &str,
        node_path: &str,
    ) -> slab_store::Result<AttributeMap> {
        self.inner.read_attributes(locator, node_path).await
    }
}
