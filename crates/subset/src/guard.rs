//! Removal of partially written output.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

/// Removes an output directory when dropped, unless the job completed.
///
/// Any exit after creation other than [`OutputGuard::disarm`] removes the
/// directory, including a dropped (timed out) job future.
pub struct OutputGuard {
    path: PathBuf,
    armed: bool,
    abandoned: Arc<AtomicBool>,
}

impl OutputGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
            abandoned: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Signal handed to blocking write tasks that may outlive the job future.
    pub fn signal(&self) -> AbandonSignal {
        AbandonSignal {
            abandoned: self.abandoned.clone(),
            path: self.path.clone(),
        }
    }

    /// Keep the output; the job succeeded.
    pub fn disarm(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.abandoned.store(true, Ordering::SeqCst);
        if !self.path.exists() {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Removed partial output"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove partial output"),
        }
    }
}

/// Shared view of whether the owning job gave up on its output.
#[derive(Clone)]
pub struct AbandonSignal {
    abandoned: Arc<AtomicBool>,
    path: PathBuf,
}

impl AbandonSignal {
    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    /// Remove anything a write task produced after the guard already cleaned up.
    pub fn sweep(&self) {
        if self.is_abandoned() && self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to sweep abandoned output");
            }
        }
    }
}
