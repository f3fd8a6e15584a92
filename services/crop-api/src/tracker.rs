//! Tracking of active and recently finished crop jobs.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

/// A job still running.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveJob {
    pub id: String,
    pub file_name: String,
    pub bbox: String,
    pub started_at: DateTime<Utc>,
}

/// A finished job.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedJob {
    pub id: String,
    pub file_name: String,
    pub bbox: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub output_file: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

/// Terminal result handed to [`JobTracker::complete`].
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed { output_file: String },
    Failed { kind: String, message: String },
}

/// Response for `/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub active: Vec<ActiveJob>,
    pub recent: Vec<CompletedJob>,
    pub total_completed: usize,
}

pub struct JobTracker {
    active: Mutex<HashMap<String, ActiveJob>>,
    completed: Mutex<VecDeque<CompletedJob>>,
    max_completed: usize,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Tracker keeping at most `max_completed` finished jobs.
    pub fn with_capacity(max_completed: usize) -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            completed: Mutex::new(VecDeque::new()),
            max_completed,
        }
    }

    pub async fn start(&self, id: &str, file_name: &str, bbox: &str) {
        let job = ActiveJob {
            id: id.to_string(),
            file_name: file_name.to_string(),
            bbox: bbox.to_string(),
            started_at: Utc::now(),
        };
        self.active.lock().await.insert(id.to_string(), job);
    }

    pub async fn complete(&self, id: &str, outcome: JobOutcome) {
        let mut active = self.active.lock().await;
        let Some(job) = active.remove(id) else {
            return;
        };

        let completed_at = Utc::now();
        let duration_ms = (completed_at - job.started_at).num_milliseconds().max(0) as u64;
        let (success, output_file, error_kind, error_message) = match outcome {
            JobOutcome::Completed { output_file } => (true, Some(output_file), None, None),
            JobOutcome::Failed { kind, message } => (false, None, Some(kind), Some(message)),
        };

        let mut completed = self.completed.lock().await;
        completed.push_front(CompletedJob {
            id: job.id,
            file_name: job.file_name,
            bbox: job.bbox,
            started_at: job.started_at,
            completed_at,
            duration_ms,
            success,
            output_file,
            error_kind,
            error_message,
        });

        // Keep only recent entries
        while completed.len() > self.max_completed {
            completed.pop_back();
        }
    }

    pub async fn get_status(&self) -> StatusResponse {
        let active = self.active.lock().await;
        let completed = self.completed.lock().await;

        StatusResponse {
            active: active.values().cloned().collect(),
            recent: completed.iter().take(20).cloned().collect(),
            total_completed: completed.len(),
        }
    }
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}
