//! Shared per-category job run counters.
//!
//! All instances of one job family share a tracker handle; synchronization
//! is scoped to each counter update.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Instant,
};

/// Run counters for one job category.
pub struct JobTracker {
    category: String,
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    last_completed: Mutex<Option<Instant>>,
}

impl JobTracker {
    /// Create a tracker for `category`.
    pub fn new(category: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            category: category.into(),
            runs_started: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            last_completed: Mutex::new(None),
        })
    }

    /// Category name this tracker counts for.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Record the start of one run.
    pub fn job_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the completion of one run.
    pub fn job_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        *self
            .last_completed
            .lock()
            .expect("tracker timestamp poisoned") = Some(Instant::now());
    }

    /// Runs started so far.
    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    /// Runs completed so far.
    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    /// When the last run completed, if any has.
    pub fn last_completed(&self) -> Option<Instant> {
        *self
            .last_completed
            .lock()
            .expect("tracker timestamp poisoned")
    }
}

/// The per-database tracker set, one handle per tracked job family.
#[derive(Clone)]
pub struct JobTrackers {
    /// Bucket-move family.
    pub bucket_move: Arc<JobTracker>,
    /// Lid-space-compaction family; shared by all per-sub-database instances.
    pub lid_space_compact: Arc<JobTracker>,
    /// Removed-document pruning.
    pub removed_documents_prune: Arc<JobTracker>,
    /// Heartbeat.
    pub heart_beat: Arc<JobTracker>,
    /// Session-cache pruning.
    pub session_cache_prune: Arc<JobTracker>,
    /// Attribute-usage sampling.
    pub attribute_usage_sample: Arc<JobTracker>,
}

impl Default for JobTrackers {
    fn default() -> Self {
        Self {
            bucket_move: JobTracker::new("bucket_move"),
            lid_space_compact: JobTracker::new("lid_space_compact"),
            removed_documents_prune: JobTracker::new("removed_documents_prune"),
            heart_beat: JobTracker::new("heart_beat"),
            session_cache_prune: JobTracker::new("session_cache_prune"),
            attribute_usage_sample: JobTracker::new("attribute_usage_sample"),
        }
    }
}

impl JobTrackers {
    /// Create the standard tracker set.
    pub fn new() -> Self {
        Self::default()
    }
}
