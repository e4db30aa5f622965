//! Per-bucket exclusive locking.
//!
//! The lock table is the single exclusivity primitive shared by the
//! persistence proxy and the bucket executor: whoever holds the
//! [`BucketGuard`] for a bucket excludes every other mutating party.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_lock::MutexGuardArc;
use thiserror::Error;

use super::BucketId;

type Entry = Arc<async_lock::Mutex<()>>;

/// How long a caller is willing to wait for exclusive bucket access.
///
/// Indefinite blocking puts correctness entirely on call-site lock-ordering
/// discipline, so the policy is explicit configuration rather than an
/// implicit invariant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockPolicy {
    /// Block until the current holder releases the bucket.
    #[default]
    Wait,
    /// Give up with [`LockError::Timeout`] after the given duration.
    Timeout(Duration),
}

/// Errors from bucket lock acquisition.
#[derive(Debug, Error)]
pub enum LockError {
    /// The configured wait budget elapsed while another holder kept the lock.
    #[error("timed out after {waited:?} waiting for exclusive access to {bucket}")]
    Timeout {
        /// Normalized id of the contended bucket.
        bucket: BucketId,
        /// The budget that elapsed.
        waited: Duration,
    },
}

/// Table of per-bucket async mutexes, keyed by normalized id.
///
/// Entries are created on first acquisition and pruned once the last guard
/// for a bucket is dropped.
#[derive(Clone, Default)]
pub struct BucketLockMap {
    entries: Arc<Mutex<HashMap<BucketId, Entry>>>,
}

impl BucketLockMap {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to `bucket` under the given policy.
    ///
    /// The id is normalized first, so raw and normalized callers contend on
    /// the same entry.
    pub async fn lock(&self, bucket: BucketId, policy: LockPolicy) -> Result<BucketGuard, LockError> {
        let bucket = bucket.normalized();
        let entry = {
            let mut entries = self.entries.lock().expect("bucket lock table poisoned");
            Arc::clone(entries.entry(bucket).or_default())
        };
        let guard = match policy {
            LockPolicy::Wait => entry.lock_arc().await,
            LockPolicy::Timeout(waited) => {
                match tokio::time::timeout(waited, entry.lock_arc()).await {
                    Ok(guard) => guard,
                    Err(_) => {
                        drop(entry);
                        self.prune(bucket);
                        return Err(LockError::Timeout { bucket, waited });
                    }
                }
            }
        };
        Ok(BucketGuard {
            bucket,
            map: self.clone(),
            guard: Some(guard),
        })
    }

    /// Number of live lock entries, for tests and introspection.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("bucket lock table poisoned").len()
    }

    /// Whether no bucket lock entry is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the entry for `bucket` if nothing else references it.
    fn prune(&self, bucket: BucketId) {
        let mut entries = self.entries.lock().expect("bucket lock table poisoned");
        if let Some(entry) = entries.get(&bucket) {
            if Arc::strong_count(entry) == 1 {
                entries.remove(&bucket);
            }
        }
    }
}

/// Scoped exclusive-lock handle on one bucket.
///
/// Released on drop on every exit path; while held, all other mutating
/// access to the bucket blocks.
pub struct BucketGuard {
    bucket: BucketId,
    map: BucketLockMap,
    guard: Option<MutexGuardArc<()>>,
}

impl BucketGuard {
    /// The normalized id this guard holds.
    pub fn bucket(&self) -> BucketId {
        self.bucket
    }
}

impl Drop for BucketGuard {
    fn drop(&mut self) {
        // Release before pruning so a waiting acquirer can take the entry.
        self.guard.take();
        self.map.prune(self.bucket);
    }
}
