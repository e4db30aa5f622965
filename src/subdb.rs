//! Sub-database bindings for maintenance jobs.
//!
//! Documents are partitioned across three sub-databases by serving status. A
//! job or proxy is bound to specific sub-databases at construction and never
//! rebinds.

use std::{fmt, sync::Arc};

use crate::{
    bucket::BucketId,
    document::{DocumentId, Timestamp},
};

/// Which sub-database a document lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubDbId {
    /// Indexed and serving.
    Ready,
    /// Stored but not indexed for serving.
    NotReady,
    /// Tombstones for removed documents.
    Removed,
}

impl fmt::Display for SubDbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubDbId::Ready => "ready",
            SubDbId::NotReady => "not_ready",
            SubDbId::Removed => "removed",
        };
        f.write_str(name)
    }
}

/// Local-id occupancy of one sub-database.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LidUsageStats {
    /// One past the highest addressable local id.
    pub lid_limit: u32,
    /// Number of local ids currently in use.
    pub used_lids: u32,
    /// Lowest unused local id.
    pub lowest_free_lid: u32,
    /// Highest local id in use.
    pub highest_used_lid: u32,
}

impl LidUsageStats {
    /// Number of unused slots below the limit. Lid 0 is never addressable.
    pub fn lid_bloat(&self) -> u32 {
        self.lid_limit
            .saturating_sub(self.used_lids)
            .saturating_sub(1)
    }

    /// Bloat as a fraction of the lid limit.
    pub fn lid_bloat_factor(&self) -> f64 {
        if self.lid_limit == 0 {
            0.0
        } else {
            f64::from(self.lid_bloat()) / f64::from(self.lid_limit)
        }
    }
}

/// Where a document currently sits: identity, bucket, local id, timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentLocation {
    /// Stable identifier.
    pub document_id: DocumentId,
    /// Normalized bucket holding the document.
    pub bucket: BucketId,
    /// Local id within the sub-database.
    pub lid: u32,
    /// Timestamp of the last mutation.
    pub timestamp: Timestamp,
}

/// Read access to one sub-database's document meta store.
///
/// Implemented by the owning database; jobs only consume the queries needed
/// to plan bounded units of work.
pub trait DocumentMetaStore: Send + Sync {
    /// Current local-id occupancy.
    fn lid_usage(&self) -> LidUsageStats;

    /// Up to `max` documents with local ids strictly above `lid_limit`,
    /// highest lid first.
    fn documents_above(&self, lid_limit: u32, max: usize) -> Vec<DocumentLocation>;

    /// Up to `max` removed documents with a timestamp before `cutoff`.
    fn removed_documents_older_than(&self, cutoff: Timestamp, max: usize) -> Vec<DocumentLocation>;

    /// All buckets with documents in this sub-database.
    fn buckets(&self) -> Vec<BucketId>;
}

/// One sub-database as seen by maintenance jobs: its id and meta store.
#[derive(Clone)]
pub struct MaintenanceSubDb {
    sub_db: SubDbId,
    meta_store: Arc<dyn DocumentMetaStore>,
}

impl MaintenanceSubDb {
    /// Bind a sub-database id to its meta store.
    pub fn new(sub_db: SubDbId, meta_store: Arc<dyn DocumentMetaStore>) -> Self {
        Self { sub_db, meta_store }
    }

    /// Which sub-database this is.
    pub fn sub_db(&self) -> SubDbId {
        self.sub_db
    }

    /// The bound meta store.
    pub fn meta_store(&self) -> &Arc<dyn DocumentMetaStore> {
        &self.meta_store
    }
}
