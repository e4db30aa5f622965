//! Feed operations and the single-writer dispatch front.
//!
//! Mutating persistence requests become tagged [`FeedOperation`]s and enter
//! the per-database pipeline in submission order; the pipeline completes one
//! [`token::CompletionToken`] per operation, always asynchronously.

mod handler;
mod token;

pub use handler::{spawn_feed_pipeline, FeedHandle, FeedSink, FenceWait, OperationStorer};
pub use token::{CompletionReceiver, CompletionToken, FeedError};

use crate::{
    bucket::BucketId,
    document::{Document, DocumentId, DocumentUpdate, Timestamp},
    subdb::SubDbId,
};

/// Internal representation of a mutating persistence request.
///
/// Immutable once constructed; every bucket id is stored normalized.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedOperation {
    /// Store a document.
    Put {
        /// Target bucket.
        bucket: BucketId,
        /// Operation timestamp.
        timestamp: Timestamp,
        /// The document to store.
        document: Document,
    },
    /// Apply a partial update.
    Update {
        /// Target bucket.
        bucket: BucketId,
        /// Operation timestamp.
        timestamp: Timestamp,
        /// The update to apply.
        update: DocumentUpdate,
    },
    /// Remove a document.
    Remove {
        /// Target bucket.
        bucket: BucketId,
        /// Operation timestamp.
        timestamp: Timestamp,
        /// Identifier of the document to remove.
        document_id: DocumentId,
    },
    /// Create an empty bucket.
    CreateBucket {
        /// Bucket to create.
        bucket: BucketId,
    },
    /// Delete a bucket and its documents.
    DeleteBucket {
        /// Bucket to delete.
        bucket: BucketId,
    },
    /// Split one bucket into two.
    SplitBucket {
        /// Bucket being split.
        source: BucketId,
        /// First split target.
        target1: BucketId,
        /// Second split target.
        target2: BucketId,
    },
    /// Join two buckets into one.
    JoinBuckets {
        /// First join source.
        source1: BucketId,
        /// Second join source.
        source2: BucketId,
        /// Join target.
        target: BucketId,
    },
    /// Move a document between sub-databases (maintenance traffic).
    MoveDocument {
        /// Identifier of the moved document.
        document_id: DocumentId,
        /// Bucket holding the document.
        bucket: BucketId,
        /// Local id at the source.
        lid: u32,
        /// Sub-database the document leaves.
        source: SubDbId,
        /// Sub-database the document enters.
        target: SubDbId,
        /// Timestamp of the move.
        timestamp: Timestamp,
    },
    /// Shrink a sub-database's local-id space (maintenance traffic).
    CompactLidSpace {
        /// Sub-database being compacted.
        sub_db: SubDbId,
        /// New one-past-the-end local id.
        lid_limit: u32,
    },
    /// Drop aged removed-document tombstones (maintenance traffic).
    PruneRemovedDocuments {
        /// Sub-database holding the tombstones.
        sub_db: SubDbId,
        /// Local ids to prune.
        lids: Vec<u32>,
    },
}

impl FeedOperation {
    /// Short tag naming the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedOperation::Put { .. } => "put",
            FeedOperation::Update { .. } => "update",
            FeedOperation::Remove { .. } => "remove",
            FeedOperation::CreateBucket { .. } => "create_bucket",
            FeedOperation::DeleteBucket { .. } => "delete_bucket",
            FeedOperation::SplitBucket { .. } => "split_bucket",
            FeedOperation::JoinBuckets { .. } => "join_buckets",
            FeedOperation::MoveDocument { .. } => "move_document",
            FeedOperation::CompactLidSpace { .. } => "compact_lid_space",
            FeedOperation::PruneRemovedDocuments { .. } => "prune_removed_documents",
        }
    }
}
