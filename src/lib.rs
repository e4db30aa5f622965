//! Per-database maintenance and operation-dispatch layer for a document
//! database core.
//!
//! Two coupled concerns live here. Background [`maintenance`] jobs keep
//! storage structures (bucket placement, local-id space, removed-document
//! history, attribute usage) compact and consistent without blocking live
//! traffic. The [`proxy::PersistenceHandlerProxy`] translates the external
//! persistence-provider operation contract into tagged [`feed`] operations on
//! the database's single-writer pipeline, reporting completion asynchronously
//! through caller-supplied tokens.
//!
//! The bucket is the unit of mutual exclusion: a held
//! [`bucket::BucketGuard`] excludes all other mutating access to that bucket,
//! maintenance jobs and proxy alike. Durability mechanics, attribute
//! compaction algorithms and the document meta store are collaborators
//! injected at construction (see [`handlers`]), not implemented here.

/// Bucket identifiers, spaces and the per-bucket exclusivity primitive.
pub mod bucket;

/// Maintenance configuration surface.
pub mod config;

/// Document database façade shared by the proxy and the feed pipeline.
pub mod db;

/// Opaque document payloads and identifiers carried by feed operations.
pub mod document;

/// Spawn abstraction and the per-bucket task executor.
pub mod executor;

/// Feed operations, completion tokens and the single-writer dispatch front.
pub mod feed;

/// Collaborator interfaces consumed by jobs and the proxy.
pub mod handlers;

/// Maintenance jobs, controller and wiring.
pub mod maintenance;

/// Publish/subscribe fan-out channels for resource and cluster signals.
pub mod notifier;

mod observability;

/// Boundary adapter implementing the persistence-provider contract.
pub mod proxy;

/// Sub-database bindings and the document meta store interface.
pub mod subdb;

/// Shared per-category job run counters.
pub mod tracker;

pub use crate::{db::DocumentDb, proxy::PersistenceHandlerProxy};
