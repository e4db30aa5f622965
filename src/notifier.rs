//! Publish/subscribe fan-out for resource and cluster signals.
//!
//! Every live subscriber receives every value published after it subscribed.
//! Delivery order between subscribers is unspecified; subscribers must not
//! rely on seeing a signal before or after any other subscriber.

use std::sync::Mutex;

use crate::bucket::BucketId;

/// Multi-subscriber broadcast channel.
///
/// Publishing never blocks; each subscriber gets its own unbounded queue and
/// drains it at its own pace. Closed subscriptions are pruned on publish.
pub struct Notifier<T> {
    subscribers: Mutex<Vec<flume::Sender<T>>>,
}

impl<T> Default for Notifier<T> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone> Notifier<T> {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription receiving all values published from now on.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = flume::unbounded();
        self.subscribers
            .lock()
            .expect("notifier subscriber list poisoned")
            .push(tx);
        Subscription { rx }
    }

    /// Deliver `value` to every live subscriber.
    pub fn publish(&self, value: &T) {
        self.subscribers
            .lock()
            .expect("notifier subscriber list poisoned")
            .retain(|tx| tx.send(value.clone()).is_ok());
    }

    /// Number of live subscriptions, counting ones not yet pruned.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("notifier subscriber list poisoned")
            .len()
    }
}

/// Receiving half of a [`Notifier`] subscription.
pub struct Subscription<T> {
    rx: flume::Receiver<T>,
}

impl<T> Subscription<T> {
    /// Next pending value, if any. Never blocks.
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next value; `None` once the notifier is dropped.
    pub async fn recv(&self) -> Option<T> {
        self.rx.recv_async().await.ok()
    }
}

/// Disk and memory usage relative to capacity, published by the resource
/// monitor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiskMemUsageState {
    /// Disk usage as a fraction of capacity.
    pub disk_usage: f64,
    /// Memory usage as a fraction of capacity.
    pub memory_usage: f64,
}

impl DiskMemUsageState {
    /// Whether disk usage exceeds the configured limit factor.
    pub fn above_disk_limit(&self, limit_factor: f64) -> bool {
        self.disk_usage > limit_factor
    }

    /// Whether memory usage exceeds the configured limit factor.
    pub fn above_memory_limit(&self, limit_factor: f64) -> bool {
        self.memory_usage > limit_factor
    }
}

/// Cluster-state membership flags for this node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClusterState {
    /// Node is being drained out of the cluster.
    pub node_retired: bool,
    /// Node is temporarily in maintenance mode.
    pub node_maintenance: bool,
}

/// A bucket flipped between ready and not-ready.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketStateChange {
    /// Normalized id of the affected bucket.
    pub bucket: BucketId,
    /// New serving state.
    pub now_ready: bool,
}

/// A bucket was created in the bucket database.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketCreated {
    /// Normalized id of the new bucket.
    pub bucket: BucketId,
}

/// The per-database notifier set handed to the jobs injector.
#[derive(Default)]
pub struct Notifiers {
    /// Disk/memory pressure signals.
    pub disk_mem_usage: Notifier<DiskMemUsageState>,
    /// Cluster-state change signals.
    pub cluster_state: Notifier<ClusterState>,
    /// Bucket ready/not-ready transitions.
    pub bucket_state: Notifier<BucketStateChange>,
    /// Bucket creation events.
    pub bucket_create: Notifier<BucketCreated>,
}

impl Notifiers {
    /// Create the notifier set with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }
}
