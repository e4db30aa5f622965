//! Persistence-provider contract behavior end to end: submission order,
//! normalization, asynchronous completion and bucket exclusivity.

mod common;

use std::{sync::Arc, time::Duration};

use futures::FutureExt;

use drover::{
    bucket::{BucketId, BucketLockMap, BucketSpace, LockError, LockPolicy},
    document::{Document, DocumentId, Timestamp},
    executor::TokioExecutor,
    feed::{spawn_feed_pipeline, CompletionToken, FeedError, FeedOperation},
    notifier::ClusterState,
    DocumentDb, PersistenceHandlerProxy,
};

use common::{RecordingBucketHandler, RecordingClusterStateHandler, RecordingSink};

struct Fixture {
    proxy: PersistenceHandlerProxy,
    sink: Arc<RecordingSink>,
    bucket_handler: Arc<RecordingBucketHandler>,
    cluster_handler: Arc<RecordingClusterStateHandler>,
    online: drover::db::OnlineSignal,
}

fn fixture(lock_policy: LockPolicy) -> Fixture {
    let sink = RecordingSink::new();
    let feed = spawn_feed_pipeline(&TokioExecutor::current(), sink.clone());
    let bucket_handler = RecordingBucketHandler::with_buckets(vec![BucketId::new(16, 7)]);
    let cluster_handler = RecordingClusterStateHandler::new();
    let (db, online) = DocumentDb::new(
        "music",
        BucketSpace::DEFAULT,
        feed,
        bucket_handler.clone(),
        cluster_handler.clone(),
        BucketLockMap::new(),
        lock_policy,
    );
    Fixture {
        proxy: PersistenceHandlerProxy::new(db),
        sink,
        bucket_handler,
        cluster_handler,
        online,
    }
}

fn document(id: &str) -> Document {
    Document {
        id: DocumentId::new(id),
        payload: vec![1, 2, 3],
    }
}

#[tokio::test]
async fn writes_apply_normalized_in_submission_order() {
    let f = fixture(LockPolicy::Wait);
    // 8 used bits: everything above the low byte is reserved noise.
    let raw = BucketId::new(8, 0xabcd);
    let normalized = raw.normalized();
    assert_ne!(raw, normalized);

    let (put_token, put_rx) = CompletionToken::channel();
    let (remove_token, remove_rx) = CompletionToken::channel();
    let (create_token, create_rx) = CompletionToken::channel();
    f.proxy.put(put_token, raw, Timestamp(10), document("id:test::1"));
    f.proxy.remove(
        remove_token,
        raw,
        Timestamp(11),
        DocumentId::new("id:test::1"),
    );
    f.proxy.create_bucket(create_token, raw);

    assert_eq!(put_rx.outcome().await, Ok(()));
    assert_eq!(remove_rx.outcome().await, Ok(()));
    assert_eq!(create_rx.outcome().await, Ok(()));

    let applied = f.sink.applied.lock().unwrap();
    assert_eq!(applied.len(), 3);
    assert_eq!(applied[0].kind(), "put");
    assert_eq!(applied[1].kind(), "remove");
    assert_eq!(applied[2].kind(), "create_bucket");
    for op in applied.iter() {
        match op {
            FeedOperation::Put { bucket, .. }
            | FeedOperation::Remove { bucket, .. }
            | FeedOperation::CreateBucket { bucket } => assert_eq!(*bucket, normalized),
            other => panic!("unexpected operation {}", other.kind()),
        }
    }
}

#[tokio::test]
async fn split_and_join_normalize_every_bucket_id() {
    let f = fixture(LockPolicy::Wait);
    let source = BucketId::new(8, 0x1ff);
    let target1 = BucketId::new(9, 0x2ff);
    let target2 = BucketId::new(9, 0x3ff);

    let (token, rx) = CompletionToken::channel();
    f.proxy.split(token, source, target1, target2);
    assert_eq!(rx.outcome().await, Ok(()));

    let applied = f.sink.applied.lock().unwrap();
    match &applied[0] {
        FeedOperation::SplitBucket {
            source: s,
            target1: t1,
            target2: t2,
        } => {
            assert_eq!(*s, source.normalized());
            assert_eq!(*t1, target1.normalized());
            assert_eq!(*t2, target2.normalized());
        }
        other => panic!("unexpected operation {}", other.kind()),
    }
}

#[tokio::test]
async fn rejected_operation_fails_only_its_own_token() {
    let f = fixture(LockPolicy::Wait);
    let bucket = BucketId::new(16, 1);

    f.sink.reject_next(true);
    let (bad_token, bad_rx) = CompletionToken::channel();
    f.proxy.create_bucket(bad_token, bucket);
    assert!(matches!(bad_rx.outcome().await, Err(FeedError::Rejected(_))));

    f.sink.reject_next(false);
    let (good_token, good_rx) = CompletionToken::channel();
    f.proxy.delete_bucket(good_token, bucket);
    assert_eq!(good_rx.outcome().await, Ok(()));
}

#[tokio::test]
async fn commit_and_wait_covers_earlier_submissions() {
    let f = fixture(LockPolicy::Wait);
    for id in 0..4u64 {
        let (token, _rx) = CompletionToken::channel();
        f.proxy.create_bucket(token, BucketId::new(16, id));
    }
    f.proxy.commit_and_wait().await.unwrap();
    assert_eq!(f.sink.applied.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn initialize_waits_for_the_online_signal() {
    let f = fixture(LockPolicy::Wait);

    assert!(
        f.proxy.initialize().now_or_never().is_none(),
        "must block while offline"
    );
    f.online.set_online();
    f.proxy.initialize().await.unwrap();
}

#[tokio::test]
async fn queries_delegate_outside_the_feed_queue() {
    let f = fixture(LockPolicy::Wait);
    let known = BucketId::new(16, 7);

    assert_eq!(f.proxy.list_buckets(), vec![known]);
    assert_eq!(f.proxy.get_bucket_info(known).doc_count, 1);

    f.proxy.set_active_state(BucketId::new(8, 0xabcd), true);
    let calls = f.bucket_handler.state_calls.lock().unwrap().clone();
    assert_eq!(calls, vec![(BucketId::new(8, 0xabcd).normalized(), true)]);
    assert_eq!(f.proxy.list_active_buckets().len(), 1);

    let state = ClusterState {
        node_retired: true,
        node_maintenance: false,
    };
    f.proxy.set_cluster_state(&state);
    assert_eq!(*f.cluster_handler.states.lock().unwrap(), vec![state]);

    f.cluster_handler.modified.lock().unwrap().push(known);
    assert_eq!(f.proxy.get_modified_buckets(), vec![known]);
    assert!(f.proxy.get_modified_buckets().is_empty(), "modified set drains");

    // Nothing above went through the feed pipeline.
    assert!(f.sink.applied.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn bucket_lock_excludes_raw_aliases_of_the_same_bucket() {
    let f = fixture(LockPolicy::Timeout(Duration::from_millis(50)));
    let raw = BucketId::new(8, 0xabcd);

    let guard = f.proxy.lock_bucket(raw.normalized()).await.unwrap();
    let contended = f.proxy.lock_bucket(raw).await;
    assert!(matches!(contended, Err(LockError::Timeout { .. })));

    drop(guard);
    let reacquired = f.proxy.lock_bucket(raw).await.unwrap();
    assert_eq!(reacquired.bucket(), raw.normalized());
}
