use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::mpsc;
use url::Url;

use services::assets::{
    AcquirePolicy, AssetNotifier, AssetPayload, AssetPipeline, AssetProducer, RemoteAssetStore,
};
use services::{ProduceError, RemoteStoreError};
use storage::StorageError;
use storage::repository::{AssetCacheRepository, Storage, WrongStatRepository};
use voca_core::model::{AssetCacheEntry, AssetKey, AssetKind};
use voca_core::time::{fixed_clock, fixed_now};

/// Producer that answers from a script, then succeeds.
struct Scripted {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    warmups: usize,
}

impl Scripted {
    fn new(calls: &Arc<AtomicUsize>) -> Self {
        Self {
            calls: Arc::clone(calls),
            delay: Duration::ZERO,
            warmups: 0,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn with_warmups(mut self, warmups: usize) -> Self {
        self.warmups = warmups;
        self
    }
}

#[async_trait::async_trait]
impl AssetProducer for Scripted {
    async fn produce(&self, key: &AssetKey) -> Result<Bytes, ProduceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if call < self.warmups {
            return Err(ProduceError::WarmingUp {
                estimated_wait: Some(Duration::from_millis(1)),
            });
        }
        Ok(Bytes::from(format!("png:{}", key.cache_key())))
    }
}

#[derive(Default)]
struct FakeArchive {
    stored: Mutex<HashMap<String, Bytes>>,
    fail_fetch: bool,
    published: Option<mpsc::UnboundedSender<String>>,
    probes: Arc<AtomicUsize>,
}

impl FakeArchive {
    fn location(key: &AssetKey) -> Url {
        Url::parse(&format!("https://archive.test/{}.png", key.cache_key())).unwrap()
    }
}

#[async_trait::async_trait]
impl RemoteAssetStore for FakeArchive {
    async fn probe(&self, key: &AssetKey) -> Result<Option<Url>, RemoteStoreError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let stored = self.stored.lock().unwrap();
        Ok(stored
            .contains_key(key.cache_key())
            .then(|| Self::location(key)))
    }

    async fn fetch(&self, location: &Url) -> Result<Bytes, RemoteStoreError> {
        if self.fail_fetch {
            return Err(RemoteStoreError::Rejected("offline".into()));
        }
        let name = location
            .path()
            .trim_start_matches('/')
            .trim_end_matches(".png")
            .to_owned();
        let stored = self.stored.lock().unwrap();
        stored
            .get(&name)
            .cloned()
            .ok_or_else(|| RemoteStoreError::Rejected("missing".into()))
    }

    async fn publish(&self, key: &AssetKey, payload: &Bytes) -> Result<Url, RemoteStoreError> {
        self.stored
            .lock()
            .unwrap()
            .insert(key.cache_key().to_owned(), payload.clone());
        if let Some(tx) = &self.published {
            let _ = tx.send(key.cache_key().to_owned());
        }
        Ok(Self::location(key))
    }
}

/// Cache whose second read answers late with a miss, like a lookup that ran
/// just before another production stored its result.
struct LateSecondRead {
    inner: Arc<dyn AssetCacheRepository>,
    reads: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl AssetCacheRepository for LateSecondRead {
    async fn get_asset(
        &self,
        kind: AssetKind,
        key: &str,
    ) -> Result<Option<AssetCacheEntry>, StorageError> {
        if self.reads.fetch_add(1, Ordering::SeqCst) == 1 {
            tokio::time::sleep(self.delay).await;
            return Ok(None);
        }
        self.inner.get_asset(kind, key).await
    }

    async fn put_asset(
        &self,
        kind: AssetKind,
        entry: &AssetCacheEntry,
    ) -> Result<(), StorageError> {
        self.inner.put_asset(kind, entry).await
    }

    async fn has_asset(&self, kind: AssetKind, key: &str) -> Result<bool, StorageError> {
        self.inner.has_asset(kind, key).await
    }

    async fn delete_assets_before(
        &self,
        kind: AssetKind,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        self.inner.delete_assets_before(kind, cutoff).await
    }

    async fn clear_assets(&self, kind: AssetKind) -> Result<u64, StorageError> {
        self.inner.clear_assets(kind).await
    }

    async fn count_assets(&self, kind: AssetKind) -> Result<u64, StorageError> {
        self.inner.count_assets(kind).await
    }
}

fn image_pipeline(storage: &Storage) -> AssetPipeline {
    AssetPipeline::new(
        AssetKind::Image,
        AcquirePolicy::image(),
        fixed_clock(),
        storage,
    )
}

#[tokio::test]
async fn concurrent_acquires_share_one_production() {
    let storage = Storage::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = image_pipeline(&storage)
        .with_producer(Scripted::new(&calls).with_delay(Duration::from_millis(50)));

    let results = join_all((0..8).map(|_| pipeline.acquire("cat", true))).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let first = results[0].as_ref().unwrap().clone().expect("asset");
    for result in &results {
        assert_eq!(result.as_ref().unwrap().as_ref(), Some(&first));
    }
    assert_eq!(
        first,
        AssetPayload::Bytes(Bytes::from_static(b"png:cat"))
    );
}

#[tokio::test]
async fn late_cache_miss_reuses_a_finished_production() {
    let base = Storage::in_memory();
    let storage = Storage {
        assets: Arc::new(LateSecondRead {
            inner: Arc::clone(&base.assets),
            reads: AtomicUsize::new(0),
            delay: Duration::from_millis(100),
        }),
        ..base.clone()
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = image_pipeline(&storage).with_producer(Scripted::new(&calls));

    let (first, second) = tokio::join!(
        pipeline.acquire("cat", true),
        pipeline.acquire("cat", true)
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let expected = Some(AssetPayload::Bytes(Bytes::from_static(b"png:cat")));
    assert_eq!(first.unwrap(), expected);
    assert_eq!(second.unwrap(), expected);
}

#[tokio::test]
async fn different_keys_are_produced_independently() {
    let storage = Storage::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = image_pipeline(&storage)
        .with_producer(Scripted::new(&calls).with_delay(Duration::from_millis(20)));

    let (cat, dog) = tokio::join!(pipeline.acquire("cat", true), pipeline.acquire("dog", true));
    assert!(cat.unwrap().is_some());
    assert!(dog.unwrap().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn generation_waits_for_the_wrong_count_threshold() {
    let storage = Storage::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = image_pipeline(&storage).with_producer(Scripted::new(&calls));

    storage
        .wrong_stats
        .increment_wrong("cat", fixed_now())
        .await
        .unwrap();
    assert!(!pipeline.should_generate("cat").await.unwrap());
    assert!(pipeline.acquire("cat", false).await.unwrap().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    storage
        .wrong_stats
        .increment_wrong("cat", fixed_now())
        .await
        .unwrap();
    assert!(pipeline.should_generate("cat").await.unwrap());
    assert!(pipeline.acquire("cat", false).await.unwrap().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!pipeline.should_generate("cat").await.unwrap());
}

#[tokio::test]
async fn forced_acquire_bypasses_the_threshold() {
    let storage = Storage::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = image_pipeline(&storage).with_producer(Scripted::new(&calls));

    assert!(!pipeline.should_generate("owl").await.unwrap());
    assert!(!pipeline.preload_if_needed("owl").await.unwrap());
    assert!(pipeline.acquire("owl", true).await.unwrap().is_some());
    assert!(!pipeline.should_generate("owl").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn warming_up_is_retried_then_given_up() {
    let storage = Storage::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = image_pipeline(&storage).with_producer(Scripted::new(&calls).with_warmups(2));

    assert!(pipeline.acquire("cat", true).await.unwrap().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let storage = Storage::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = image_pipeline(&storage).with_producer(Scripted::new(&calls).with_warmups(100));

    assert!(pipeline.acquire("cat", true).await.unwrap().is_none());
    assert_eq!(
        calls.load(Ordering::SeqCst),
        AcquirePolicy::image().max_retries as usize + 1
    );
    assert_eq!(pipeline.cached_count().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_producer_times_out_softly() {
    let storage = Storage::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = image_pipeline(&storage)
        .with_producer(Scripted::new(&calls).with_delay(Duration::from_secs(120)));

    assert!(pipeline.acquire("cat", true).await.unwrap().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The key is free again afterwards.
    assert!(pipeline.acquire("cat", true).await.unwrap().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn archive_hit_is_copied_into_the_cache() {
    let storage = Storage::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let archive = FakeArchive::default();
    archive
        .stored
        .lock()
        .unwrap()
        .insert("cat".into(), Bytes::from_static(b"archived"));

    let pipeline = image_pipeline(&storage)
        .with_producer(Scripted::new(&calls))
        .with_remote(archive);

    let found = pipeline.acquire("Cat", false).await.unwrap();
    assert_eq!(
        found,
        Some(AssetPayload::Bytes(Bytes::from_static(b"archived")))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(
        storage
            .assets
            .has_asset(AssetKind::Image, "cat")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn unreadable_archive_hit_returns_its_location() {
    let storage = Storage::in_memory();
    let archive = FakeArchive {
        fail_fetch: true,
        ..FakeArchive::default()
    };
    archive
        .stored
        .lock()
        .unwrap()
        .insert("cat".into(), Bytes::from_static(b"archived"));
    let pipeline = image_pipeline(&storage).with_remote(archive);

    let found = pipeline.acquire("cat", false).await.unwrap();
    assert_eq!(
        found,
        Some(AssetPayload::Remote(
            Url::parse("https://archive.test/cat.png").unwrap()
        ))
    );
    assert_eq!(pipeline.cached_count().await.unwrap(), 0);
}

#[tokio::test]
async fn produced_assets_are_mirrored_to_the_archive() {
    let storage = Storage::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = image_pipeline(&storage)
        .with_producer(Scripted::new(&calls))
        .with_remote(FakeArchive {
            published: Some(tx),
            ..FakeArchive::default()
        });

    assert!(pipeline.acquire("ice cream", true).await.unwrap().is_some());

    let published = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("mirror ran")
        .expect("channel open");
    assert_eq!(published, "ice_cream");
}

#[tokio::test]
async fn preload_probes_the_archive_once() {
    let storage = Storage::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let probes = Arc::new(AtomicUsize::new(0));
    let notifier = AssetNotifier::default();
    let mut events = notifier.subscribe();
    let pipeline = image_pipeline(&storage)
        .with_producer(Scripted::new(&calls))
        .with_remote(FakeArchive {
            probes: Arc::clone(&probes),
            ..FakeArchive::default()
        })
        .with_notifier(notifier);

    for _ in 0..2 {
        storage
            .wrong_stats
            .increment_wrong("cat", fixed_now())
            .await
            .unwrap();
    }
    assert!(pipeline.preload_if_needed("cat").await.unwrap());

    let ready = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("notification")
        .unwrap();
    assert!(ready.is_for("cat"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(probes.load(Ordering::SeqCst), 1);

    assert!(!pipeline.preload_if_needed("cat").await.unwrap());
    assert_eq!(probes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn wrong_answers_trigger_background_generation_and_notify() {
    let storage = Storage::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let notifier = AssetNotifier::default();
    let mut events = notifier.subscribe();
    let pipeline = image_pipeline(&storage)
        .with_producer(Scripted::new(&calls))
        .with_notifier(notifier);

    let first = pipeline.record_wrong_answer("Cat").await.unwrap();
    assert_eq!(first.stat.wrong_count(), 1);
    assert!(!first.generating);
    assert!(first.asset.is_none());

    let second = pipeline.record_wrong_answer("cat").await.unwrap();
    assert_eq!(second.stat.wrong_count(), 2);
    assert!(second.generating);

    let ready = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("notification")
        .unwrap();
    assert!(ready.is_for("CAT"));
    assert!(!ready.is_for("dog"));
    assert_eq!(ready.kind, AssetKind::Image);

    let third = pipeline.record_wrong_answer("cat").await.unwrap();
    assert!(!third.generating);
    assert_eq!(third.asset, Some(ready.payload));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn prune_only_removes_old_entries() {
    let storage = Storage::in_memory();
    let pipeline = AssetPipeline::new(
        AssetKind::Audio,
        AcquirePolicy::audio(),
        fixed_clock(),
        &storage,
    );

    let old = voca_core::model::AssetCacheEntry::new(
        "cat",
        b"old".to_vec(),
        fixed_now() - chrono::Duration::days(31),
    );
    let fresh = voca_core::model::AssetCacheEntry::new(
        "dog",
        b"new".to_vec(),
        fixed_now() - chrono::Duration::days(1),
    );
    storage.assets.put_asset(AssetKind::Audio, &old).await.unwrap();
    storage.assets.put_asset(AssetKind::Audio, &fresh).await.unwrap();

    assert_eq!(
        pipeline
            .prune_older_than(chrono::Duration::days(30))
            .await
            .unwrap(),
        1
    );
    assert_eq!(pipeline.cached_count().await.unwrap(), 1);
    assert_eq!(pipeline.clear_cache().await.unwrap(), 1);
}
