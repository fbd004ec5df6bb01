use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinHandle;
use voca_core::Clock;
use voca_core::model::{AssetCacheEntry, AssetKey, AssetKind, WrongStat};

use storage::repository::{AssetCacheRepository, Storage, WrongStatRepository};

use super::notify::{AssetNotifier, AssetPayload, AssetReady};
use super::policy::AcquirePolicy;
use super::producer::{AssetProducer, RemoteAssetStore};
use crate::error::{AssetError, ProduceError};

type InFlight = Shared<BoxFuture<'static, Option<AssetPayload>>>;

/// Result of [`AssetPipeline::record_wrong_answer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrongAnswerRecord {
    pub stat: WrongStat,
    /// Asset already available locally or remotely.
    pub asset: Option<AssetPayload>,
    /// A background acquire was started; its result arrives as [`AssetReady`].
    pub generating: bool,
}

//
// ─── PRODUCTION ────────────────────────────────────────────────────────────────
//

/// The part of the pipeline that runs on a spawned task.
#[derive(Clone)]
struct Production {
    kind: AssetKind,
    policy: AcquirePolicy,
    clock: Clock,
    cache: Arc<dyn AssetCacheRepository>,
    producer: Option<Arc<dyn AssetProducer>>,
    remote: Option<Arc<dyn RemoteAssetStore>>,
}

impl Production {
    async fn run(&self, key: &AssetKey) -> Option<AssetPayload> {
        // A production that finished between the caller's lookup and this
        // task's registration has already filled the cache.
        match self.cache.get_asset(self.kind, key.cache_key()).await {
            Ok(Some(entry)) => {
                tracing::debug!(%key, "cache filled by an earlier production");
                return Some(AssetPayload::Bytes(Bytes::from(entry.payload)));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(%key, error = %e, "cache recheck failed, producing"),
        }

        let bytes = self.produce_with_retry(key).await?;

        let entry = AssetCacheEntry::new(key.cache_key(), bytes.to_vec(), self.clock.now());
        if let Err(e) = self.cache.put_asset(self.kind, &entry).await {
            tracing::warn!(%key, error = %e, "failed to cache produced asset");
        }

        if let Some(remote) = &self.remote {
            let remote = Arc::clone(remote);
            let key = key.clone();
            let bytes = bytes.clone();
            tokio::spawn(async move {
                match remote.publish(&key, &bytes).await {
                    Ok(url) => tracing::debug!(%key, %url, "mirrored asset to archive"),
                    Err(e) => tracing::warn!(%key, error = %e, "archive mirror failed"),
                }
            });
        }

        Some(AssetPayload::Bytes(bytes))
    }

    async fn produce_with_retry(&self, key: &AssetKey) -> Option<Bytes> {
        let Some(producer) = &self.producer else {
            tracing::debug!(%key, "no producer configured");
            return None;
        };

        let mut retries = 0;
        loop {
            let attempt = tokio::time::timeout(self.policy.timeout, producer.produce(key))
                .await
                .unwrap_or(Err(ProduceError::Timeout));

            match attempt {
                Ok(bytes) if bytes.is_empty() => {
                    tracing::warn!(%key, "producer returned an empty asset");
                    return None;
                }
                Ok(bytes) => return Some(bytes),
                Err(ProduceError::WarmingUp { estimated_wait })
                    if retries < self.policy.max_retries =>
                {
                    retries += 1;
                    let wait = self.policy.backoff(estimated_wait);
                    tracing::info!(
                        %key,
                        retry = retries,
                        ?wait,
                        "producer warming up, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, retries, "asset unavailable");
                    return None;
                }
            }
        }
    }
}

//
// ─── PIPELINE ──────────────────────────────────────────────────────────────────
//

/// Get-or-produce for one asset kind: local cache, then the remote archive,
/// then the producer.
///
/// Concurrent acquires of the same key share one production; different keys
/// run independently.
#[derive(Clone)]
pub struct AssetPipeline {
    production: Production,
    stats: Arc<dyn WrongStatRepository>,
    in_flight: Arc<DashMap<String, InFlight>>,
    notifier: AssetNotifier,
}

impl AssetPipeline {
    /// Pipeline with no producer and no remote store; add them with the
    /// `with_*` builders.
    #[must_use]
    pub fn new(kind: AssetKind, policy: AcquirePolicy, clock: Clock, storage: &Storage) -> Self {
        Self {
            production: Production {
                kind,
                policy,
                clock,
                cache: Arc::clone(&storage.assets),
                producer: None,
                remote: None,
            },
            stats: Arc::clone(&storage.wrong_stats),
            in_flight: Arc::new(DashMap::new()),
            notifier: AssetNotifier::default(),
        }
    }

    #[must_use]
    pub fn with_producer(mut self, producer: impl AssetProducer + 'static) -> Self {
        self.production.producer = Some(Arc::new(producer));
        self
    }

    #[must_use]
    pub fn with_remote(mut self, remote: impl RemoteAssetStore + 'static) -> Self {
        self.production.remote = Some(Arc::new(remote));
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: AssetNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn kind(&self) -> AssetKind {
        self.production.kind
    }

    #[must_use]
    pub fn policy(&self) -> &AcquirePolicy {
        &self.production.policy
    }

    #[must_use]
    pub fn notifier(&self) -> &AssetNotifier {
        &self.notifier
    }

    /// Returns the asset for `word`, producing it if needed and allowed.
    ///
    /// `Ok(None)` means no asset is available right now; producer failures
    /// never surface as errors.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::InvalidKey` for words that cannot be keyed and
    /// `AssetError::Storage` when the local store cannot be read.
    pub async fn acquire(
        &self,
        word: &str,
        force: bool,
    ) -> Result<Option<AssetPayload>, AssetError> {
        let key = AssetKey::new(self.kind(), word)?;

        if let Some(found) = self.lookup(&key).await? {
            return Ok(Some(found));
        }

        if !force && !self.meets_threshold(&key).await? {
            tracing::debug!(%key, "below wrong-count threshold, not generating");
            return Ok(None);
        }

        Ok(self.produce_once(key).await)
    }

    /// Runs [`acquire`](Self::acquire) on a spawned task and broadcasts the
    /// result to subscribers when an asset comes back.
    pub fn acquire_in_background(
        &self,
        word: &str,
        force: bool,
    ) -> JoinHandle<Option<AssetPayload>> {
        let pipeline = self.clone();
        let word = word.to_owned();
        tokio::spawn(async move {
            let payload = match pipeline.acquire(&word, force).await {
                Ok(payload) => payload?,
                Err(e) => {
                    tracing::warn!(word = %word, error = %e, "background acquire failed");
                    return None;
                }
            };
            if let Ok(key) = AssetKey::new(pipeline.kind(), &word) {
                pipeline.notifier.notify(AssetReady {
                    kind: pipeline.kind(),
                    key,
                    payload: payload.clone(),
                });
            }
            Some(payload)
        })
    }

    /// True when the asset is in neither store and the word has been missed
    /// often enough to be worth generating.
    ///
    /// # Errors
    ///
    /// Returns `AssetError` for invalid keys or unreadable stores.
    pub async fn should_generate(&self, word: &str) -> Result<bool, AssetError> {
        let key = AssetKey::new(self.kind(), word)?;
        if !self.meets_threshold(&key).await? {
            return Ok(false);
        }
        if self.production.cache.has_asset(self.kind(), key.cache_key()).await? {
            return Ok(false);
        }
        Ok(self.probe_remote(&key).await.is_none())
    }

    /// Asset already stored locally or remotely, without producing anything.
    ///
    /// # Errors
    ///
    /// Returns `AssetError` for invalid keys or unreadable stores.
    pub async fn cached(&self, word: &str) -> Result<Option<AssetPayload>, AssetError> {
        let key = AssetKey::new(self.kind(), word)?;
        self.lookup(&key).await
    }

    /// Counts a wrong answer for `word` and, once the word crosses the
    /// threshold, hands back what is already stored or starts producing it in
    /// the background.
    ///
    /// The stat is recorded even when the word cannot be keyed for this kind.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::Storage` when the stat or cache cannot be accessed.
    pub async fn record_wrong_answer(&self, word: &str) -> Result<WrongAnswerRecord, AssetError> {
        let stat = self
            .stats
            .increment_wrong(word, self.production.clock.now())
            .await?;
        let mut record = WrongAnswerRecord {
            stat,
            asset: None,
            generating: false,
        };

        if record.stat.wrong_count() < self.policy().min_trigger_threshold {
            return Ok(record);
        }

        let key = match AssetKey::new(self.kind(), word) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(word, error = %e, "word cannot be keyed, skipping asset");
                return Ok(record);
            }
        };

        record.asset = self.lookup(&key).await?;
        if record.asset.is_none() {
            self.acquire_in_background(word, false);
            record.generating = true;
        }
        Ok(record)
    }

    /// Starts a background acquire for a word past the threshold that is not
    /// cached locally. Returns whether one was started.
    ///
    /// The remote store is left to the background acquire, which probes it
    /// once and copies a hit into the cache.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::Storage` when the stores cannot be read.
    pub async fn preload_if_needed(&self, word: &str) -> Result<bool, AssetError> {
        let Ok(key) = AssetKey::new(self.kind(), word) else {
            return Ok(false);
        };
        if !self.meets_threshold(&key).await? {
            return Ok(false);
        }
        if self.production.cache.has_asset(self.kind(), key.cache_key()).await? {
            return Ok(false);
        }
        self.acquire_in_background(word, false);
        Ok(true)
    }

    /// Deletes local entries older than `max_age`.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::Storage` when the delete fails.
    pub async fn prune_older_than(&self, max_age: chrono::Duration) -> Result<u64, AssetError> {
        let cutoff = self.production.clock.cutoff(max_age);
        let removed = self
            .production
            .cache
            .delete_assets_before(self.kind(), cutoff)
            .await?;
        tracing::info!(kind = %self.kind(), removed, "pruned asset cache");
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns `AssetError::Storage` when the delete fails.
    pub async fn clear_cache(&self) -> Result<u64, AssetError> {
        Ok(self.production.cache.clear_assets(self.kind()).await?)
    }

    /// # Errors
    ///
    /// Returns `AssetError::Storage` when the count fails.
    pub async fn cached_count(&self) -> Result<u64, AssetError> {
        Ok(self.production.cache.count_assets(self.kind()).await?)
    }

    async fn meets_threshold(&self, key: &AssetKey) -> Result<bool, AssetError> {
        let threshold = self.policy().min_trigger_threshold;
        if threshold == 0 {
            return Ok(true);
        }
        Ok(self.stats.wrong_count(key.word()).await? >= threshold)
    }

    async fn lookup(&self, key: &AssetKey) -> Result<Option<AssetPayload>, AssetError> {
        if let Some(entry) = self
            .production
            .cache
            .get_asset(self.kind(), key.cache_key())
            .await?
        {
            tracing::debug!(%key, "asset cache hit");
            return Ok(Some(AssetPayload::Bytes(Bytes::from(entry.payload))));
        }

        let Some(location) = self.probe_remote(key).await else {
            return Ok(None);
        };
        let Some(remote) = &self.production.remote else {
            return Ok(None);
        };

        let bytes = match remote.fetch(&location).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Ok(Some(AssetPayload::Remote(location))),
            Err(e) => {
                tracing::warn!(%key, error = %e, "archive fetch failed, returning location");
                return Ok(Some(AssetPayload::Remote(location)));
            }
        };

        let entry = AssetCacheEntry::new(
            key.cache_key(),
            bytes.to_vec(),
            self.production.clock.now(),
        );
        if let Err(e) = self.production.cache.put_asset(self.kind(), &entry).await {
            tracing::warn!(%key, error = %e, "failed to copy archived asset into cache");
        }
        tracing::debug!(%key, "archive hit");
        Ok(Some(AssetPayload::Bytes(bytes)))
    }

    async fn probe_remote(&self, key: &AssetKey) -> Option<url::Url> {
        let remote = self.production.remote.as_ref()?;
        match remote.probe(key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(%key, error = %e, "archive probe failed");
                None
            }
        }
    }

    /// Joins the in-flight production for `key` or starts one.
    async fn produce_once(&self, key: AssetKey) -> Option<AssetPayload> {
        let shared = match self.in_flight.entry(key.cache_key().to_owned()) {
            Entry::Occupied(entry) => {
                tracing::debug!(%key, "joining in-flight production");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let production = self.production.clone();
                let in_flight = Arc::clone(&self.in_flight);
                let task = tokio::spawn(async move {
                    let out = production.run(&key).await;
                    in_flight.remove(key.cache_key());
                    out
                });
                let shared = async move {
                    task.await.unwrap_or_else(|e| {
                        tracing::error!(error = %e, "asset production task failed");
                        None
                    })
                }
                .boxed()
                .shared();
                entry.insert(shared.clone());
                shared
            }
        };
        shared.await
    }
}
