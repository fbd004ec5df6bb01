use bytes::Bytes;
use url::Url;
use voca_core::model::AssetKey;

use crate::error::{ProduceError, RemoteStoreError};

/// Something that can create an asset's bytes from scratch, usually an HTTP
/// generation service.
#[async_trait::async_trait]
pub trait AssetProducer: Send + Sync {
    /// Produce the asset for `key`.
    ///
    /// # Errors
    ///
    /// Returns `ProduceError::WarmingUp` when the caller should back off and
    /// retry; any other variant is final for this attempt.
    async fn produce(&self, key: &AssetKey) -> Result<Bytes, ProduceError>;
}

/// Durable store that outlives the local cache and is shared between clients.
#[async_trait::async_trait]
pub trait RemoteAssetStore: Send + Sync {
    /// Cheap existence check. Returns the public location when present.
    ///
    /// # Errors
    ///
    /// Returns `RemoteStoreError` when the store cannot be reached.
    async fn probe(&self, key: &AssetKey) -> Result<Option<Url>, RemoteStoreError>;

    /// Download an asset previously reported by [`probe`](Self::probe).
    ///
    /// # Errors
    ///
    /// Returns `RemoteStoreError` when the download fails.
    async fn fetch(&self, location: &Url) -> Result<Bytes, RemoteStoreError>;

    /// Create or update the stored asset, returning its public location.
    ///
    /// # Errors
    ///
    /// Returns `RemoteStoreError` when the upload is refused or fails.
    async fn publish(&self, key: &AssetKey, payload: &Bytes) -> Result<Url, RemoteStoreError>;
}

/// Tries each producer in order and returns the first non-empty result.
///
/// Used for audio: the free dictionary goes first and the paid speech
/// service only runs when the dictionary has nothing.
pub struct TieredProducer {
    tiers: Vec<(&'static str, Box<dyn AssetProducer>)>,
}

impl TieredProducer {
    #[must_use]
    pub fn new() -> Self {
        Self { tiers: Vec::new() }
    }

    #[must_use]
    pub fn with_tier(mut self, name: &'static str, producer: impl AssetProducer + 'static) -> Self {
        self.tiers.push((name, Box::new(producer)));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl Default for TieredProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AssetProducer for TieredProducer {
    async fn produce(&self, key: &AssetKey) -> Result<Bytes, ProduceError> {
        let mut last = ProduceError::Empty;
        for (name, tier) in &self.tiers {
            match tier.produce(key).await {
                Ok(bytes) if !bytes.is_empty() => {
                    tracing::debug!(%key, tier = name, "tier produced asset");
                    return Ok(bytes);
                }
                Ok(_) => last = ProduceError::Empty,
                Err(e) => {
                    tracing::debug!(%key, tier = name, error = %e, "tier failed, falling through");
                    last = e;
                }
            }
        }
        Err(last)
    }
}
