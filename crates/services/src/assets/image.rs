//! Mnemonic images: generated on demand for words the learner keeps missing,
//! archived remotely so other clients can reuse them.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;
use voca_core::Clock;
use voca_core::model::{AssetKey, AssetKind};

use storage::repository::Storage;

use super::config::{ArchiveConfig, AssetConfig};
use super::notify::AssetNotifier;
use super::pipeline::AssetPipeline;
use super::policy::AcquirePolicy;
use super::producer::{AssetProducer, RemoteAssetStore};
use crate::error::{ProduceError, RemoteStoreError};

/// Image generation proxy taking `{ "word": ... }`.
///
/// A `503` carrying `{ "retry": true, "estimated_time": secs }` means the
/// model is still loading.
#[derive(Clone)]
pub struct ImageProducer {
    client: Client,
    endpoint: Url,
}

impl ImageProducer {
    #[must_use]
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    word: &'a str,
}

#[derive(Debug, Deserialize)]
struct WarmingUpBody {
    #[serde(default)]
    retry: bool,
    #[serde(default)]
    estimated_time: Option<f64>,
}

fn estimated_wait(secs: Option<f64>) -> Option<Duration> {
    secs.filter(|s| *s > 0.0)
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
}

#[async_trait::async_trait]
impl AssetProducer for ImageProducer {
    async fn produce(&self, key: &AssetKey) -> Result<Bytes, ProduceError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ImageRequest { word: key.word() })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            // An unparseable 503 is still treated as warm-up.
            let body = response.json::<WarmingUpBody>().await.ok();
            return match body {
                Some(body) if !body.retry => Err(ProduceError::HttpStatus(status)),
                body => Err(ProduceError::WarmingUp {
                    estimated_wait: estimated_wait(body.and_then(|b| b.estimated_time)),
                }),
            };
        }
        if !status.is_success() {
            return Err(ProduceError::HttpStatus(status));
        }
        Ok(response.bytes().await?)
    }
}

/// Version-controlled image archive: committed through a proxy, read back
/// from a public raw-file URL.
#[derive(Clone)]
pub struct ArchiveStore {
    client: Client,
    commit_url: Url,
    raw_base: Url,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitRequest<'a> {
    word: &'a str,
    image_base64: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ArchiveStore {
    #[must_use]
    pub fn new(client: Client, config: &ArchiveConfig) -> Self {
        Self {
            client,
            commit_url: config.commit_url.clone(),
            raw_base: config.raw_base.clone(),
        }
    }

    /// Public location of the archived image for `key`.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the joined URL is invalid.
    pub fn location(&self, key: &AssetKey) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "{}/{}.png",
            self.raw_base.as_str().trim_end_matches('/'),
            key.cache_key()
        ))
    }
}

#[async_trait::async_trait]
impl RemoteAssetStore for ArchiveStore {
    async fn probe(&self, key: &AssetKey) -> Result<Option<Url>, RemoteStoreError> {
        let location = self.location(key)?;
        let response = self.client.head(location.clone()).send().await?;
        match response.status() {
            status if status.is_success() => Ok(Some(location)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(RemoteStoreError::HttpStatus(status)),
        }
    }

    async fn fetch(&self, location: &Url) -> Result<Bytes, RemoteStoreError> {
        let response = self.client.get(location.clone()).send().await?;
        if !response.status().is_success() {
            return Err(RemoteStoreError::HttpStatus(response.status()));
        }
        Ok(response.bytes().await?)
    }

    async fn publish(&self, key: &AssetKey, payload: &Bytes) -> Result<Url, RemoteStoreError> {
        let response = self
            .client
            .post(self.commit_url.clone())
            .json(&CommitRequest {
                word: key.word(),
                image_base64: STANDARD.encode(payload),
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteStoreError::HttpStatus(response.status()));
        }

        let body: CommitResponse = response.json().await?;
        match (body.success, body.url) {
            (true, Some(url)) => Ok(Url::parse(&url)?),
            (true, None) => Ok(self.location(key)?),
            (false, _) => Err(RemoteStoreError::Rejected(
                body.error.unwrap_or_else(|| "no reason given".into()),
            )),
        }
    }
}

/// Image pipeline gated on `config.image_min_wrong`, with the archive when
/// configured.
#[must_use]
pub fn image_pipeline(
    config: &AssetConfig,
    client: &Client,
    clock: Clock,
    storage: &Storage,
    notifier: AssetNotifier,
) -> AssetPipeline {
    let policy = AcquirePolicy::image().with_threshold(config.image_min_wrong);
    let mut pipeline =
        AssetPipeline::new(AssetKind::Image, policy, clock, storage).with_notifier(notifier);
    if let Some(url) = &config.image_url {
        pipeline = pipeline.with_producer(ImageProducer::new(client.clone(), url.clone()));
    }
    if let Some(archive) = &config.archive {
        pipeline = pipeline.with_remote(ArchiveStore::new(client.clone(), archive));
    }
    pipeline
}
