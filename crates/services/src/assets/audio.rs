//! Pronunciation audio: dictionary recordings first, synthesized speech as a
//! fallback. Cached locally only.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;
use voca_core::Clock;
use voca_core::model::{AssetKey, AssetKind};

use storage::repository::Storage;

use super::config::AssetConfig;
use super::notify::AssetNotifier;
use super::pipeline::AssetPipeline;
use super::policy::AcquirePolicy;
use super::producer::{AssetProducer, TieredProducer};
use crate::error::ProduceError;

const DICTIONARY_TIMEOUT: Duration = Duration::from_secs(5);

/// Looks the word up in an open pronunciation dictionary and downloads the
/// first recording it lists.
#[derive(Clone)]
pub struct DictionaryProducer {
    client: Client,
    base_url: Url,
}

impl DictionaryProducer {
    #[must_use]
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn entry_url(&self, word: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(word);
        }
        url
    }
}

#[derive(Debug, Deserialize)]
struct DictionaryEntry {
    #[serde(default)]
    phonetics: Vec<Phonetic>,
}

#[derive(Debug, Deserialize)]
struct Phonetic {
    #[serde(default)]
    audio: Option<String>,
}

#[async_trait::async_trait]
impl AssetProducer for DictionaryProducer {
    async fn produce(&self, key: &AssetKey) -> Result<Bytes, ProduceError> {
        let response = self
            .client
            .get(self.entry_url(key.word()))
            .timeout(DICTIONARY_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProduceError::HttpStatus(response.status()));
        }

        let entries: Vec<DictionaryEntry> = response.json().await?;
        let audio = entries
            .iter()
            .flat_map(|entry| &entry.phonetics)
            .filter_map(|phonetic| phonetic.audio.as_deref())
            .find(|audio| !audio.trim().is_empty())
            .ok_or(ProduceError::Empty)?;
        // Protocol-relative and absolute links both resolve against the base.
        let audio_url = self.base_url.join(audio.trim()).map_err(|_| ProduceError::Empty)?;

        let response = self
            .client
            .get(audio_url)
            .timeout(DICTIONARY_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProduceError::HttpStatus(response.status()));
        }
        Ok(response.bytes().await?)
    }
}

/// Paid text-to-speech behind a proxy that takes `{ "text": ... }`.
#[derive(Clone)]
pub struct SpeechProducer {
    client: Client,
    endpoint: Url,
}

impl SpeechProducer {
    #[must_use]
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

#[async_trait::async_trait]
impl AssetProducer for SpeechProducer {
    async fn produce(&self, key: &AssetKey) -> Result<Bytes, ProduceError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&SpeechRequest { text: key.word() })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProduceError::HttpStatus(response.status()));
        }
        Ok(response.bytes().await?)
    }
}

/// Audio pipeline with whichever tiers `config` enables.
#[must_use]
pub fn audio_pipeline(
    config: &AssetConfig,
    client: &Client,
    clock: Clock,
    storage: &Storage,
    notifier: AssetNotifier,
) -> AssetPipeline {
    let mut tiers = TieredProducer::new();
    if let Some(url) = &config.dictionary_url {
        tiers = tiers.with_tier("dictionary", DictionaryProducer::new(client.clone(), url.clone()));
    }
    if let Some(url) = &config.speech_url {
        tiers = tiers.with_tier("speech", SpeechProducer::new(client.clone(), url.clone()));
    }

    let pipeline = AssetPipeline::new(AssetKind::Audio, AcquirePolicy::audio(), clock, storage)
        .with_notifier(notifier);
    if tiers.is_empty() {
        pipeline
    } else {
        pipeline.with_producer(tiers)
    }
}
