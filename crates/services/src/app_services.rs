use std::sync::Arc;

use reqwest::Client;
use storage::repository::Storage;

use crate::Clock;
use crate::assets::{AssetConfig, AssetNotifier, AssetPipeline, audio_pipeline, image_pipeline};
use crate::deck_service::DeckService;
use crate::error::{AppServicesError, AssetError};
use crate::sessions::SessionLoopService;

/// Everything the front end needs, built once from a store and a config.
#[derive(Clone)]
pub struct AppServices {
    config: AssetConfig,
    notifier: AssetNotifier,
    audio: AssetPipeline,
    images: AssetPipeline,
    deck_service: Arc<DeckService>,
    session_loop: Arc<SessionLoopService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or the HTTP client
    /// setup fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: AssetConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::with_storage(&storage, clock, config)
    }

    /// Build services over an arbitrary store, typically `Storage::in_memory()`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::HttpClient` if the HTTP client cannot be built.
    pub fn with_storage(
        storage: &Storage,
        clock: Clock,
        config: AssetConfig,
    ) -> Result<Self, AppServicesError> {
        let client = Client::builder()
            .user_agent(concat!("voca/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let notifier = AssetNotifier::default();

        let audio = audio_pipeline(&config, &client, clock, storage, notifier.clone());
        let images = image_pipeline(&config, &client, clock, storage, notifier.clone());

        let deck_service = Arc::new(DeckService::new(
            clock,
            Arc::clone(&storage.decks),
            Arc::clone(&storage.wrong_log),
            Arc::clone(&storage.wrong_stats),
        ));
        let session_loop = Arc::new(
            SessionLoopService::new(
                clock,
                Arc::clone(&storage.decks),
                Arc::clone(&storage.wrong_log),
                Arc::clone(&storage.checkpoints),
                images.clone(),
            )
            .with_audio(audio.clone()),
        );

        Ok(Self {
            config,
            notifier,
            audio,
            images,
            deck_service,
            session_loop,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    /// Shared channel for late-arriving audio and images.
    #[must_use]
    pub fn notifier(&self) -> &AssetNotifier {
        &self.notifier
    }

    #[must_use]
    pub fn audio(&self) -> &AssetPipeline {
        &self.audio
    }

    #[must_use]
    pub fn images(&self) -> &AssetPipeline {
        &self.images
    }

    #[must_use]
    pub fn deck_service(&self) -> Arc<DeckService> {
        Arc::clone(&self.deck_service)
    }

    #[must_use]
    pub fn session_loop(&self) -> Arc<SessionLoopService> {
        Arc::clone(&self.session_loop)
    }

    /// Drop cached audio older than the configured age.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::Storage` if the delete fails.
    pub async fn prune_audio(&self) -> Result<u64, AssetError> {
        self.audio.prune_older_than(self.config.audio_max_age()).await
    }
}
