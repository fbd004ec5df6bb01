#![forbid(unsafe_code)]

pub mod app_services;
pub mod assets;
pub mod deck_service;
pub mod error;
pub mod sessions;

pub use voca_core::Clock;

pub use app_services::AppServices;
pub use deck_service::DeckService;
pub use error::{
    AppServicesError, AssetError, ConfigError, DeckServiceError, ProduceError, RemoteStoreError,
    SessionError,
};
pub use sessions::{QuizSession, SessionEngine, SessionLoopService, SessionMode};
