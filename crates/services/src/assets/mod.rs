//! Get-or-produce for binary assets attached to words.

mod audio;
mod config;
mod image;
mod notify;
mod pipeline;
mod policy;
mod producer;

pub use audio::{DictionaryProducer, SpeechProducer, audio_pipeline};
pub use config::{ArchiveConfig, AssetConfig, DEFAULT_DICTIONARY_URL};
pub use image::{ArchiveStore, ImageProducer, image_pipeline};
pub use notify::{AssetNotifier, AssetPayload, AssetReady};
pub use pipeline::{AssetPipeline, WrongAnswerRecord};
pub use policy::AcquirePolicy;
pub use producer::{AssetProducer, RemoteAssetStore, TieredProducer};
