mod asset;
mod checkpoint;
mod deck;
mod word;
mod wrong_stat;

pub use asset::{
    AUDIO_KEY_MAX_LEN, AssetCacheEntry, AssetKey, AssetKind, IMAGE_KEY_MAX_LEN, KeyError,
};
pub use checkpoint::SessionCheckpoint;
pub use deck::{Deck, DeckError};
pub use word::{WordPair, WordPairError, fold_word};
pub use wrong_stat::WrongStat;
