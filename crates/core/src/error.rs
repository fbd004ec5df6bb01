use thiserror::Error;

use crate::model::{DeckError, KeyError, WordPairError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    WordPair(#[from] WordPairError),
    #[error(transparent)]
    AssetKey(#[from] KeyError),
}
