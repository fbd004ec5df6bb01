use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker written on quit-and-save. Only the deck selection survives;
/// queue position is not restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    pub deck_name: String,
    pub saved_at: DateTime<Utc>,
}

impl SessionCheckpoint {
    #[must_use]
    pub fn new(deck_name: impl Into<String>, saved_at: DateTime<Utc>) -> Self {
        Self {
            deck_name: deck_name.into(),
            saved_at,
        }
    }
}
