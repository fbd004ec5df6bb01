use bytes::Bytes;
use tokio::sync::broadcast;
use url::Url;
use voca_core::model::{AssetKey, AssetKind, fold_word};

const DEFAULT_CAPACITY: usize = 32;

/// What an acquire hands back: the bytes themselves, or where to find them
/// when only the remote archive has them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPayload {
    Bytes(Bytes),
    Remote(Url),
}

impl AssetPayload {
    #[must_use]
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            AssetPayload::Bytes(bytes) => Some(bytes),
            AssetPayload::Remote(_) => None,
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            AssetPayload::Bytes(bytes) => format!("{} bytes", bytes.len()),
            AssetPayload::Remote(url) => url.to_string(),
        }
    }
}

/// Sent when a background acquire finishes with an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReady {
    pub kind: AssetKind,
    pub key: AssetKey,
    pub payload: AssetPayload,
}

impl AssetReady {
    /// True when this notification belongs to the question showing `word`.
    /// Listeners drop anything else.
    #[must_use]
    pub fn is_for(&self, word: &str) -> bool {
        self.key.word() == fold_word(word)
    }
}

/// Fan-out of [`AssetReady`] events to any number of listeners.
#[derive(Debug, Clone)]
pub struct AssetNotifier {
    tx: broadcast::Sender<AssetReady>,
}

impl AssetNotifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AssetReady> {
        self.tx.subscribe()
    }

    pub fn notify(&self, ready: AssetReady) {
        let key = ready.key.clone();
        if self.tx.send(ready).is_err() {
            tracing::debug!(%key, "asset ready with no listeners");
        }
    }
}

impl Default for AssetNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(word: &str) -> AssetReady {
        AssetReady {
            kind: AssetKind::Image,
            key: AssetKey::new(AssetKind::Image, word).unwrap(),
            payload: AssetPayload::Bytes(Bytes::from_static(b"png")),
        }
    }

    #[test]
    fn matches_displayed_word_case_insensitively() {
        let event = ready("Ice Cream");
        assert!(event.is_for(" ice cream"));
        assert!(!event.is_for("ice_cream"));
        assert!(!event.is_for("dog"));
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let notifier = AssetNotifier::default();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        notifier.notify(ready("cat"));

        assert!(a.recv().await.unwrap().is_for("cat"));
        assert!(b.recv().await.unwrap().is_for("cat"));
    }

    #[test]
    fn notifying_without_listeners_is_fine() {
        AssetNotifier::new(0).notify(ready("cat"));
    }
}
