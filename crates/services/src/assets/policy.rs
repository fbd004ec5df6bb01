use std::time::Duration;

/// Knobs for one asset kind's acquire path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquirePolicy {
    /// Persisted wrong count a word needs before generation is attempted.
    pub min_trigger_threshold: u32,
    /// Upper bound on a single producer call.
    pub timeout: Duration,
    /// Extra attempts allowed while the producer reports it is warming up.
    pub max_retries: u32,
    /// Ceiling on the wait between warm-up retries.
    pub retry_delay: Duration,
}

impl AcquirePolicy {
    /// Image generation: only for words missed at least twice, generous timeout
    /// because the model may need to cold start.
    #[must_use]
    pub const fn image() -> Self {
        Self {
            min_trigger_threshold: 2,
            timeout: Duration::from_secs(35),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Pronunciation audio: always worth fetching, no warm-up retries.
    #[must_use]
    pub const fn audio() -> Self {
        Self {
            min_trigger_threshold: 0,
            timeout: Duration::from_secs(10),
            max_retries: 0,
            retry_delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, min_trigger_threshold: u32) -> Self {
        self.min_trigger_threshold = min_trigger_threshold;
        self
    }

    /// Wait before the next warm-up retry: the service's hint, capped at
    /// `retry_delay`.
    #[must_use]
    pub fn backoff(&self, suggested: Option<Duration>) -> Duration {
        suggested.unwrap_or(self.retry_delay).min(self.retry_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped_by_retry_delay() {
        let policy = AcquirePolicy::image();
        assert_eq!(policy.backoff(None), Duration::from_secs(5));
        assert_eq!(
            policy.backoff(Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.backoff(Some(Duration::from_secs(60))),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn audio_is_never_gated() {
        assert_eq!(AcquirePolicy::audio().min_trigger_threshold, 0);
        assert_eq!(AcquirePolicy::image().with_threshold(4).min_trigger_threshold, 4);
    }
}
