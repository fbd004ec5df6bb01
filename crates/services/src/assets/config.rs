use std::env;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_DICTIONARY_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en";
pub const DEFAULT_IMAGE_MIN_WRONG: u32 = 2;
pub const DEFAULT_AUDIO_MAX_AGE_DAYS: u32 = 30;

/// Where the archive proxy accepts commits and where committed images can be
/// read back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub commit_url: Url,
    pub raw_base: Url,
}

/// External endpoints and thresholds for both asset kinds.
///
/// Every endpoint is optional; a missing one disables that producer and the
/// pipeline degrades to "no asset".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetConfig {
    pub dictionary_url: Option<Url>,
    pub speech_url: Option<Url>,
    pub image_url: Option<Url>,
    pub archive: Option<ArchiveConfig>,
    pub image_min_wrong: u32,
    pub audio_max_age_days: u32,
}

impl AssetConfig {
    /// No external services at all. Useful for tests and offline runs.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            dictionary_url: None,
            speech_url: None,
            image_url: None,
            archive: None,
            image_min_wrong: DEFAULT_IMAGE_MIN_WRONG,
            audio_max_age_days: DEFAULT_AUDIO_MAX_AGE_DAYS,
        }
    }

    /// Reads the `VOCA_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let dictionary_url = match lookup("VOCA_DICTIONARY_URL") {
            // Explicitly empty turns the dictionary tier off.
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(parse_url("VOCA_DICTIONARY_URL", raw.trim())?),
            None => Some(parse_url("VOCA_DICTIONARY_URL", DEFAULT_DICTIONARY_URL)?),
        };
        let speech_url = var("VOCA_SPEECH_URL")
            .map(|raw| parse_url("VOCA_SPEECH_URL", &raw))
            .transpose()?;
        let image_url = var("VOCA_IMAGE_URL")
            .map(|raw| parse_url("VOCA_IMAGE_URL", &raw))
            .transpose()?;

        let archive = match (var("VOCA_ARCHIVE_URL"), var("VOCA_ARCHIVE_RAW_BASE")) {
            (Some(commit), Some(raw_base)) => Some(ArchiveConfig {
                commit_url: parse_url("VOCA_ARCHIVE_URL", &commit)?,
                raw_base: parse_url("VOCA_ARCHIVE_RAW_BASE", &raw_base)?,
            }),
            _ => None,
        };

        let image_min_wrong = var("VOCA_IMAGE_MIN_WRONG")
            .map(|raw| parse_number("VOCA_IMAGE_MIN_WRONG", raw))
            .transpose()?
            .unwrap_or(DEFAULT_IMAGE_MIN_WRONG);
        let audio_max_age_days = var("VOCA_AUDIO_MAX_AGE_DAYS")
            .map(|raw| parse_number("VOCA_AUDIO_MAX_AGE_DAYS", raw))
            .transpose()?
            .unwrap_or(DEFAULT_AUDIO_MAX_AGE_DAYS);

        Ok(Self {
            dictionary_url,
            speech_url,
            image_url,
            archive,
            image_min_wrong,
            audio_max_age_days,
        })
    }

    #[must_use]
    pub fn audio_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.audio_max_age_days))
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { var, source })
}

fn parse_number(var: &'static str, raw: String) -> Result<u32, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::InvalidNumber { var, raw })
}
