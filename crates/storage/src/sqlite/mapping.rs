use voca_core::model::{AssetKind, WordPair};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn position_to_i64(position: usize) -> Result<i64, StorageError> {
    i64::try_from(position).map_err(|_| StorageError::Serialization("position overflow".into()))
}

/// Partition table for an asset kind.
pub(crate) fn asset_table(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Audio => "audio_cache",
        AssetKind::Image => "image_cache",
    }
}

pub(crate) fn word_pair_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<WordPair, StorageError> {
    use sqlx::Row;

    WordPair::new(
        row.try_get::<String, _>("word").map_err(ser)?,
        row.try_get::<String, _>("meaning").map_err(ser)?,
    )
    .map_err(ser)
}
