//! Archive range discovery.

use gts_common::PartitionKey;
use serde::Serialize;

use crate::error::{ArchiveError, Result};
use crate::store::PositionStore;

/// Inclusive span of monthly partitions that hold data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveRange {
    pub start: PartitionKey,
    pub end: PartitionKey,
}

impl ArchiveRange {
    /// Every month from `start` through `end`, ascending.
    pub fn months(&self) -> impl Iterator<Item = PartitionKey> {
        self.start.months_through(self.end)
    }
}

/// Partitions spanned by the valid rows of `store`, or `None` when it has none.
pub fn find_archive_range(store: &PositionStore) -> Result<Option<ArchiveRange>> {
    let Some((min, max)) = store.timestamp_bounds()? else {
        return Ok(None);
    };
    let start = PartitionKey::from_unix(min)
        .map_err(|e| ArchiveError::Discovery(format!("earliest timestamp {min}: {e}")))?;
    let end = PartitionKey::from_unix(max)
        .map_err(|e| ArchiveError::Discovery(format!("latest timestamp {max}: {e}")))?;
    Ok(Some(ArchiveRange { start, end }))
}
