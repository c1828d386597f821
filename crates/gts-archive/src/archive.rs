//! Archive run: every month the store spans, oldest first.

use std::path::Path;

use serde::Serialize;
use tracing::{error, info};

use crate::error::Result;
use crate::merge::{merge_partition, MergeOptions, MergeStats};
use crate::range::{find_archive_range, ArchiveRange};
use crate::store::PositionStore;

/// Result of one archive run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    /// `None` when the store held no valid rows.
    pub range: Option<ArchiveRange>,
    pub partitions: Vec<MergeStats>,
}

impl ArchiveSummary {
    pub fn total_new_rows(&self) -> u64 {
        self.partitions.iter().map(|p| p.new_rows).sum()
    }

    pub fn total_skipped_rows(&self) -> u64 {
        self.partitions.iter().map(|p| p.skipped_rows).sum()
    }

    pub fn total_copied_rows(&self) -> u64 {
        self.partitions.iter().map(|p| p.copied_rows).sum()
    }
}

/// Merge every month between the store's earliest and latest rows into the
/// archive under `archive_root`. Stops at the first failing month; months
/// already merged keep their new files.
pub fn archive_partitions(
    store: &PositionStore,
    archive_root: &Path,
    options: &MergeOptions,
) -> Result<ArchiveSummary> {
    let shown = std::path::absolute(archive_root).unwrap_or_else(|_| archive_root.to_path_buf());
    info!(
        store = ?store.path(),
        root = %shown.display(),
        window = ?options.window,
        "archiving vehicle positions"
    );

    let Some(range) = find_archive_range(store)? else {
        info!("store holds no valid rows; nothing to archive");
        return Ok(ArchiveSummary::default());
    };
    info!(start = %range.start, end = %range.end, "archive range");

    let mut summary = ArchiveSummary {
        range: Some(range),
        partitions: Vec::new(),
    };
    for key in range.months() {
        match merge_partition(store, archive_root, key, options) {
            Ok(stats) => summary.partitions.push(stats),
            Err(e) => {
                error!(partition = %key, error = %e, "partition merge failed");
                return Err(e);
            }
        }
    }

    info!(
        partitions = summary.partitions.len(),
        new = summary.total_new_rows(),
        skipped = summary.total_skipped_rows(),
        "archive complete"
    );
    Ok(summary)
}
