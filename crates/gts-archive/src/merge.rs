//! Single-partition merge.
//!
//! Widens one monthly partition with rows that arrived in the store since
//! it was last written:
//!
//! 1. Open the existing partition file, if any, and derive per-vehicle
//!    watermarks from it.
//! 2. Copy its rows unchanged into a staging file next to it.
//! 3. Query the store from the oldest watermark (or the start of the month)
//!    to the end of the month and append every row newer than its
//!    vehicle's watermark.
//! 4. Finish the staging file and rename it over the partition.
//!
//! The existing file is never modified in place; until the final rename it
//! stays readable and complete.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gts_common::PartitionKey;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::buffer::RowGroupBuffer;
use crate::error::{ArchiveError, Result};
use crate::reader::PartitionReader;
use crate::store::PositionStore;
use crate::watermark::Watermarks;
use crate::writer::{PartitionSink, PartitionWriter, WriterConfig};
use crate::{DEFAULT_READ_BATCH_SIZE, DEFAULT_ROW_GROUP_SIZE, PARTITION_FILE_NAME};

/// Where the store rescan for a partition begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryWindow {
    /// Oldest per-vehicle watermark, or the start of the month when the
    /// partition is new. Cheap on repeated runs, but a vehicle that first
    /// appears in a partition with rows older than every existing watermark
    /// has those rows left out.
    #[default]
    MinWatermark,
    /// Always the start of the month. Rescans the whole month every run.
    PeriodStart,
}

/// Tuning for a partition merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    pub window: QueryWindow,
    pub row_group_size: usize,
    pub read_batch_size: usize,
    pub zstd_level: i32,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            window: QueryWindow::default(),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
            zstd_level: WriterConfig::default().zstd_level,
        }
    }
}

impl MergeOptions {
    fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            zstd_level: self.zstd_level,
            ..WriterConfig::default()
        }
        .with_row_group_size(self.row_group_size)
    }
}

/// Outcome of one partition merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub partition: PartitionKey,
    pub path: PathBuf,
    /// True when no partition file existed before this merge.
    pub created: bool,
    pub existing_rows: u64,
    pub copied_rows: u64,
    /// Vehicles with a watermark from the existing file.
    pub vehicles: usize,
    pub query_start: DateTime<Utc>,
    pub query_end: DateTime<Utc>,
    pub new_rows: u64,
    pub skipped_rows: u64,
}

impl MergeStats {
    pub fn total_rows(&self) -> u64 {
        self.copied_rows + self.new_rows
    }
}

/// Final location of a partition file under `archive_root`.
pub fn partition_path(archive_root: &Path, key: PartitionKey) -> PathBuf {
    archive_root
        .join(key.relative_dir())
        .join(PARTITION_FILE_NAME)
}

/// Staging file used while an existing partition is being rewritten.
pub fn staging_path(final_path: &Path) -> PathBuf {
    let mut staged = final_path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Merge newly stored rows for `key` into its partition file.
pub fn merge_partition(
    store: &PositionStore,
    archive_root: &Path,
    key: PartitionKey,
    options: &MergeOptions,
) -> Result<MergeStats> {
    let config = options.writer_config();
    merge_with(store, archive_root, key, options, |path| {
        PartitionWriter::create(path, &config)
    })
}

/// Merge through the sink that `create` opens on the staging path.
fn merge_with<W, F>(
    store: &PositionStore,
    archive_root: &Path,
    key: PartitionKey,
    options: &MergeOptions,
    create: F,
) -> Result<MergeStats>
where
    W: PartitionSink,
    F: FnOnce(&Path) -> Result<W>,
{
    let final_path = partition_path(archive_root, key);
    if let Some(dir) = final_path.parent() {
        fs::create_dir_all(dir).map_err(ArchiveError::io(dir))?;
    }

    let existing = PartitionReader::open(&final_path)?
        .map(|reader| reader.with_batch_size(options.read_batch_size));

    let (watermarks, staging) = match &existing {
        Some(reader) => {
            info!(partition = %key, rows = reader.num_rows(), "found existing partition file");
            let watermarks = reader.scan_watermarks()?;
            info!(partition = %key, vehicles = watermarks.len(), "found watermarks");
            (watermarks, staging_path(&final_path))
        }
        None => (Watermarks::new(), final_path.clone()),
    };

    let staged = create(&staging).and_then(|writer| {
        stage_partition(store, key, writer, existing.as_ref(), watermarks, options)
    });
    // Release the old file before replacing it.
    drop(existing);

    let stats = match staged {
        Ok(stats) => stats,
        Err(e) => {
            discard(&staging);
            return Err(e);
        }
    };

    if staging != final_path {
        if let Err(e) = fs::rename(&staging, &final_path) {
            discard(&staging);
            return Err(ArchiveError::io(&final_path)(e));
        }
    }

    info!(
        partition = %key,
        new = stats.new_rows,
        skipped = stats.skipped_rows,
        total = stats.total_rows(),
        "partition written"
    );
    Ok(MergeStats {
        path: final_path,
        ..stats
    })
}

fn stage_partition<W: PartitionSink>(
    store: &PositionStore,
    key: PartitionKey,
    mut writer: W,
    existing: Option<&PartitionReader>,
    mut watermarks: Watermarks,
    options: &MergeOptions,
) -> Result<MergeStats> {
    let existing_rows = existing.map(PartitionReader::num_rows).unwrap_or(0);
    let mut copied_rows = 0;
    if let Some(reader) = existing {
        copied_rows = writer.copy_from(reader)?;
        info!(partition = %key, rows = copied_rows, "copied rows from existing file");
        if copied_rows != existing_rows {
            return Err(ArchiveError::RowCountMismatch {
                context: format!("{key}: copy of {}", reader.path().display()),
                expected: existing_rows,
                actual: copied_rows,
            });
        }
    }

    let vehicles = watermarks.len();
    let query_start = match options.window {
        QueryWindow::MinWatermark => watermarks
            .min_watermark()
            .unwrap_or_else(|| key.period_start()),
        QueryWindow::PeriodStart => key.period_start(),
    };
    let query_end = key.period_end();
    info!(partition = %key, from = %query_start, to = %query_end, "querying store");

    let mut buffer = RowGroupBuffer::new(options.row_group_size);
    let mut new_rows = 0u64;
    let mut skipped_rows = 0u64;
    store.for_each_in_window(query_start.timestamp(), query_end.timestamp(), |vp| {
        if !key.contains(vp.timestamp) {
            return Err(ArchiveError::Decode(format!(
                "store returned {} outside {key}",
                vp.timestamp
            )));
        }
        // Already represented in the copied rows.
        if watermarks.is_superseded(&vp.vehicle_id, vp.timestamp) {
            skipped_rows += 1;
            return Ok(());
        }
        watermarks.observe(&vp.vehicle_id, vp.timestamp);
        new_rows += 1;
        buffer.push(vp, &mut writer)
    })?;

    // Each flush is count-checked by the buffer.
    buffer.finish(&mut writer)?;

    let written = writer.finish()?;
    if written != copied_rows + new_rows {
        return Err(ArchiveError::RowCountMismatch {
            context: format!("{key}: partition total"),
            expected: copied_rows + new_rows,
            actual: written,
        });
    }

    Ok(MergeStats {
        partition: key,
        // Set to the final location by the caller.
        path: PathBuf::new(),
        created: existing.is_none(),
        existing_rows,
        copied_rows,
        vehicles,
        query_start,
        query_end,
        new_rows,
        skipped_rows,
    })
}

/// Best-effort removal of a staging file left by a failed merge.
fn discard(staging: &Path) {
    match fs::remove_file(staging) {
        Ok(()) => debug!(path = %staging.display(), "removed staging file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %staging.display(), error = %e, "failed to remove staging file"),
    }
}
