//! Parquet partition writer.
//!
//! Wraps an [`ArrowWriter`] over a staging file. String columns keep the
//! default dictionary encoding, timestamp columns use delta encoding, and
//! the whole file is ZSTD-compressed.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use gts_common::VehiclePosition;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, Encoding, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::schema::types::ColumnPath;
use tracing::debug;

use crate::buffer::BatchSink;
use crate::error::{ArchiveError, Result};
use crate::reader::PartitionReader;
use crate::schema::{records_to_batch, vehicle_positions_schema, COL_START_TIME, COL_TIMESTAMP};
use crate::DEFAULT_ROW_GROUP_SIZE;

/// Writer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Maximum rows per Parquet row group.
    pub max_row_group_size: usize,

    /// ZSTD compression level.
    pub zstd_level: i32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_row_group_size: DEFAULT_ROW_GROUP_SIZE,
            zstd_level: 3,
        }
    }
}

impl WriterConfig {
    /// Set the maximum row group size.
    pub fn with_row_group_size(mut self, rows: usize) -> Self {
        self.max_row_group_size = rows.max(1);
        self
    }

    fn properties(&self) -> Result<WriterProperties> {
        let mut builder = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::try_new(self.zstd_level)?))
            .set_max_row_group_size(self.max_row_group_size);
        // Dictionary encoding takes precedence over the column encoding, so it
        // has to be switched off for delta encoding to apply.
        for name in [COL_TIMESTAMP, COL_START_TIME] {
            builder = builder
                .set_column_dictionary_enabled(ColumnPath::from(name), false)
                .set_column_encoding(ColumnPath::from(name), Encoding::DELTA_BINARY_PACKED);
        }
        Ok(builder.build())
    }
}

/// Destination of a partition merge: copied batches, buffered records, then
/// one finishing step.
pub trait PartitionSink: BatchSink {
    /// Write an already-encoded batch. Returns the number of rows written.
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<usize>;

    /// Complete the output. Returns the total rows it holds.
    fn finish(self) -> Result<u64>
    where
        Self: Sized;

    /// Stream every row of `reader` into this output unchanged.
    fn copy_from(&mut self, reader: &PartitionReader) -> Result<u64> {
        let mut copied = 0u64;
        for batch in reader.batches()? {
            copied += self.write_batch(&batch?)? as u64;
        }
        Ok(copied)
    }
}

/// Streaming writer for one partition file.
pub struct PartitionWriter {
    path: PathBuf,
    writer: ArrowWriter<File>,
    sync_handle: File,
    rows_written: u64,
}

impl std::fmt::Debug for PartitionWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionWriter")
            .field("path", &self.path)
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

impl PartitionWriter {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path, config: &WriterConfig) -> Result<Self> {
        let file = File::create(path).map_err(ArchiveError::io(path))?;
        let sync_handle = file.try_clone().map_err(ArchiveError::io(path))?;
        let writer =
            ArrowWriter::try_new(file, vehicle_positions_schema(), Some(config.properties()?))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            sync_handle,
            rows_written: 0,
        })
    }

    /// Encode and write records. Returns the number of rows written.
    pub fn write_records(&mut self, records: &[VehiclePosition]) -> Result<usize> {
        let batch = records_to_batch(records)?;
        self.write_batch(&batch)
    }

    /// Write an already-encoded batch. Returns the number of rows written.
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<usize> {
        self.writer.write(batch)?;
        let rows = batch.num_rows();
        self.rows_written += rows as u64;
        Ok(rows)
    }

    /// Flush buffered rows, write the footer and sync the file to disk.
    pub fn finish(self) -> Result<u64> {
        let metadata = self.writer.close()?;
        let in_footer = u64::try_from(metadata.num_rows).unwrap_or(0);
        if in_footer != self.rows_written {
            return Err(ArchiveError::RowCountMismatch {
                context: format!("{} footer", self.path.display()),
                expected: self.rows_written,
                actual: in_footer,
            });
        }
        self.sync_handle
            .sync_all()
            .map_err(ArchiveError::io(&self.path))?;
        debug!(path = %self.path.display(), rows = self.rows_written, "partition file finished");
        Ok(self.rows_written)
    }
}

impl BatchSink for PartitionWriter {
    fn write_records(&mut self, records: &[VehiclePosition]) -> Result<usize> {
        PartitionWriter::write_records(self, records)
    }
}

impl PartitionSink for PartitionWriter {
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<usize> {
        PartitionWriter::write_batch(self, batch)
    }

    fn finish(self) -> Result<u64> {
        PartitionWriter::finish(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use tempfile::TempDir;

    fn records(n: usize) -> Vec<VehiclePosition> {
        (0..n)
            .map(|i| {
                let ts = DateTime::from_timestamp(1_706_745_600 + i as i64, 0).unwrap();
                let mut vp = VehiclePosition::new(format!("V{}", i % 3), ts);
                vp.route_id = "R1".to_string();
                vp
            })
            .collect()
    }

    #[test]
    fn writes_row_groups_of_configured_size() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.parquet");
        let config = WriterConfig::default().with_row_group_size(4);

        let mut writer = PartitionWriter::create(&path, &config).unwrap();
        assert_eq!(writer.write_records(&records(10)).unwrap(), 10);
        assert_eq!(writer.finish().unwrap(), 10);

        let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
        let meta = reader.metadata();
        assert_eq!(meta.file_metadata().num_rows(), 10);
        assert_eq!(meta.num_row_groups(), 3);
    }

    #[test]
    fn uses_zstd_and_delta_timestamps() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.parquet");
        let mut writer = PartitionWriter::create(&path, &WriterConfig::default()).unwrap();
        writer.write_records(&records(50)).unwrap();
        writer.finish().unwrap();

        let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
        let row_group = reader.metadata().row_group(0);
        for column in row_group.columns() {
            assert!(matches!(column.compression(), Compression::ZSTD(_)));
            if column.column_path().string() == COL_TIMESTAMP {
                assert!(column.encodings().contains(&Encoding::DELTA_BINARY_PACKED));
            }
            if column.column_path().string() == "vehicle_id" {
                assert!(column.dictionary_page_offset().is_some());
            }
        }
    }

    #[test]
    fn empty_write_is_counted_as_zero() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.parquet");
        let mut writer = PartitionWriter::create(&path, &WriterConfig::default()).unwrap();
        assert_eq!(writer.write_records(&[]).unwrap(), 0);
        assert_eq!(writer.finish().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn create_in_missing_directory_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("out.parquet");
        let err = PartitionWriter::create(&path, &WriterConfig::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));
    }
}
