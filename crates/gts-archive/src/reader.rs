//! Parquet partition reader.
//!
//! Holds one open handle on an existing partition file. Every call to
//! [`PartitionReader::batches`] starts a fresh pass from the first row, which
//! is how the merge reads the file twice: once for watermarks, once to copy.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use arrow::array::{StringArray, TimestampMillisecondArray};
use gts_common::VehiclePosition;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ProjectionMask;

use crate::error::{ArchiveError, Result};
use crate::schema::{batch_to_records, column, millis_to_datetime, COL_TIMESTAMP, COL_VEHICLE_ID};
use crate::watermark::Watermarks;
use crate::DEFAULT_READ_BATCH_SIZE;

/// Rewindable reader over one partition file.
#[derive(Debug)]
pub struct PartitionReader {
    path: PathBuf,
    file: File,
    num_rows: u64,
    batch_size: usize,
}

impl PartitionReader {
    /// Open the partition at `path`. Returns `Ok(None)` when no file exists yet.
    pub fn open(path: &Path) -> Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ArchiveError::io(path)(e)),
        };
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file.try_clone().map_err(ArchiveError::io(path))?)?;
        let num_rows = builder.metadata().file_metadata().num_rows();
        let num_rows = u64::try_from(num_rows).map_err(|_| {
            ArchiveError::Decode(format!(
                "{} reports a negative row count ({num_rows})",
                path.display()
            ))
        })?;
        Ok(Some(Self {
            path: path.to_path_buf(),
            file,
            num_rows,
            batch_size: DEFAULT_READ_BATCH_SIZE,
        }))
    }

    /// Set the number of rows decoded per batch.
    pub fn with_batch_size(mut self, rows: usize) -> Self {
        self.batch_size = rows.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total rows according to the file footer.
    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    fn builder(&self) -> Result<ParquetRecordBatchReaderBuilder<File>> {
        let file = self.file.try_clone().map_err(ArchiveError::io(&self.path))?;
        Ok(ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(self.batch_size))
    }

    /// A new pass over every row, starting from the beginning of the file.
    pub fn batches(&self) -> Result<ParquetRecordBatchReader> {
        Ok(self.builder()?.build()?)
    }

    /// Read only the vehicle id and timestamp columns and build watermarks.
    pub fn scan_watermarks(&self) -> Result<Watermarks> {
        let builder = self.builder()?;
        let leaves: Vec<usize> = builder
            .parquet_schema()
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name() == COL_VEHICLE_ID || c.name() == COL_TIMESTAMP)
            .map(|(i, _)| i)
            .collect();
        let mask = ProjectionMask::leaves(builder.parquet_schema(), leaves);
        let reader = builder.with_projection(mask).build()?;

        let mut watermarks = Watermarks::new();
        for batch in reader {
            let batch = batch?;
            let vehicle_ids = column::<StringArray>(&batch, COL_VEHICLE_ID)?;
            let timestamps = column::<TimestampMillisecondArray>(&batch, COL_TIMESTAMP)?;
            for i in 0..batch.num_rows() {
                watermarks.observe(vehicle_ids.value(i), millis_to_datetime(timestamps.value(i))?);
            }
        }
        Ok(watermarks)
    }

    /// Decode the whole file into memory.
    pub fn read_all(&self) -> Result<Vec<VehiclePosition>> {
        let mut records = Vec::with_capacity(self.num_rows as usize);
        for batch in self.batches()? {
            records.extend(batch_to_records(&batch?)?);
        }
        Ok(records)
    }
}
