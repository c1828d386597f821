//! GTFS scraper archive storage.
//!
//! This crate provides:
//! - Access to the realtime SQLite store the ingestor appends to
//! - The Arrow schema of archived vehicle positions
//! - Bounded row-group buffering and Parquet partition reader/writer
//! - The per-month merge and the archive run driving it

pub mod archive;
pub mod buffer;
pub mod error;
pub mod merge;
pub mod range;
pub mod reader;
pub mod schema;
pub mod store;
pub mod watermark;
pub mod writer;

pub use archive::{archive_partitions, ArchiveSummary};
pub use buffer::{BatchSink, RowGroupBuffer};
pub use error::{ArchiveError, ErrorKind, Result};
pub use merge::{
    merge_partition, partition_path, staging_path, MergeOptions, MergeStats, QueryWindow,
};
pub use range::{find_archive_range, ArchiveRange};
pub use reader::PartitionReader;
pub use schema::{vehicle_positions_schema, ARCHIVE_TIMEZONE};
pub use store::PositionStore;
pub use watermark::Watermarks;
pub use writer::{PartitionSink, PartitionWriter, WriterConfig};

/// File name of every monthly partition.
pub const PARTITION_FILE_NAME: &str = "vehicle_positions.parquet";

/// Default number of rows per Parquet row group and per write batch.
pub const DEFAULT_ROW_GROUP_SIZE: usize = 1_000_000;

/// Default number of rows decoded per batch when reading a partition.
pub const DEFAULT_READ_BATCH_SIZE: usize = 65_536;
