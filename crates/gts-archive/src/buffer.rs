//! Bounded row-group buffer.
//!
//! Collects records until a fixed capacity is reached and then hands the
//! whole batch to a [`BatchSink`], so memory stays bounded by one row group
//! no matter how many rows a merge appends.

use gts_common::VehiclePosition;
use tracing::debug;

use crate::error::{ArchiveError, Result};

/// Destination for buffered record batches.
pub trait BatchSink {
    /// Write `records`, returning how many rows were actually written.
    fn write_records(&mut self, records: &[VehiclePosition]) -> Result<usize>;
}

/// Accumulates records and flushes them in batches of `capacity`.
#[derive(Debug)]
pub struct RowGroupBuffer {
    rows: Vec<VehiclePosition>,
    capacity: usize,
    rows_flushed: u64,
    flushes: u64,
}

impl RowGroupBuffer {
    /// Create a buffer holding at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::new(),
            capacity: capacity.max(1),
            rows_flushed: 0,
            flushes: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records currently held.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows_flushed(&self) -> u64 {
        self.rows_flushed
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Append a record, flushing to `sink` once the buffer is full.
    pub fn push<S: BatchSink + ?Sized>(&mut self, record: VehiclePosition, sink: &mut S) -> Result<()> {
        self.rows.push(record);
        if self.rows.len() >= self.capacity {
            self.flush(sink)?;
        }
        Ok(())
    }

    /// Flush whatever remains, even an empty batch. Returns total rows flushed.
    pub fn finish<S: BatchSink + ?Sized>(mut self, sink: &mut S) -> Result<u64> {
        self.flush(sink)?;
        Ok(self.rows_flushed)
    }

    fn flush<S: BatchSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        let expected = self.rows.len();
        let written = sink.write_records(&self.rows)?;
        if written != expected {
            return Err(ArchiveError::RowCountMismatch {
                context: "row group flush".to_string(),
                expected: expected as u64,
                actual: written as u64,
            });
        }
        self.rows_flushed += written as u64;
        self.flushes += 1;
        self.rows.clear();
        debug!(rows = written, total = self.rows_flushed, "flushed row group");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[derive(Default)]
    struct RecordingSink {
        batches: Vec<usize>,
        short_by: usize,
    }

    impl BatchSink for RecordingSink {
        fn write_records(&mut self, records: &[VehiclePosition]) -> Result<usize> {
            self.batches.push(records.len());
            Ok(records.len().saturating_sub(self.short_by))
        }
    }

    fn record(i: i64) -> VehiclePosition {
        VehiclePosition::new("V1", DateTime::from_timestamp(1_000 + i, 0).unwrap())
    }

    #[test]
    fn flushes_at_capacity_and_on_finish() {
        let mut sink = RecordingSink::default();
        let mut buffer = RowGroupBuffer::new(3);
        for i in 0..7 {
            buffer.push(record(i), &mut sink).unwrap();
            assert!(buffer.len() < buffer.capacity());
        }
        assert_eq!(buffer.flushes(), 2);
        assert_eq!(buffer.finish(&mut sink).unwrap(), 7);
        assert_eq!(sink.batches, vec![3, 3, 1]);
    }

    #[test]
    fn finish_flushes_empty_batch() {
        let mut sink = RecordingSink::default();
        let buffer = RowGroupBuffer::new(3);
        assert_eq!(buffer.finish(&mut sink).unwrap(), 0);
        assert_eq!(sink.batches, vec![0]);
    }

    #[test]
    fn exact_multiple_ends_with_empty_flush() {
        let mut sink = RecordingSink::default();
        let mut buffer = RowGroupBuffer::new(2);
        for i in 0..4 {
            buffer.push(record(i), &mut sink).unwrap();
        }
        assert!(buffer.is_empty());
        assert_eq!(buffer.finish(&mut sink).unwrap(), 4);
        assert_eq!(sink.batches, vec![2, 2, 0]);
    }

    #[test]
    fn short_write_is_invariant_violation() {
        let mut sink = RecordingSink {
            short_by: 1,
            ..Default::default()
        };
        let mut buffer = RowGroupBuffer::new(2);
        buffer.push(record(0), &mut sink).unwrap();
        let err = buffer.push(record(1), &mut sink).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            ArchiveError::RowCountMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(RowGroupBuffer::new(0).capacity(), 1);
    }
}
