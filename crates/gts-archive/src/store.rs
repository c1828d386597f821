//! Realtime SQLite store.
//!
//! The ingestor appends every feed poll to `vehicle_positions`; the
//! archiver only ever reads it. SQLite cannot hold a native timestamp, so
//! `start_time` and `timestamp` are persisted as epoch seconds and cast
//! back to integers on the way out.

use std::path::{Path, PathBuf};

use gts_common::record::timestamp_from_unix;
use gts_common::VehiclePosition;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags, Row};
use tracing::debug;

use crate::error::{ArchiveError, Result};

/// Column names and declared types of `vehicle_positions`, in insert order.
const COLUMNS: &[(&str, &str)] = &[
    ("trip_id", "TEXT"),
    ("route_id", "TEXT"),
    ("direction_id", "INT8"),
    ("start_time", "DATETIME"),
    ("schedule_relationship", "INT8"),
    ("latitude", "REAL"),
    ("longitude", "REAL"),
    ("bearing", "REAL"),
    ("odometer", "REAL"),
    ("speed", "REAL"),
    ("current_stop_sequence", "INTEGER"),
    ("stop_id", "TEXT"),
    ("current_status", "INT8"),
    ("timestamp", "DATETIME"),
    ("congestion_level", "INT8"),
    ("occupancy_status", "INT8"),
    ("vehicle_id", "TEXT"),
    ("vehicle_label", "TEXT"),
    ("license_plate", "TEXT"),
];

// timestamp > 0 drops rows the feed delivered without an observation time
const BOUNDS_QUERY: &str = "
    SELECT MIN(timestamp), MAX(timestamp)
    FROM vehicle_positions WHERE timestamp > 0
";

const WINDOW_QUERY: &str = "
    SELECT
        trip_id,
        route_id,
        direction_id,
        CAST(start_time AS INTEGER),
        schedule_relationship,
        latitude,
        longitude,
        bearing,
        odometer,
        speed,
        current_stop_sequence,
        stop_id,
        current_status,
        CAST(timestamp AS INTEGER),
        congestion_level,
        occupancy_status,
        vehicle_id,
        vehicle_label,
        license_plate
    FROM vehicle_positions
    WHERE timestamp >= ?1 AND timestamp < ?2 AND timestamp > 0
    ORDER BY timestamp
";

fn create_table_sql() -> String {
    let columns: Vec<String> = COLUMNS
        .iter()
        .map(|(name, ty)| format!("{name} {ty}"))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS vehicle_positions (\n{},\nUNIQUE(trip_id, timestamp));\n\
         CREATE INDEX IF NOT EXISTS vehicle_positions_timestamp ON vehicle_positions(timestamp);",
        columns.join(",\n")
    )
}

fn insert_sql() -> String {
    let names: Vec<&str> = COLUMNS.iter().map(|(name, _)| *name).collect();
    let placeholders = vec!["?"; COLUMNS.len()].join(", ");
    format!(
        "INSERT INTO vehicle_positions ({}) VALUES ({}) ON CONFLICT DO NOTHING",
        names.join(", "),
        placeholders
    )
}

/// Handle on the realtime store.
pub struct PositionStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for PositionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PositionStore {
    /// Open (or create) the store, enable WAL and create the table if absent.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // WAL lets the archiver read a snapshot while the ingestor writes.
        conn.pragma_update(None, "journal_mode", "wal")?;
        conn.execute_batch(&create_table_sql())?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing store for archiving. Never writes to it.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ArchiveError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "realtime store does not exist",
                ),
            });
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&create_table_sql())?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert positions in one transaction, ignoring (trip_id, timestamp) duplicates.
    ///
    /// Returns the number of rows actually inserted.
    pub fn insert_positions(&mut self, positions: &[VehiclePosition]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&insert_sql())?;
            for vp in positions {
                inserted += stmt.execute(params![
                    vp.trip_id,
                    vp.route_id,
                    vp.direction_id,
                    vp.start_time.timestamp(),
                    vp.schedule_relationship,
                    f64::from(vp.latitude),
                    f64::from(vp.longitude),
                    f64::from(vp.bearing),
                    vp.odometer,
                    f64::from(vp.speed),
                    vp.current_stop_sequence,
                    vp.stop_id,
                    vp.current_status,
                    vp.timestamp.timestamp(),
                    vp.congestion_level,
                    vp.occupancy_status,
                    vp.vehicle_id,
                    vp.vehicle_label,
                    vp.license_plate,
                ])?;
            }
        }
        tx.commit()?;
        debug!(inserted, offered = positions.len(), "inserted vehicle positions");
        Ok(inserted)
    }

    /// Minimum and maximum valid timestamps (epoch seconds), or `None` for an empty store.
    pub fn timestamp_bounds(&self) -> Result<Option<(i64, i64)>> {
        let (min, max): (Value, Value) = self
            .conn
            .query_row(BOUNDS_QUERY, [], |row| Ok((row.get(0)?, row.get(1)?)))?;

        match (min, max) {
            (Value::Null, Value::Null) => Ok(None),
            (Value::Integer(min), Value::Integer(max)) => Ok(Some((min, max))),
            (min, max) => Err(ArchiveError::Discovery(format!(
                "timestamp bounds are not integers: min={min:?}, max={max:?}"
            ))),
        }
    }

    /// Stream every valid row with `start <= timestamp < end`, ordered by timestamp.
    pub fn for_each_in_window<F>(&self, start: i64, end: i64, mut f: F) -> Result<u64>
    where
        F: FnMut(VehiclePosition) -> Result<()>,
    {
        let mut stmt = self.conn.prepare(WINDOW_QUERY)?;
        let mut rows = stmt.query(params![start, end])?;
        let mut scanned = 0u64;
        while let Some(row) = rows.next()? {
            f(decode_row(row)?)?;
            scanned += 1;
        }
        Ok(scanned)
    }

    /// Number of rows in the table, valid or not.
    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vehicle_positions", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }
}

// The ingestor writes zero values rather than NULLs, but older rows may carry
// NULLs; they decode as the zero value.
fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

fn code(row: &Row<'_>, idx: usize) -> rusqlite::Result<i8> {
    Ok(row.get::<_, Option<i8>>(idx)?.unwrap_or_default())
}

fn real(row: &Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or_default())
}

fn decode_row(row: &Row<'_>) -> Result<VehiclePosition> {
    let start_time: Option<i64> = row.get(3)?;
    let timestamp: i64 = row.get(13)?;
    Ok(VehiclePosition {
        trip_id: text(row, 0)?,
        route_id: text(row, 1)?,
        direction_id: code(row, 2)?,
        start_time: timestamp_from_unix(start_time.unwrap_or_default())?,
        schedule_relationship: code(row, 4)?,
        latitude: real(row, 5)? as f32,
        longitude: real(row, 6)? as f32,
        bearing: real(row, 7)? as f32,
        odometer: real(row, 8)?,
        speed: real(row, 9)? as f32,
        current_stop_sequence: row.get::<_, Option<u32>>(10)?.unwrap_or_default(),
        stop_id: text(row, 11)?,
        current_status: code(row, 12)?,
        timestamp: timestamp_from_unix(timestamp)?,
        congestion_level: code(row, 14)?,
        occupancy_status: code(row, 15)?,
        vehicle_id: text(row, 16)?,
        vehicle_label: text(row, 17)?,
        license_plate: text(row, 18)?,
    })
}
