//! Monthly archive partitions.
//!
//! A partition covers the half-open UTC window `[period_start, period_end)`
//! of one calendar month. Every valid observation falls into exactly one
//! partition, determined by its timestamp alone.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// (year, month) pair identifying one archive partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    year: i32,
    month: u32,
}

impl PartitionKey {
    /// Build a key, rejecting months outside 1..=12 and years chrono cannot represent.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(Error::InvalidMonth { year, month })?;
        Ok(Self { year, month })
    }

    /// The partition containing `ts`.
    pub fn from_timestamp(ts: DateTime<Utc>) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    /// The partition containing the instant `secs` seconds after the epoch.
    pub fn from_unix(secs: i64) -> Result<Self> {
        DateTime::from_timestamp(secs, 0)
            .map(Self::from_timestamp)
            .ok_or(Error::TimestampOutOfRange(secs))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First instant of the month.
    pub fn period_start(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// First instant of the following month (exclusive bound).
    pub fn period_end(&self) -> DateTime<Utc> {
        self.next().period_start()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.period_start() && ts < self.period_end()
    }

    /// Hive-style directory for this partition, relative to the archive root.
    pub fn relative_dir(&self) -> PathBuf {
        PathBuf::from(format!("year={:04}", self.year)).join(format!("month={:02}", self.month))
    }

    /// Iterate months from `self` through `end`, inclusive. Empty when `end < self`.
    pub fn months_through(self, end: PartitionKey) -> impl Iterator<Item = PartitionKey> {
        std::iter::successors(Some(self), |key| Some(key.next())).take_while(move |key| *key <= end)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PartitionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidPartition(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}
