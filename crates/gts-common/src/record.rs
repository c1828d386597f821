//! Canonical vehicle position record.
//!
//! One row per observation reported by the realtime feed. The transactional
//! store persists `start_time` and `timestamp` as epoch seconds; everything
//! downstream of the store works with [`DateTime<Utc>`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::partition::PartitionKey;

/// A single vehicle position observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehiclePosition {
    pub trip_id: String,
    pub route_id: String,
    pub direction_id: i8,
    pub start_time: DateTime<Utc>,
    pub schedule_relationship: i8,
    pub latitude: f32,
    pub longitude: f32,
    pub bearing: f32,
    pub odometer: f64,
    pub speed: f32,
    pub current_stop_sequence: u32,
    pub stop_id: String,
    pub current_status: i8,
    pub timestamp: DateTime<Utc>,
    pub congestion_level: i8,
    pub occupancy_status: i8,
    pub vehicle_id: String,
    pub vehicle_label: String,
    pub license_plate: String,
}

impl VehiclePosition {
    /// Create an otherwise-empty observation for a vehicle at an instant.
    pub fn new(vehicle_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            timestamp,
            ..Self::default()
        }
    }

    /// Observation time as epoch seconds.
    pub fn timestamp_unix(&self) -> i64 {
        self.timestamp.timestamp()
    }

    /// Records without a positive timestamp carry no usable observation time.
    pub fn is_valid(&self) -> bool {
        self.timestamp_unix() > 0
    }

    /// The monthly partition this record belongs to.
    pub fn partition(&self) -> PartitionKey {
        PartitionKey::from_timestamp(self.timestamp)
    }
}

/// Convert epoch seconds from the store into a UTC instant.
pub fn timestamp_from_unix(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(Error::TimestampOutOfRange(secs))
}
