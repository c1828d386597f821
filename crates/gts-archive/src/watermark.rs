//! Per-vehicle watermarks.
//!
//! A watermark is the latest observation time already archived for a
//! vehicle in one partition. Incoming rows at or before it are already
//! represented in the partition file.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Latest archived timestamp per vehicle id. Built per merge, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermarks {
    latest: HashMap<String, DateTime<Utc>>,
}

impl Watermarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation, keeping the maximum per vehicle.
    ///
    /// Rows without a vehicle id cannot be attributed and are ignored.
    pub fn observe(&mut self, vehicle_id: &str, timestamp: DateTime<Utc>) {
        if vehicle_id.is_empty() {
            return;
        }
        match self.latest.get_mut(vehicle_id) {
            Some(current) => {
                if timestamp > *current {
                    *current = timestamp;
                }
            }
            None => {
                self.latest.insert(vehicle_id.to_string(), timestamp);
            }
        }
    }

    pub fn get(&self, vehicle_id: &str) -> Option<DateTime<Utc>> {
        self.latest.get(vehicle_id).copied()
    }

    /// True when the vehicle has a watermark and `timestamp` is not strictly newer.
    pub fn is_superseded(&self, vehicle_id: &str, timestamp: DateTime<Utc>) -> bool {
        matches!(self.get(vehicle_id), Some(watermark) if timestamp <= watermark)
    }

    /// Oldest watermark across all vehicles.
    pub fn min_watermark(&self) -> Option<DateTime<Utc>> {
        self.latest.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}
