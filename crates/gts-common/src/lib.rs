//! GTFS scraper common types and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - The canonical vehicle position record
//! - Monthly partition keys and their time windows
//! - Errors from record and partition arithmetic

pub mod error;
pub mod partition;
pub mod record;

pub use error::{Error, Result};
pub use partition::PartitionKey;
pub use record::VehiclePosition;
