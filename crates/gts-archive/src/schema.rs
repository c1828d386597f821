//! Arrow schema and record conversion for archived vehicle positions.
//!
//! Column order follows the store table. `start_time` and `timestamp` are
//! materialized as UTC millisecond timestamps, and the derived `year` and
//! `month` columns repeat the partition identity inside the file so the
//! archive can be read without its directory layout.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float32Array, Float64Array, Int32Array, Int8Array, StringArray,
    TimestampMillisecondArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Datelike, Utc};
use gts_common::VehiclePosition;

use crate::error::{ArchiveError, Result};

/// Timezone recorded on every timestamp column.
pub const ARCHIVE_TIMEZONE: &str = "UTC";

pub const COL_VEHICLE_ID: &str = "vehicle_id";
pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_START_TIME: &str = "start_time";

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some(ARCHIVE_TIMEZONE.into()))
}

/// Schema of `vehicle_positions.parquet`.
pub fn vehicle_positions_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("trip_id", DataType::Utf8, false),
        Field::new("route_id", DataType::Utf8, false),
        Field::new("direction_id", DataType::Int8, false),
        Field::new(COL_START_TIME, timestamp_type(), false),
        Field::new("schedule_relationship", DataType::Int8, false),
        Field::new("latitude", DataType::Float32, false),
        Field::new("longitude", DataType::Float32, false),
        Field::new("bearing", DataType::Float32, false),
        Field::new("odometer", DataType::Float64, false),
        Field::new("speed", DataType::Float32, false),
        Field::new("current_stop_sequence", DataType::UInt32, false),
        Field::new("stop_id", DataType::Utf8, false),
        Field::new("current_status", DataType::Int8, false),
        Field::new(COL_TIMESTAMP, timestamp_type(), false),
        Field::new("congestion_level", DataType::Int8, false),
        Field::new("occupancy_status", DataType::Int8, false),
        Field::new(COL_VEHICLE_ID, DataType::Utf8, false),
        Field::new("vehicle_label", DataType::Utf8, false),
        Field::new("license_plate", DataType::Utf8, false),
        Field::new("year", DataType::Int32, false),
        Field::new("month", DataType::Int8, false),
    ]))
}

fn strings<'a>(
    records: &'a [VehiclePosition],
    f: impl Fn(&'a VehiclePosition) -> &'a str,
) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(records.iter().map(f)))
}

fn codes(records: &[VehiclePosition], f: impl Fn(&VehiclePosition) -> i8) -> ArrayRef {
    Arc::new(Int8Array::from_iter_values(records.iter().map(f)))
}

fn timestamps(
    records: &[VehiclePosition],
    f: impl Fn(&VehiclePosition) -> DateTime<Utc>,
) -> ArrayRef {
    Arc::new(
        TimestampMillisecondArray::from_iter_values(
            records.iter().map(|r| f(r).timestamp_millis()),
        )
        .with_timezone(ARCHIVE_TIMEZONE),
    )
}

/// Build one record batch from a slice of records.
pub fn records_to_batch(records: &[VehiclePosition]) -> Result<RecordBatch> {
    let year = Int32Array::from_iter_values(records.iter().map(|r| r.timestamp.year()));
    let month: Vec<i8> = records
        .iter()
        .map(|r| {
            i8::try_from(r.timestamp.month())
                .map_err(|_| ArchiveError::Decode(format!("month of {} out of range", r.timestamp)))
        })
        .collect::<Result<_>>()?;

    let columns: Vec<ArrayRef> = vec![
        strings(records, |r| r.trip_id.as_str()),
        strings(records, |r| r.route_id.as_str()),
        codes(records, |r| r.direction_id),
        timestamps(records, |r| r.start_time),
        codes(records, |r| r.schedule_relationship),
        Arc::new(Float32Array::from_iter_values(records.iter().map(|r| r.latitude))),
        Arc::new(Float32Array::from_iter_values(records.iter().map(|r| r.longitude))),
        Arc::new(Float32Array::from_iter_values(records.iter().map(|r| r.bearing))),
        Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.odometer))),
        Arc::new(Float32Array::from_iter_values(records.iter().map(|r| r.speed))),
        Arc::new(UInt32Array::from_iter_values(
            records.iter().map(|r| r.current_stop_sequence),
        )),
        strings(records, |r| r.stop_id.as_str()),
        codes(records, |r| r.current_status),
        timestamps(records, |r| r.timestamp),
        codes(records, |r| r.congestion_level),
        codes(records, |r| r.occupancy_status),
        strings(records, |r| r.vehicle_id.as_str()),
        strings(records, |r| r.vehicle_label.as_str()),
        strings(records, |r| r.license_plate.as_str()),
        Arc::new(year),
        Arc::new(Int8Array::from(month)),
    ];

    Ok(RecordBatch::try_new(vehicle_positions_schema(), columns)?)
}

/// Look up a column by name and downcast it to its concrete array type.
pub(crate) fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| ArchiveError::Decode(format!("column '{name}' is missing or mistyped")))
}

pub(crate) fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ArchiveError::Decode(format!("timestamp {millis}ms out of range")))
}

/// Decode an archived batch back into records.
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<VehiclePosition>> {
    let trip_id = column::<StringArray>(batch, "trip_id")?;
    let route_id = column::<StringArray>(batch, "route_id")?;
    let direction_id = column::<Int8Array>(batch, "direction_id")?;
    let start_time = column::<TimestampMillisecondArray>(batch, COL_START_TIME)?;
    let schedule_relationship = column::<Int8Array>(batch, "schedule_relationship")?;
    let latitude = column::<Float32Array>(batch, "latitude")?;
    let longitude = column::<Float32Array>(batch, "longitude")?;
    let bearing = column::<Float32Array>(batch, "bearing")?;
    let odometer = column::<Float64Array>(batch, "odometer")?;
    let speed = column::<Float32Array>(batch, "speed")?;
    let current_stop_sequence = column::<UInt32Array>(batch, "current_stop_sequence")?;
    let stop_id = column::<StringArray>(batch, "stop_id")?;
    let current_status = column::<Int8Array>(batch, "current_status")?;
    let timestamp = column::<TimestampMillisecondArray>(batch, COL_TIMESTAMP)?;
    let congestion_level = column::<Int8Array>(batch, "congestion_level")?;
    let occupancy_status = column::<Int8Array>(batch, "occupancy_status")?;
    let vehicle_id = column::<StringArray>(batch, COL_VEHICLE_ID)?;
    let vehicle_label = column::<StringArray>(batch, "vehicle_label")?;
    let license_plate = column::<StringArray>(batch, "license_plate")?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        records.push(VehiclePosition {
            trip_id: trip_id.value(i).to_string(),
            route_id: route_id.value(i).to_string(),
            direction_id: direction_id.value(i),
            start_time: millis_to_datetime(start_time.value(i))?,
            schedule_relationship: schedule_relationship.value(i),
            latitude: latitude.value(i),
            longitude: longitude.value(i),
            bearing: bearing.value(i),
            odometer: odometer.value(i),
            speed: speed.value(i),
            current_stop_sequence: current_stop_sequence.value(i),
            stop_id: stop_id.value(i).to_string(),
            current_status: current_status.value(i),
            timestamp: millis_to_datetime(timestamp.value(i))?,
            congestion_level: congestion_level.value(i),
            occupancy_status: occupancy_status.value(i),
            vehicle_id: vehicle_id.value(i).to_string(),
            vehicle_label: vehicle_label.value(i).to_string(),
            license_plate: license_plate.value(i).to_string(),
        });
    }
    Ok(records)
}
