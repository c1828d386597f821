//! End-to-end archive runs against a store on disk.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use gts_archive::{
    archive_partitions, find_archive_range, merge_partition, partition_path, staging_path,
    MergeOptions, PartitionReader, PositionStore, QueryWindow,
};
use gts_common::{PartitionKey, VehiclePosition};
use tempfile::TempDir;

fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn position(trip: &str, vehicle: &str, ts: DateTime<Utc>) -> VehiclePosition {
    let mut vp = VehiclePosition::new(vehicle, ts);
    vp.trip_id = trip.to_string();
    vp.route_id = "R10".to_string();
    vp.latitude = 47.6;
    vp.longitude = -122.3;
    vp
}

fn key(y: i32, m: u32) -> PartitionKey {
    PartitionKey::new(y, m).unwrap()
}

/// Store file plus archive root in one scratch directory.
struct Fixture {
    _tmp: TempDir,
    db: PathBuf,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("realtime.db");
        let root = tmp.path().join("archive");
        PositionStore::open(&db).unwrap();
        Self { _tmp: tmp, db, root }
    }

    fn insert(&self, rows: &[VehiclePosition]) {
        PositionStore::open(&self.db)
            .unwrap()
            .insert_positions(rows)
            .unwrap();
    }

    fn archive(&self, options: &MergeOptions) -> gts_archive::ArchiveSummary {
        let store = PositionStore::open_read_only(&self.db).unwrap();
        archive_partitions(&store, &self.root, options).unwrap()
    }

    fn rows(&self, key: PartitionKey) -> Vec<VehiclePosition> {
        PartitionReader::open(&partition_path(&self.root, key))
            .unwrap()
            .map(|r| r.read_all().unwrap())
            .unwrap_or_default()
    }
}

fn stamps(rows: &[VehiclePosition]) -> Vec<(String, DateTime<Utc>)> {
    rows.iter()
        .map(|r| (r.vehicle_id.clone(), r.timestamp))
        .collect()
}

#[test]
fn empty_store_performs_no_file_operations() {
    let fx = Fixture::new();
    let summary = fx.archive(&MergeOptions::default());
    assert!(summary.range.is_none());
    assert!(summary.partitions.is_empty());
    assert!(!fx.root.exists());
}

#[test]
fn first_run_splits_rows_by_month() {
    let fx = Fixture::new();
    let t1 = utc(2024, 1, 20, 9);
    let t2 = utc(2024, 2, 3, 9);
    fx.insert(&[position("T1", "V1", t1), position("T2", "V1", t2)]);

    let summary = fx.archive(&MergeOptions::default());
    assert_eq!(summary.partitions.len(), 2);
    assert!(summary.partitions.iter().all(|p| p.created));
    assert_eq!(summary.total_new_rows(), 2);

    assert!(fx.root.join("year=2024/month=01/vehicle_positions.parquet").is_file());
    assert!(fx.root.join("year=2024/month=02/vehicle_positions.parquet").is_file());
    assert_eq!(stamps(&fx.rows(key(2024, 1))), vec![("V1".to_string(), t1)]);
    assert_eq!(stamps(&fx.rows(key(2024, 2))), vec![("V1".to_string(), t2)]);

    let row = &fx.rows(key(2024, 1))[0];
    assert_eq!(row.trip_id, "T1");
    assert_eq!(row.route_id, "R10");
    assert_eq!(row.latitude, 47.6);
}

#[test]
fn rerun_without_new_rows_changes_nothing() {
    let fx = Fixture::new();
    let t2 = utc(2024, 2, 3, 9);
    fx.insert(&[position("T2", "V1", t2)]);
    fx.archive(&MergeOptions::default());
    let before = fx.rows(key(2024, 2));

    let summary = fx.archive(&MergeOptions::default());
    let feb = &summary.partitions[0];
    assert!(!feb.created);
    assert_eq!(feb.vehicles, 1);
    assert_eq!(feb.query_start, t2);
    assert_eq!(feb.skipped_rows, 1);
    assert_eq!(feb.new_rows, 0);
    assert_eq!(fx.rows(key(2024, 2)), before);
    assert!(!staging_path(&partition_path(&fx.root, key(2024, 2))).exists());
}

#[test]
fn newer_row_is_appended_once() {
    let fx = Fixture::new();
    let t2 = utc(2024, 2, 3, 9);
    let t3 = utc(2024, 2, 3, 10);
    fx.insert(&[position("T2", "V1", t2)]);
    fx.archive(&MergeOptions::default());

    fx.insert(&[position("T3", "V1", t3)]);
    let store = PositionStore::open_read_only(&fx.db).unwrap();
    let stats = merge_partition(&store, &fx.root, key(2024, 2), &MergeOptions::default()).unwrap();
    assert_eq!(stats.copied_rows, 1);
    assert_eq!(stats.skipped_rows, 1);
    assert_eq!(stats.new_rows, 1);

    assert_eq!(
        stamps(&fx.rows(key(2024, 2))),
        vec![("V1".to_string(), t2), ("V1".to_string(), t3)]
    );
}

#[test]
fn zero_timestamp_is_never_archived() {
    let fx = Fixture::new();
    let epoch = DateTime::from_timestamp(0, 0).unwrap();
    fx.insert(&[
        position("T0", "V1", epoch),
        position("T1", "V1", utc(2024, 3, 1, 0)),
    ]);

    let store = PositionStore::open_read_only(&fx.db).unwrap();
    assert_eq!(store.count().unwrap(), 2);
    let range = find_archive_range(&store).unwrap().unwrap();
    assert_eq!(range.start, key(2024, 3));
    assert_eq!(range.end, key(2024, 3));

    let summary = fx.archive(&MergeOptions::default());
    assert_eq!(summary.total_new_rows(), 1);
    assert!(!fx.root.join("year=1970").exists());
    assert!(fx.rows(key(2024, 3)).iter().all(|r| r.is_valid()));
}

#[test]
fn stray_staging_file_is_replaced() {
    let fx = Fixture::new();
    fx.insert(&[position("T1", "V1", utc(2024, 4, 1, 6))]);
    fx.archive(&MergeOptions::default());

    let final_path = partition_path(&fx.root, key(2024, 4));
    let staging = staging_path(&final_path);
    fs::write(&staging, b"left behind by a killed run").unwrap();
    let original = fs::read(&final_path).unwrap();

    // The next run truncates and reuses the staging path.
    fx.insert(&[position("T2", "V1", utc(2024, 4, 1, 7))]);
    let summary = fx.archive(&MergeOptions::default());
    assert_eq!(summary.total_new_rows(), 1);
    assert!(!staging.exists());
    assert_ne!(fs::read(&final_path).unwrap(), original);
    assert_eq!(fx.rows(key(2024, 4)).len(), 2);
}

#[test]
fn failed_merge_leaves_existing_partition_intact() {
    let fx = Fixture::new();
    fx.insert(&[position("T1", "V1", utc(2024, 5, 2, 6))]);
    fx.archive(&MergeOptions::default());

    let final_path = partition_path(&fx.root, key(2024, 5));
    let original = fs::read(&final_path).unwrap();
    // Staging cannot be created where a directory sits.
    fs::create_dir(staging_path(&final_path)).unwrap();

    fx.insert(&[position("T2", "V1", utc(2024, 5, 2, 7))]);
    let store = PositionStore::open_read_only(&fx.db).unwrap();
    let err = archive_partitions(&store, &fx.root, &MergeOptions::default()).unwrap_err();
    assert!(!err.is_fatal());

    assert_eq!(fs::read(&final_path).unwrap(), original);
    assert_eq!(fx.rows(key(2024, 5)).len(), 1);
}

#[test]
fn late_vehicle_needs_full_rescan() {
    let fx = Fixture::new();
    fx.insert(&[position("T1", "V1", utc(2024, 6, 10, 12))]);
    fx.archive(&MergeOptions::default());

    // V2 first reports for June with a time older than every watermark.
    fx.insert(&[position("T2", "V2", utc(2024, 6, 5, 12))]);

    let gap = fx.archive(&MergeOptions::default());
    assert_eq!(gap.total_new_rows(), 0);
    assert_eq!(fx.rows(key(2024, 6)).len(), 1);

    let full = MergeOptions {
        window: QueryWindow::PeriodStart,
        ..MergeOptions::default()
    };
    let fixed = fx.archive(&full);
    assert_eq!(fixed.total_new_rows(), 1);
    let vehicles: Vec<String> = fx
        .rows(key(2024, 6))
        .into_iter()
        .map(|r| r.vehicle_id)
        .collect();
    assert_eq!(vehicles, vec!["V1", "V2"]);

    // Nothing further to add on another full pass.
    assert_eq!(fx.archive(&full).total_new_rows(), 0);
}

#[test]
fn rows_without_vehicle_id_are_appended_each_run() {
    let fx = Fixture::new();
    fx.insert(&[
        position("T1", "V1", utc(2024, 7, 1, 1)),
        position("T2", "", utc(2024, 7, 1, 2)),
    ]);
    fx.archive(&MergeOptions::default());
    assert_eq!(fx.rows(key(2024, 7)).len(), 2);

    // Unattributed rows carry no watermark, so a rerun copies them again.
    let summary = fx.archive(&MergeOptions::default());
    assert_eq!(summary.total_new_rows(), 1);
    assert_eq!(fx.rows(key(2024, 7)).len(), 3);
}

#[test]
fn small_row_groups_preserve_every_row() {
    let fx = Fixture::new();
    let rows: Vec<VehiclePosition> = (0..25)
        .map(|i| {
            position(
                &format!("T{i}"),
                &format!("V{}", i % 4),
                utc(2024, 8, 1, 0) + chrono::Duration::minutes(i),
            )
        })
        .collect();
    fx.insert(&rows);

    let options = MergeOptions {
        row_group_size: 4,
        read_batch_size: 3,
        ..MergeOptions::default()
    };
    fx.archive(&options);
    fx.insert(&[position("T99", "V1", utc(2024, 8, 2, 0))]);
    let summary = fx.archive(&options);
    assert_eq!(summary.total_copied_rows(), 25);
    assert_eq!(summary.total_new_rows(), 1);
    assert_eq!(fx.rows(key(2024, 8)).len(), 26);
}
