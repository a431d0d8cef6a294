//! CSV loading and processing from files on disk.

use dbscope::data::{DataError, load_data, process_data};
use dbscope::models::ValidationError;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_and_process_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("input.csv");
    fs::write(&path, "name,age,city\nAlice,30,Beijing\nBob,25,Shanghai\n").unwrap();

    let records = load_data(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.processed));

    let processed = process_data(records);
    assert_eq!(processed.len(), 2);
    assert!(processed.iter().all(|r| r.processed));
    assert_eq!(processed[0].name, "Alice");
    assert_eq!(processed[1].city, "Shanghai");
}

#[test]
fn test_missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.csv");

    match load_data(&path) {
        Err(DataError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected I/O error, got {:?}", other),
    }
}

#[test]
fn test_empty_city_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("input.csv");
    fs::write(&path, "name,age,city\nAlice,30,\n").unwrap();

    match load_data(&path) {
        Err(DataError::Invalid { row, source }) => {
            assert_eq!(row, 1);
            assert_eq!(source, ValidationError::EmptyCity);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_non_numeric_age_is_csv_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("input.csv");
    fs::write(&path, "name,age,city\nAlice,thirty,Beijing\n").unwrap();

    assert!(matches!(load_data(&path), Err(DataError::Csv(_))));
}

#[test]
fn test_header_only_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("input.csv");
    fs::write(&path, "name,age,city\n").unwrap();

    assert!(load_data(&path).unwrap().is_empty());
}
