//! CSV loading and processing of user records.
//!
//! The input has `name,age,city` headers. Every row is validated into a
//! [`UserData`]; the first invalid row aborts the load and is reported by its
//! 1-based data row number.

use crate::models::{ProcessedUserData, UserData, ValidationError};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid row {row}: {source}")]
    Invalid {
        row: usize,
        #[source]
        source: ValidationError,
    },
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    name: String,
    age: i64,
    city: String,
}

/// Load and validate every row of the CSV file at `path`.
pub fn load_data(path: impl AsRef<Path>) -> Result<Vec<UserData>, DataError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = load_from_reader(file)?;
    info!(path = %path.display(), rows = records.len(), "Data loaded");
    Ok(records)
}

/// Load and validate CSV rows from any reader.
pub fn load_from_reader<R: Read>(reader: R) -> Result<Vec<UserData>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let record = UserData::new(&row.name, row.age, &row.city)
            .map_err(|source| DataError::Invalid { row: idx + 1, source })?;
        records.push(record);
    }
    debug!(rows = records.len(), "Rows validated");
    Ok(records)
}

/// Mark every record processed and stamp the processing time.
pub fn process_data(records: Vec<UserData>) -> Vec<ProcessedUserData> {
    let processed: Vec<ProcessedUserData> =
        records.into_iter().map(ProcessedUserData::from).collect();
    info!(rows = processed.len(), "Data processed");
    processed
}
