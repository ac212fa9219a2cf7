//! Roster import and export in JSON or CSV.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{StudentRecord, StudentRow};
use crate::store::{RosterStore, StoreError};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Unsupported file format for {0:?}. Please use JSON or CSV.")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File must contain an array of students.")]
    NotAnArray,

    #[error("No valid student records found in the file.")]
    NoValidRecords,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Csv,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(FileFormat::Json),
            Some("csv") => Ok(FileFormat::Csv),
            _ => Err(ImportError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportMode {
    /// Keep the current roster and add records with unseen ids.
    #[default]
    Merge,
    Replace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// Zero-based position of the record in the file.
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub valid: usize,
    pub added: usize,
    pub rejected: Vec<RejectedRow>,
}

/// Reads every record in the file. Records that fail to parse are
/// returned as `Err` so the caller can skip them.
pub fn read_rows(path: &Path) -> Result<Vec<Result<StudentRow, String>>, ImportError> {
    let format = FileFormat::from_path(path)?;
    let file = File::open(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    match format {
        FileFormat::Json => {
            let value: serde_json::Value = serde_json::from_reader(reader)?;
            let serde_json::Value::Array(items) = value else {
                return Err(ImportError::NotAnArray);
            };
            Ok(items
                .into_iter()
                .map(|item| serde_json::from_value::<StudentRow>(item).map_err(|e| e.to_string()))
                .collect())
        }
        FileFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_reader(reader);
            Ok(reader
                .deserialize::<StudentRow>()
                .map(|result| result.map_err(|e| e.to_string()))
                .collect())
        }
    }
}

pub async fn import_file<S: StudentRecord>(
    store: &dyn RosterStore<S>,
    path: &Path,
    mode: ImportMode,
) -> Result<ImportReport, ImportError> {
    let rows = read_rows(path)?;
    let mut students = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();

    for (index, row) in rows.into_iter().enumerate() {
        let converted = match row {
            Ok(mut row) => {
                if row.id.is_none() {
                    row.id = Some(store.allocate_id().await?);
                }
                S::from_row(row).map_err(|e| e.to_string())
            }
            Err(reason) => Err(reason),
        };

        match converted {
            Ok(student) => students.push(student),
            Err(reason) => {
                warn!(index, %reason, "skipping invalid student record");
                rejected.push(RejectedRow { index, reason });
            }
        }
    }

    if students.is_empty() {
        return Err(ImportError::NoValidRecords);
    }

    let valid = students.len();
    let added = match mode {
        ImportMode::Merge => store.append(students).await?,
        ImportMode::Replace => {
            store.replace(students).await?;
            valid
        }
    };

    info!(path = ?path, valid, added, rejected = rejected.len(), ?mode, "imported roster file");
    Ok(ImportReport {
        valid,
        added,
        rejected,
    })
}

pub fn write_rows(path: &Path, rows: &[StudentRow]) -> Result<(), ImportError> {
    let format = FileFormat::from_path(path)?;
    let file = File::create(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    match format {
        FileFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writer.flush().map_err(|source| ImportError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        FileFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(writer);
            for row in rows {
                csv_writer.serialize(row)?;
            }
            csv_writer.flush().map_err(|source| ImportError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    Ok(())
}

pub async fn export_file<S: StudentRecord>(
    store: &dyn RosterStore<S>,
    path: &Path,
) -> Result<usize, ImportError> {
    let roster = store.current_roster().await?;
    let rows: Vec<StudentRow> = roster.iter().map(StudentRecord::to_row).collect();
    write_rows(path, &rows)?;
    info!(path = ?path, count = rows.len(), "exported roster");
    Ok(rows.len())
}
