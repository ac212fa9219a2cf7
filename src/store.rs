//! Roster persistence.
//!
//! The query engine only ever sees a `Vec` snapshot; everything that
//! changes the roster goes through a [`RosterStore`].

use std::collections::HashSet;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::{RecordError, StudentRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid stored record {id}: {source}")]
    InvalidRecord {
        id: i64,
        #[source]
        source: RecordError,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RosterStore<S: StudentRecord>: Send + Sync {
    /// Fresh snapshot in insertion order.
    async fn current_roster(&self) -> StoreResult<Vec<S>>;

    async fn replace(&self, records: Vec<S>) -> StoreResult<()>;

    /// Adds records whose id is not already present. Returns how many
    /// were added.
    async fn append(&self, records: Vec<S>) -> StoreResult<usize>;

    async fn delete(&self, id: i64) -> StoreResult<bool>;

    /// Restores the built-in roster for the deployment.
    async fn reset(&self) -> StoreResult<Vec<S>>;

    /// Next free id. Ids handed out are never handed out again, even if
    /// the record is later deleted.
    async fn allocate_id(&self) -> StoreResult<i64>;
}

/// Drops records whose id already appeared earlier in the list.
pub fn dedupe_ids<S: StudentRecord>(records: Vec<S>) -> Vec<S> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|student| {
            let fresh = seen.insert(student.id());
            if !fresh {
                warn!(id = student.id(), "dropping record with duplicate id");
            }
            fresh
        })
        .collect()
}

#[derive(Debug)]
struct FileState {
    next_id: i64,
}

impl FileState {
    fn observe<S: StudentRecord>(&mut self, records: &[S]) {
        if let Some(max) = records.iter().map(StudentRecord::id).max() {
            self.next_id = self.next_id.max(max + 1);
        }
    }
}

/// Roster kept as a JSON array on local disk. The file is created from
/// the default roster the first time it is read.
///
/// The highest id ever handed out is kept in a sidecar file next to the
/// roster so ids stay retired across runs.
#[derive(Debug)]
pub struct JsonFileStore<S> {
    path: PathBuf,
    ids_path: PathBuf,
    state: Mutex<FileState>,
    _records: PhantomData<fn() -> S>,
}

impl<S: StudentRecord> JsonFileStore<S> {
    pub const FILE_NAME: &'static str = "querysense_students.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            ids_path: path.with_extension("next_id"),
            path,
            state: Mutex::new(FileState { next_id: 1 }),
            _records: PhantomData,
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self, state: &mut FileState) -> StoreResult<Vec<S>> {
        self.load_next_id(state).await?;

        let records = match fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<S>>(&bytes) {
                Ok(records) => checked(records)?,
                Err(err) => {
                    warn!(path = ?self.path, %err, "roster file unreadable, using default roster");
                    S::default_roster()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let defaults = S::default_roster();
                self.write(&defaults).await?;
                state.observe(&defaults);
                self.save_next_id(state).await?;
                info!(path = ?self.path, count = defaults.len(), "seeded roster file");
                defaults
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        state.observe(&records);
        Ok(records)
    }

    async fn write(&self, records: &[S]) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(records)?;
        self.write_file(&self.path, json).await?;
        debug!(path = ?self.path, count = records.len(), "wrote roster file");
        Ok(())
    }

    async fn write_file(&self, path: &Path, contents: Vec<u8>) -> StoreResult<()> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        fs::write(&staging, contents).await.map_err(io_err)?;
        fs::rename(&staging, path).await.map_err(io_err)?;
        Ok(())
    }

    async fn load_next_id(&self, state: &mut FileState) -> StoreResult<()> {
        match fs::read(&self.ids_path).await {
            Ok(bytes) => match serde_json::from_slice::<i64>(&bytes) {
                Ok(next_id) => state.next_id = state.next_id.max(next_id),
                Err(err) => warn!(path = ?self.ids_path, %err, "ignoring unreadable id file"),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.ids_path.clone(),
                    source,
                })
            }
        }
        Ok(())
    }

    async fn save_next_id(&self, state: &FileState) -> StoreResult<()> {
        let json = serde_json::to_vec(&state.next_id)?;
        self.write_file(&self.ids_path, json).await
    }
}

/// Checks records read back from disk the same way new records are
/// checked. Duplicate ids keep their first occurrence.
fn checked<S: StudentRecord>(records: Vec<S>) -> StoreResult<Vec<S>> {
    let records = dedupe_ids(records);
    for student in &records {
        student.validate().map_err(|source| StoreError::InvalidRecord {
            id: student.id(),
            source,
        })?;
    }
    Ok(records)
}

#[async_trait]
impl<S: StudentRecord> RosterStore<S> for JsonFileStore<S> {
    async fn current_roster(&self) -> StoreResult<Vec<S>> {
        let mut state = self.state.lock().await;
        self.read(&mut state).await
    }

    async fn replace(&self, records: Vec<S>) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let records = dedupe_ids(records);
        self.load_next_id(&mut state).await?;
        self.write(&records).await?;
        state.observe(&records);
        self.save_next_id(&state).await?;
        info!(count = records.len(), "replaced roster");
        Ok(())
    }

    async fn append(&self, records: Vec<S>) -> StoreResult<usize> {
        let mut state = self.state.lock().await;
        let mut roster = self.read(&mut state).await?;
        let existing: HashSet<i64> = roster.iter().map(StudentRecord::id).collect();

        let fresh: Vec<S> = dedupe_ids(records)
            .into_iter()
            .filter(|student| !existing.contains(&student.id()))
            .collect();
        let added = fresh.len();

        if added > 0 {
            roster.extend(fresh);
            self.write(&roster).await?;
            state.observe(&roster);
            self.save_next_id(&state).await?;
        }
        info!(added, total = roster.len(), "appended records");
        Ok(added)
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let mut roster = self.read(&mut state).await?;
        let before = roster.len();
        roster.retain(|student| student.id() != id);

        if roster.len() == before {
            return Ok(false);
        }
        self.write(&roster).await?;
        self.save_next_id(&state).await?;
        info!(id, "deleted record");
        Ok(true)
    }

    async fn reset(&self) -> StoreResult<Vec<S>> {
        let mut state = self.state.lock().await;
        let defaults = S::default_roster();
        self.load_next_id(&mut state).await?;
        self.write(&defaults).await?;
        state.observe(&defaults);
        self.save_next_id(&state).await?;
        info!(count = defaults.len(), "reset roster to defaults");
        Ok(defaults)
    }

    async fn allocate_id(&self) -> StoreResult<i64> {
        let mut state = self.state.lock().await;
        self.read(&mut state).await?;
        let id = state.next_id;
        state.next_id += 1;
        self.save_next_id(&state).await?;
        Ok(id)
    }
}
