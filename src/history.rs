use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::warn;

pub const DEFAULT_CAPACITY: usize = 5;
pub const FILE_NAME: &str = "recent_queries.json";

/// Recently asked queries, newest first. Asking the same text again moves
/// it to the front instead of adding a second copy.
#[derive(Debug, Clone)]
pub struct QueryHistory {
    path: PathBuf,
    capacity: usize,
    entries: Vec<String>,
}

impl QueryHistory {
    /// Loads the history file. A missing or unreadable file starts empty.
    pub fn load(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<Vec<String>>(&bytes).unwrap_or_else(|err| {
                warn!(path = ?path, %err, "ignoring unreadable query history");
                Vec::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                warn!(path = ?path, %err, "could not read query history");
                Vec::new()
            }
        };

        let mut history = Self {
            path,
            capacity: capacity.max(1),
            entries,
        };
        history.entries.truncate(history.capacity);
        history
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a query. Blank input is ignored.
    pub fn record(&mut self, query: &str) {
        if query.trim().is_empty() {
            return;
        }
        self.entries.retain(|existing| existing != query);
        self.entries.insert(0, query.to_string());
        self.entries.truncate(self.capacity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(&self.entries)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}
