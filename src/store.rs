//! Durable record of upload ids that were already announced.
//!
//! The whole set lives in memory and is rewritten to one JSON file on every new
//! addition. Only the scheduler's tick path mutates it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::StoreError;
use crate::probe::Platform;

pub const DEFAULT_STATE_PATH: &str = "state/seen_uploads.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SeenRecord {
    #[serde(default)]
    seen: Vec<String>,
}

#[derive(Debug)]
pub struct SeenEventStore {
    path: PathBuf,
    seen: HashSet<String>,
}

fn key(platform: Platform, id: &str) -> String {
    format!("{platform}:{id}")
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl SeenEventStore {
    /// Load the set, degrading to empty when the file is unreadable or corrupt.
    /// Old uploads may be announced once more in that case; the warning says so.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::try_open(path.clone()).await {
            Ok(store) => {
                tracing::info!(path = %path.display(), entries = store.len(), "seen store loaded");
                store
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "seen store unreadable; starting empty (recent uploads may be re-announced)"
                );
                Self {
                    path,
                    seen: HashSet::new(),
                }
            }
        }
    }

    /// Strict load. A missing file is an empty store, not an error.
    pub async fn try_open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let seen = match fs::read_to_string(&path).await {
            Ok(s) if s.trim().is_empty() => HashSet::new(),
            Ok(s) => {
                let rec: SeenRecord = serde_json::from_str(&s)?;
                rec.seen.into_iter().collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(io_err(&path, e)),
        };
        Ok(Self { path, seen })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn has(&self, platform: Platform, id: &str) -> bool {
        self.seen.contains(&key(platform, id))
    }

    /// Record `id` and rewrite the file. Adding a present id is a no-op.
    ///
    /// On a write error the id stays recorded in memory: the announcement already
    /// went out, so this process must not repeat it.
    pub async fn add(&mut self, platform: Platform, id: &str) -> Result<(), StoreError> {
        if !self.seen.insert(key(platform, id)) {
            return Ok(());
        }
        self.persist().await
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let mut seen: Vec<String> = self.seen.iter().cloned().collect();
        seen.sort();
        let json = serde_json::to_vec_pretty(&SeenRecord { seen })?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(|e| io_err(dir, e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await.map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}
