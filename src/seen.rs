//! Durable set of entry ids that have already been processed.
//!
//! The set lives in memory for the whole process and is flushed explicitly
//! with [`SeenStore::save`].  On disk it is a JSON array of strings, sorted so
//! that successive saves of the same set produce identical files.
//!
//! There is no eviction: the file grows for as long as the feed keeps
//! producing new listings.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::PersistError;

pub struct SeenStore {
    path: PathBuf,
    ids: BTreeSet<String>,
}

impl SeenStore {
    /// Start with an empty set that will be saved to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ids: BTreeSet::new(),
        }
    }

    /// Load the set from `path`.
    ///
    /// A missing file or malformed content yields an empty set; this never
    /// fails.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ids = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Vec<String>>(&text) {
                Ok(list) => list.into_iter().collect(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "seen file is malformed, starting empty");
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "seen file unreadable, starting empty");
                BTreeSet::new()
            }
        };
        tracing::info!(path = %path.display(), count = ids.len(), "seen set loaded");
        Self { path, ids }
    }

    /// Write the whole set to disk, replacing the previous file atomically.
    pub fn save(&self) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(&self.ids)?;
        atomic_write(&self.path, json.as_bytes())
    }

    /// Record `id` as processed.  Returns `false` if it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write `content` to a sibling temp file, then rename it over `path`.
///
/// Readers see either the old file or the new one, never a partial write.
/// A crash before the rename leaves only an orphaned temp file.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.display().to_string(),
        source,
    };

    let temp_path = path.with_file_name(format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id()
    ));
    fs::write(&temp_path, content).map_err(io_err)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(io_err(e));
    }
    Ok(())
}
