//! The single delivery destination.
//!
//! Stored as the decimal chat id on one line, so a restart keeps the last
//! destination an admin configured.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::PersistError;
use crate::seen::atomic_write;

/// Telegram chat identifier.  Negative for groups and channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChatId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ChatId)
    }
}

/// File-backed cell holding the optional target.  Last write wins.
pub struct TargetRegistry {
    path: PathBuf,
    current: Option<ChatId>,
}

impl TargetRegistry {
    /// Load from `path`; a missing or malformed file means no target.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match fs::read_to_string(&path) {
            Ok(text) => match text.parse::<ChatId>() {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "target file is malformed, ignoring");
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "target file unreadable, ignoring");
                None
            }
        };
        Self { path, current }
    }

    pub fn get(&self) -> Option<ChatId> {
        self.current
    }

    /// Replace the target and persist it.
    ///
    /// The in-memory value is updated even when the write fails, so the
    /// running process keeps delivering to the new chat.
    pub fn set(&mut self, id: ChatId) -> Result<(), PersistError> {
        self.current = Some(id);
        atomic_write(&self.path, format!("{id}\n").as_bytes())
    }
}
