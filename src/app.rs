//! Shared relay state and the operations the command layer calls.
//!
//! One [`Relay`] is built at startup and shared (behind an `Arc`) between the
//! delivery loop and the command poller.  The seen store sits behind an async
//! mutex that the delivery loop holds for a whole tick; the target and the
//! last tick status sit behind plain mutexes that are never held across an
//! `.await`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::{ErrorClass, PersistError, SendError};
use crate::seen::SeenStore;
use crate::sender::MessageSender;
use crate::target::{ChatId, TargetRegistry};

/// Text of the message sent by `/testsend`.
pub const TEST_MESSAGE: &str = "Test message from listing-relay";

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No target configured; nothing was fetched.
    WaitingForTarget,
    /// The feed had no unseen entries.
    NothingNew,
    /// Every new entry was posted, skipped as a dead link, or rejected by
    /// the messaging API as undeliverable.
    Delivered {
        posted: usize,
        dead: usize,
        rejected: usize,
    },
    /// The tick stopped early.  Counts cover what was done before the error.
    Failed {
        class: ErrorClass,
        message: String,
        posted: usize,
        dead: usize,
        rejected: usize,
        /// Extra wait requested by the messaging platform.
        retry_after: Option<Duration>,
    },
}

impl TickOutcome {
    pub(crate) fn failed(class: ErrorClass, message: impl Into<String>) -> Self {
        TickOutcome::Failed {
            class,
            message: message.into(),
            posted: 0,
            dead: 0,
            rejected: 0,
            retry_after: None,
        }
    }
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickOutcome::WaitingForTarget => f.write_str("waiting for target"),
            TickOutcome::NothingNew => f.write_str("nothing new"),
            TickOutcome::Delivered {
                posted,
                dead,
                rejected,
            } => {
                write!(f, "posted {posted}")?;
                if *dead > 0 {
                    write!(f, ", skipped {dead} dead")?;
                }
                if *rejected > 0 {
                    write!(f, ", {rejected} rejected")?;
                }
                Ok(())
            }
            TickOutcome::Failed {
                class,
                message,
                posted,
                ..
            } => {
                write!(f, "{class}: {message}")?;
                if *posted > 0 {
                    write!(f, " (after posting {posted})")?;
                }
                Ok(())
            }
        }
    }
}

/// Timestamped outcome of the most recent tick.
#[derive(Debug, Clone)]
pub struct TickStatus {
    pub at: DateTime<Utc>,
    pub outcome: TickOutcome,
}

/// Snapshot returned by [`Relay::status`].
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub target: Option<ChatId>,
    pub interval: Duration,
    pub last_tick: Option<TickStatus>,
    /// `None` while a tick holds the seen store.
    pub seen: Option<usize>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(id) => writeln!(f, "Target: {id}")?,
            None => writeln!(f, "Target: not set")?,
        }
        writeln!(f, "Interval: {}s", self.interval.as_secs())?;
        match &self.last_tick {
            Some(tick) => {
                writeln!(f, "Last check: {}", tick.at.format("%Y-%m-%d %H:%M:%S UTC"))?;
                write!(f, "Last result: {}", tick.outcome)?;
            }
            None => write!(f, "Last check: never")?,
        }
        match self.seen {
            Some(n) => write!(f, "\nSeen: {n}"),
            None => write!(f, "\nSeen: (check in progress)"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TestSendError {
    #[error("no target set")]
    NoTarget,
    #[error(transparent)]
    Send(#[from] SendError),
}

/// The relay service: shared state plus the operations exposed to commands.
pub struct Relay {
    seen: tokio::sync::Mutex<SeenStore>,
    target: Mutex<TargetRegistry>,
    last_tick: Mutex<Option<TickStatus>>,
    sender: Arc<dyn MessageSender>,
    interval: Duration,
}

impl Relay {
    pub fn new(
        seen: SeenStore,
        target: TargetRegistry,
        sender: Arc<dyn MessageSender>,
        interval: Duration,
    ) -> Self {
        Self {
            seen: tokio::sync::Mutex::new(seen),
            target: Mutex::new(target),
            last_tick: Mutex::new(None),
            sender,
            interval,
        }
    }

    pub fn target(&self) -> Option<ChatId> {
        lock(&self.target).get()
    }

    /// Point delivery at `id`.  The new target takes effect immediately even
    /// if persisting it fails.
    pub fn set_target(&self, id: ChatId) -> Result<(), PersistError> {
        let result = lock(&self.target).set(id);
        match &result {
            Ok(()) => tracing::info!(target_chat = %id, "target set"),
            Err(e) => tracing::error!(target_chat = %id, error = %e, "target set but not persisted"),
        }
        result
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            target: self.target(),
            interval: self.interval,
            last_tick: lock(&self.last_tick).clone(),
            seen: self.seen.try_lock().ok().map(|s| s.len()),
        }
    }

    /// Send [`TEST_MESSAGE`] to the current target.
    pub async fn test_send(&self) -> Result<ChatId, TestSendError> {
        let chat = self.target().ok_or(TestSendError::NoTarget)?;
        self.sender.send_message(chat, TEST_MESSAGE).await?;
        Ok(chat)
    }

    pub(crate) fn seen(&self) -> &tokio::sync::Mutex<SeenStore> {
        &self.seen
    }

    pub(crate) fn sender(&self) -> &dyn MessageSender {
        self.sender.as_ref()
    }

    pub(crate) fn record(&self, status: TickStatus) {
        *lock(&self.last_tick) = Some(status);
    }
}

/// Lock a std mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSender;
    use tempfile::TempDir;

    fn relay(dir: &TempDir, sender: Arc<RecordingSender>) -> Relay {
        Relay::new(
            SeenStore::load(dir.path().join("seen.json")),
            TargetRegistry::load(dir.path().join("target.txt")),
            sender,
            Duration::from_secs(300),
        )
    }

    #[test]
    fn status_before_any_tick() {
        let dir = TempDir::new().unwrap();
        let relay = relay(&dir, Arc::new(RecordingSender::default()));

        let report = relay.status();
        assert_eq!(report.target, None);
        assert_eq!(report.seen, Some(0));
        assert_eq!(
            report.to_string(),
            "Target: not set\nInterval: 300s\nLast check: never\nSeen: 0"
        );
    }

    #[test]
    fn set_target_is_visible_in_status_and_persisted() {
        let dir = TempDir::new().unwrap();
        let relay = relay(&dir, Arc::new(RecordingSender::default()));

        relay.set_target(ChatId(77)).unwrap();

        assert_eq!(relay.status().target, Some(ChatId(77)));
        let reloaded = TargetRegistry::load(dir.path().join("target.txt"));
        assert_eq!(reloaded.get(), Some(ChatId(77)));
    }

    #[test]
    fn status_shows_last_tick() {
        let dir = TempDir::new().unwrap();
        let relay = relay(&dir, Arc::new(RecordingSender::default()));
        relay.record(TickStatus {
            at: Utc::now(),
            outcome: TickOutcome::Delivered {
                posted: 3,
                dead: 1,
                rejected: 0,
            },
        });

        let text = relay.status().to_string();
        assert!(text.contains("Last result: posted 3, skipped 1 dead"), "{text}");

        relay.record(TickStatus {
            at: Utc::now(),
            outcome: TickOutcome::Delivered {
                posted: 1,
                dead: 0,
                rejected: 2,
            },
        });
        let text = relay.status().to_string();
        assert!(text.contains("Last result: posted 1, 2 rejected"), "{text}");
    }

    #[tokio::test]
    async fn test_send_without_target() {
        let dir = TempDir::new().unwrap();
        let sender = Arc::new(RecordingSender::default());
        let relay = relay(&dir, sender.clone());

        assert!(matches!(relay.test_send().await, Err(TestSendError::NoTarget)));
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_goes_to_target() {
        let dir = TempDir::new().unwrap();
        let sender = Arc::new(RecordingSender::default());
        let relay = relay(&dir, sender.clone());
        relay.set_target(ChatId(5)).unwrap();

        assert_eq!(relay.test_send().await.unwrap(), ChatId(5));
        assert_eq!(sender.sent(), vec![(ChatId(5), TEST_MESSAGE.to_string())]);
    }

    #[test]
    fn failed_outcome_mentions_partial_progress() {
        let outcome = TickOutcome::Failed {
            class: ErrorClass::RateLimited,
            message: "rate limited, retry after 5s".into(),
            posted: 2,
            dead: 0,
            rejected: 0,
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(
            outcome.to_string(),
            "rate limited: rate limited, retry after 5s (after posting 2)"
        );
    }
}
