//! The delivery loop: fetch, diff, filter, deliver, persist.
//!
//! A single task runs [`DeliveryLoop::tick`] on a fixed interval.  Ticks never
//! overlap: a slow tick pushes the next one back instead of running beside
//! it.  Every failure is caught inside the tick, logged, and recorded as the
//! relay's last [`TickStatus`]; the loop itself only stops on shutdown.
//!
//! ## Delivery guarantees
//!
//! * An id is marked seen right after its entry is posted or dropped as a
//!   dead link, and the seen set is flushed once at the end of the tick.  A
//!   crash before that flush can redeliver at most one tick's worth of
//!   entries.
//! * A failed send stops the batch.  The failed entry and everything after
//!   it stay unseen and are retried next tick, so nothing is lost.
//! * Dead links are marked seen and never retried.
//! * A message the API refuses outright (see
//!   [`SendError::is_message_rejected`](crate::error::SendError::is_message_rejected))
//!   is marked seen and the batch carries on, so one bad listing cannot
//!   block every newer one.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use crate::app::{Relay, TickOutcome, TickStatus};
use crate::error::ErrorClass;
use crate::liveness::LinkProbe;
use crate::seen::SeenStore;
use crate::source::{Entry, FeedSource};
use crate::task::TaskHandle;

/// Pause between two consecutive sends.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(300);

/// Upper bound on a server-requested rate-limit wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(600);

pub struct DeliveryLoop {
    relay: Arc<Relay>,
    source: Arc<dyn FeedSource>,
    probe: Option<Arc<dyn LinkProbe>>,
    send_delay: Duration,
}

impl DeliveryLoop {
    /// `probe` is `None` when dead-link filtering is disabled.
    pub fn new(
        relay: Arc<Relay>,
        source: Arc<dyn FeedSource>,
        probe: Option<Arc<dyn LinkProbe>>,
    ) -> Self {
        Self {
            relay,
            source,
            probe,
            send_delay: DEFAULT_SEND_DELAY,
        }
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// Run one fetch/deliver cycle and record its outcome on the relay.
    pub async fn tick(&self) -> TickOutcome {
        let at = Utc::now();
        let outcome = self.run_tick().await;

        match &outcome {
            TickOutcome::WaitingForTarget => tracing::debug!("no target set, skipping fetch"),
            TickOutcome::NothingNew => tracing::debug!("nothing new"),
            TickOutcome::Delivered {
                posted,
                dead,
                rejected,
            } => {
                tracing::info!(posted, dead, rejected, "tick complete");
            }
            TickOutcome::Failed {
                class,
                message,
                posted,
                dead,
                rejected,
                ..
            } => {
                tracing::warn!(class = %class, posted, dead, rejected, error = %message, "tick failed");
            }
        }

        self.relay.record(TickStatus {
            at,
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn run_tick(&self) -> TickOutcome {
        let Some(chat) = self.relay.target() else {
            return TickOutcome::WaitingForTarget;
        };

        let entries = match self.source.fetch().await {
            Ok(entries) => entries,
            Err(e) => return TickOutcome::failed(e.class(), e.to_string()),
        };

        let mut seen = self.relay.seen().lock().await;
        let fresh = new_entries(entries, &seen);
        if fresh.is_empty() {
            return TickOutcome::NothingNew;
        }
        tracing::info!(source = self.source.name(), count = fresh.len(), "new entries");

        let mut posted = 0;
        let mut dead = 0;
        let mut rejected = 0;
        let mut attempted = false;
        let mut failure = None;

        for entry in &fresh {
            if let Some(probe) = &self.probe {
                if !probe.is_alive(&entry.link).await {
                    tracing::info!(id = %entry.id, "dropping dead link");
                    seen.insert(entry.id.clone());
                    dead += 1;
                    continue;
                }
            }

            if attempted {
                tokio::time::sleep(self.send_delay).await;
            }
            attempted = true;

            match self.relay.sender().send_message(chat, &entry.message()).await {
                Ok(()) => {
                    seen.insert(entry.id.clone());
                    posted += 1;
                }
                Err(e) if e.is_message_rejected() => {
                    tracing::warn!(id = %entry.id, error = %e, "message rejected, dropping entry");
                    seen.insert(entry.id.clone());
                    rejected += 1;
                }
                Err(e) => {
                    tracing::warn!(id = %entry.id, error = %e, "send failed, stopping batch");
                    failure = Some(e);
                    break;
                }
            }
        }

        let persisted = if posted + dead + rejected > 0 { seen.save() } else { Ok(()) };
        if let Err(e) = &persisted {
            tracing::error!(path = %seen.path().display(), error = %e, "failed to save seen set");
        }
        drop(seen);

        match (failure, persisted) {
            (Some(e), _) => TickOutcome::Failed {
                class: e.class(),
                message: e.to_string(),
                posted,
                dead,
                rejected,
                retry_after: e.retry_after().map(|d| d.min(MAX_RETRY_AFTER)),
            },
            (None, Err(e)) => TickOutcome::Failed {
                class: ErrorClass::Persistence,
                message: e.to_string(),
                posted,
                dead,
                rejected,
                retry_after: None,
            },
            (None, Ok(())) => TickOutcome::Delivered {
                posted,
                dead,
                rejected,
            },
        }
    }

    /// Spawn the periodic loop.  The first tick runs immediately.
    ///
    /// On shutdown the loop stops between ticks, so an in-flight tick
    /// finishes (and persists) first.
    pub fn spawn(self, interval: Duration) -> TaskHandle {
        TaskHandle::spawn(move |mut shutdown| async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_secs = interval.as_secs(), "delivery loop started");

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let TickOutcome::Failed { retry_after: Some(wait), .. } = self.tick().await {
                            tracing::info!(wait_secs = wait.as_secs(), "rate limited, deferring next tick");
                            tokio::select! {
                                _ = tokio::time::sleep(wait) => timer.reset(),
                                _ = shutdown.recv() => break,
                            }
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }

            tracing::info!("delivery loop stopped");
        })
    }
}

/// Unseen entries with a usable id, oldest first.
///
/// `entries` is in feed order (newest first); duplicates within the batch
/// keep their first occurrence.
pub fn new_entries(entries: Vec<Entry>, seen: &SeenStore) -> Vec<Entry> {
    let mut batch = HashSet::new();
    let mut fresh: Vec<Entry> = entries
        .into_iter()
        .filter(|e| !e.id.is_empty() && !seen.contains(&e.id) && batch.insert(e.id.clone()))
        .collect();
    fresh.reverse();
    fresh
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
