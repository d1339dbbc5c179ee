//! listing-relay: relays new classifieds listings from an RSS/Atom feed to a
//! Telegram chat.
//!
//! ## Architecture overview
//!
//! ```text
//!              fetch()            is_alive()
//!  ┌──────────┐ ◄────── ┌──────────┐ ──────► ┌─────────────┐
//!  │ source/  │         │ poll.rs  │         │ liveness.rs │
//!  │(RSS/Atom)│         │  (loop)  │         └─────────────┘
//!  └──────────┘         └──────────┘
//!                         │      │ send_message()
//!          seen / target  │      ▼
//!                    ┌────────┐ ┌─────────────┐
//!                    │ app.rs │ │ telegram.rs │
//!                    │(Relay) │ └─────────────┘
//!                    └────────┘        ▲ getUpdates
//!                         ▲            │
//!                         └─── commands.rs
//! ```
//!
//! * **`source/`** — the `FeedSource` trait, the `Entry` type and the RSS/Atom
//!   implementation.
//! * **`seen`** — the durable set of processed entry ids.
//! * **`target`** — the durable delivery destination.
//! * **`liveness`** — optional dead-link probe.
//! * **`poll`** — the periodic fetch/diff/deliver/persist loop.
//! * **`app`** — the `Relay` service holding shared state and exposing the
//!   operations the command layer calls.
//! * **`telegram`** / **`sender`** — the Bot API client and the narrow
//!   sending capability the loop depends on.
//! * **`commands`** — admin command parsing and the long-polling loop.
//! * **`config`** — environment configuration.

pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod liveness;
pub mod poll;
pub mod seen;
pub mod sender;
pub mod source;
pub mod target;
pub mod task;
pub mod telegram;

#[cfg(test)]
mod test_support;

pub use app::{Relay, StatusReport, TickOutcome, TickStatus};
pub use config::Config;
pub use poll::DeliveryLoop;
pub use source::{Entry, FeedSource, RssFeed};
pub use target::ChatId;
