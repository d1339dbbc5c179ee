//! Error types for every stage of a relay tick.
//!
//! Nothing in here is fatal on its own.  The delivery loop catches each of
//! these at tick granularity, logs it, and records its [`ErrorClass`] in the
//! tick status.  Only [`ConfigError`] stops the process, and only at startup.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failure to obtain entries from the remote feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Timeout, DNS failure, refused connection, or an unreadable body.
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("feed returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The body is neither RSS nor Atom.
    #[error("feed could not be parsed: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
}

/// Failure to deliver one message to the destination chat.
#[derive(Debug, Error)]
pub enum SendError {
    /// The platform asked us to slow down.
    #[error("rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// The request never produced an API answer.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with an error other than rate limiting.
    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },
}

/// Failure to write durable state.  The previous file on disk stays intact.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Invalid or missing startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Coarse classification of a tick failure, shown by `/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Fetch,
    Parse,
    Delivery,
    RateLimited,
    Persistence,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorClass::Fetch => "fetch error",
            ErrorClass::Parse => "parse error",
            ErrorClass::Delivery => "delivery error",
            ErrorClass::RateLimited => "rate limited",
            ErrorClass::Persistence => "persistence error",
        };
        f.write_str(label)
    }
}

impl FeedError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FeedError::Parse(_) => ErrorClass::Parse,
            FeedError::Request(_) | FeedError::Status(_) => ErrorClass::Fetch,
        }
    }
}

impl SendError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SendError::RateLimited { .. } => ErrorClass::RateLimited,
            SendError::Network(_) | SendError::Api { .. } => ErrorClass::Delivery,
        }
    }

    /// True when the API refused this particular message, so sending it
    /// again can never succeed.
    ///
    /// Only a plain `400 Bad Request` about the message itself counts.
    /// Errors naming the chat (not found, upgraded, missing rights) concern
    /// the target, as do 401 and 403, and are worth retrying once fixed.
    pub fn is_message_rejected(&self) -> bool {
        match self {
            SendError::Api { code, description } => {
                *code == 400 && !description.to_ascii_lowercase().contains("chat")
            }
            _ => false,
        }
    }

    /// Server-specified back-off, if this is a rate-limit response.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SendError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_error_classes() {
        let limited = SendError::RateLimited {
            retry_after: Duration::from_secs(7),
        };
        assert_eq!(limited.class(), ErrorClass::RateLimited);
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(limited.to_string(), "rate limited, retry after 7s");

        let api = SendError::Api {
            code: 400,
            description: "Bad Request: chat not found".into(),
        };
        assert_eq!(api.class(), ErrorClass::Delivery);
        assert!(api.retry_after().is_none());
    }

    #[test]
    fn only_message_level_bad_requests_are_rejections() {
        let api = |code, description: &str| SendError::Api {
            code,
            description: description.into(),
        };

        assert!(api(400, "Bad Request: message is too long").is_message_rejected());
        assert!(!api(400, "Bad Request: chat not found").is_message_rejected());
        assert!(!api(403, "Forbidden: bot was kicked from the group chat").is_message_rejected());
        assert!(!api(401, "Unauthorized").is_message_rejected());
        assert!(!SendError::RateLimited {
            retry_after: Duration::from_secs(1)
        }
        .is_message_rejected());
    }

    #[test]
    fn feed_error_status_is_fetch_class() {
        let err = FeedError::Status(reqwest::StatusCode::FORBIDDEN);
        assert_eq!(err.class(), ErrorClass::Fetch);
        assert_eq!(err.to_string(), "feed returned HTTP 403 Forbidden");
    }

    #[test]
    fn class_labels_are_human_readable() {
        assert_eq!(ErrorClass::Persistence.to_string(), "persistence error");
        assert_eq!(ErrorClass::Parse.to_string(), "parse error");
    }
}
