//! Environment-driven configuration.
//!
//! Every setting has a default except the bot token.  Values are read from
//! the process environment, which `main` first populates from a `.env` file
//! when one exists.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;

use crate::error::ConfigError;

pub const DEFAULT_RSS_URL: &str = "https://www.olx.pl/motoryzacja/samochody/lodzkie/?search%5Bfilter_float_price:to%5D=7000&search%5Bfilter_float_year:from%5D=2000&format=rss";

/// Some classifieds sites refuse requests with reqwest's default agent.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    pub rss_url: String,
    pub interval: Duration,
    pub seen_file: PathBuf,
    pub target_file: PathBuf,
    pub check_links: bool,
    pub http_timeout: Duration,
    pub send_delay: Duration,
    pub user_agent: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.  Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        Ok(Self {
            bot_token,
            rss_url: get("RSS_URL").unwrap_or_else(|| DEFAULT_RSS_URL.to_string()),
            interval: positive_secs(&get, "CHECK_INTERVAL_SECONDS", 300)?,
            seen_file: get("SEEN_FILE").unwrap_or_else(|| "seen.json".into()).into(),
            target_file: get("TARGET_FILE").unwrap_or_else(|| "target.txt".into()).into(),
            check_links: parse_bool(&get, "CHECK_LINKS", true)?,
            http_timeout: positive_secs(&get, "HTTP_TIMEOUT_SECONDS", 20)?,
            send_delay: Duration::from_millis(parse_or(&get, "SEND_DELAY_MS", 300)?),
            user_agent: get("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }

    /// Shared HTTP client for the feed, the link probe and the bot API.
    pub fn http_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(self.http_timeout)
            .user_agent(&self.user_agent)
            .build()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("rss_url", &self.rss_url)
            .field("interval", &self.interval)
            .field("seen_file", &self.seen_file)
            .field("target_file", &self.target_file)
            .field("check_links", &self.check_links)
            .field("http_timeout", &self.http_timeout)
            .field("send_delay", &self.send_delay)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

/// Whole seconds, at least 1.
fn positive_secs<G>(get: &G, var: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match parse_or(get, var, default)? {
        0 => Err(ConfigError::Invalid {
            var,
            value: "0".into(),
            reason: "must be at least 1".into(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn parse_bool<G>(get: &G, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var,
                value,
                reason: "expected true or false".into(),
            }),
        },
    }
}
