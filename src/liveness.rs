//! Dead-link filter.
//!
//! Classifieds listings often disappear between being published in the feed
//! and being relayed.  A [`LinkProbe`] lets the delivery loop skip those.
//! The probe never fails: anything other than a clean 200 counts as dead.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn is_alive(&self, url: &str) -> bool;
}

/// Probe that issues a GET (following redirects) and expects HTTP 200.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// `client` should carry the request timeout; redirects follow reqwest's
    /// default policy.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LinkProbe for HttpProbe {
    async fn is_alive(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => {
                let alive = response.status() == StatusCode::OK;
                if !alive {
                    tracing::debug!(url, status = %response.status(), "link is dead");
                }
                alive
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "link check failed");
                false
            }
        }
    }
}
