//! Shared test helpers: a tiny HTTP server answering every request with the
//! same canned response, and fakes for the relay's injected capabilities.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

use crate::error::{FeedError, SendError};
use crate::liveness::LinkProbe;
use crate::sender::MessageSender;
use crate::source::{Entry, FeedSource};
use crate::target::ChatId;

/// Sender that records every delivered message.
///
/// Results queued with [`fail_after`](RecordingSender::fail_after) are returned
/// by the next sends, in order; failed attempts are not recorded.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(ChatId, String)>>,
    sent_at: Mutex<Vec<Instant>>,
    script: Mutex<VecDeque<Result<(), SendError>>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    /// Clock reading at each recorded send.
    pub fn sent_at(&self) -> Vec<Instant> {
        self.sent_at.lock().unwrap().clone()
    }

    /// Let `ok` sends succeed, then fail the following one with `err`.
    pub fn fail_after(&self, ok: usize, err: SendError) {
        let mut script = self.script.lock().unwrap();
        script.extend((0..ok).map(|_| Ok(())));
        script.push_back(Err(err));
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), SendError> {
        if let Some(result) = self.script.lock().unwrap().pop_front() {
            result?;
        }
        self.sent.lock().unwrap().push((chat, text.to_string()));
        self.sent_at.lock().unwrap().push(Instant::now());
        Ok(())
    }
}

/// Feed source returning a fixed list of entries, or failing with a status.
#[derive(Default)]
pub struct StaticFeed {
    entries: Mutex<Vec<Entry>>,
    fail_status: Mutex<Option<u16>>,
    fetches: Mutex<usize>,
}

impl StaticFeed {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    pub fn set_entries(&self, entries: Vec<Entry>) {
        *self.entries.lock().unwrap() = entries;
    }

    pub fn fail_with_status(&self, status: u16) {
        *self.fail_status.lock().unwrap() = Some(status);
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<Entry>, FeedError> {
        *self.fetches.lock().unwrap() += 1;
        if let Some(status) = *self.fail_status.lock().unwrap() {
            let status = reqwest::StatusCode::from_u16(status).unwrap();
            return Err(FeedError::Status(status));
        }
        Ok(self.entries.lock().unwrap().clone())
    }
}

/// Probe that treats a configurable set of URLs as dead.
#[derive(Default)]
pub struct FakeProbe {
    dead: Mutex<HashSet<String>>,
}

impl FakeProbe {
    pub fn dead(urls: &[&str]) -> Self {
        Self {
            dead: Mutex::new(urls.iter().map(|u| u.to_string()).collect()),
        }
    }

    pub fn revive(&self, url: &str) {
        self.dead.lock().unwrap().remove(url);
    }
}

#[async_trait]
impl LinkProbe for FakeProbe {
    async fn is_alive(&self, url: &str) -> bool {
        !self.dead.lock().unwrap().contains(url)
    }
}

/// HTTP client that ignores proxy settings from the environment.
pub fn local_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Shorthand: entry whose id is its link.
pub fn listing(n: u32, title: &str) -> Entry {
    let link = format!("http://x/{n}");
    Entry::new(link.clone(), title, link)
}

pub struct TestServer {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub async fn start(status: u16, headers: &[(&str, &str)], body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown");
        let mut response = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n",
            body.len()
        );
        for (name, value) in headers {
            response.push_str(&format!("{name}: {value}\r\n"));
        }
        response.push_str("\r\n");
        response.push_str(body);

        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let response = response.clone();
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let mut raw = Vec::new();
                    let mut buf = [0u8; 4096];
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                raw.extend_from_slice(&buf[..n]);
                                if request_complete(&raw) {
                                    break;
                                }
                            }
                        }
                    }
                    log.lock().unwrap().push(String::from_utf8_lossy(&raw).into_owned());
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            base: format!("http://{addr}"),
            requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Raw text of every request received so far, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// True once the headers and any `Content-Length` body have arrived.
fn request_complete(raw: &[u8]) -> bool {
    let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&raw[..end]).to_ascii_lowercase();
    let body_len = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= end + 4 + body_len
}
