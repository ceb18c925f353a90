//! In-memory [`Fetcher`] with canned replies, for tests.
//!
//! Replies are registered per URL. A lookup tries the exact URL first and
//! then the URL with its query string removed, so one registration can
//! answer every proximity-scoped variant of an endpoint. Unregistered URLs
//! answer HTTP 404.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{Semaphore, watch};

use crate::{FetchError, Fetcher, RawResponse};

/// A canned reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 200 with this JSON body.
    Json(serde_json::Value),
    /// The given status with this JSON body.
    JsonWithStatus(u16, serde_json::Value),
    /// The given status with an empty body.
    Status(u16),
    /// No response at all.
    Transport(String),
    /// 200 with a body that is not JSON.
    Malformed(String),
}

#[derive(Default)]
struct State {
    routes: BTreeMap<String, VecDeque<MockReply>>,
    gates: BTreeMap<String, Arc<Semaphore>>,
    requests: Vec<String>,
    posted: Vec<serde_json::Value>,
}

/// Test double for [`Fetcher`].
pub struct MockFetcher {
    state: Mutex<State>,
    request_count: watch::Sender<usize>,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    /// Creates a fetcher with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            request_count: watch::Sender::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Answers every request for `url` with `reply`.
    pub fn respond(&self, url: &str, reply: MockReply) {
        self.respond_sequence(url, vec![reply]);
    }

    /// Answers successive requests for `url` with `replies` in order; the
    /// last reply repeats once the others are used up.
    pub fn respond_sequence(&self, url: &str, replies: Vec<MockReply>) {
        self.state()
            .routes
            .insert(url.to_string(), replies.into_iter().collect());
    }

    /// Makes requests for exactly `url` wait until [`MockFetcher::release`].
    pub fn hold(&self, url: &str) {
        self.state()
            .gates
            .insert(url.to_string(), Arc::new(Semaphore::new(0)));
    }

    /// Lets held requests for `url` (current and future) through.
    pub fn release(&self, url: &str) {
        if let Some(gate) = self.state().gates.remove(url) {
            gate.close();
        }
    }

    /// Every URL requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }

    /// Number of requests made for exactly `url`.
    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.state().requests.iter().filter(|r| *r == url).count()
    }

    /// Bodies of every `POST` so far.
    #[must_use]
    pub fn posted_bodies(&self) -> Vec<serde_json::Value> {
        self.state().posted.clone()
    }

    /// Waits until at least `n` requests have been made in total.
    pub async fn wait_for_requests(&self, n: usize) {
        let mut rx = self.request_count.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    async fn next_reply(&self, url: &str) -> MockReply {
        let (reply, gate) = {
            let mut state = self.state();
            state.requests.push(url.to_string());

            let path = url.split('?').next().unwrap_or(url);
            let key = if state.routes.contains_key(url) {
                Some(url.to_string())
            } else if state.routes.contains_key(path) {
                Some(path.to_string())
            } else {
                None
            };

            let reply = key
                .and_then(|key| state.routes.get_mut(&key))
                .and_then(|queue| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    }
                })
                .unwrap_or(MockReply::Status(404));

            (reply, state.gates.get(url).cloned())
        };

        self.request_count.send_modify(|count| *count += 1);

        if let Some(gate) = gate {
            // Closing the semaphore is the release signal.
            let _ = gate.acquire().await;
        }

        reply
    }
}

fn status_error(url: &str, status: u16) -> FetchError {
    FetchError::Status {
        url: url.to_string(),
        status,
        reason: String::new(),
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        match self.next_reply(url).await {
            MockReply::Json(value) => Ok(value),
            MockReply::JsonWithStatus(status, value) if (200..300).contains(&status) => Ok(value),
            MockReply::JsonWithStatus(status, _) | MockReply::Status(status) => {
                Err(status_error(url, status))
            }
            MockReply::Transport(message) => Err(FetchError::Transport {
                url: url.to_string(),
                message,
            }),
            MockReply::Malformed(body) => Err(FetchError::Json {
                url: url.to_string(),
                message: format!("expected JSON, got {body:?}"),
            }),
        }
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<RawResponse, FetchError> {
        self.state().posted.push(body.clone());

        match self.next_reply(url).await {
            MockReply::Json(value) => Ok(RawResponse {
                status: 200,
                body: value.to_string(),
            }),
            MockReply::JsonWithStatus(status, value) => Ok(RawResponse {
                status,
                body: value.to_string(),
            }),
            MockReply::Status(status) => Ok(RawResponse {
                status,
                body: String::new(),
            }),
            MockReply::Transport(message) => Err(FetchError::Transport {
                url: url.to_string(),
                message,
            }),
            MockReply::Malformed(body) => Ok(RawResponse { status: 200, body }),
        }
    }
}
