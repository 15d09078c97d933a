//! In-process [`Network`] double for exercising stores without HTTP.
//!
//! Responses are keyed by `(Method, path)`. Each route holds a queue: calls
//! pop the front response, and the last queued response is replayed once
//! the queue runs down to it. Unknown routes fail with a 404
//! `rest_no_route`, which matches what a WordPress site returns.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;

use crate::error::NetworkError;
use crate::network::{Method, Network, Request};

type Reply = Result<Value, NetworkError>;

#[derive(Default)]
struct StubState {
    routes: HashMap<(Method, String), VecDeque<Reply>>,
    requests: Vec<Request>,
    delay: Option<Duration>,
}

/// Scripted [`Network`] that records every request it receives.
///
/// `Clone` shares state, so a test can keep one clone for assertions
/// after handing another to the code under test.
///
/// # Examples
///
/// ```
/// use fiable::testing::StubNetwork;
/// use fiable::Method;
/// use serde_json::json;
///
/// let stub = StubNetwork::new();
/// stub.respond(Method::Get, "/mate/v1/system-status", json!({"version": "1"}));
/// assert_eq!(stub.request_count("/mate/v1/system-status"), 0);
/// ```
#[derive(Clone, Default)]
pub struct StubNetwork {
    state: Arc<Mutex<StubState>>,
}

impl std::fmt::Debug for StubNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("StubNetwork")
            .field("routes", &state.routes.len())
            .field("requests", &state.requests.len())
            .finish()
    }
}

impl StubNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, method: Method, path: &str, reply: Reply) -> &Self {
        self.lock()
            .routes
            .entry((method, path.to_owned()))
            .or_default()
            .push_back(reply);
        self
    }

    /// Queue a successful response for `method path`.
    pub fn respond(&self, method: Method, path: &str, body: Value) -> &Self {
        self.push(method, path, Ok(body))
    }

    /// Queue a failure for `method path`.
    pub fn fail(&self, method: Method, path: &str, err: NetworkError) -> &Self {
        self.push(method, path, Err(err))
    }

    /// Sleep for `delay` before answering every request.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.lock().delay = Some(delay);
        self
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Number of requests received for `path`, any method.
    pub fn request_count(&self, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

#[async_trait::async_trait]
impl Network for StubNetwork {
    async fn perform(&self, request: Request) -> Result<Value, NetworkError> {
        let (reply, delay) = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            let key = (request.method, request.path.clone());
            let reply = match state.routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            };
            (reply, state.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply.unwrap_or_else(|| {
            Err(NetworkError::Status {
                code: 404,
                message: "rest_no_route".to_owned(),
            })
        })
    }
}
