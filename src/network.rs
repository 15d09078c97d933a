//! The network capability consumed by stores, and its HTTP implementation.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;

use crate::error::NetworkError;

/// HTTP verb of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// A remote call described independently of any transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Path relative to the network's base URL, e.g. `/mate/v1/events`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set the JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Performs remote calls on behalf of stores.
///
/// One call per store handler invocation. Timeouts are the
/// implementation's concern; stores add none of their own.
#[async_trait::async_trait]
pub trait Network: Send + Sync + 'static {
    /// Perform `request` and return the decoded JSON body.
    ///
    /// An empty success body is returned as `Value::Null`.
    async fn perform(&self, request: Request) -> Result<Value, NetworkError>;
}

/// Shared, refreshable bearer token.
///
/// Read on every outgoing request, so writing a new value rotates
/// credentials without rebuilding the client. An empty token means no
/// `Authorization` header is sent.
#[derive(Debug, Clone, Default)]
pub struct BearerToken {
    inner: Arc<RwLock<String>>,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token.into())),
        }
    }

    /// Replace the token.
    pub fn set(&self, token: impl Into<String>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = token.into();
    }

    /// Forget the token.
    pub fn clear(&self) {
        self.set(String::new());
    }

    /// `Authorization` header value, or `None` if no token is set.
    pub fn header_value(&self) -> Option<String> {
        let token = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        (!token.is_empty()).then(|| format!("Bearer {token}"))
    }
}

/// Configuration for [`HttpNetwork`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fiable::NetworkConfig;
///
/// let config = NetworkConfig {
///     timeout: Duration::from_secs(10),
///     ..NetworkConfig::default()
/// };
/// assert_eq!(config.base_url, "https://public-api.wordpress.com");
/// ```
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Prefix for every request path.
    pub base_url: String,
    /// Whole-request timeout.
    ///
    /// Default: 30 seconds.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_url: "https://public-api.wordpress.com".to_owned(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("fiable/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

/// [`Network`] over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
    base_url: String,
    token: BearerToken,
}

impl HttpNetwork {
    /// Build a client for `config`, authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::Transport`] if the TLS backend cannot be
    /// initialized.
    pub fn new(config: NetworkConfig, token: BearerToken) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url,
            token,
        })
    }

    /// The token this client reads on each request.
    pub fn token(&self) -> &BearerToken {
        &self.token
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl Network for HttpNetwork {
    async fn perform(&self, request: Request) -> Result<Value, NetworkError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(auth) = self.token.header_value() {
            builder = builder.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let body = response.bytes().await.map_err(classify)?;

        tracing::debug!(
            method = ?request.method,
            path = %request.path,
            status = status.as_u16(),
            "remote call finished"
        );

        if !status.is_success() {
            return Err(NetworkError::Status {
                code: status.as_u16(),
                message: error_message(&body),
            });
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|e| NetworkError::Decode(e.to_string()))
    }
}

fn classify(err: reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout
    } else if err.is_connect() {
        NetworkError::Unreachable(err.to_string())
    } else if err.is_decode() {
        NetworkError::Decode(err.to_string())
    } else {
        NetworkError::Transport(err.to_string())
    }
}

/// Extract the most specific error string from an error body.
///
/// WordPress-style bodies carry `code`; others carry `error` or `message`.
fn error_message(body: &[u8]) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        for key in ["code", "error", "message"] {
            if let Some(Value::String(s)) = map.get(key) {
                return s.clone();
            }
        }
    }
    String::from_utf8_lossy(body).trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_empty_token_produces_bearer_header() {
        let token = BearerToken::new("abc");
        assert_eq!(token.header_value().as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn empty_token_produces_no_header() {
        assert_eq!(BearerToken::default().header_value(), None);
    }

    #[test]
    fn token_mutation_visible_through_clones() {
        let token = BearerToken::new("abc");
        let shared = token.clone();
        shared.set("xyz");
        assert_eq!(token.header_value().as_deref(), Some("Bearer xyz"));
        shared.clear();
        assert_eq!(token.header_value(), None);
    }

    #[test]
    fn request_builders_set_fields() {
        let request = Request::get("/mate/v1/events")
            .with_query("page", 2)
            .with_query("per_page", 25);
        assert_eq!(request.method, Method::Get);
        assert_eq!(
            request.query,
            vec![
                ("page".to_owned(), "2".to_owned()),
                ("per_page".to_owned(), "25".to_owned())
            ]
        );

        let post = Request::post("/x", json!({"a": 1}));
        assert_eq!(post.body, Some(json!({"a": 1})));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let network = HttpNetwork::new(
            NetworkConfig {
                base_url: "https://example.com/".into(),
                ..NetworkConfig::default()
            },
            BearerToken::default(),
        )
        .expect("client should build");
        assert_eq!(
            network.url("/mate/v1/events"),
            "https://example.com/mate/v1/events"
        );
    }

    #[test]
    fn error_message_prefers_code() {
        let body = br#"{"code":"invalid_token","message":"The token is invalid"}"#;
        assert_eq!(error_message(body), "invalid_token");
        assert_eq!(error_message(br#"{"message":"nope"}"#), "nope");
        assert_eq!(error_message(b"  plain text  "), "plain text");
    }

    #[tokio::test]
    async fn unreachable_host_is_reported() {
        let network = HttpNetwork::new(
            NetworkConfig {
                base_url: "http://127.0.0.1:1".into(),
                timeout: Duration::from_secs(5),
                ..NetworkConfig::default()
            },
            BearerToken::default(),
        )
        .expect("client should build");
        let result = network.perform(Request::get("/anything")).await;
        assert!(
            matches!(
                result,
                Err(NetworkError::Unreachable(_) | NetworkError::Transport(_))
            ),
            "got: {result:?}"
        );
    }
}
