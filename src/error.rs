//! Crate-level error types for network calls, storage commits, and dispatch.

/// Error returned by a [`Network`](crate::Network) implementation.
///
/// These are transport and remote failures. Most stores forward them to
/// the caller unchanged inside [`StoreError::Network`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkError {
    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status code.
    #[error("remote returned status {code}: {message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Error code or message extracted from the response body.
        message: String,
    },

    /// The request body could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The remote host could not be reached.
    #[error("remote unreachable: {0}")]
    Unreachable(String),
}

/// Normalized domain error for stores that unify heterogeneous remote
/// error shapes before surfacing them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The credentials used for the request are no longer valid.
    #[error("invalid token")]
    InvalidToken,

    /// The request reached the server but was rejected as malformed.
    #[error("request failed")]
    RequestFailed,

    /// The authenticated user is not allowed to perform this request.
    #[error("unauthorized")]
    Unauthorized,

    /// The site does not expose the requested REST route.
    #[error("no REST route")]
    NoRestRoute,

    /// The requested resource does not exist on the remote.
    #[error("resource does not exist")]
    ResourceDoesNotExist,

    /// Anything not covered above.
    #[error("unknown API error: {message}")]
    Unknown {
        /// Human-readable description of the underlying error.
        message: String,
    },
}

impl ApiError {
    /// Classify a [`NetworkError`] into the domain set.
    ///
    /// Status codes and well-known error codes map onto dedicated
    /// variants. Transport-level failures (timeouts, unreachable hosts,
    /// undecodable bodies) become [`ApiError::Unknown`].
    pub fn from_network(err: &NetworkError) -> Self {
        match err {
            NetworkError::Status { code, message } => match (*code, message.as_str()) {
                (_, "invalid_token") => Self::InvalidToken,
                (_, "rest_no_route") => Self::NoRestRoute,
                (401, _) => Self::InvalidToken,
                (403, _) => Self::Unauthorized,
                (404, _) => Self::ResourceDoesNotExist,
                (400, _) => Self::RequestFailed,
                _ => Self::Unknown {
                    message: err.to_string(),
                },
            },
            other => Self::Unknown {
                message: other.to_string(),
            },
        }
    }
}

/// Error raised by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem failure while reading or committing a table.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be converted to or from its stored form.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The derived-storage writer thread has exited.
    #[error("derived storage writer is no longer running")]
    WriterGone,

    /// The session that owned the writer has ended; nothing more is
    /// committed on its behalf.
    #[error("storage is closed to the previous session")]
    Closed,
}

/// Error delivered through an action's completion.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The network call failed; forwarded unchanged.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The network call failed and the store normalized the error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The remote call succeeded but the local commit did not.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Error observed by the caller awaiting a [`Pending`](crate::Pending).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The store answered the action with an error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The action was dropped without an answer.
    ///
    /// Happens when no store is registered for the action in the active
    /// state, or when the handling store went away mid-flight.
    #[error("action was dropped without a response")]
    Dropped,
}

/// Error raised while persisting or loading session credentials.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The credentials could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error raised while opening a [`StoresManager`](crate::StoresManager) or
/// switching its session.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// No runtime was configured and none is current.
    #[error("no tokio runtime available for store tasks")]
    NoRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, message: &str) -> NetworkError {
        NetworkError::Status {
            code,
            message: message.to_string(),
        }
    }

    #[test]
    fn status_codes_map_to_api_errors() {
        assert_eq!(ApiError::from_network(&status(401, "")), ApiError::InvalidToken);
        assert_eq!(ApiError::from_network(&status(403, "")), ApiError::Unauthorized);
        assert_eq!(
            ApiError::from_network(&status(404, "")),
            ApiError::ResourceDoesNotExist
        );
        assert_eq!(ApiError::from_network(&status(400, "")), ApiError::RequestFailed);
    }

    #[test]
    fn error_codes_take_precedence_over_status() {
        assert_eq!(
            ApiError::from_network(&status(404, "rest_no_route")),
            ApiError::NoRestRoute
        );
        assert_eq!(
            ApiError::from_network(&status(400, "invalid_token")),
            ApiError::InvalidToken
        );
    }

    #[test]
    fn transport_failures_become_unknown() {
        let err = ApiError::from_network(&NetworkError::Transport("reset by peer".into()));
        match err {
            ApiError::Unknown { message } => assert!(message.contains("reset by peer")),
            other => panic!("expected Unknown, got: {other:?}"),
        }
    }

    #[test]
    fn encode_failures_are_not_decode_failures() {
        let err = NetworkError::Encode("key must be a string".into());
        assert_eq!(err.to_string(), "failed to encode request: key must be a string");
        assert!(matches!(ApiError::from_network(&err), ApiError::Unknown { .. }));
    }

    #[test]
    fn server_errors_become_unknown() {
        assert!(matches!(
            ApiError::from_network(&status(500, "boom")),
            ApiError::Unknown { .. }
        ));
    }

    #[test]
    fn store_error_network_is_transparent() {
        let err = StoreError::from(NetworkError::Timeout);
        assert_eq!(err.to_string(), "request timed out");
    }

    #[test]
    fn storage_error_io_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = StorageError::from(io_err);
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn dispatch_error_dropped_display() {
        assert_eq!(
            DispatchError::Dropped.to_string(),
            "action was dropped without a response"
        );
    }

    // Errors cross task boundaries through tokio channels.
    const _: () = {
        #[allow(dead_code)]
        fn assert_send_sync<T: Send + Sync>() {}

        #[allow(dead_code)]
        fn check() {
            assert_send_sync::<StoreError>();
            assert_send_sync::<DispatchError>();
            assert_send_sync::<SessionError>();
            assert_send_sync::<ManagerError>();
        }
    };
}
