use crate::Route;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHttpError {
    /// Network or request execution error from `reqwest`, including connect
    /// and read timeouts. Never retried.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// The underlying `reqwest` client could not be constructed.
    #[error("client build error: {0}")]
    Build(reqwest::Error),
    /// Target URL could not be parsed or uses an unsupported scheme.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// No connection slot became free within the acquisition timeout.
    #[error("timed out after {waited_ms} ms waiting for a connection to {route}")]
    PoolTimeout { route: Route, waited_ms: u64 },
    /// The client was closed.
    #[error("client is closed")]
    Closed,
    /// Invalid configuration value.
    #[error("config error: {0}")]
    Config(String),
    /// Payload could not be encoded as JSON.
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}
