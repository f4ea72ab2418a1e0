/// Errors raised by the status/console websocket stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("missing exaroton token or server id")]
    MissingCredentials,
    #[error("invalid authorization header")]
    InvalidToken,
    #[error("websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Errors raised by the control-plane HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("missing exaroton token or server id")]
    MissingCredentials,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}
