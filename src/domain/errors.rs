//! Error taxonomy and connection statuses.
//!
//! An empty history response is deliberately not an error: it marks the
//! start of available history and flips `reached_oldest` instead.

use derive_more::Display;

#[derive(Debug, Clone, PartialEq, Display)]
pub enum DataError {
    /// Transport failure or non-success HTTP status. The existing
    /// buffer is kept; the UI surfaces a retry banner.
    #[display(fmt = "network failure: {}", _0)]
    Network(String),
    /// A push message that could not be parsed. Dropped without
    /// touching the buffer.
    #[display(fmt = "malformed stream message: {}", _0)]
    Malformed(String),
    /// A push message for a stream the chart is no longer tuned to.
    #[display(fmt = "stale message for stream {}", _0)]
    StaleStream(String),
    /// Invalid symbol or timeframe input at the API boundary.
    #[display(fmt = "invalid request: {}", _0)]
    InvalidRequest(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ApiStatus {
    #[display(fmt = "idle")]
    Idle,
    #[display(fmt = "loading")]
    Loading,
    #[display(fmt = "ok")]
    Ok,
    #[display(fmt = "error")]
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StreamStatus {
    #[display(fmt = "disconnected")]
    Disconnected,
    #[display(fmt = "connecting")]
    Connecting,
    #[display(fmt = "live")]
    Live,
    #[display(fmt = "reconnecting")]
    Reconnecting,
}
