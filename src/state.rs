//! Connection state as observed by the supervision task.
//!
//! The lifecycle flows `Connecting -> Connected -> Disconnected ->
//! Reconnecting -> Connecting -> ...`. Transitions are driven exclusively by
//! the connection supervisor; the sample loop only reads the state through a
//! watch channel and never mutates it.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Waiting for the broker to accept the connection.
    Connecting,

    /// Handshake complete, keep-alive active. Publishes go straight out.
    Connected,

    /// Connection lost. Carries the broker/network reason.
    Disconnected(String),

    /// Waiting out a backoff delay (in seconds) before the next attempt.
    Reconnecting(f64),
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected(_) => "Disconnected",
            ConnectionState::Reconnecting(_) => "Reconnecting",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected(reason) => write!(f, "Disconnected ({reason})"),
            ConnectionState::Reconnecting(seconds) => {
                write!(f, "Reconnecting (in {seconds} seconds)")
            }
            other => write!(f, "{}", other.as_str()),
        }
    }
}
