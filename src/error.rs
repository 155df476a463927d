//! Error types for the channel boundary and configuration.
//!
//! Nothing past [`crate::protocol::parse_event`] returns an error: the store
//! drops whatever it cannot use.

use thiserror::Error;

/// A broadcast payload that could not be turned into a [`crate::protocol::ChannelEvent`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown subject '{0}'")]
    UnknownSubject(String),

    #[error("empty participant id")]
    EmptyParticipantId,

    #[error("non-finite value in field '{field}'")]
    NonFinite { field: &'static str },

    #[error("empty chat phrase")]
    EmptyPhrase,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("'{field}' must be a positive, finite duration")]
    InvalidDuration { field: &'static str },

    #[error("idle timeout ({idle_ms} ms) must be shorter than disconnect timeout ({disconnect_ms} ms)")]
    ThresholdOrder { idle_ms: f64, disconnect_ms: f64 },

    #[error("bubble lifetime {duration_ms} ms is shorter than its pop-in and fade windows")]
    BubbleTooShort { duration_ms: f64 },
}
