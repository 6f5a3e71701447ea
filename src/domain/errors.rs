// Recoverable protocol and transport errors. None of them terminate the process.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArenaError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unknown message type `{0}`")]
    UnknownMessageType(String),

    #[error("invalid payload field `{field}`: {reason}")]
    InvalidPayload { field: String, reason: String },

    #[error("transport unavailable: not connected")]
    TransportUnavailable,

    #[error("connect requested while already connected")]
    DuplicateConnect,
}

impl ArenaError {
    pub fn invalid_payload(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ArenaError::InvalidPayload {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Client-side patch anomalies. The offending patch is dropped; the world stays usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("patch received before the first world_state")]
    NoBaseline,

    #[error("patch references player {0}, which is not alive")]
    UnknownPlayer(u32),
}
