//! Client error types

use thiserror::Error;

use crate::rooms::RoomIdError;

/// Errors surfaced by protocol client operations.
///
/// Every client call returns a tagged `Result`; callers branch on the
/// variant, never on the runtime shape of a response.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connection, TLS, timeout)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status with the homeserver's error body
    #[error("homeserver returned {status} {errcode}: {message}")]
    Api {
        status: u16,
        errcode: String,
        message: String,
    },

    /// A 2xx response whose body did not match the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The configured homeserver URL cannot be used as an API base
    #[error("invalid homeserver URL: {0}")]
    InvalidHomeserver(String),

    #[error(transparent)]
    RoomId(#[from] RoomIdError),
}

impl ClientError {
    /// Whether this error came from a room identifier that can never be
    /// joined, as opposed to a transient homeserver condition
    pub fn is_malformed_room_id(&self) -> bool {
        matches!(self, ClientError::RoomId(_))
    }
}
