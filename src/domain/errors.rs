//! Error taxonomy for the sync pipeline
//!
//! - `ClientError`: anything an external collaborator (HTTP API, media host,
//!   alert channel) can fail with. All of these are transient I/O from the
//!   pipeline's point of view: logged, item or page skipped, no retry.
//! - `SyncError`: what a single reconciliation step can fail with before it
//!   is folded into a `SyncOutcome` at the item boundary.

use thiserror::Error;

use crate::domain::sync_outcome::SkipReason;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Request signing failed: {0}")]
    Signing(String),
}

impl ClientError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Transient I/O: {0}")]
    TransientIo(#[from] ClientError),

    #[error("Incomplete data: {0}")]
    DataIncomplete(SkipReason),

    #[error("Identity map error: {0}")]
    IdentityMap(String),
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        Self::IdentityMap(err.to_string())
    }
}
