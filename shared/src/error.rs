//! Error taxonomy for the replication core.
//!
//! Nothing in here is fatal to the process: every failure degrades to
//! "drop and continue" because the system tolerates an unreliable channel
//! and out-of-order delivery by design.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A wire blob is missing a required field. The message is dropped,
    /// the connection stays up.
    #[error("malformed blob: missing required field '{0}'")]
    MissingField(&'static str),

    /// A creation blob names a type tag with no registered constructor.
    /// The entity is dropped; the rest of the batch is still processed.
    #[error("no factory registered for type tag '{0}'")]
    UnknownTypeTag(String),

    /// A second login arrived from an already-registered session.
    #[error("session is already logged in")]
    DuplicateLogin,

    /// The connection could not be established within the retry budget.
    #[error("could not connect after {attempts} attempts")]
    ConnectFailed { attempts: u32 },

    /// A frame exceeded the maximum allowed size.
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    /// Wire-level (de)serialization failure.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}
