use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by [`crate::store::ProfileStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile storage unavailable: {0}")]
    StorageUnavailable(#[source] io::Error),
    #[error("failed to encode profile: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no profile matches '{0}'")]
    NotFound(String),
    #[error("'{query}' matches {count} profiles; use the profile id instead")]
    Ambiguous { query: String, count: usize },
}

/// Failures surfaced by [`crate::switch::SwitchEngine`] and the identity backend
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("key generation failed: {reason}")]
    GenerationFailed { reason: String },
    #[error("{path} does not contain an OpenSSH private key")]
    MalformedKeyMaterial { path: PathBuf },
    #[error("invalid key label '{0}'")]
    InvalidLabel(String),
    #[error("failed to run {program}: {source}")]
    Command {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("background task failed: {0}")]
    Task(String),
}

pub type SwitchResult<T> = Result<T, SwitchError>;
