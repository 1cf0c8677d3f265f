//! Recoverable error types.
//!
//! Contract violations (missing stage, unknown layer that must exist) are
//! panics, not variants here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading, migrating or saving persisted state.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("persisted state has no `_version` field; migration required")]
    MigrationRequired,

    #[error("unsupported state version {0}")]
    UnsupportedVersion(u64),
}

impl From<Box<bincode::ErrorKind>> for PersistError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        PersistError::Serialize(e.to_string())
    }
}

/// Failure reported by the generation backend for a mutation request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ApiError(pub String);

/// Errors surfaced by the headless CLI.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("no input scripts matched and no --state was given")]
    NoInputs,

    #[error("could not read script '{path}': {source}")]
    ReadScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid script '{path}': {source}")]
    ParseScript {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state error: {0}")]
    Persist(#[from] PersistError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
