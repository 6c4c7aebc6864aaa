//! Error types for synchronization runs.
//!
//! Every variant here is run-fatal. Per-item problems (a project whose info
//! cannot be fetched, an override that fails to copy) are logged and recorded
//! in the [`SyncReport`](crate::SyncReport) instead of being returned.

use camino::Utf8PathBuf;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Manifest(#[from] cfpack_manifest::ManifestError),

    /// The manifest asked for a file revision the project does not list.
    #[error("No file {file_id} in project {project_id}")]
    FileNotInProject { project_id: u64, file_id: u64 },

    #[error("Size mismatch for {path}: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch {
        path: Utf8PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Hash mismatch for {path}")]
    HashMismatch { path: Utf8PathBuf },

    #[error("Unable to download {url} in {attempts} attempts")]
    DownloadFailed { url: String, attempts: u32 },

    /// A file name from the project info provider is not a plain file name.
    #[error("Refusing to write {0:?} outside the destination")]
    UnsafePath(String),

    #[error("Downloading from {host} is not allowed ({url})")]
    DisallowedHost { url: String, host: String },

    #[error("Invalid download URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),

    /// The user chose to exit while resolving an override conflict.
    #[error("Aborted by user")]
    Aborted,

    /// The caller's stop flag was raised.
    #[error("Canceled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
