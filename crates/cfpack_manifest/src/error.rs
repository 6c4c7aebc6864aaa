use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ManifestError>;

/// Errors that reject a manifest before any download starts.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Unable to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Manifest read error: manifest is empty")]
    Empty,

    #[error("No \"{0}\" key in manifest")]
    MissingKey(&'static str),

    /// A path in the manifest is absolute or climbs out of the archive.
    #[error("Path {0:?} points outside the modpack")]
    UnsafePath(String),

    #[error("No download URL for {0}")]
    NoDownloads(String),
}
