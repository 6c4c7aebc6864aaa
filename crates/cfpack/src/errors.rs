use camino::Utf8PathBuf;
use cfpack_sync::ManifestError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Invalid modpack manifest")]
    #[diagnostic(
        code(manifest::invalid),
        help("The archive must contain either a manifest.json with \"name\", \"version\" and \"files\" keys or a modrinth.index.json with \"name\", \"versionId\" and \"files\" keys")
    )]
    InvalidManifest {
        #[source]
        source: ManifestError,
    },

    #[error("Modpack archive not found: {path}")]
    #[diagnostic(
        code(archive::not_found),
        help("Pass the path to a downloaded modpack zip-file or a direct http(s) URL")
    )]
    ArchiveNotFound { path: Utf8PathBuf },

    #[error("Unable to download {url} in {attempts} attempts")]
    #[diagnostic(
        code(download::failed),
        help("Check your connection and run the same command again. Files that were already downloaded are kept")
    )]
    DownloadFailed { url: String, attempts: u32 },

    #[error("Project {project_id} has no file {file_id}")]
    #[diagnostic(
        code(project::file_missing),
        help("The modpack references a file that is no longer listed for this project. Try a newer version of the modpack")
    )]
    FileNotInProject { project_id: u64, file_id: u64 },

    #[error("Downloading from {host} is not allowed")]
    #[diagnostic(
        code(download::host),
        help("The modpack wants {url}. Pass --skip-host-check if you trust it")
    )]
    DisallowedHost { url: String, host: String },

    #[error("Synchronization failed")]
    #[diagnostic(code(sync::failed))]
    Sync {
        #[source]
        source: cfpack_sync::Error,
    },

    #[error("Unable to install Ctrl-C handler")]
    #[diagnostic(code(signal::handler))]
    SignalHandler {
        #[source]
        source: ctrlc::Error,
    },

    #[error("Synchronization thread panicked")]
    #[diagnostic(code(sync::panicked))]
    WorkerPanicked,
}

impl From<cfpack_sync::Error> for CliError {
    fn from(error: cfpack_sync::Error) -> Self {
        match error {
            cfpack_sync::Error::Manifest(source) => Self::InvalidManifest { source },
            cfpack_sync::Error::DownloadFailed { url, attempts } => {
                Self::DownloadFailed { url, attempts }
            }
            cfpack_sync::Error::FileNotInProject {
                project_id,
                file_id,
            } => Self::FileNotInProject {
                project_id,
                file_id,
            },
            cfpack_sync::Error::DisallowedHost { url, host } => {
                Self::DisallowedHost { url, host }
            }
            source => Self::Sync { source },
        }
    }
}

impl CliError {
    pub fn archive_not_found(path: Utf8PathBuf) -> Self {
        Self::ArchiveNotFound { path }
    }
}
