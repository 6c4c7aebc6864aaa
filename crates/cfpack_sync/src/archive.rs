//! Modpack archive input: a local zip or a URL to one.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom};
use zip::ZipArchive;

use crate::error::Result;
use crate::transport::{Request, Transport};

/// Where the modpack archive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
    Local(Utf8PathBuf),
    Remote(String),
}

impl ArchiveSource {
    /// An existing path wins over URL detection, so a local folder literally
    /// named `http:` still opens as a file.
    pub fn parse(input: &str) -> Self {
        if Utf8Path::new(input).exists() {
            return ArchiveSource::Local(Utf8PathBuf::from(input));
        }
        let lower = input.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return ArchiveSource::Remote(input.to_string());
        }
        ArchiveSource::Local(Utf8PathBuf::from(input))
    }

    /// Open the archive for reading. A remote archive is streamed into an
    /// anonymous temporary file inside `workdir` first.
    pub fn open(
        &self,
        transport: &dyn Transport,
        user_agent: &str,
        workdir: &Utf8Path,
    ) -> Result<File> {
        match self {
            ArchiveSource::Local(path) => {
                tracing::info!("Opening {}", path);
                Ok(File::open(path)?)
            }
            ArchiveSource::Remote(url) => {
                tracing::info!("Downloading {}", url);
                let request = Request::get(url.as_str()).with_user_agent(user_agent);
                let mut body = transport.get(&request)?;
                let mut file = tempfile::tempfile_in(workdir)?;
                let size = io::copy(&mut body, &mut file)?;
                tracing::debug!("Downloaded {} bytes", size);
                file.seek(SeekFrom::Start(0))?;
                Ok(file)
            }
        }
    }
}

impl std::fmt::Display for ArchiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveSource::Local(path) => write!(f, "{}", path),
            ArchiveSource::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Extract every entry of `archive` below `root`.
///
/// Entries whose names would land outside `root` are skipped with a warning.
/// Returns the number of files written.
pub fn extract(archive: File, root: &Utf8Path) -> Result<usize> {
    let mut archive = ZipArchive::new(archive)?;
    fs::create_dir_all(root)?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let out_path = root.as_std_path().join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    tracing::debug!("Extracted {} files into {}", written, root);
    Ok(written)
}
