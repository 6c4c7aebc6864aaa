//! Downloads with bounded retry and size verification.

use camino::Utf8Path;
use cfpack_manifest::FileHashes;
use std::fs::{self, File};
use std::io::{self, Write};
use std::thread;

use crate::checksum::verify_hashes;
use crate::error::{Error, Result};
use crate::options::RetryPolicy;
use crate::transport::{Request, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The destination already existed; nothing was requested.
    AlreadyPresent,
    Downloaded { attempts: u32 },
}

/// Download `request` to `destination` unless the destination already exists.
///
/// A transport error or a size mismatch counts as a failed attempt. After
/// `policy.max_attempts` failures the partial file is removed and
/// [`Error::DownloadFailed`] is returned.
pub fn fetch_with_retry(
    transport: &dyn Transport,
    request: &Request,
    destination: &Utf8Path,
    expected_size: u64,
    policy: &RetryPolicy,
) -> Result<FetchOutcome> {
    if destination.exists() {
        tracing::info!("File {} already exists", destination);
        return Ok(FetchOutcome::AlreadyPresent);
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    match retry_download(transport, request, destination, expected_size, None, policy) {
        Ok(attempts) => Ok(FetchOutcome::Downloaded { attempts }),
        Err(attempts) => {
            remove_partial(destination);
            Err(Error::DownloadFailed {
                url: request.url.clone(),
                attempts,
            })
        }
    }
}

/// Download a file that is listed with mirrors and, optionally, digests.
///
/// An existing destination is kept when it matches `hashes` (or just
/// `expected_size` without hashes) and replaced otherwise. Each mirror gets the
/// full retry policy before the next one is tried. A digest mismatch counts as
/// a failed attempt. When every mirror fails the partial file is removed.
pub fn fetch_verified(
    transport: &dyn Transport,
    mirrors: &[Request],
    destination: &Utf8Path,
    expected_size: u64,
    hashes: Option<&FileHashes>,
    policy: &RetryPolicy,
) -> Result<FetchOutcome> {
    if destination.is_file() {
        if is_intact(destination, expected_size, hashes)? {
            tracing::info!("File {} already exists", destination);
            return Ok(FetchOutcome::AlreadyPresent);
        }
        tracing::info!("Replacing {}, it differs from the modpack's copy", destination);
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut attempts = 0;
    for request in mirrors {
        match retry_download(transport, request, destination, expected_size, hashes, policy) {
            Ok(used) => {
                return Ok(FetchOutcome::Downloaded {
                    attempts: attempts + used,
                })
            }
            Err(used) => {
                attempts += used;
                tracing::warn!("Giving up on mirror {}", request.url);
            }
        }
    }

    remove_partial(destination);
    Err(Error::DownloadFailed {
        url: mirrors
            .first()
            .map(|request| request.url.clone())
            .unwrap_or_else(|| destination.to_string()),
        attempts,
    })
}

/// Up to `policy.max_attempts` downloads of one URL. Returns the attempts used,
/// as `Err` when none succeeded.
fn retry_download(
    transport: &dyn Transport,
    request: &Request,
    destination: &Utf8Path,
    expected_size: u64,
    hashes: Option<&FileHashes>,
    policy: &RetryPolicy,
) -> std::result::Result<u32, u32> {
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        let result = download(transport, request, destination, Some(expected_size))
            .and_then(|size| check_hashes(destination, hashes).map(|()| size));
        match result {
            Ok(size) => {
                tracing::debug!("Downloaded {} ({} bytes)", destination, size);
                return Ok(attempt);
            }
            Err(e) => {
                tracing::warn!(
                    "Attempt {}/{} to download {} failed: {}",
                    attempt,
                    max_attempts,
                    request.url,
                    e
                );
                if attempt < max_attempts {
                    thread::sleep(policy.delay);
                }
            }
        }
    }
    Err(max_attempts)
}

fn check_hashes(destination: &Utf8Path, hashes: Option<&FileHashes>) -> Result<()> {
    match hashes {
        Some(hashes) if !verify_hashes(destination, hashes)? => Err(Error::HashMismatch {
            path: destination.to_path_buf(),
        }),
        _ => Ok(()),
    }
}

fn is_intact(path: &Utf8Path, expected_size: u64, hashes: Option<&FileHashes>) -> Result<bool> {
    match hashes {
        Some(hashes) => verify_hashes(path, hashes),
        None => Ok(fs::metadata(path)?.len() == expected_size),
    }
}

fn remove_partial(destination: &Utf8Path) {
    if destination.exists() {
        if let Err(e) = fs::remove_file(destination) {
            tracing::warn!("Unable to remove partial file {}: {}", destination, e);
        }
    }
}

/// Stream one response body to `destination`, replacing its content.
///
/// The file is flushed and synced before its size is compared against
/// `expected_size`. Returns the number of bytes written.
pub fn download(
    transport: &dyn Transport,
    request: &Request,
    destination: &Utf8Path,
    expected_size: Option<u64>,
) -> Result<u64> {
    let mut body = transport.get(request)?;
    let mut file = File::create(destination)?;
    io::copy(&mut body, &mut file)?;
    file.flush()?;
    file.sync_all()?;

    let actual = file.metadata()?.len();
    if let Some(expected) = expected_size {
        if actual != expected {
            return Err(Error::SizeMismatch {
                path: destination.to_path_buf(),
                expected,
                actual,
            });
        }
    }

    Ok(actual)
}
