//! File comparison used by the override reconciler, and digest checks for
//! downloads that come with expected hashes.

use camino::Utf8Path;
use cfpack_manifest::FileHashes;
use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha512;
use similar::{ChangeTag, TextDiff};
use std::fs::File;
use std::io::Read;

use crate::error::Result;

const CHECKSUM_BUFFER_SIZE: usize = 2048;

/// Hex encoded MD5 of a file, read in fixed size chunks.
pub fn file_md5(path: &Utf8Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; CHECKSUM_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub fn files_match(a: &Utf8Path, b: &Utf8Path) -> Result<bool> {
    Ok(file_md5(a)? == file_md5(b)?)
}

/// Whether the file's SHA-1 and SHA-512 both equal `expected`.
pub fn verify_hashes(path: &Utf8Path, expected: &FileHashes) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut sha1 = Sha1::new();
    let mut sha512 = Sha512::new();
    let mut buf = [0u8; CHECKSUM_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        sha1.update(&buf[..read]);
        sha512.update(&buf[..read]);
    }

    let sha1 = hex::encode(sha1.finalize());
    let sha512 = hex::encode(sha512.finalize());
    Ok(sha1.eq_ignore_ascii_case(expected.sha1.trim())
        && sha512.eq_ignore_ascii_case(expected.sha512.trim()))
}

/// Unified line diff from `old` to `new`.
///
/// Both sides are decoded lossily and line endings are normalized, so two files
/// that differ only in encoding noise or CRLF/LF produce an empty string.
pub fn text_diff(old: &[u8], new: &[u8], old_label: &str, new_label: &str) -> String {
    let old = normalize(old);
    let new = normalize(new);

    let diff = TextDiff::from_lines(&old, &new);
    if diff
        .iter_all_changes()
        .all(|change| change.tag() == ChangeTag::Equal)
    {
        return String::new();
    }

    diff.unified_diff()
        .context_radius(3)
        .header(old_label, new_label)
        .to_string()
}

fn normalize(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace("\r\n", "\n")
}
