//! `.old` backup chains.
//!
//! A file `F` being replaced is renamed to `F.old`. If `F.old` already exists it
//! moves to `F.old.old` first, and so on, so earlier backups are never lost.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

use crate::error::Result;

const BACKUP_SUFFIX: &str = ".old";

/// `path` with `.old` appended `depth` times.
pub fn backup_path(path: &Utf8Path, depth: usize) -> Utf8PathBuf {
    let mut name = path.as_str().to_string();
    for _ in 0..depth {
        name.push_str(BACKUP_SUFFIX);
    }
    Utf8PathBuf::from(name)
}

/// Move every existing backup of `path` one level deeper, deepest first.
///
/// Only the contiguous chain `F.old`, `F.old.old`, ... is shifted; it stops at
/// the first missing level.
pub fn shift_backup_chain(path: &Utf8Path) -> Result<()> {
    let mut depth = 1;
    while backup_path(path, depth).exists() {
        depth += 1;
    }

    for level in (1..depth).rev() {
        let from = backup_path(path, level);
        let to = backup_path(path, level + 1);
        tracing::debug!("Renaming {} to {}", from, to);
        fs::rename(&from, &to)?;
    }

    Ok(())
}

/// Rename `path` to `path.old`, shifting older backups out of the way.
/// Returns the new location of the file.
pub fn backup_file(path: &Utf8Path) -> Result<Utf8PathBuf> {
    shift_backup_chain(path)?;
    let target = backup_path(path, 1);
    fs::rename(path, &target)?;
    Ok(target)
}
