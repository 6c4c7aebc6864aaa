//! Merges a pack's override files into the destination.
//!
//! Every file under the overrides folder maps to the same relative path under
//! the destination. Missing targets are copied, identical ones are left alone,
//! and differing ones are settled by the [`ConflictMode`], asking a
//! [`ConflictResolver`] when the mode is [`ConflictMode::Ask`].

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fs;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::backup::backup_file;
use crate::checksum::{files_match, text_diff};
use crate::error::{Error, Result};

/// How differing override files are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictMode {
    /// Ask the [`ConflictResolver`] for every file with a visible difference.
    #[default]
    Ask,
    /// Keep the user's file.
    Skip,
    /// Move the user's file to `.old` and copy the pack's file in.
    Rename,
    /// Replace the user's file in place.
    Overwrite,
}

/// Answer to a single conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    Skip,
    Overwrite,
    Rename,
    /// Stop the whole run.
    Exit,
}

/// Decides what to do with an override that differs from the user's copy.
///
/// Implementations may block (a console prompt, a dialog); the engine calls
/// this from its worker thread.
pub trait ConflictResolver: Send + Sync {
    fn resolve(&self, relative_path: &Utf8Path, diff: &str) -> ConflictChoice;
}

/// State of a target path before reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideState {
    NotPresent,
    IdenticalContent,
    DifferentContent,
}

/// Terminal action taken for one override file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverrideAction {
    /// Target did not exist.
    Copy,
    /// Target replaced without backup.
    Overwrite,
    Skip,
    /// Target moved to `.old`, then replaced.
    BackupAndCopy,
}

pub fn inspect(source: &Utf8Path, target: &Utf8Path) -> Result<OverrideState> {
    if !target.exists() {
        return Ok(OverrideState::NotPresent);
    }
    if files_match(source, target)? {
        return Ok(OverrideState::IdenticalContent);
    }
    Ok(OverrideState::DifferentContent)
}

/// Decide the action for `source` against `target`.
///
/// Returns [`Error::Aborted`] when the resolver answers
/// [`ConflictChoice::Exit`].
pub fn decide(
    source: &Utf8Path,
    target: &Utf8Path,
    relative_path: &Utf8Path,
    mode: ConflictMode,
    resolver: Option<&dyn ConflictResolver>,
) -> Result<OverrideAction> {
    match inspect(source, target)? {
        OverrideState::NotPresent => Ok(OverrideAction::Copy),
        OverrideState::IdenticalContent => Ok(OverrideAction::Skip),
        OverrideState::DifferentContent => match mode {
            ConflictMode::Skip => Ok(OverrideAction::Skip),
            ConflictMode::Overwrite => Ok(OverrideAction::Overwrite),
            ConflictMode::Rename => Ok(OverrideAction::BackupAndCopy),
            ConflictMode::Ask => ask(source, target, relative_path, resolver),
        },
    }
}

fn ask(
    source: &Utf8Path,
    target: &Utf8Path,
    relative_path: &Utf8Path,
    resolver: Option<&dyn ConflictResolver>,
) -> Result<OverrideAction> {
    let ours = fs::read(target)?;
    let theirs = fs::read(source)?;
    let diff = text_diff(
        &ours,
        &theirs,
        &format!("{} (yours)", relative_path),
        &format!("{} (modpack)", relative_path),
    );

    if diff.is_empty() {
        tracing::warn!(
            "Checksums of files {} don't match but no text difference found! Creating backup and overwriting",
            relative_path
        );
        tracing::warn!("Please consider checking these files manually and removing unnecessary ones");
        return Ok(OverrideAction::BackupAndCopy);
    }

    let Some(resolver) = resolver else {
        tracing::debug!("No conflict resolver set, backing up {}", relative_path);
        return Ok(OverrideAction::BackupAndCopy);
    };

    tracing::info!(
        "Your {} is different from the downloaded one. Please select what to do",
        relative_path
    );
    match resolver.resolve(relative_path, &diff) {
        ConflictChoice::Skip => Ok(OverrideAction::Skip),
        ConflictChoice::Overwrite => Ok(OverrideAction::Overwrite),
        ConflictChoice::Rename => Ok(OverrideAction::BackupAndCopy),
        ConflictChoice::Exit => Err(Error::Aborted),
    }
}

/// Carry out `action` for one file.
pub fn apply(action: OverrideAction, source: &Utf8Path, target: &Utf8Path) -> Result<()> {
    match action {
        OverrideAction::Skip => Ok(()),
        OverrideAction::Copy | OverrideAction::Overwrite => copy_file(source, target),
        OverrideAction::BackupAndCopy => {
            let backup = backup_file(target)?;
            tracing::info!("Renamed {} to {}", target, backup);
            copy_file(source, target)
        }
    }
}

fn copy_file(source: &Utf8Path, target: &Utf8Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, target)?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideReport {
    /// Relative path and the action taken, in walk order.
    pub entries: Vec<(Utf8PathBuf, OverrideAction)>,
    /// Relative paths that could not be processed.
    pub failed: Vec<Utf8PathBuf>,
}

pub struct OverrideReconciler {
    mode: ConflictMode,
    resolver: Option<Arc<dyn ConflictResolver>>,
}

impl OverrideReconciler {
    pub fn new(mode: ConflictMode) -> Self {
        Self {
            mode,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Reconcile every file under `overrides_dir` into `destination`.
    ///
    /// A failure on one file is logged and recorded, and the walk continues.
    /// Only an explicit user exit stops the walk.
    pub fn reconcile(
        &self,
        overrides_dir: &Utf8Path,
        destination: &Utf8Path,
    ) -> Result<OverrideReport> {
        let mut report = OverrideReport::default();
        self.reconcile_layer(overrides_dir, &[], destination, &mut report)?;
        Ok(report)
    }

    /// Reconcile several override folders into `destination`.
    ///
    /// A file present at the same relative path in a later folder shadows the
    /// earlier one, so each destination file is reconciled once.
    pub fn reconcile_layers(
        &self,
        overrides_dirs: &[Utf8PathBuf],
        destination: &Utf8Path,
    ) -> Result<OverrideReport> {
        let mut report = OverrideReport::default();
        for (i, dir) in overrides_dirs.iter().enumerate() {
            self.reconcile_layer(dir, &overrides_dirs[i + 1..], destination, &mut report)?;
        }
        Ok(report)
    }

    fn reconcile_layer(
        &self,
        overrides_dir: &Utf8Path,
        later: &[Utf8PathBuf],
        destination: &Utf8Path,
        report: &mut OverrideReport,
    ) -> Result<()> {
        if !overrides_dir.is_dir() {
            tracing::warn!("Overrides folder {} not found in modpack", overrides_dir);
            return Ok(());
        }

        for entry in WalkDir::new(overrides_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let source = Utf8PathBuf::from_path_buf(entry.into_path()).map_err(Error::NonUtf8Path)?;
            let relative = source
                .strip_prefix(overrides_dir)
                .map(Utf8Path::to_path_buf)
                .map_err(|_| Error::Other(format!("{} is outside {}", source, overrides_dir)))?;
            if let Some(shadow) = later.iter().find(|dir| dir.join(&relative).is_file()) {
                tracing::debug!("{} is replaced by {}", relative, shadow);
                continue;
            }
            let target = destination.join(&relative);

            match self.reconcile_file(&source, &target, &relative) {
                Ok(action) => {
                    match action {
                        OverrideAction::Skip => tracing::info!("Skipping file {}", relative),
                        _ => tracing::info!("Copying {} into {}", relative, target),
                    }
                    report.entries.push((relative, action));
                }
                Err(Error::Aborted) => return Err(Error::Aborted),
                Err(e) => {
                    tracing::error!(
                        "Unable to copy {} into {}. Please copy files manually: {}",
                        source,
                        target,
                        e
                    );
                    report.failed.push(relative);
                }
            }
        }

        Ok(())
    }

    fn reconcile_file(
        &self,
        source: &Utf8Path,
        target: &Utf8Path,
        relative: &Utf8Path,
    ) -> Result<OverrideAction> {
        let action = decide(source, target, relative, self.mode, self.resolver.as_deref())?;
        apply(action, source, target)?;
        Ok(action)
    }
}
