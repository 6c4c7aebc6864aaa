//! One synchronization run.
//!
//! [`ModpackSync`] drives a run from archive to installed files:
//!
//! 1. Open the archive (local file, or download to a temporary file).
//! 2. Extract it into a scoped temporary directory.
//! 3. Parse and validate the manifest (`manifest.json`, or
//!    `modrinth.index.json` for a Modrinth pack). Nothing is written to the
//!    destination before this succeeds.
//! 4. Copy the manifest (and `modlist.html`) into the destination.
//! 5. Download the pack's files in manifest order.
//!    - CurseForge: resolve the project, download the file with retry, then
//!      delete older revisions of the same project.
//!    - Modrinth: skip files the chosen side does not want, then download each
//!      one from its mirrors and verify its hashes.
//! 6. Merge the override folders into the destination.
//! 7. Download the mod loader installer.
//!
//! The stop flag is checked between stages and before every download. A stopped
//! run returns [`SyncOutcome::Cancelled`] and keeps whatever was already written.

use camino::{Utf8Path, Utf8PathBuf};
use cfpack_manifest::{Manifest, Modpack, PackFormat, MODLIST_FILE};
use serde::Serialize;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::archive::{extract, ArchiveSource};
use crate::error::{Error, Result};
use crate::events::{
    download_fraction, EventCallback, StopFlag, SyncEvent, SyncProgress, SyncStage,
};
use crate::fetcher::{fetch_verified, fetch_with_retry, FetchOutcome};
use crate::loader::{fetch_loader, plan_loader, LoaderOutcome};
use crate::modrinth::{plan_files, ModrinthPlan};
use crate::options::SyncOptions;
use crate::overrides::{ConflictResolver, OverrideReconciler, OverrideReport};
use crate::resolver::{ProjectResolver, ResolveOutcome};
use crate::transport::{HttpTransport, Request, Transport};
use crate::utils::prettify_bytes;

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub name: String,
    pub version: String,
    pub format: PackFormat,
    /// Files fetched during this run.
    pub downloaded: Vec<Utf8PathBuf>,
    /// Files that already existed and were not requested.
    pub already_present: Vec<Utf8PathBuf>,
    /// Projects left out because their info was unavailable.
    pub skipped_projects: Vec<u64>,
    /// Modrinth files the chosen side does not want, relative to the
    /// destination.
    pub excluded: Vec<Utf8PathBuf>,
    /// Older revisions deleted after their replacement arrived.
    pub stale_removed: Vec<Utf8PathBuf>,
    pub overrides: OverrideReport,
    /// `None` when the pack names no loader.
    pub loader: Option<LoaderOutcome>,
    pub elapsed: Duration,
}

impl SyncReport {
    fn new(modpack: &Modpack) -> Self {
        Self {
            name: modpack.name().to_string(),
            version: modpack.version().to_string(),
            format: modpack.format(),
            downloaded: Vec::new(),
            already_present: Vec::new(),
            skipped_projects: Vec::new(),
            excluded: Vec::new(),
            stale_removed: Vec::new(),
            overrides: OverrideReport::default(),
            loader: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn message(&self) -> String {
        format!("{} v{} downloaded", self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "report")]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// The stop flag was raised. Work done before that point is kept.
    Cancelled,
}

impl SyncOutcome {
    pub fn message(&self) -> String {
        match self {
            SyncOutcome::Completed(report) => report.message(),
            SyncOutcome::Cancelled => "Canceled".to_string(),
        }
    }
}

/// Reconciles a destination directory with a modpack archive.
///
/// Configure with the `with_*` methods, then call [`run`](Self::run). The run
/// blocks; callers with a UI should run it on a worker thread and receive
/// progress through [`with_events`](Self::with_events).
pub struct ModpackSync {
    source: ArchiveSource,
    destination: Utf8PathBuf,
    options: SyncOptions,
    transport: Option<Arc<dyn Transport>>,
    conflict_resolver: Option<Arc<dyn ConflictResolver>>,
    event_callback: Option<EventCallback>,
    stop_flag: StopFlag,
}

impl ModpackSync {
    pub fn new(source: ArchiveSource, destination: impl Into<Utf8PathBuf>) -> Self {
        Self {
            source,
            destination: destination.into(),
            options: SyncOptions::default(),
            transport: None,
            conflict_resolver: None,
            event_callback: None,
            stop_flag: StopFlag::new(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `transport` instead of an HTTP client built from the options.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Resolver asked about differing overrides in
    /// [`ConflictMode::Ask`](crate::ConflictMode::Ask). Without one, such files
    /// are backed up and replaced.
    pub fn with_conflict_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.conflict_resolver = Some(resolver);
        self
    }

    /// Register an event callback.
    ///
    /// The callback is invoked on the thread calling [`run`](Self::run).
    pub fn with_events<F>(mut self, callback: F) -> Self
    where
        F: Fn(SyncEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_stop_flag(mut self, stop_flag: StopFlag) -> Self {
        self.stop_flag = stop_flag;
        self
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop_flag.clone()
    }

    /// Run the synchronization to completion, failure or cancellation.
    pub fn run(&self) -> Result<SyncOutcome> {
        let start = Instant::now();

        match self.run_internal() {
            Ok(mut report) => {
                report.elapsed = start.elapsed();
                tracing::info!("{}", report.message());
                let outcome = SyncOutcome::Completed(report);
                self.emit(SyncEvent::Finished(outcome.clone()));
                Ok(outcome)
            }
            Err(Error::Cancelled) => {
                tracing::warn!("Canceled");
                self.emit(SyncEvent::Finished(SyncOutcome::Cancelled));
                Ok(SyncOutcome::Cancelled)
            }
            Err(e) => {
                tracing::debug!("Run failed: {}", e);
                self.emit(SyncEvent::Failed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Core run implementation. See module-level docs for the sequence.
    fn run_internal(&self) -> Result<SyncReport> {
        self.stop_flag.check()?;

        let transport: Arc<dyn Transport> = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(HttpTransport::new(&self.options.transport)?),
        };
        let user_agent = self.options.user_agent.as_str();

        // Removed on drop, whichever way this function returns
        let workdir = tempfile::Builder::new().prefix("cfpack-").tempdir()?;
        let work_root = Utf8Path::from_path(workdir.path())
            .ok_or_else(|| Error::NonUtf8Path(workdir.path().to_path_buf()))?;
        tracing::info!("Working directory: {}", work_root);

        self.emit_progress(
            SyncStage::OpeningArchive,
            0.05,
            format!("Opening {}", self.source),
        );
        let archive = self.source.open(transport.as_ref(), user_agent, work_root)?;
        self.stop_flag.check()?;

        self.emit_progress(SyncStage::Extracting, 0.10, "Extracting modpack");
        let pack_root = work_root.join("pack");
        extract(archive, &pack_root)?;

        let modpack = Modpack::detect(&pack_root)?;
        for line in modpack.summary().lines() {
            tracing::info!("{}", line);
        }
        self.stop_flag.check()?;

        let mut report = SyncReport::new(&modpack);
        let overrides_dirs: Vec<Utf8PathBuf> = match &modpack {
            Modpack::CurseForge(manifest) => {
                self.copy_metadata(&pack_root, &modpack)?;
                self.download_files(manifest, transport.clone(), &mut report)?;
                manifest.overrides_dir(&pack_root).into_iter().collect()
            }
            Modpack::Modrinth(index) => {
                let plan = plan_files(index, &self.options.modrinth)?;
                self.copy_metadata(&pack_root, &modpack)?;
                self.download_modrinth_files(&plan, transport.as_ref(), &mut report)?;
                // Packs usually ship only some of these
                index
                    .overrides_dirs(&pack_root, self.options.modrinth.side)
                    .into_iter()
                    .filter(|dir| dir.is_dir())
                    .collect()
            }
        };
        self.stop_flag.check()?;

        self.emit_progress(
            SyncStage::ProcessingOverrides,
            0.90,
            "Processing overrides",
        );
        report.overrides = self.reconcile_overrides(&overrides_dirs)?;
        self.stop_flag.check()?;

        if let Some(plan) = plan_loader(modpack.minecraft().as_ref()) {
            self.emit_progress(
                SyncStage::DownloadingLoader,
                0.95,
                "Downloading mod loader",
            );
            report.loader = Some(fetch_loader(
                &plan,
                transport.as_ref(),
                user_agent,
                &self.destination,
            )?);
        }

        self.emit_progress(SyncStage::Complete, 1.0, report.message());
        Ok(report)
    }

    fn copy_metadata(&self, pack_root: &Utf8Path, modpack: &Modpack) -> Result<()> {
        if !self.destination.exists() {
            tracing::info!("Creating directory {}", self.destination);
        }
        fs::create_dir_all(&self.destination)?;

        let manifest_file = modpack.manifest_file();
        tracing::info!("Copying {}", manifest_file);
        fs::copy(
            pack_root.join(manifest_file),
            self.destination.join(manifest_file),
        )?;

        if modpack.format() == PackFormat::Modrinth {
            return Ok(());
        }
        let modlist = pack_root.join(MODLIST_FILE);
        if modlist.is_file() {
            tracing::info!("Copying {}", MODLIST_FILE);
            fs::copy(&modlist, self.destination.join(MODLIST_FILE))?;
        } else {
            tracing::warn!("No {} in modpack", MODLIST_FILE);
        }

        Ok(())
    }

    fn download_files(
        &self,
        manifest: &Manifest,
        transport: Arc<dyn Transport>,
        report: &mut SyncReport,
    ) -> Result<()> {
        let resolver = ProjectResolver::new(
            transport.clone(),
            self.options.endpoints.clone(),
            self.options.user_agent.clone(),
        );
        let total = manifest.files.len();
        tracing::info!("Found {} files", total);

        for (i, file_ref) in manifest.files.iter().enumerate() {
            self.stop_flag.check()?;
            let prefix = format!("[{}/{}]", i + 1, total);
            self.emit_progress(
                SyncStage::DownloadingFiles,
                download_fraction(i, total),
                format!("{} Project {}", prefix, file_ref.project_id),
            );

            tracing::info!(
                "{} Retrieving project information for {}",
                prefix,
                file_ref.project_id
            );
            let resolution = match resolver.resolve(file_ref, &self.destination)? {
                ResolveOutcome::Resolved(resolution) => resolution,
                ResolveOutcome::Skipped { reason } => {
                    tracing::warn!(
                        "{} Unable to parse project info. Skipping project {}: {}",
                        prefix,
                        file_ref.project_id,
                        reason
                    );
                    report.skipped_projects.push(file_ref.project_id);
                    self.emit(SyncEvent::ProjectSkipped {
                        project_id: file_ref.project_id,
                        reason,
                    });
                    continue;
                }
            };

            let destination = resolution.destination();
            tracing::info!(
                "{} {} ({}, {})",
                prefix,
                resolution.title,
                resolution.file_name,
                prettify_bytes(resolution.expected_size)
            );

            self.stop_flag.check()?;
            let request = Request::get(resolution.download_url.as_str())
                .with_user_agent(self.options.user_agent.as_str());
            let outcome = fetch_with_retry(
                transport.as_ref(),
                &request,
                &destination,
                resolution.expected_size,
                &self.options.retry,
            )?;

            match outcome {
                FetchOutcome::AlreadyPresent => report.already_present.push(destination),
                FetchOutcome::Downloaded { .. } => {
                    for stale in resolution.stale {
                        tracing::warn!("{} Deleting previous version {}", prefix, stale);
                        match fs::remove_file(&stale) {
                            Ok(()) => report.stale_removed.push(stale),
                            Err(e) => tracing::warn!("Unable to delete {}: {}", stale, e),
                        }
                    }
                    report.downloaded.push(destination);
                }
            }
        }

        Ok(())
    }

    fn download_modrinth_files(
        &self,
        plan: &ModrinthPlan<'_>,
        transport: &dyn Transport,
        report: &mut SyncReport,
    ) -> Result<()> {
        let side = self.options.modrinth.side;
        for file in &plan.excluded {
            tracing::info!("Skipping file {}, not needed on the {}", file.path, side);
            report.excluded.push(file.path.clone());
        }

        let total = plan.files.len();
        tracing::info!("Found {} files", total);
        let verify_hashes = self.options.modrinth.verify_hashes;
        if !verify_hashes {
            tracing::warn!("Hash verification disabled, only file sizes are checked");
        }

        for (i, file) in plan.files.iter().enumerate() {
            self.stop_flag.check()?;
            let prefix = format!("[{}/{}]", i + 1, total);
            self.emit_progress(
                SyncStage::DownloadingFiles,
                download_fraction(i, total),
                format!("{} {}", prefix, file.path),
            );
            tracing::info!(
                "{} {} ({})",
                prefix,
                file.path,
                prettify_bytes(file.file_size)
            );

            let destination = self.destination.join(&file.path);
            let mirrors: Vec<Request> = file
                .downloads
                .iter()
                .map(|url| {
                    Request::get(url.as_str()).with_user_agent(self.options.user_agent.as_str())
                })
                .collect();

            self.stop_flag.check()?;
            let outcome = fetch_verified(
                transport,
                &mirrors,
                &destination,
                file.file_size,
                verify_hashes.then_some(&file.hashes),
                &self.options.retry,
            )?;
            match outcome {
                FetchOutcome::AlreadyPresent => report.already_present.push(destination),
                FetchOutcome::Downloaded { .. } => report.downloaded.push(destination),
            }
        }

        Ok(())
    }

    fn reconcile_overrides(&self, overrides_dirs: &[Utf8PathBuf]) -> Result<OverrideReport> {
        if overrides_dirs.is_empty() {
            return Ok(OverrideReport::default());
        }

        let mut reconciler = OverrideReconciler::new(self.options.conflict_mode);
        if let Some(resolver) = &self.conflict_resolver {
            reconciler = reconciler.with_resolver(resolver.clone());
        }
        reconciler.reconcile_layers(overrides_dirs, &self.destination)
    }

    fn emit_progress(&self, stage: SyncStage, fraction: f32, message: impl Into<String>) {
        self.emit(SyncEvent::Progress(SyncProgress {
            stage,
            fraction,
            message: message.into(),
        }));
    }

    /// Emit an event if a callback was registered.
    fn emit(&self, event: SyncEvent) {
        if let Some(callback) = &self.event_callback {
            callback(event);
        }
    }
}
