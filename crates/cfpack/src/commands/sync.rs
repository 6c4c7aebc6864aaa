use std::sync::{mpsc, Arc};
use std::thread;

use camino::Utf8PathBuf;
use cfpack_sync::{
    prettify_bytes, ArchiveSource, ConflictMode, Error, LoaderOutcome, ModpackSync, ModrinthOptions,
    Side, StopFlag, SyncEvent, SyncOptions, SyncOutcome, SyncReport, SyncStage, TransportConfig,
};
use colored::Colorize;

use crate::errors::CliError;
use crate::println_pad;
use crate::prompt::ConsolePrompt;
use crate::utils::print_ansi_boxed_lines;

pub struct SyncModpackArgs {
    pub source: String,
    pub destination_dir: Utf8PathBuf,
    pub user_agent: String,
    pub conflict_mode: ConflictMode,
    pub side: Side,
    pub include_optional: bool,
    pub verify_hashes: bool,
    pub check_hosts: bool,
    pub insecure: bool,
}

pub fn sync_modpack(args: SyncModpackArgs) -> miette::Result<()> {
    let source = ArchiveSource::parse(&args.source);
    if let ArchiveSource::Local(path) = &source {
        if !path.is_file() {
            return Err(CliError::archive_not_found(path.clone()).into());
        }
    }

    let options = SyncOptions {
        user_agent: args.user_agent,
        conflict_mode: args.conflict_mode,
        transport: TransportConfig {
            accept_invalid_certs: args.insecure,
        },
        modrinth: ModrinthOptions {
            side: args.side,
            include_optional: args.include_optional,
            verify_hashes: args.verify_hashes,
            check_hosts: args.check_hosts,
            ..Default::default()
        },
        ..Default::default()
    };

    let stop_flag = StopFlag::new();
    let handler_flag = stop_flag.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("Interrupted, stopping after the current step...");
        handler_flag.stop();
    })
    .map_err(|source| CliError::SignalHandler { source })?;

    let (tx, rx) = mpsc::channel();
    let mut sync = ModpackSync::new(source, args.destination_dir)
        .with_options(options)
        .with_stop_flag(stop_flag)
        .with_events(move |event| {
            let _ = tx.send(event);
        });
    if args.conflict_mode == ConflictMode::Ask {
        sync = sync.with_conflict_resolver(Arc::new(ConsolePrompt));
    }

    let worker = thread::spawn(move || sync.run());

    // The sender lives inside the worker's `ModpackSync`, so this ends with it
    let mut last_stage = None;
    for event in rx {
        render_event(&event, &mut last_stage);
    }

    let result = worker.join().map_err(|_| CliError::WorkerPanicked)?;
    match result {
        Ok(SyncOutcome::Completed(report)) => {
            print_report(&report);
            Ok(())
        }
        Ok(SyncOutcome::Cancelled) | Err(Error::Aborted) => {
            tracing::warn!("Canceled");
            Ok(())
        }
        Err(e) => Err(CliError::from(e).into()),
    }
}

fn render_event(event: &SyncEvent, last_stage: &mut Option<SyncStage>) {
    match event {
        SyncEvent::Progress(progress) => {
            if *last_stage != Some(progress.stage) {
                *last_stage = Some(progress.stage);
                println_pad!(
                    "{} {}",
                    format!("[{:>3.0}%]", progress.fraction * 100.0).bright_blue(),
                    stage_label(progress.stage).bold()
                );
            }
            tracing::debug!("{:.2} {}", progress.fraction, progress.message);
        }
        SyncEvent::ProjectSkipped { project_id, reason } => {
            println_pad!(
                "{} project {}: {}",
                "Skipped".bright_yellow().bold(),
                project_id,
                reason.dimmed()
            );
        }
        SyncEvent::Finished(_) | SyncEvent::Failed { .. } => {}
    }
}

fn stage_label(stage: SyncStage) -> &'static str {
    match stage {
        SyncStage::OpeningArchive => "Opening modpack",
        SyncStage::Extracting => "Extracting",
        SyncStage::DownloadingFiles => "Downloading files",
        SyncStage::ProcessingOverrides => "Processing overrides",
        SyncStage::DownloadingLoader => "Downloading mod loader",
        SyncStage::Complete => "Done",
    }
}

fn print_report(report: &SyncReport) {
    let downloaded_bytes: u64 = report
        .downloaded
        .iter()
        .filter_map(|path| path.metadata().ok())
        .map(|metadata| metadata.len())
        .sum();

    let mut lines = vec![
        format!("{}", report.message().bright_green().bold()),
        format!(
            "Downloaded: {} ({})",
            report.downloaded.len(),
            prettify_bytes(downloaded_bytes)
        ),
        format!("Already present: {}", report.already_present.len()),
        format!("Previous versions removed: {}", report.stale_removed.len()),
        format!("Overrides processed: {}", report.overrides.entries.len()),
    ];
    if !report.excluded.is_empty() {
        lines.push(format!("Not needed on this side: {}", report.excluded.len()));
    }
    if !report.skipped_projects.is_empty() {
        lines.push(format!(
            "{} {}",
            "Skipped projects:".bright_yellow(),
            report
                .skipped_projects
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    if !report.overrides.failed.is_empty() {
        lines.push(format!(
            "{} {}",
            "Copy manually:".bright_red(),
            report.overrides.failed.len()
        ));
    }
    lines.push(format!("Took {:.1}s", report.elapsed.as_secs_f32()));

    println!();
    print_ansi_boxed_lines(&lines);

    match &report.loader {
        Some(LoaderOutcome::Downloaded { instructions, .. }) => {
            println!();
            println_pad!("{}", instructions.bright_cyan());
        }
        Some(LoaderOutcome::ManualInstall { id }) => {
            println!();
            println_pad!(
                "{}",
                format!("Please download {} mod loader manually", id).bright_yellow()
            );
        }
        None => {}
    }
}
