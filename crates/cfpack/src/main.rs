use camino::Utf8PathBuf;
use cfpack_sync::{ConflictMode, Side, DEFAULT_USER_AGENT};
use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser};
use commands::{sync_modpack, SyncModpackArgs};
use miette::Result;

mod commands;
mod errors;
mod logging;
mod prompt;
mod utils;

/// Download and update CurseForge and Modrinth modpacks
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to downloaded modpack zip-file (.zip or .mrpack) or direct URL to download
    zip_path_or_url: String,

    /// Destination path (ex. /home/username/.minecraft/versions/MyModPack/)
    destination_dir: Utf8PathBuf,

    /// User agent for project information requests
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    #[command(flatten)]
    conflict: ConflictArgs,

    #[command(flatten)]
    modrinth: ModrinthArgs,

    /// Accept invalid TLS certificates for this run
    #[arg(long)]
    insecure: bool,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

/// What to do with override files that differ from yours. Asks by default.
#[derive(clap::Args, Debug)]
#[group(required = false, multiple = false)]
struct ConflictArgs {
    /// Automatically skip existing extra files without overwriting them
    #[arg(short, long)]
    skip: bool,

    /// Automatically rename existing extra files into .old before copying
    #[arg(short, long)]
    rename: bool,

    /// Automatically overwrite existing extra files
    #[arg(short, long)]
    overwrite: bool,
}

impl ConflictArgs {
    fn mode(&self) -> ConflictMode {
        if self.skip {
            ConflictMode::Skip
        } else if self.rename {
            ConflictMode::Rename
        } else if self.overwrite {
            ConflictMode::Overwrite
        } else {
            ConflictMode::Ask
        }
    }
}

/// Only used for Modrinth modpacks
#[derive(clap::Args, Debug)]
struct ModrinthArgs {
    /// Install the server side files instead of the client side ones
    #[arg(long)]
    server: bool,

    /// Leave out files the modpack marks as optional
    #[arg(long)]
    no_optional: bool,

    /// Do not verify file hashes, only sizes
    #[arg(long)]
    ignore_hashes: bool,

    /// Allow downloads from any host
    #[arg(long)]
    skip_host_check: bool,
}

impl ModrinthArgs {
    fn side(&self) -> Side {
        if self.server {
            Side::Server
        } else {
            Side::Client
        }
    }
}

fn parse_args() -> Args {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn main() -> Result<()> {
    let args = parse_args();
    logging::init(args.verbose);

    tracing::info!("cfpack v{}", env!("CARGO_PKG_VERSION"));

    sync_modpack(SyncModpackArgs {
        source: args.zip_path_or_url,
        destination_dir: args.destination_dir,
        user_agent: args.user_agent,
        conflict_mode: args.conflict.mode(),
        side: args.modrinth.side(),
        include_optional: !args.modrinth.no_optional,
        verify_hashes: !args.modrinth.ignore_hashes,
        check_hosts: !args.modrinth.skip_host_check,
        insecure: args.insecure,
    })
}
