//! Installs and updates CurseForge and Modrinth modpacks into a game instance
//! directory.
//!
//! The entry point is [`ModpackSync`]. Given a modpack archive and a
//! destination it downloads every file listed in the manifest, removes
//! superseded revisions, merges the pack's override files while keeping user
//! edits the caller wants kept, and fetches the mod loader installer. Modrinth
//! files are checked against their listed hashes and download hosts.
//!
//! Network access goes through the [`Transport`] trait and override conflicts
//! go through the [`ConflictResolver`] trait, so front ends and tests can
//! supply their own implementations.
//!
//! ```no_run
//! use cfpack_sync::{ArchiveSource, ConflictMode, ModpackSync, SyncOptions};
//!
//! let options = SyncOptions {
//!     conflict_mode: ConflictMode::Rename,
//!     ..Default::default()
//! };
//! let outcome = ModpackSync::new(ArchiveSource::parse("pack.zip"), "instance")
//!     .with_options(options)
//!     .run()?;
//! println!("{}", outcome.message());
//! # Ok::<(), cfpack_sync::Error>(())
//! ```

pub mod archive;
pub mod backup;
pub mod checksum;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod loader;
pub mod modrinth;
pub mod options;
pub mod overrides;
pub mod resolver;
pub mod sync;
pub mod transport;
pub mod utils;

pub use archive::ArchiveSource;
pub use error::{Error, Result};
pub use events::{EventCallback, StopFlag, SyncEvent, SyncProgress, SyncStage};
pub use fetcher::FetchOutcome;
pub use modrinth::ModrinthPlan;
pub use loader::{LoaderOutcome, LoaderPlan};
pub use options::{Endpoints, ModrinthOptions, RetryPolicy, SyncOptions, DEFAULT_ALLOWED_HOSTS};
pub use overrides::{
    ConflictChoice, ConflictMode, ConflictResolver, OverrideAction, OverrideReconciler,
    OverrideReport,
};
pub use resolver::{ProjectInfo, ProjectKind, ProjectResolver, Resolution, ResolveOutcome};
pub use sync::{ModpackSync, SyncOutcome, SyncReport};
pub use transport::{HttpTransport, Request, Transport, TransportConfig, DEFAULT_USER_AGENT};
pub use utils::prettify_bytes;

pub use cfpack_manifest::{
    FileRef, Manifest, ManifestError, Modpack, ModrinthIndex, PackFormat, Side,
};
