use cfpack_manifest::Side;
use std::time::Duration;

use crate::overrides::ConflictMode;
use crate::transport::{TransportConfig, DEFAULT_USER_AGENT};

/// Project info endpoint. `{project_id}` is substituted.
pub const DEFAULT_INFO_URL: &str = "https://api.cfwidget.com/{project_id}";

/// File download endpoint. `{project_id}` and `{file_id}` are substituted.
pub const DEFAULT_DOWNLOAD_URL: &str =
    "https://www.curseforge.com/api/v1/mods/{project_id}/files/{file_id}/download";

/// URL templates for the remote services the engine talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub info_url: String,
    pub download_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            info_url: DEFAULT_INFO_URL.to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
        }
    }
}

impl Endpoints {
    pub fn info_url(&self, project_id: u64) -> String {
        self.info_url
            .replace("{project_id}", &project_id.to_string())
    }

    pub fn download_url(&self, project_id: u64, file_id: u64) -> String {
        self.download_url
            .replace("{project_id}", &project_id.to_string())
            .replace("{file_id}", &file_id.to_string())
    }
}

/// How many times a download is attempted and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Hosts Modrinth pack files may be downloaded from.
pub const DEFAULT_ALLOWED_HOSTS: [&str; 4] = [
    "cdn.modrinth.com",
    "github.com",
    "raw.githubusercontent.com",
    "gitlab.com",
];

/// How a Modrinth pack is installed. Ignored for CurseForge packs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModrinthOptions {
    pub side: Side,
    /// Install files marked optional for `side`.
    pub include_optional: bool,
    /// Check SHA-1 and SHA-512 of every file. Sizes are always checked.
    pub verify_hashes: bool,
    /// Refuse packs with download URLs outside `allowed_hosts`.
    pub check_hosts: bool,
    pub allowed_hosts: Vec<String>,
}

impl Default for ModrinthOptions {
    fn default() -> Self {
        Self {
            side: Side::Client,
            include_optional: true,
            verify_hashes: true,
            check_hosts: true,
            allowed_hosts: DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

/// Tunables for one synchronization run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub user_agent: String,
    pub conflict_mode: ConflictMode,
    pub retry: RetryPolicy,
    pub endpoints: Endpoints,
    pub transport: TransportConfig,
    pub modrinth: ModrinthOptions,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            conflict_mode: ConflictMode::default(),
            retry: RetryPolicy::default(),
            endpoints: Endpoints::default(),
            transport: TransportConfig::default(),
            modrinth: ModrinthOptions::default(),
        }
    }
}
