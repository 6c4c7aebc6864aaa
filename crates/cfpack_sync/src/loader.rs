//! Mod loader installer lookup.
//!
//! Only the installer artifact is fetched. Running it is left to the user, so
//! the outcome carries the command line they need.

use camino::{Utf8Path, Utf8PathBuf};
use cfpack_manifest::Minecraft;
use serde::Serialize;

use crate::error::Result;
use crate::fetcher::download;
use crate::transport::{Request, Transport};

const FORGE_URL: &str = "https://maven.minecraftforge.net/net/minecraftforge/forge/\
    {game_version}-{forge_version}/forge-{game_version}-{forge_version}-installer.jar";

/// Forge builds for game versions before 1.8 repeat the game version.
const FORGE_URL_OLD: &str = "https://maven.minecraftforge.net/net/minecraftforge/forge/\
    {game_version}-{forge_version}-{game_version}/\
    forge-{game_version}-{forge_version}-{game_version}-installer.jar";

const FABRIC_URL: &str =
    "https://maven.fabricmc.net/net/fabricmc/fabric-installer/1.0.1/fabric-installer-1.0.1.jar";
const FABRIC_FILE_NAME: &str = "fabric-installer-1.0.1.jar";

/// What to fetch for the pack's mod loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderPlan {
    Forge {
        version: String,
        url: String,
        file_name: String,
    },
    Fabric {
        url: String,
        file_name: String,
    },
    /// No installer is known for this loader id.
    Unsupported { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LoaderOutcome {
    Downloaded {
        path: Utf8PathBuf,
        /// How to run the installer.
        instructions: String,
    },
    ManualInstall { id: String },
}

/// Work out the installer for the first listed loader.
///
/// `None` when the pack names no game version or no loader.
pub fn plan_loader(minecraft: Option<&Minecraft>) -> Option<LoaderPlan> {
    let minecraft = minecraft?;
    let game_version = minecraft.version.as_deref()?;
    let loader = minecraft.mod_loaders.first()?;
    let id = loader.id.as_str();

    if let Some(forge_version) = id.strip_prefix("forge-") {
        let template = if is_legacy_game_version(game_version) {
            FORGE_URL_OLD
        } else {
            FORGE_URL
        };
        let url = template
            .replace("{game_version}", game_version)
            .replace("{forge_version}", forge_version);
        let file_name = url_file_name(&url);
        return Some(LoaderPlan::Forge {
            version: forge_version.to_string(),
            url,
            file_name,
        });
    }

    if id.starts_with("fabric") {
        return Some(LoaderPlan::Fabric {
            url: FABRIC_URL.to_string(),
            file_name: FABRIC_FILE_NAME.to_string(),
        });
    }

    Some(LoaderPlan::Unsupported { id: id.to_string() })
}

/// Minor version below 8, e.g. `1.7.10`. Unparseable versions are not legacy.
fn is_legacy_game_version(game_version: &str) -> bool {
    game_version
        .split('.')
        .nth(1)
        .and_then(|minor| minor.trim().parse::<u32>().ok())
        .is_some_and(|minor| minor < 8)
}

/// Last non-empty path segment, or the one before it for a trailing slash.
fn url_file_name(url: &str) -> String {
    let mut segments = url.rsplit('/');
    let last = segments.next().unwrap_or_default().trim();
    if !last.is_empty() {
        return last.to_string();
    }
    segments.next().unwrap_or_default().trim().to_string()
}

/// Download the installer described by `plan` into `destination`.
///
/// A download failure is returned as an error. An unsupported loader is not.
pub fn fetch_loader(
    plan: &LoaderPlan,
    transport: &dyn Transport,
    user_agent: &str,
    destination: &Utf8Path,
) -> Result<LoaderOutcome> {
    let (url, file_name) = match plan {
        LoaderPlan::Forge { url, file_name, .. } | LoaderPlan::Fabric { url, file_name } => {
            (url, file_name)
        }
        LoaderPlan::Unsupported { id } => {
            tracing::warn!("Please download {} mod loader manually", id);
            return Ok(LoaderOutcome::ManualInstall { id: id.clone() });
        }
    };

    let path = destination.join(file_name);
    tracing::info!("Downloading {} as {}", url, path);
    let request = Request::get(url.as_str()).with_user_agent(user_agent);
    download(transport, &request, &path, None)?;

    let instructions = match plan {
        LoaderPlan::Forge { version, .. } => format!(
            "Forge {} downloaded. Please run java -jar \"{}\" to install client \
             and use --installServer argument to install server",
            version, path
        ),
        _ => format!(
            "Fabric installer downloaded. Please run java -jar \"{}\" client -dir {} \
             -mcversion \"target minecraft version\" -loader \"target fabric version\" \
             to install client",
            path, destination
        ),
    };
    tracing::info!("{}", instructions);

    Ok(LoaderOutcome::Downloaded { path, instructions })
}
