//! Modpack manifest models.
//!
//! A CurseForge archive carries a `manifest.json` at its root that lists every
//! project file the pack depends on, the folder holding the pack's override
//! files, and the game/mod loader versions it targets. A Modrinth `.mrpack`
//! carries a `modrinth.index.json` instead, see [`modrinth`].
//!
//! [`Modpack::detect`] picks the right one for an extracted archive. This crate
//! parses and validates those documents; it performs no I/O beyond reading
//! them.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;

mod error;
pub mod modrinth;

pub use error::{ManifestError, Result};
pub use modrinth::{
    DependencyId, EnvRequirement, FileEnv, FileHashes, ModpackFile, ModrinthIndex, Side,
    MODRINTH_INDEX_FILE,
};

/// Well-known name of the manifest inside an extracted modpack.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Well-known name of the HTML mod list shipped next to the manifest.
pub const MODLIST_FILE: &str = "modlist.html";

/// Keys that must be present before a manifest is accepted.
const REQUIRED_KEYS: [&str; 3] = ["name", "version", "files"];

/// Describes a modpack's `manifest.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Display name of the pack.
    pub name: String,

    /// Pack version as authored, not necessarily semver.
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Usually `minecraftModpack`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_version: Option<u32>,

    /// Folder (relative to the archive root) holding files that are merged into
    /// the destination as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft: Option<Minecraft>,

    /// Project files in download order.
    pub files: Vec<FileRef>,
}

/// Game version and mod loaders targeted by the pack.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Minecraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mod_loaders: Vec<ModLoader>,
}

/// A mod loader entry such as `forge-47.2.0` or `fabric-0.15.7`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModLoader {
    pub id: String,

    #[serde(default)]
    pub primary: bool,
}

/// Reference to one file revision of one project.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileRef {
    #[serde(rename = "projectID")]
    pub project_id: u64,

    #[serde(rename = "fileID")]
    pub file_id: u64,

    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl Manifest {
    /// Read and validate `manifest.json` from an extracted archive root.
    pub fn parse(archive_root: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = archive_root.as_ref().join(MANIFEST_FILE);
        let bytes = fs::read(path.as_std_path()).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_slice(&bytes)
    }

    /// Validate and parse manifest bytes.
    ///
    /// Fails if the content is empty, is not a JSON object, or lacks any of
    /// `name`, `version` and `files`. Every other key is optional, but an
    /// `overrides` folder must stay inside the archive.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value = parse_object(bytes, &REQUIRED_KEYS)?;
        let manifest: Self = serde_json::from_value(value)?;

        if let Some(overrides) = manifest.overrides.as_deref().map(str::trim) {
            if !overrides.is_empty() && !is_enclosed_path(overrides) {
                return Err(ManifestError::UnsafePath(overrides.to_string()));
            }
        }

        Ok(manifest)
    }

    /// The loader the pack should be installed with (the first listed one).
    pub fn mod_loader(&self) -> Option<&ModLoader> {
        self.minecraft.as_ref()?.mod_loaders.first()
    }

    pub fn game_version(&self) -> Option<&str> {
        self.minecraft.as_ref()?.version.as_deref()
    }

    /// Absolute overrides folder for an extracted archive, if the pack has one.
    pub fn overrides_dir(&self, archive_root: &Utf8Path) -> Option<Utf8PathBuf> {
        self.overrides
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty() && is_enclosed_path(dir))
            .map(|dir| archive_root.join(dir))
    }

    /// Multi-line human readable description of the pack.
    pub fn summary(&self) -> String {
        let mut out = format!("{} version {}", self.name, self.version);
        if let Some(author) = &self.author {
            let _ = write!(out, "\nAuthor: {}", author);
        }
        if let Some(game_version) = self.game_version() {
            let _ = write!(out, "\nMinecraft: {}", game_version);
        }
        if let Some(minecraft) = &self.minecraft {
            if !minecraft.mod_loaders.is_empty() {
                out.push_str("\nMod loaders:");
                for loader in &minecraft.mod_loaders {
                    let primary = if loader.primary { " (primary)" } else { "" };
                    let _ = write!(out, "\n  {}{}", loader.id, primary);
                }
            }
        }
        let _ = write!(out, "\nTotal files: {}", self.files.len());
        out
    }
}

/// Which manifest format an archive uses.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PackFormat {
    CurseForge,
    Modrinth,
}

/// The manifest of an extracted modpack, in whichever format it came.
#[derive(Debug, Clone, PartialEq)]
pub enum Modpack {
    CurseForge(Manifest),
    Modrinth(ModrinthIndex),
}

impl Modpack {
    /// Parse the manifest of an extracted archive.
    ///
    /// An archive holding `modrinth.index.json` is a Modrinth pack. Anything
    /// else is read as a CurseForge pack, so a missing manifest reports
    /// `manifest.json`.
    pub fn detect(archive_root: impl AsRef<Utf8Path>) -> Result<Self> {
        let archive_root = archive_root.as_ref();
        if archive_root.join(MODRINTH_INDEX_FILE).is_file() {
            return ModrinthIndex::parse(archive_root).map(Modpack::Modrinth);
        }
        Manifest::parse(archive_root).map(Modpack::CurseForge)
    }

    pub fn format(&self) -> PackFormat {
        match self {
            Modpack::CurseForge(_) => PackFormat::CurseForge,
            Modpack::Modrinth(_) => PackFormat::Modrinth,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Modpack::CurseForge(manifest) => &manifest.name,
            Modpack::Modrinth(index) => &index.name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Modpack::CurseForge(manifest) => &manifest.version,
            Modpack::Modrinth(index) => &index.version_id,
        }
    }

    /// Game version and loaders, in the CurseForge shape for both formats.
    pub fn minecraft(&self) -> Option<Minecraft> {
        match self {
            Modpack::CurseForge(manifest) => manifest.minecraft.clone(),
            Modpack::Modrinth(index) => Some(index.minecraft()),
        }
    }

    /// Name of the manifest file inside the archive.
    pub fn manifest_file(&self) -> &'static str {
        match self {
            Modpack::CurseForge(_) => MANIFEST_FILE,
            Modpack::Modrinth(_) => MODRINTH_INDEX_FILE,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Modpack::CurseForge(manifest) => manifest.summary(),
            Modpack::Modrinth(index) => index.summary(),
        }
    }
}

/// Whether `path` is relative and never climbs above its starting folder.
///
/// Backslashes count as separators so Windows style paths in a manifest are
/// judged the same on every platform.
pub fn is_enclosed_path(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    let path = Utf8Path::new(&normalized);

    let mut has_normal = false;
    for component in path.components() {
        match component {
            Utf8Component::Normal(_) => has_normal = true,
            Utf8Component::CurDir => {}
            _ => return false,
        }
    }
    has_normal
}

/// Decode a manifest document into a non-empty JSON object holding `required`.
pub(crate) fn parse_object(
    bytes: &[u8],
    required: &[&'static str],
) -> Result<serde_json::Value> {
    // Strip UTF-8 BOM if present
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ManifestError::Empty);
    }

    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    let object = match value.as_object() {
        Some(object) if !object.is_empty() => object,
        _ => return Err(ManifestError::Empty),
    };

    if let Some(key) = required.iter().find(|key| !object.contains_key(**key)) {
        return Err(ManifestError::MissingKey(*key));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
    {
        "minecraft": {
            "version": "1.20.1",
            "modLoaders": [{ "id": "forge-47.2.0", "primary": true }]
        },
        "manifestType": "minecraftModpack",
        "manifestVersion": 1,
        "name": "Pack",
        "version": "1.0",
        "author": "someone",
        "files": [
            { "projectID": 1, "fileID": 10, "required": true },
            { "projectID": 3, "fileID": 30 },
            { "projectID": 2, "fileID": 20, "required": false }
        ],
        "overrides": "overrides"
    }
    "#;

    #[test]
    fn test_parse_full_manifest() {
        let manifest = Manifest::from_slice(FULL.as_bytes()).unwrap();

        assert_eq!(manifest.name, "Pack");
        assert_eq!(manifest.version, "1.0");
        assert_eq!(manifest.author.as_deref(), Some("someone"));
        assert_eq!(manifest.game_version(), Some("1.20.1"));
        assert_eq!(manifest.mod_loader().unwrap().id, "forge-47.2.0");
        assert_eq!(manifest.overrides.as_deref(), Some("overrides"));
    }

    #[test]
    fn test_files_keep_manifest_order() {
        let manifest = Manifest::from_slice(FULL.as_bytes()).unwrap();

        let ids: Vec<(u64, u64)> = manifest
            .files
            .iter()
            .map(|f| (f.project_id, f.file_id))
            .collect();
        assert_eq!(ids, vec![(1, 10), (3, 30), (2, 20)]);
        assert!(manifest.files[1].required);
        assert!(!manifest.files[2].required);
    }

    #[test]
    fn test_minimal_manifest() {
        let manifest =
            Manifest::from_slice(br#"{"name":"Pack","version":"1.0","files":[]}"#).unwrap();

        assert!(manifest.files.is_empty());
        assert!(manifest.minecraft.is_none());
        assert!(manifest.mod_loader().is_none());
        assert!(manifest.overrides_dir(Utf8Path::new("/tmp/x")).is_none());
    }

    #[test]
    fn test_missing_required_keys() {
        for (json, key) in [
            (r#"{"version":"1.0","files":[]}"#, "name"),
            (r#"{"name":"Pack","files":[]}"#, "version"),
            (r#"{"name":"Pack","version":"1.0"}"#, "files"),
        ] {
            match Manifest::from_slice(json.as_bytes()) {
                Err(ManifestError::MissingKey(missing)) => assert_eq!(missing, key),
                other => panic!("expected missing {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_manifest_rejected() {
        assert!(matches!(Manifest::from_slice(b""), Err(ManifestError::Empty)));
        assert!(matches!(Manifest::from_slice(b"  \n"), Err(ManifestError::Empty)));
        assert!(matches!(Manifest::from_slice(b"{}"), Err(ManifestError::Empty)));
        assert!(matches!(Manifest::from_slice(b"[]"), Err(ManifestError::Empty)));
    }

    #[test]
    fn test_garbage_manifest_rejected() {
        assert!(matches!(
            Manifest::from_slice(b"{not json"),
            Err(ManifestError::Json(_))
        ));
    }

    #[test]
    fn test_modloaders_without_version() {
        let manifest = Manifest::from_slice(
            br#"{"name":"P","version":"1","files":[],"minecraft":{"modLoaders":[{"id":"fabric-0.15"}]}}"#,
        )
        .unwrap();

        assert_eq!(manifest.game_version(), None);
        assert_eq!(manifest.mod_loader().unwrap().id, "fabric-0.15");
        assert!(!manifest.mod_loader().unwrap().primary);
    }

    #[test]
    fn test_overrides_dir_blank_is_none() {
        let manifest = Manifest::from_slice(
            br#"{"name":"P","version":"1","files":[],"overrides":"  "}"#,
        )
        .unwrap();
        assert!(manifest.overrides_dir(Utf8Path::new("/root")).is_none());
    }

    #[test]
    fn test_overrides_outside_archive_rejected() {
        for overrides in ["..", "../..", "/etc", "a/../../b"] {
            let json = format!(
                r#"{{"name":"P","version":"1","files":[],"overrides":"{overrides}"}}"#
            );
            match Manifest::from_slice(json.as_bytes()) {
                Err(ManifestError::UnsafePath(path)) => assert_eq!(path, overrides),
                other => panic!("expected {overrides} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_enclosed_paths() {
        assert!(is_enclosed_path("overrides"));
        assert!(is_enclosed_path("./overrides/config"));
        assert!(is_enclosed_path("mods/x.jar"));
        assert!(!is_enclosed_path(""));
        assert!(!is_enclosed_path("."));
        assert!(!is_enclosed_path("mods/../../x.jar"));
        assert!(!is_enclosed_path("/abs/x.jar"));
        assert!(!is_enclosed_path("mods\\..\\..\\x.jar"));
    }

    #[test]
    fn test_detect_format() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(root.join(MANIFEST_FILE), FULL).unwrap();

        let modpack = Modpack::detect(root).unwrap();
        assert_eq!(modpack.format(), PackFormat::CurseForge);
        assert_eq!(modpack.name(), "Pack");
        assert_eq!(modpack.manifest_file(), MANIFEST_FILE);

        fs::write(
            root.join(MODRINTH_INDEX_FILE),
            r#"{"formatVersion":1,"game":"minecraft","versionId":"2.0","name":"Rinth",
                "files":[],"dependencies":{"minecraft":"1.20.1"}}"#,
        )
        .unwrap();

        let modpack = Modpack::detect(root).unwrap();
        assert_eq!(modpack.format(), PackFormat::Modrinth);
        assert_eq!(modpack.version(), "2.0");
        assert_eq!(
            modpack.minecraft().unwrap().version.as_deref(),
            Some("1.20.1")
        );
    }

    #[test]
    fn test_detect_without_manifest_reports_curseforge_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        match Modpack::detect(root) {
            Err(ManifestError::Read { path, .. }) => assert!(path.ends_with(MANIFEST_FILE)),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn test_summary() {
        let manifest = Manifest::from_slice(FULL.as_bytes()).unwrap();
        let summary = manifest.summary();

        assert!(summary.starts_with("Pack version 1.0"));
        assert!(summary.contains("Author: someone"));
        assert!(summary.contains("Minecraft: 1.20.1"));
        assert!(summary.contains("forge-47.2.0 (primary)"));
        assert!(summary.ends_with("Total files: 3"));
    }

    #[test]
    fn test_parse_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(root.join(MANIFEST_FILE), FULL).unwrap();

        let manifest = Manifest::parse(root).unwrap();
        assert_eq!(manifest.files.len(), 3);
    }

    #[test]
    fn test_parse_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        assert!(matches!(
            Manifest::parse(root),
            Err(ManifestError::Read { .. })
        ));
    }
}
