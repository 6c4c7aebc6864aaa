//! Modrinth `.mrpack` index model.
//!
//! Unlike a CurseForge manifest, the index lists direct download URLs, the
//! install path and the expected digests of every file, so no project lookup
//! is needed. Files may be marked as client or server only.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::fs;

use crate::error::{ManifestError, Result};
use crate::{is_enclosed_path, parse_object, Minecraft, ModLoader};

/// Well-known name of the index inside an extracted `.mrpack`.
pub const MODRINTH_INDEX_FILE: &str = "modrinth.index.json";

/// Override folder applied on every side.
pub const OVERRIDES_DIR: &str = "overrides";

const REQUIRED_KEYS: [&str; 3] = ["name", "versionId", "files"];

/// Describes a pack's `modrinth.index.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModrinthIndex {
    #[serde(default)]
    pub format_version: u32,

    /// Always `minecraft` for packs this tool installs.
    #[serde(default)]
    pub game: String,

    pub version_id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    pub files: Vec<ModpackFile>,

    /// Game and loader versions keyed by dependency id.
    #[serde(default)]
    pub dependencies: BTreeMap<DependencyId, String>,
}

/// One file to download, with the place it goes and how to check it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModpackFile {
    /// Install path relative to the destination root.
    pub path: Utf8PathBuf,

    pub hashes: FileHashes,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<FileEnv>,

    /// Mirrors, tried in order.
    pub downloads: Vec<String>,

    pub file_size: u64,
}

/// Hex encoded digests of a file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileHashes {
    pub sha1: String,
    pub sha512: String,

    /// Any further algorithms the index lists. Not verified.
    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEnv {
    pub client: EnvRequirement,
    pub server: EnvRequirement,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EnvRequirement {
    Required,
    Optional,
    Unsupported,
}

/// Which kind of installation the pack is unpacked into.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    #[default]
    Client,
    Server,
}

impl Side {
    /// Override folder applied only on this side.
    pub fn overrides_dir(self) -> &'static str {
        match self {
            Side::Client => "client-overrides",
            Side::Server => "server-overrides",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Client => write!(f, "client"),
            Side::Server => write!(f, "server"),
        }
    }
}

/// Key of the `dependencies` map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DependencyId {
    Minecraft,
    Forge,
    Neoforge,
    FabricLoader,
    QuiltLoader,
    Other(String),
}

impl From<String> for DependencyId {
    fn from(value: String) -> Self {
        match value.as_str() {
            "minecraft" => DependencyId::Minecraft,
            "forge" => DependencyId::Forge,
            "neoforge" => DependencyId::Neoforge,
            "fabric-loader" => DependencyId::FabricLoader,
            "quilt-loader" => DependencyId::QuiltLoader,
            _ => DependencyId::Other(value),
        }
    }
}

impl From<DependencyId> for String {
    fn from(id: DependencyId) -> Self {
        match id {
            DependencyId::Minecraft => "minecraft".to_string(),
            DependencyId::Forge => "forge".to_string(),
            DependencyId::Neoforge => "neoforge".to_string(),
            DependencyId::FabricLoader => "fabric-loader".to_string(),
            DependencyId::QuiltLoader => "quilt-loader".to_string(),
            DependencyId::Other(name) => name,
        }
    }
}

impl DependencyId {
    /// Loader id in the CurseForge `<loader>-<version>` form.
    fn loader_id(&self, version: &str) -> Option<String> {
        let prefix = match self {
            DependencyId::Minecraft => return None,
            DependencyId::Forge => "forge",
            DependencyId::Neoforge => "neoforge",
            DependencyId::FabricLoader => "fabric",
            DependencyId::QuiltLoader => "quilt",
            DependencyId::Other(name) => name.as_str(),
        };
        Some(format!("{}-{}", prefix, version))
    }
}

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyId::Minecraft => write!(f, "Minecraft"),
            DependencyId::Forge => write!(f, "Forge"),
            DependencyId::Neoforge => write!(f, "NeoForge"),
            DependencyId::FabricLoader => write!(f, "Fabric"),
            DependencyId::QuiltLoader => write!(f, "Quilt"),
            DependencyId::Other(name) => write!(f, "{}", name),
        }
    }
}

impl ModpackFile {
    /// Whether this file belongs in a `side` installation.
    ///
    /// Files without an `env` block go everywhere. Optional files follow
    /// `include_optional`.
    pub fn is_wanted(&self, side: Side, include_optional: bool) -> bool {
        let Some(env) = &self.env else {
            return true;
        };
        let requirement = match side {
            Side::Client => env.client,
            Side::Server => env.server,
        };
        match requirement {
            EnvRequirement::Required => true,
            EnvRequirement::Optional => include_optional,
            EnvRequirement::Unsupported => false,
        }
    }
}

impl ModrinthIndex {
    /// Read and validate `modrinth.index.json` from an extracted archive root.
    pub fn parse(archive_root: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = archive_root.as_ref().join(MODRINTH_INDEX_FILE);
        let bytes = fs::read(path.as_std_path()).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_slice(&bytes)
    }

    /// Validate and parse index bytes.
    ///
    /// Requires `name`, `versionId` and `files`. Every file must install to a
    /// relative path inside the destination and list at least one download.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value = parse_object(bytes, &REQUIRED_KEYS)?;
        let index: Self = serde_json::from_value(value)?;

        for file in &index.files {
            if !is_enclosed_path(file.path.as_str()) {
                return Err(ManifestError::UnsafePath(file.path.to_string()));
            }
            if file.downloads.is_empty() {
                return Err(ManifestError::NoDownloads(file.path.to_string()));
            }
        }

        Ok(index)
    }

    pub fn game_version(&self) -> Option<&str> {
        self.dependencies
            .get(&DependencyId::Minecraft)
            .map(String::as_str)
    }

    /// Game version and loaders in the shape CurseForge manifests use.
    ///
    /// Loaders come in a fixed order (Forge, NeoForge, Fabric, Quilt, others)
    /// and the first one is primary.
    pub fn minecraft(&self) -> Minecraft {
        let mod_loaders = self
            .dependencies
            .iter()
            .filter_map(|(id, version)| id.loader_id(version))
            .enumerate()
            .map(|(i, id)| ModLoader { id, primary: i == 0 })
            .collect();

        Minecraft {
            version: self.game_version().map(str::to_string),
            mod_loaders,
        }
    }

    /// Override folders for a `side` installation, shared folder first.
    pub fn overrides_dirs(&self, archive_root: &Utf8Path, side: Side) -> Vec<Utf8PathBuf> {
        vec![
            archive_root.join(OVERRIDES_DIR),
            archive_root.join(side.overrides_dir()),
        ]
    }

    /// Multi-line human readable description of the pack.
    pub fn summary(&self) -> String {
        let mut out = format!("{} version {}", self.name, self.version_id);
        if let Some(summary) = &self.summary {
            let _ = write!(out, "\n{}", summary);
        }
        if !self.dependencies.is_empty() {
            out.push_str("\nDependencies:");
            for (id, version) in &self.dependencies {
                let _ = write!(out, "\n  {}: {}", id, version);
            }
        }
        let _ = write!(out, "\nTotal files: {}", self.files.len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
    {
        "formatVersion": 1,
        "game": "minecraft",
        "versionId": "3.1.0",
        "name": "Rinth Pack",
        "summary": "A test pack",
        "files": [
            {
                "path": "mods/a.jar",
                "hashes": { "sha1": "aa", "sha512": "bb", "md5": "cc" },
                "downloads": ["https://cdn.modrinth.com/data/a/a.jar"],
                "fileSize": 10
            },
            {
                "path": "mods/client-only.jar",
                "hashes": { "sha1": "aa", "sha512": "bb" },
                "env": { "client": "required", "server": "unsupported" },
                "downloads": ["https://cdn.modrinth.com/data/b/b.jar"],
                "fileSize": 20
            },
            {
                "path": "mods/optional.jar",
                "hashes": { "sha1": "aa", "sha512": "bb" },
                "env": { "client": "optional", "server": "optional" },
                "downloads": ["https://cdn.modrinth.com/data/c/c.jar"],
                "fileSize": 30
            }
        ],
        "dependencies": { "fabric-loader": "0.15.7", "minecraft": "1.20.1" }
    }
    "#;

    fn index() -> ModrinthIndex {
        ModrinthIndex::from_slice(INDEX.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_index() {
        let index = index();

        assert_eq!(index.name, "Rinth Pack");
        assert_eq!(index.version_id, "3.1.0");
        assert_eq!(index.files.len(), 3);
        assert_eq!(index.files[0].path, "mods/a.jar");
        assert_eq!(index.files[0].hashes.other.get("md5").map(String::as_str), Some("cc"));
        assert_eq!(index.game_version(), Some("1.20.1"));
    }

    #[test]
    fn test_loader_from_dependencies() {
        let minecraft = index().minecraft();

        assert_eq!(minecraft.version.as_deref(), Some("1.20.1"));
        assert_eq!(minecraft.mod_loaders.len(), 1);
        assert_eq!(minecraft.mod_loaders[0].id, "fabric-0.15.7");
        assert!(minecraft.mod_loaders[0].primary);
    }

    #[test]
    fn test_forge_ranks_before_other_loaders() {
        let index = ModrinthIndex::from_slice(
            br#"{"name":"P","versionId":"1","files":[],
                "dependencies":{"quilt-loader":"0.20","forge":"47.2.0","minecraft":"1.20.1"}}"#,
        )
        .unwrap();

        let ids: Vec<String> = index
            .minecraft()
            .mod_loaders
            .into_iter()
            .map(|loader| loader.id)
            .collect();
        assert_eq!(ids, vec!["forge-47.2.0", "quilt-0.20"]);
    }

    #[test]
    fn test_env_filtering() {
        let index = index();
        let wanted = |side, optional| {
            index
                .files
                .iter()
                .filter(|file| file.is_wanted(side, optional))
                .map(|file| file.path.as_str())
                .collect::<Vec<_>>()
        };

        assert_eq!(
            wanted(Side::Client, true),
            vec!["mods/a.jar", "mods/client-only.jar", "mods/optional.jar"]
        );
        assert_eq!(wanted(Side::Server, true), vec!["mods/a.jar", "mods/optional.jar"]);
        assert_eq!(wanted(Side::Server, false), vec!["mods/a.jar"]);
    }

    #[test]
    fn test_file_path_outside_destination_rejected() {
        for path in ["../evil.jar", "/etc/evil.jar", "mods/../../evil.jar"] {
            let json = format!(
                r#"{{"name":"P","versionId":"1","files":[{{"path":"{path}",
                    "hashes":{{"sha1":"a","sha512":"b"}},"downloads":["https://cdn.modrinth.com/x"],
                    "fileSize":1}}]}}"#
            );
            match ModrinthIndex::from_slice(json.as_bytes()) {
                Err(ManifestError::UnsafePath(rejected)) => assert_eq!(rejected, path),
                other => panic!("expected {path} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_file_without_downloads_rejected() {
        let result = ModrinthIndex::from_slice(
            br#"{"name":"P","versionId":"1","files":[{"path":"mods/a.jar",
                "hashes":{"sha1":"a","sha512":"b"},"downloads":[],"fileSize":1}]}"#,
        );
        assert!(matches!(result, Err(ManifestError::NoDownloads(path)) if path == "mods/a.jar"));
    }

    #[test]
    fn test_missing_required_keys() {
        match ModrinthIndex::from_slice(br#"{"name":"P","files":[]}"#) {
            Err(ManifestError::MissingKey(key)) => assert_eq!(key, "versionId"),
            other => panic!("expected missing versionId, got {other:?}"),
        }
    }

    #[test]
    fn test_overrides_dirs_per_side() {
        let root = Utf8Path::new("/pack");

        assert_eq!(
            index().overrides_dirs(root, Side::Server),
            vec![root.join("overrides"), root.join("server-overrides")]
        );
    }

    #[test]
    fn test_summary() {
        let summary = index().summary();

        assert!(summary.starts_with("Rinth Pack version 3.1.0\nA test pack"));
        assert!(summary.contains("  Fabric: 0.15.7"));
        assert!(summary.contains("  Minecraft: 1.20.1"));
        assert!(summary.ends_with("Total files: 3"));
    }
}
