//! Maps a manifest [`FileRef`] to a concrete download.
//!
//! Project metadata comes from an external info provider. The resolver picks
//! the destination folder from the project's category, finds the requested
//! file revision, and lists older revisions of the same project that are
//! already present so they can be removed once the new one lands.

use camino::{Utf8Path, Utf8PathBuf};
use cfpack_manifest::FileRef;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::options::Endpoints;
use crate::transport::{get_bytes, Request, Transport};

/// Category of a project as reported by the info provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ProjectKind {
    Mods,
    ResourcePacks,
    Shaders,
    Other(String),
}

impl From<String> for ProjectKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Mods" => ProjectKind::Mods,
            "Resource Packs" => ProjectKind::ResourcePacks,
            "Shaders" => ProjectKind::Shaders,
            _ => ProjectKind::Other(value),
        }
    }
}

impl ProjectKind {
    /// Subdirectory of the destination this kind of project is installed into.
    /// Unknown categories are installed as mods.
    pub fn directory(&self) -> &'static str {
        match self {
            ProjectKind::Mods | ProjectKind::Other(_) => "mods",
            ProjectKind::ResourcePacks => "resourcepacks",
            ProjectKind::Shaders => "shaderpacks",
        }
    }
}

/// One downloadable revision of a project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectFile {
    pub id: u64,
    pub name: String,
    pub filesize: u64,
}

/// Project metadata returned by the info provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectInfo {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ProjectKind,
    pub files: Vec<ProjectFile>,
}

/// Everything needed to fetch one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub title: String,
    pub kind: ProjectKind,
    /// Absolute destination folder, e.g. `<dest>/mods`.
    pub directory: Utf8PathBuf,
    pub file_name: String,
    pub download_url: String,
    pub expected_size: u64,
    /// Other revisions of this project already present in `directory`.
    pub stale: Vec<Utf8PathBuf>,
}

impl Resolution {
    pub fn destination(&self) -> Utf8PathBuf {
        self.directory.join(&self.file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved(Resolution),
    /// The project info could not be fetched or understood.
    Skipped { reason: String },
}

pub struct ProjectResolver {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    user_agent: String,
}

impl ProjectResolver {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            user_agent: user_agent.into(),
        }
    }

    /// Fetch project info for `file_ref.project_id`.
    pub fn fetch_info(&self, project_id: u64) -> Result<ProjectInfo> {
        let url = self.endpoints.info_url(project_id);
        tracing::debug!("Retrieving project information from {}", url);

        let request = Request::get(url)
            .with_user_agent(self.user_agent.clone())
            .json();
        let body = get_bytes(self.transport.as_ref(), &request)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Resolve one manifest entry against the destination root.
    ///
    /// A project whose info cannot be fetched is skipped. A project that does
    /// not list the requested file fails with [`Error::FileNotInProject`], and
    /// one whose file name is not a plain name fails with
    /// [`Error::UnsafePath`].
    pub fn resolve(&self, file_ref: &FileRef, destination: &Utf8Path) -> Result<ResolveOutcome> {
        let info = match self.fetch_info(file_ref.project_id) {
            Ok(info) => info,
            Err(e) => {
                return Ok(ResolveOutcome::Skipped {
                    reason: e.to_string(),
                })
            }
        };

        if let ProjectKind::Other(kind) = &info.kind {
            tracing::warn!("Unknown project type {}. Considering as mod...", kind);
        }

        let directory = destination.join(info.kind.directory());
        let download_url = self
            .endpoints
            .download_url(file_ref.project_id, file_ref.file_id);

        select_file(info, file_ref, directory, download_url).map(ResolveOutcome::Resolved)
    }
}

/// Pick the requested revision out of `info.files` and collect stale ones.
fn select_file(
    info: ProjectInfo,
    file_ref: &FileRef,
    directory: Utf8PathBuf,
    download_url: String,
) -> Result<Resolution> {
    let target = info
        .files
        .iter()
        .find(|file| file.id == file_ref.file_id)
        .ok_or(Error::FileNotInProject {
            project_id: file_ref.project_id,
            file_id: file_ref.file_id,
        })?;
    if !is_plain_file_name(&target.name) {
        return Err(Error::UnsafePath(target.name.clone()));
    }

    let mut stale: Vec<Utf8PathBuf> = Vec::new();
    for file in info.files.iter().filter(|file| file.id != file_ref.file_id) {
        if file.name == target.name || !is_plain_file_name(&file.name) {
            continue;
        }
        let path = directory.join(&file.name);
        if path.is_file() && !stale.contains(&path) {
            stale.push(path);
        }
    }

    Ok(Resolution {
        title: info.title.clone(),
        kind: info.kind.clone(),
        file_name: target.name.clone(),
        expected_size: target.filesize,
        directory,
        download_url,
        stale,
    })
}

/// Names coming from the provider must stay inside the destination folder.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains(':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::io::{Cursor, Read};

    struct StaticTransport(HashMap<String, Vec<u8>>);

    impl Transport for StaticTransport {
        fn get(&self, request: &Request) -> Result<Box<dyn Read + Send>> {
            match self.0.get(&request.url) {
                Some(body) => Ok(Box::new(Cursor::new(body.clone()))),
                None => Err(Error::HttpStatus {
                    url: request.url.clone(),
                    status: 404,
                }),
            }
        }
    }

    fn resolver(responses: &[(u64, &str)]) -> ProjectResolver {
        let endpoints = Endpoints::default();
        let map = responses
            .iter()
            .map(|(id, body)| (endpoints.info_url(*id), body.as_bytes().to_vec()))
            .collect();
        ProjectResolver::new(Arc::new(StaticTransport(map)), endpoints, "test")
    }

    fn file_ref(project_id: u64, file_id: u64) -> FileRef {
        FileRef {
            project_id,
            file_id,
            required: true,
        }
    }

    #[test]
    fn test_kind_directories() {
        for (raw, dir) in [
            ("Mods", "mods"),
            ("Resource Packs", "resourcepacks"),
            ("Shaders", "shaderpacks"),
            ("Worlds", "mods"),
        ] {
            assert_eq!(ProjectKind::from(raw.to_string()).directory(), dir);
        }
    }

    #[test]
    fn test_resolve_selects_requested_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let resolver = resolver(&[(
            1,
            r#"{"title":"X","type":"Mods","files":[
                {"id":9,"name":"x-old.jar","filesize":90},
                {"id":10,"name":"x.jar","filesize":100}]}"#,
        )]);

        let ResolveOutcome::Resolved(resolution) =
            resolver.resolve(&file_ref(1, 10), root).unwrap()
        else {
            panic!("expected resolution");
        };

        assert_eq!(resolution.title, "X");
        assert_eq!(resolution.file_name, "x.jar");
        assert_eq!(resolution.expected_size, 100);
        assert_eq!(resolution.destination(), root.join("mods/x.jar"));
        assert_eq!(
            resolution.download_url,
            "https://www.curseforge.com/api/v1/mods/1/files/10/download"
        );
        assert!(resolution.stale.is_empty());
    }

    #[test]
    fn test_first_duplicate_wins() {
        let info: ProjectInfo = serde_json::from_str(
            r#"{"title":"X","type":"Mods","files":[
                {"id":10,"name":"first.jar","filesize":1},
                {"id":10,"name":"second.jar","filesize":2}]}"#,
        )
        .unwrap();

        let resolution = select_file(
            info,
            &file_ref(1, 10),
            Utf8PathBuf::from("/nonexistent/mods"),
            String::new(),
        )
        .unwrap();
        assert_eq!(resolution.file_name, "first.jar");
    }

    #[test]
    fn test_stale_versions_present_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(root.join("resourcepacks")).unwrap();
        fs::write(root.join("resourcepacks/pack-1.zip"), b"old").unwrap();
        fs::write(root.join("resourcepacks/pack-2.zip"), b"current").unwrap();
        let resolver = resolver(&[(
            5,
            r#"{"title":"Pack","type":"Resource Packs","files":[
                {"id":1,"name":"pack-1.zip","filesize":3},
                {"id":2,"name":"pack-2.zip","filesize":7},
                {"id":3,"name":"pack-3.zip","filesize":9}]}"#,
        )]);

        let ResolveOutcome::Resolved(resolution) =
            resolver.resolve(&file_ref(5, 2), root).unwrap()
        else {
            panic!("expected resolution");
        };

        assert_eq!(resolution.stale, vec![root.join("resourcepacks/pack-1.zip")]);
    }

    #[test]
    fn test_same_name_other_id_is_not_stale() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(root.join("mods")).unwrap();
        fs::write(root.join("mods/x.jar"), b"x").unwrap();
        let resolver = resolver(&[(
            1,
            r#"{"title":"X","type":"Mods","files":[
                {"id":10,"name":"x.jar","filesize":1},
                {"id":11,"name":"x.jar","filesize":1}]}"#,
        )]);

        let ResolveOutcome::Resolved(resolution) =
            resolver.resolve(&file_ref(1, 10), root).unwrap()
        else {
            panic!("expected resolution");
        };
        assert!(resolution.stale.is_empty());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let resolver = resolver(&[(
            1,
            r#"{"title":"X","type":"Mods","files":[{"id":9,"name":"x.jar","filesize":1}]}"#,
        )]);

        let result = resolver.resolve(&file_ref(1, 10), Utf8Path::new("/tmp"));
        assert!(matches!(
            result,
            Err(Error::FileNotInProject {
                project_id: 1,
                file_id: 10
            })
        ));
    }

    #[test]
    fn test_file_name_leaving_category_folder_is_rejected() {
        for name in ["../../escaped.jar", "/tmp/escaped.jar", "..", "mods\\..\\x.jar", "C:x.jar"] {
            let info = format!(
                r#"{{"title":"X","type":"Mods","files":[{{"id":10,"name":{},"filesize":3}}]}}"#,
                serde_json::to_string(name).unwrap()
            );
            let resolver = resolver(&[(1, info.as_str())]);

            match resolver.resolve(&file_ref(1, 10), Utf8Path::new("/tmp/instance")) {
                Err(Error::UnsafePath(rejected)) => assert_eq!(rejected, name),
                other => panic!("expected {name} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unreachable_or_incomplete_project_is_skipped() {
        let resolver = resolver(&[(2, r#"{"title":"X","files":[]}"#), (3, "not json")]);

        for project_id in [1, 2, 3] {
            let outcome = resolver
                .resolve(&file_ref(project_id, 10), Utf8Path::new("/tmp"))
                .unwrap();
            assert!(matches!(outcome, ResolveOutcome::Skipped { .. }));
        }
    }
}
