#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cfpack_sync::{Endpoints, Error, Request, Result, RetryPolicy, SyncOptions, Transport};
use sha1::{Digest, Sha1};
use sha2::Sha512;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::sync::Mutex;
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory transport. Each URL serves a script of responses in order, the
/// last one repeating. `None` is a failed request.
#[derive(Default)]
pub struct FakeTransport {
    routes: HashMap<String, Vec<Option<Vec<u8>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.script(url, vec![Some(body.into())])
    }

    pub fn script(mut self, url: impl Into<String>, responses: Vec<Option<Vec<u8>>>) -> Self {
        self.routes.insert(url.into(), responses);
        self
    }

    pub fn project(self, project_id: u64, info: &str) -> Self {
        let url = Endpoints::default().info_url(project_id);
        self.route(url, info.as_bytes())
    }

    pub fn file(self, project_id: u64, file_id: u64, body: Vec<u8>) -> Self {
        let url = Endpoints::default().download_url(project_id, file_id);
        self.route(url, body)
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn download_calls(&self, project_id: u64, file_id: u64) -> usize {
        self.calls(&Endpoints::default().download_url(project_id, file_id))
    }
}

impl Transport for FakeTransport {
    fn get(&self, request: &Request) -> Result<Box<dyn Read + Send>> {
        let mut calls = self.calls.lock().unwrap();
        let count = calls.entry(request.url.clone()).or_insert(0);
        let index = *count;
        *count += 1;

        let not_found = || Error::HttpStatus {
            url: request.url.clone(),
            status: 404,
        };
        let script = self.routes.get(&request.url).ok_or_else(not_found)?;
        match &script[index.min(script.len() - 1)] {
            Some(body) => Ok(Box::new(Cursor::new(body.clone()))),
            None => Err(not_found()),
        }
    }
}

pub fn write_pack(path: &Utf8Path, manifest: &str, entries: &[(&str, &[u8])]) {
    write_archive(path, "manifest.json", manifest, entries);
}

pub fn write_mrpack(path: &Utf8Path, index: &str, entries: &[(&str, &[u8])]) {
    write_archive(path, "modrinth.index.json", index, entries);
}

fn write_archive(path: &Utf8Path, manifest_name: &str, manifest: &str, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    writer
        .start_file(manifest_name, SimpleFileOptions::default())
        .unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

pub fn fast_options() -> SyncOptions {
    SyncOptions {
        retry: RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1),
        },
        ..Default::default()
    }
}

pub struct Workspace {
    _dir: tempfile::TempDir,
    pub pack: Utf8PathBuf,
    pub dest: Utf8PathBuf,
}

pub fn workspace() -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap().to_path_buf();
    Workspace {
        pack: root.join("pack.zip"),
        dest: root.join("instance"),
        _dir: dir,
    }
}

pub const SINGLE_MOD_MANIFEST: &str =
    r#"{"name":"Pack","version":"1.0","files":[{"projectID":1,"fileID":10}]}"#;

pub const SINGLE_MOD_INFO: &str =
    r#"{"title":"X","type":"Mods","files":[{"id":10,"name":"x.jar","filesize":100}]}"#;

/// One `files` entry of a Modrinth index whose hashes match `content`.
pub fn mrpack_file(path: &str, urls: &[&str], content: &[u8], env: Option<(&str, &str)>) -> String {
    let env = env
        .map(|(client, server)| format!(r#""env":{{"client":"{client}","server":"{server}"}},"#))
        .unwrap_or_default();
    format!(
        r#"{{"path":"{path}","hashes":{{"sha1":"{}","sha512":"{}"}},{env}"downloads":{},"fileSize":{}}}"#,
        hex::encode(Sha1::digest(content)),
        hex::encode(Sha512::digest(content)),
        serde_json::to_string(urls).unwrap(),
        content.len()
    )
}

pub fn mrpack_index(files: &[String], dependencies: &str) -> String {
    format!(
        r#"{{"formatVersion":1,"game":"minecraft","versionId":"3.0","name":"Rinth",
            "files":[{}],"dependencies":{dependencies}}}"#,
        files.join(",")
    )
}
