// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Loading of CRD, template and image manifest files.
//!
//! Directory loads are all-or-nothing: every file is parsed before anything is
//! returned, and every parse failure is collected into a single render error.
//! A broken file therefore never results in a partially applied directory.

use crate::errors::{HubError, HubResult};
use async_trait::async_trait;
use kube::api::DynamicObject;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One file read from a manifest directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestFile {
    /// File name without the directory
    pub name: String,
    /// Raw file content
    pub content: String,
}

/// Read access to manifest files.
#[async_trait]
pub trait ManifestReader: Send + Sync {
    /// Regular files of `dir`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be read.
    async fn list_files(&self, dir: &Path) -> std::io::Result<Vec<ManifestFile>>;

    /// Content of a single file, `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for anything but a missing file.
    async fn read_file(&self, path: &Path) -> std::io::Result<Option<String>>;
}

/// [`ManifestReader`] over the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsManifestReader;

#[async_trait]
impl ManifestReader for FsManifestReader {
    async fn list_files(&self, dir: &Path) -> std::io::Result<Vec<ManifestFile>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let content = tokio::fs::read_to_string(entry.path()).await?;
            files.push(ManifestFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                content,
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn read_file(&self, path: &Path) -> std::io::Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn is_yaml(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml"))
}

fn parse_documents(file: &ManifestFile) -> Result<Vec<Value>, String> {
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&file.content) {
        let value = Value::deserialize(document).map_err(|e| format!("{}: {e}", file.name))?;
        if !value.is_null() {
            docs.push(value);
        }
    }
    Ok(docs)
}

fn to_object(file: &str, value: Value) -> Result<DynamicObject, String> {
    let obj: DynamicObject =
        serde_json::from_value(value).map_err(|e| format!("{file}: {e}"))?;
    if obj.types.is_none() {
        return Err(format!("{file}: missing apiVersion/kind"));
    }
    if obj.metadata.name.as_deref().unwrap_or_default().is_empty() {
        return Err(format!("{file}: missing metadata.name"));
    }
    Ok(obj)
}

fn validate_crd(file: &str, value: &Value) -> Result<(), String> {
    let kind = value.get("kind").and_then(Value::as_str).unwrap_or_default();
    if kind != "CustomResourceDefinition" {
        return Err(format!("{file}: expected CustomResourceDefinition, found {kind:?}"));
    }
    let spec = value.get("spec");
    let names_kind = spec
        .and_then(|s| s.pointer("/names/kind"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if names_kind.is_empty() {
        return Err(format!("{file}: spec.names.kind is required"));
    }
    let group = spec
        .and_then(|s| s.get("group"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if group.is_empty() {
        return Err(format!("{file}: spec.group is required"));
    }
    Ok(())
}

async fn read_dir(reader: &dyn ManifestReader, dir: &Path) -> Result<Vec<ManifestFile>, String> {
    reader
        .list_files(dir)
        .await
        .map_err(|e| format!("{}: {e}", dir.display()))
}

/// Load every CRD in `dir`.
///
/// Only `.yaml` files are considered. Each document must be a
/// `CustomResourceDefinition` declaring `spec.names.kind` and `spec.group`.
///
/// # Errors
///
/// Returns a single [`HubError::Render`] with reason `CRDRenderFailure`
/// listing every failing file.
pub async fn load_crds(reader: &dyn ManifestReader, dir: &Path) -> HubResult<Vec<DynamicObject>> {
    let dir_name = dir.display().to_string();
    let files = read_dir(reader, dir)
        .await
        .map_err(|e| HubError::crd_render(&dir_name, vec![e]))?;

    let mut objects = Vec::new();
    let mut errors = Vec::new();
    for file in files.iter().filter(|f| is_yaml(&f.name)) {
        match parse_documents(file) {
            Ok(docs) => {
                for doc in docs {
                    let checked = validate_crd(&file.name, &doc)
                        .and_then(|()| to_object(&file.name, doc));
                    match checked {
                        Ok(obj) => objects.push(obj),
                        Err(e) => errors.push(e),
                    }
                }
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(HubError::crd_render(&dir_name, errors));
    }
    debug!("Loaded {} CRD(s) from {}", objects.len(), dir_name);
    Ok(objects)
}

/// Load every base template in `dir`.
///
/// Only `.yaml` files are considered; every document must name its
/// `apiVersion`, `kind` and `metadata.name`.
///
/// # Errors
///
/// Returns a single [`HubError::Render`] with reason `ResourceRenderFailure`
/// listing every failing file.
pub async fn load_templates(
    reader: &dyn ManifestReader,
    dir: &Path,
) -> HubResult<Vec<DynamicObject>> {
    let dir_name = dir.display().to_string();
    let files = read_dir(reader, dir)
        .await
        .map_err(|e| HubError::template_render(&dir_name, vec![e]))?;

    let mut objects = Vec::new();
    let mut errors = Vec::new();
    for file in files.iter().filter(|f| is_yaml(&f.name)) {
        match parse_documents(file) {
            Ok(docs) => {
                for doc in docs {
                    match to_object(&file.name, doc) {
                        Ok(obj) => objects.push(obj),
                        Err(e) => errors.push(e),
                    }
                }
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(HubError::template_render(&dir_name, errors));
    }
    debug!("Loaded {} template(s) from {}", objects.len(), dir_name);
    Ok(objects)
}

/// One entry of an image manifest file.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ImageManifestEntry {
    #[serde(rename = "image-key")]
    pub image_key: String,
    #[serde(rename = "image-remote")]
    pub image_remote: String,
    #[serde(rename = "image-name")]
    pub image_name: String,
    #[serde(rename = "image-digest", default)]
    pub image_digest: Option<String>,
    #[serde(rename = "image-tag", default)]
    pub image_tag: Option<String>,
}

impl ImageManifestEntry {
    /// Full image reference, by digest when one is known.
    #[must_use]
    pub fn reference(&self) -> String {
        let remote = &self.image_remote;
        match (&self.image_digest, &self.image_tag) {
            (Some(digest), _) if !digest.is_empty() => {
                format!("{remote}/{}@{digest}", self.image_name)
            }
            (_, Some(tag)) if !tag.is_empty() => format!("{remote}/{}:{tag}", self.image_name),
            _ => format!("{remote}/{}", self.image_name),
        }
    }
}

/// Path of the image manifest for `version`.
#[must_use]
pub fn image_manifest_path(dir: &Path, version: &str) -> PathBuf {
    dir.join(format!("{version}.json"))
}

/// Load `<dir>/<version>.json` as image key → reference.
///
/// A missing file yields an empty map.
///
/// # Errors
///
/// Returns a configuration error if the file cannot be read or parsed.
pub async fn load_image_manifest(
    reader: &dyn ManifestReader,
    dir: &Path,
    version: &str,
) -> HubResult<BTreeMap<String, String>> {
    let path = image_manifest_path(dir, version);
    let content = reader
        .read_file(&path)
        .await
        .map_err(|e| HubError::config(format!("failed to read {}: {e}", path.display())))?;
    let Some(content) = content else {
        debug!("No image manifest at {}", path.display());
        return Ok(BTreeMap::new());
    };
    let entries: Vec<ImageManifestEntry> = serde_json::from_str(&content)
        .map_err(|e| HubError::config(format!("invalid image manifest {}: {e}", path.display())))?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            let reference = entry.reference();
            (entry.image_key, reference)
        })
        .collect())
}

#[cfg(test)]
#[path = "manifests_tests.rs"]
mod manifests_tests;
