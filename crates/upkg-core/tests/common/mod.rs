//! Shared fixtures for orchestration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use upkg_core::{Error, PackageReference, RegistryClient, Result};

/// An artifact as stored by [`MemoryRegistry`].
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub artifact_type: String,
    pub files: Vec<(String, Vec<u8>)>,
}

/// In-memory registry keyed by the canonical `host/repo:tag` form.
#[derive(Default)]
pub struct MemoryRegistry {
    artifacts: Mutex<HashMap<String, StoredArtifact>>,
    pulls: AtomicUsize,
    pushes: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a single-file artifact under `reference`.
    pub fn seed(&self, reference: &str, file_name: &str, bytes: &[u8]) {
        let key = PackageReference::parse(reference).unwrap().to_string();
        self.artifacts.lock().unwrap().insert(
            key,
            StoredArtifact {
                artifact_type: "application/vnd.upkg.npm.package.v1".to_string(),
                files: vec![(file_name.to_string(), bytes.to_vec())],
            },
        );
    }

    pub fn get(&self, reference: &str) -> Option<StoredArtifact> {
        let key = PackageReference::parse(reference).unwrap().to_string();
        self.artifacts.lock().unwrap().get(&key).cloned()
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    async fn pull(&self, reference: &PackageReference, dest: &Path) -> Result<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let stored = self
            .artifacts
            .lock()
            .unwrap()
            .get(&reference.to_string())
            .cloned()
            .ok_or_else(|| Error::transfer(reference.as_str(), "manifest unknown"))?;

        for (name, bytes) in stored.files {
            let path = dest.join(name);
            std::fs::write(&path, bytes).map_err(|e| Error::io(e, path, "writing layer"))?;
        }
        Ok(())
    }

    async fn push(
        &self,
        reference: &PackageReference,
        artifact: &Path,
        artifact_type: &str,
    ) -> Result<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        let bytes = std::fs::read(artifact).map_err(|e| Error::io(e, artifact, "reading artifact"))?;
        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.artifacts.lock().unwrap().insert(
            reference.to_string(),
            StoredArtifact {
                artifact_type: artifact_type.to_string(),
                files: vec![(name, bytes)],
            },
        );
        Ok(())
    }
}

/// Writes part of an artifact and then never finishes.
pub struct StallingRegistry;

#[async_trait]
impl RegistryClient for StallingRegistry {
    async fn pull(&self, reference: &PackageReference, dest: &Path) -> Result<()> {
        let partial = dest.join(format!("{}-{}.tgz", reference.name(), reference.version()));
        std::fs::write(partial, b"\x1f\x8b partial").unwrap();
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn push(&self, _: &PackageReference, _: &Path, _: &str) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Create a project directory containing `package.json` with `contents`.
pub fn project_with_manifest(contents: &str) -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("package.json"), contents).unwrap();
    dir
}
