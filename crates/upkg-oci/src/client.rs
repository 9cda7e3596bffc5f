//! OCI registry client for pulling and pushing package artifacts.
//!
//! Uses `oci-distribution` for registry operations. An artifact is an OCI
//! image manifest with an empty config and one layer per file; each layer
//! carries its file name in the `org.opencontainers.image.title`
//! annotation.

use async_trait::async_trait;
use oci_distribution::client::{ClientConfig, ClientProtocol, Config, ImageLayer};
use oci_distribution::manifest::{OciDescriptor, OciImageManifest};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Client, Reference};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument, trace};

use upkg_core::{PackageReference, RegistryClient};

use crate::auth;
use crate::{Error, Result};

/// Annotation holding a layer's file name.
pub const ANNOTATION_TITLE: &str = "org.opencontainers.image.title";
/// Media type of the empty config blob.
pub const EMPTY_CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.empty.v1+json";
/// Media type of a file layer.
pub const FILE_LAYER_MEDIA_TYPE: &str = "application/vnd.upkg.file.v1";

const EMPTY_CONFIG: &[u8] = b"{}";
const LOOPBACK_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// [`RegistryClient`] backed by an OCI distribution registry.
#[derive(Debug, Clone, Default)]
pub struct OciRegistryClient {
    insecure_registries: Vec<String>,
}

impl OciRegistryClient {
    /// Create a client that uses HTTPS for every non-loopback registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also use plain HTTP for these registries (`host` or `host:port`).
    #[must_use]
    pub fn with_insecure_registries<I, S>(mut self, registries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insecure_registries
            .extend(registries.into_iter().map(Into::into).filter(|r| !r.is_empty()));
        self
    }

    /// Whether `registry` is reached over plain HTTP.
    #[must_use]
    pub fn is_insecure(&self, registry: &str) -> bool {
        let host = registry.split(':').next().unwrap_or(registry);
        LOOPBACK_HOSTS.contains(&host) || self.insecure_registries.iter().any(|r| r == registry)
    }

    fn protocol_for(&self, registry: &str) -> ClientProtocol {
        if self.is_insecure(registry) {
            ClientProtocol::HttpsExcept(vec![registry.to_string()])
        } else {
            ClientProtocol::Https
        }
    }

    /// A transport client for one registry. Tokens obtained while pulling
    /// the manifest are reused for the blobs, so one client serves a whole
    /// transfer.
    fn client_for(&self, registry: &str) -> Client {
        Client::new(ClientConfig {
            protocol: self.protocol_for(registry),
            ..Default::default()
        })
    }

    /// Download every layer of the artifact at `reference` into `dest`.
    ///
    /// Returns the paths written, in manifest order.
    #[instrument(skip(self), fields(reference = %reference, dest = %dest.display()))]
    pub async fn pull_to(&self, reference: &PackageReference, dest: &Path) -> Result<Vec<PathBuf>> {
        let image = to_oci_reference(reference);
        let auth = RegistryAuth::from(&auth::resolve(reference.registry())?);
        let client = self.client_for(reference.registry());

        let (manifest, digest) = client
            .pull_image_manifest(&image, &auth)
            .await
            .map_err(|e| Error::Oci(e.to_string()))?;
        trace!(?manifest, "Got manifest");
        debug!(%digest, layer_count = manifest.layers.len(), "Resolved artifact");

        if manifest.layers.is_empty() {
            return Err(Error::EmptyArtifact(reference.to_string()));
        }

        let mut paths = Vec::with_capacity(manifest.layers.len());
        for descriptor in &manifest.layers {
            let path = dest.join(layer_file_name(descriptor)?);
            pull_blob(&client, &image, descriptor, &path).await?;
            paths.push(path);
        }

        info!(files = paths.len(), "Pulled artifact");
        Ok(paths)
    }

    /// Upload `artifact` as a single-layer artifact of `artifact_type`.
    ///
    /// Returns the URL of the pushed manifest.
    #[instrument(skip(self), fields(reference = %reference, artifact = %artifact.display()))]
    pub async fn push_file(
        &self,
        reference: &PackageReference,
        artifact: &Path,
        artifact_type: &str,
    ) -> Result<String> {
        let title = artifact
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::UnsafeTitle(artifact.display().to_string()))?;
        let data = tokio::fs::read(artifact).await?;
        debug!(title, size = data.len(), "Read artifact");

        let layers = vec![ImageLayer::new(
            data,
            FILE_LAYER_MEDIA_TYPE.to_string(),
            Some(
                [(ANNOTATION_TITLE.to_string(), title.to_string())]
                    .into_iter()
                    .collect(),
            ),
        )];
        let config = Config::new(EMPTY_CONFIG.to_vec(), EMPTY_CONFIG_MEDIA_TYPE.to_string(), None);
        let mut manifest = OciImageManifest::build(&layers, &config, None);
        manifest.artifact_type = Some(artifact_type.to_string());

        let image = to_oci_reference(reference);
        let auth = RegistryAuth::from(&auth::resolve(reference.registry())?);
        let response = self
            .client_for(reference.registry())
            .push(&image, &layers, config, &auth, Some(manifest))
            .await
            .map_err(|e| Error::Oci(e.to_string()))?;

        info!(manifest = %response.manifest_url, "Pushed artifact");
        Ok(response.manifest_url)
    }
}

#[async_trait]
impl RegistryClient for OciRegistryClient {
    async fn pull(&self, reference: &PackageReference, dest: &Path) -> upkg_core::Result<()> {
        self.pull_to(reference, dest)
            .await
            .map(drop)
            .map_err(|e| upkg_core::Error::transfer(reference.as_str(), e.to_string()))
    }

    async fn push(
        &self,
        reference: &PackageReference,
        artifact: &Path,
        artifact_type: &str,
    ) -> upkg_core::Result<()> {
        self.push_file(reference, artifact, artifact_type)
            .await
            .map(drop)
            .map_err(|e| upkg_core::Error::transfer(reference.as_str(), e.to_string()))
    }
}

/// Build a transport reference without Docker Hub normalization.
fn to_oci_reference(reference: &PackageReference) -> Reference {
    Reference::with_tag(
        reference.registry().to_string(),
        reference.repository(),
        reference.version().to_string(),
    )
}

/// File name a layer is written under.
fn layer_file_name(descriptor: &OciDescriptor) -> Result<String> {
    let title = descriptor
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(ANNOTATION_TITLE));

    match title {
        Some(title) => checked_title(title).map(str::to_string),
        None => {
            let hex = descriptor
                .digest
                .split_once(':')
                .map_or(descriptor.digest.as_str(), |(_, hex)| hex);
            checked_title(hex).map(|hex| format!("{hex}.blob"))
        }
    }
}

/// Accept `title` only if it names a file directly inside the destination.
fn checked_title(title: &str) -> Result<&str> {
    let plain = !title.is_empty()
        && title != "."
        && title != ".."
        && !title.contains(['/', '\\', '\0'])
        && !title.contains(':');
    if plain {
        Ok(title)
    } else {
        Err(Error::UnsafeTitle(title.to_string()))
    }
}

/// Pull a blob to `dest` and verify its digest.
///
/// A blob whose SHA256 digest does not match the descriptor is deleted.
async fn pull_blob(
    client: &Client,
    image: &Reference,
    descriptor: &OciDescriptor,
    dest: &Path,
) -> Result<()> {
    debug!(digest = %descriptor.digest, ?dest, "Pulling blob");

    let mut file = tokio::fs::File::create(dest).await?;
    client
        .pull_blob(image, descriptor, &mut file)
        .await
        .map_err(|e| Error::blob_pull_failed(&descriptor.digest, e.to_string()))?;
    file.flush().await?;

    let computed = compute_file_digest(dest).await?;
    if computed != descriptor.digest {
        tokio::fs::remove_file(dest).await.ok();
        return Err(Error::digest_mismatch(&descriptor.digest, &computed));
    }

    debug!(digest = %descriptor.digest, ?dest, "Pulled and verified blob");
    Ok(())
}

/// Compute the SHA256 digest of a file in OCI form (`sha256:<hex>`).
async fn compute_file_digest(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn reference(raw: &str) -> PackageReference {
        PackageReference::parse(raw).unwrap()
    }

    fn descriptor(digest: &str, title: Option<&str>) -> OciDescriptor {
        OciDescriptor {
            media_type: FILE_LAYER_MEDIA_TYPE.to_string(),
            digest: digest.to_string(),
            size: 0,
            annotations: title.map(|t| {
                [(ANNOTATION_TITLE.to_string(), t.to_string())]
                    .into_iter()
                    .collect()
            }),
            ..Default::default()
        }
    }

    // ==========================================================================
    // Reference mapping
    // ==========================================================================

    #[test]
    fn test_oci_reference_keeps_registry() {
        let image = to_oci_reference(&reference("localhost:5000/mypackage:1.0.0"));
        assert_eq!(image.registry(), "localhost:5000");
        assert_eq!(image.repository(), "mypackage");
        assert_eq!(image.tag(), Some("1.0.0"));
    }

    #[test]
    fn test_oci_reference_org_and_default_tag() {
        let image = to_oci_reference(&reference("ghcr.io/myorg/mypackage"));
        assert_eq!(image.registry(), "ghcr.io");
        assert_eq!(image.repository(), "myorg/mypackage");
        assert_eq!(image.tag(), Some("latest"));
    }

    // ==========================================================================
    // Transport protocol
    // ==========================================================================

    #[test]
    fn test_loopback_is_insecure_by_default() {
        let client = OciRegistryClient::new();
        assert!(client.is_insecure("localhost:5000"));
        assert!(client.is_insecure("127.0.0.1:5001"));
        assert!(client.is_insecure("localhost"));
        assert!(!client.is_insecure("ghcr.io"));
        assert!(!client.is_insecure("localhost.example.com"));
    }

    #[test]
    fn test_configured_insecure_registries() {
        let client = OciRegistryClient::new().with_insecure_registries(["registry.lan:5000", ""]);
        assert!(client.is_insecure("registry.lan:5000"));
        assert!(!client.is_insecure("registry.lan"));
        assert!(matches!(
            client.protocol_for("registry.lan:5000"),
            ClientProtocol::HttpsExcept(hosts) if hosts == vec!["registry.lan:5000".to_string()]
        ));
        assert!(matches!(client.protocol_for("ghcr.io"), ClientProtocol::Https));
    }

    // ==========================================================================
    // Layer titles
    // ==========================================================================

    #[test]
    fn test_layer_file_name_from_title() {
        let layer = descriptor("sha256:abc", Some("lodash-4.17.21.tgz"));
        assert_eq!(layer_file_name(&layer).unwrap(), "lodash-4.17.21.tgz");
    }

    #[test]
    fn test_layer_without_title_uses_digest() {
        let layer = descriptor("sha256:0123abcd", None);
        assert_eq!(layer_file_name(&layer).unwrap(), "0123abcd.blob");

        let mut other = descriptor("sha256:0123abcd", None);
        other.annotations = Some(HashMap::from([("a".to_string(), "b".to_string())]).into_iter().collect());
        assert_eq!(layer_file_name(&other).unwrap(), "0123abcd.blob");
    }

    #[test]
    fn test_unsafe_titles_are_rejected() {
        for title in ["", ".", "..", "../evil.tgz", "dir/file.tgz", "C:\\evil.tgz", "/etc/passwd"] {
            let layer = descriptor("sha256:abc", Some(title));
            assert!(
                matches!(layer_file_name(&layer), Err(Error::UnsafeTitle(_))),
                "title {title:?} should be rejected"
            );
        }
    }

    // ==========================================================================
    // Digests
    // ==========================================================================

    #[tokio::test]
    async fn test_compute_file_digest() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("test.txt");

        std::fs::write(&file_path, b"").unwrap();
        assert_eq!(
            compute_file_digest(&file_path).await.unwrap(),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        std::fs::write(&file_path, b"hello").unwrap();
        assert_eq!(
            compute_file_digest(&file_path).await.unwrap(),
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_compute_file_digest_spans_buffers() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("large.bin");
        let content: Vec<u8> = (0..20000).map(|i| (i % 256) as u8).collect();
        std::fs::write(&file_path, &content).unwrap();

        let expected = format!("sha256:{}", hex::encode(Sha256::digest(&content)));
        assert_eq!(compute_file_digest(&file_path).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_compute_file_digest_nonexistent() {
        let result = compute_file_digest(Path::new("/nonexistent/path")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    // ==========================================================================
    // Boundary
    // ==========================================================================

    #[tokio::test]
    async fn test_push_of_missing_file_is_transfer_error() {
        let temp = TempDir::new().unwrap();
        let client = OciRegistryClient::new();

        let err = RegistryClient::push(
            &client,
            &reference("localhost:5000/acme/lodash:1.0.0"),
            &temp.path().join("lodash-1.0.0.tgz"),
            "application/vnd.upkg.npm.package.v1",
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            upkg_core::Error::Transfer { ref reference, .. } if reference == "localhost:5000/acme/lodash:1.0.0"
        ));
    }
}
