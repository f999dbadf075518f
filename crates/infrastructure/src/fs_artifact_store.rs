//! Filesystem artifact storage with gzip tarball extraction.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use helmspan_application::{ArtifactStore, ExtractedArtifact};
use helmspan_core::{AppError, AppResult, DeploymentId};
use helmspan_domain::{AppManifest, ArtifactTree, MANIFEST_FILE_NAME};
use tar::Archive;

/// Artifact store keeping archives and unpacked trees on the local
/// filesystem, shared with the build service through a common volume.
pub struct FsArtifactStore {
    archive_root: PathBuf,
    extract_root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at the given directories.
    #[must_use]
    pub fn new(archive_root: PathBuf, extract_root: PathBuf) -> Self {
        Self {
            archive_root,
            extract_root,
        }
    }

    fn archive_path(&self, deployment_id: DeploymentId) -> PathBuf {
        self.archive_root.join(format!("{deployment_id}.tar.gz"))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn store(&self, deployment_id: DeploymentId, archive: &[u8]) -> AppResult<String> {
        tokio::fs::create_dir_all(&self.archive_root)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to create archive directory: {error}"))
            })?;

        let path = self.archive_path(deployment_id);
        tokio::fs::write(&path, archive).await.map_err(|error| {
            AppError::Internal(format!("failed to write artifact archive: {error}"))
        })?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn extract(&self, location: &str) -> AppResult<ExtractedArtifact> {
        let archive_path = PathBuf::from(location);
        let extract_root = self.extract_root.clone();

        tokio::task::spawn_blocking(move || unpack_and_parse(&archive_path, &extract_root))
            .await
            .map_err(|error| {
                AppError::Internal(format!("artifact extraction task failed: {error}"))
            })?
    }
}

fn unpack_and_parse(archive_path: &Path, extract_root: &Path) -> AppResult<ExtractedArtifact> {
    std::fs::create_dir_all(extract_root).map_err(|error| {
        AppError::Internal(format!("failed to create extraction directory: {error}"))
    })?;

    let source_dir = tempfile::Builder::new()
        .prefix("artifact-")
        .tempdir_in(extract_root)
        .map_err(|error| {
            AppError::Internal(format!("failed to allocate extraction directory: {error}"))
        })?
        .keep();

    let file = File::open(archive_path).map_err(|error| {
        AppError::Internal(format!("failed to open artifact archive: {error}"))
    })?;

    // `unpack` refuses entries that would escape the destination.
    Archive::new(GzDecoder::new(file))
        .unpack(&source_dir)
        .map_err(|error| {
            AppError::Validation(format!("artifact archive is not a valid tarball: {error}"))
        })?;

    let manifest_path = source_dir.join(MANIFEST_FILE_NAME);
    let manifest_raw = std::fs::read_to_string(&manifest_path).map_err(|_| {
        AppError::Validation(format!("artifact is missing {MANIFEST_FILE_NAME}"))
    })?;
    let manifest: AppManifest = serde_json::from_str(&manifest_raw).map_err(|error| {
        AppError::Validation(format!("{MANIFEST_FILE_NAME} is not valid: {error}"))
    })?;

    let mut directories = BTreeSet::new();
    let entries = std::fs::read_dir(&source_dir).map_err(|error| {
        AppError::Internal(format!("failed to list unpacked artifact: {error}"))
    })?;
    for entry in entries {
        let entry = entry.map_err(|error| {
            AppError::Internal(format!("failed to list unpacked artifact: {error}"))
        })?;
        let is_dir = entry
            .file_type()
            .map_err(|error| {
                AppError::Internal(format!("failed to inspect unpacked artifact: {error}"))
            })?
            .is_dir();
        if is_dir {
            directories.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }

    Ok(ExtractedArtifact {
        tree: ArtifactTree::new(manifest, directories),
        source_dir,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use helmspan_application::ArtifactStore;
    use helmspan_core::{AppError, DeploymentId};
    use serde_json::json;

    use super::FsArtifactStore;

    fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, *data)
                .unwrap_or_else(|_| unreachable!());
        }
        builder
            .into_inner()
            .unwrap_or_else(|_| unreachable!())
            .finish()
            .unwrap_or_else(|_| unreachable!())
    }

    fn store() -> FsArtifactStore {
        let root = tempfile::tempdir()
            .unwrap_or_else(|_| unreachable!())
            .keep();
        FsArtifactStore::new(root.join("archives"), root.join("unpacked"))
    }

    #[tokio::test]
    async fn stores_and_extracts_a_valid_artifact() {
        let store = store();
        let manifest = json!({
            "schema": "helmspan-app",
            "providers": [{
                "provider": "helmspan",
                "project_id": "p",
                "network": "test",
                "targets": ["frontend"],
            }],
        })
        .to_string();
        let archive = tarball(&[
            ("helmspan.json", manifest.as_bytes()),
            ("frontend/index.html", b"<html></html>"),
        ]);

        let deployment_id = DeploymentId::new();
        let location = store
            .store(deployment_id, &archive)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(location.ends_with(&format!("{deployment_id}.tar.gz")));

        let extracted = store
            .extract(&location)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(extracted.tree.manifest().schema(), "helmspan-app");
        assert!(extracted.tree.has_directory("frontend"));
        assert!(!extracted.tree.has_directory("backend"));
        assert!(extracted.source_dir.join("frontend/index.html").exists());
    }

    #[tokio::test]
    async fn rejects_archives_without_a_manifest() {
        let store = store();
        let archive = tarball(&[("frontend/index.html", b"<html></html>")]);

        let deployment_id = DeploymentId::new();
        let location = store
            .store(deployment_id, &archive)
            .await
            .unwrap_or_else(|_| unreachable!());

        let result = store.extract(&location).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn rejects_bytes_that_are_not_a_tarball() {
        let store = store();
        let deployment_id = DeploymentId::new();
        let location = store
            .store(deployment_id, b"definitely not a tarball")
            .await
            .unwrap_or_else(|_| unreachable!());

        let result = store.extract(&location).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn tarball_helper_produces_gzip_output() {
        let mut sink = Vec::new();
        sink.write_all(&tarball(&[("a/b.txt", b"x")]))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(&sink[..2], &[0x1f, 0x8b]);
    }
}
