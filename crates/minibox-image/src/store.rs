//! Local image store.
//!
//! Layout below the storage roots:
//!
//! ```text
//! images/<repo>_<tag>/rootfs          unpacked image, used as-is
//! images/<repo>_<tag>/manifest.json   layer list, unpacked on first use
//! blobs/sha256/<hex>                  layer archives
//! containers/<id>/rootfs              private per-container copy
//! ```

use std::path::{Path, PathBuf};

use minibox_common::config::StorageLayout;
use minibox_common::constants::ROOTFS_DIR;
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::ContainerId;
use serde::Deserialize;

use crate::ImageProvider;
use crate::hash::{Digest, validate_hash};
use crate::reference::ImageRef;

const MANIFEST_FILE: &str = "manifest.json";
const STAGING_DIR: &str = "rootfs.partial";

/// Image manifest: the ordered layer blobs of an image.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest format version, informational.
    #[serde(default)]
    pub schema_version: u32,
    /// Layers, base first.
    pub layers: Vec<Descriptor>,
}

/// Reference to one content-addressed blob.
#[derive(Debug, Clone, Deserialize)]
pub struct Descriptor {
    /// `sha256:<hex>` digest of the blob.
    pub digest: String,
    /// Expected blob size in bytes, checked when present.
    #[serde(default)]
    pub size: Option<u64>,
}

/// Images and container root filesystems on the local disk.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    layout: StorageLayout,
}

impl LocalImageStore {
    /// Creates a store over the given storage roots.
    #[must_use]
    pub const fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Directory holding one image.
    #[must_use]
    pub fn image_dir(&self, image: &ImageRef) -> PathBuf {
        self.layout.images.join(image.dir_name())
    }

    /// Path of a layer blob.
    #[must_use]
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.layout.blobs.join("sha256").join(digest.hex())
    }

    /// Returns the unpacked root filesystem of `image`, unpacking its
    /// layers first if only a manifest is present.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the image is unknown locally, and a
    /// hash mismatch if a layer blob fails verification.
    pub fn unpack(&self, image: &ImageRef) -> Result<PathBuf> {
        let dir = self.image_dir(image);
        let rootfs = dir.join(ROOTFS_DIR);
        if rootfs.is_dir() {
            return Ok(rootfs);
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        let raw = match std::fs::read_to_string(&manifest_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MiniboxError::NotFound {
                    kind: "image",
                    id: image.to_string(),
                });
            }
            Err(e) => return Err(MiniboxError::io(&manifest_path, e)),
        };
        let manifest: Manifest = serde_json::from_str(&raw)?;

        let staging = dir.join(STAGING_DIR);
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(|e| MiniboxError::io(&staging, e))?;
        }
        if let Err(e) = self.apply_layers(&manifest, &staging) {
            if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                tracing::warn!(path = %staging.display(), error = %cleanup, "cannot remove partial rootfs");
            }
            return Err(e);
        }
        std::fs::rename(&staging, &rootfs).map_err(|e| MiniboxError::io(&rootfs, e))?;
        tracing::info!(image = %image, layers = manifest.layers.len(), "image unpacked");
        Ok(rootfs)
    }

    fn apply_layers(&self, manifest: &Manifest, target: &Path) -> Result<()> {
        std::fs::create_dir_all(target).map_err(|e| MiniboxError::io(target, e))?;
        for descriptor in &manifest.layers {
            let digest = Digest::parse(&descriptor.digest)?;
            let blob = self.blob_path(&digest);
            validate_hash(&blob, &digest)?;
            let layer = crate::layer::extract_layer(&blob, target)?;
            if let Some(expected) = descriptor.size.filter(|&size| size != layer.size_bytes) {
                return Err(MiniboxError::HashMismatch {
                    resource: format!("{digest} size"),
                    expected: expected.to_string(),
                    actual: layer.size_bytes.to_string(),
                });
            }
        }
        Ok(())
    }

    fn container_rootfs(&self, id: &ContainerId) -> PathBuf {
        self.layout.container_dir(id.as_str()).join(ROOTFS_DIR)
    }
}

impl ImageProvider for LocalImageStore {
    fn check(&self, image: &str, id: &ContainerId) -> Result<PathBuf> {
        let reference = ImageRef::parse(image)?;
        let source = self.unpack(&reference)?;
        let target = self.container_rootfs(id);
        crate::copy::copy_tree(&source, &target)?;
        tracing::info!(id = %id, image = %reference, rootfs = %target.display(), "private rootfs ready");
        Ok(target)
    }

    fn rootfs(&self, id: &ContainerId) -> Result<PathBuf> {
        let path = self.container_rootfs(id);
        if path.is_dir() {
            Ok(path)
        } else {
            Err(MiniboxError::NotFound {
                kind: "rootfs",
                id: id.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;
    use crate::hash::hash_file;

    fn store(root: &Path) -> LocalImageStore {
        LocalImageStore::new(StorageLayout::under(root))
    }

    fn write_layer(store: &LocalImageStore, dir: &Path, files: &[(&str, &str)]) -> Digest {
        let tmp = dir.join("layer.tar");
        let mut builder = tar::Builder::new(File::create(&tmp).unwrap());
        for (name, body) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        let _ = builder.into_inner().unwrap();

        let digest = hash_file(&tmp).unwrap();
        let blob = store.blob_path(&digest);
        std::fs::create_dir_all(blob.parent().unwrap()).unwrap();
        std::fs::rename(&tmp, &blob).unwrap();
        digest
    }

    fn write_manifest(store: &LocalImageStore, image: &str, digests: &[String]) {
        let dir = store.image_dir(&ImageRef::parse(image).unwrap());
        std::fs::create_dir_all(&dir).unwrap();
        let layers: Vec<_> = digests
            .iter()
            .map(|d| serde_json::json!({ "digest": d }))
            .collect();
        let manifest = serde_json::json!({ "schemaVersion": 2, "layers": layers });
        std::fs::write(dir.join(MANIFEST_FILE), manifest.to_string()).unwrap();
    }

    #[test]
    fn prepared_rootfs_is_copied_per_container() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());
        let image_rootfs = root.path().join("images/busybox_latest/rootfs/bin");
        std::fs::create_dir_all(&image_rootfs).unwrap();
        std::fs::write(image_rootfs.join("echo"), "binary").unwrap();

        let a = store.check("busybox", &ContainerId::new("1")).unwrap();
        let b = store.check("busybox:latest", &ContainerId::new("2")).unwrap();

        assert_eq!(a, root.path().join("containers/1/rootfs"));
        assert_ne!(a, b);
        std::fs::write(a.join("bin/echo"), "modified").unwrap();
        assert_eq!(std::fs::read_to_string(b.join("bin/echo")).unwrap(), "binary");
        assert_eq!(store.rootfs(&ContainerId::new("1")).unwrap(), a);
    }

    #[test]
    fn manifest_layers_apply_in_order() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());
        let base = write_layer(&store, root.path(), &[("etc/os", "base"), ("etc/keep", "kept")]);
        let top = write_layer(&store, root.path(), &[("etc/os", "top")]);
        write_manifest(&store, "alpine:3", &[base.to_string(), top.to_string()]);

        let rootfs = store.unpack(&ImageRef::parse("alpine:3").unwrap()).unwrap();

        assert_eq!(std::fs::read_to_string(rootfs.join("etc/os")).unwrap(), "top");
        assert_eq!(std::fs::read_to_string(rootfs.join("etc/keep")).unwrap(), "kept");
        assert!(!rootfs.with_file_name(STAGING_DIR).exists());
    }

    #[test]
    fn tampered_blob_is_rejected_and_nothing_is_left_behind() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());
        let digest = write_layer(&store, root.path(), &[("file", "data")]);
        std::fs::write(store.blob_path(&digest), "tampered").unwrap();
        write_manifest(&store, "app", &[digest.to_string()]);

        let err = store.check("app", &ContainerId::new("3")).unwrap_err();

        assert!(matches!(err, MiniboxError::HashMismatch { .. }));
        let image_dir = store.image_dir(&ImageRef::parse("app").unwrap());
        assert!(!image_dir.join(ROOTFS_DIR).exists());
        assert!(!image_dir.join(STAGING_DIR).exists());
    }

    #[test]
    fn unknown_image_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let err = store(root.path())
            .check("nosuchimage", &ContainerId::new("4"))
            .unwrap_err();
        assert!(matches!(err, MiniboxError::NotFound { kind: "image", .. }));
    }

    #[test]
    fn rootfs_before_check_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let err = store(root.path()).rootfs(&ContainerId::new("5")).unwrap_err();
        assert!(err.is_not_found());
    }
}
