//! Filesystem layer extraction.
//!
//! A layer is a tar archive, optionally gzip-compressed. Layers are
//! applied in manifest order on top of one another.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use minibox_common::error::{MiniboxError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A layer that has been unpacked.
#[derive(Debug, Clone, Copy)]
pub struct Layer {
    /// Size of the archive in bytes.
    pub size_bytes: u64,
    /// Whether the archive was gzip-compressed.
    pub compressed: bool,
}

/// Extracts a tar archive into `target`.
///
/// Compression is detected from the content, not the file name, since
/// blobs are stored under their bare digest.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or unpacked.
pub fn extract_layer(archive_path: &Path, target: &Path) -> Result<Layer> {
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting layer"
    );
    std::fs::create_dir_all(target).map_err(|e| MiniboxError::io(target, e))?;

    let mut file = File::open(archive_path).map_err(|e| MiniboxError::io(archive_path, e))?;
    let size_bytes = file
        .metadata()
        .map_err(|e| MiniboxError::io(archive_path, e))?
        .len();
    let compressed = is_gzip(&mut file).map_err(|e| MiniboxError::io(archive_path, e))?;

    let unpacked = if compressed {
        unpack(tar::Archive::new(flate2::read::GzDecoder::new(file)), target)
    } else {
        unpack(tar::Archive::new(file), target)
    };
    unpacked.map_err(|e| MiniboxError::io(target, e))?;

    tracing::debug!(size = size_bytes, compressed, "layer extracted");
    Ok(Layer {
        size_bytes,
        compressed,
    })
}

fn unpack<R: Read>(mut archive: tar::Archive<R>, target: &Path) -> std::io::Result<()> {
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.unpack(target)
}

/// Sniffs the gzip magic number and rewinds.
fn is_gzip(file: &mut File) -> std::io::Result<bool> {
    let mut magic = [0_u8; 2];
    let read = file.read(&mut magic)?;
    let _ = file.seek(SeekFrom::Start(0))?;
    Ok(read == GZIP_MAGIC.len() && magic == GZIP_MAGIC)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn append(builder: &mut tar::Builder<impl std::io::Write>, name: &str, data: &[u8]) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data).unwrap();
    }

    fn plain_tar(dir: &Path) -> PathBuf {
        let path = dir.join("plain");
        let mut builder = tar::Builder::new(File::create(&path).unwrap());
        append(&mut builder, "hello.txt", b"hello from layer");
        builder.finish().unwrap();
        path
    }

    fn gzip_tar(dir: &Path) -> PathBuf {
        let path = dir.join("gzipped");
        let encoder =
            flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        append(&mut builder, "etc/motd", b"hello from gzipped layer");
        let _ = builder.into_inner().unwrap().finish().unwrap();
        path
    }

    #[test]
    fn extract_plain_tar() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("rootfs");
        let layer = extract_layer(&plain_tar(dir.path()), &target).unwrap();
        assert!(!layer.compressed);
        assert!(layer.size_bytes > 0);
        assert_eq!(
            std::fs::read_to_string(target.join("hello.txt")).unwrap(),
            "hello from layer"
        );
    }

    #[test]
    fn extract_gzip_tar_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("rootfs");
        let layer = extract_layer(&gzip_tar(dir.path()), &target).unwrap();
        assert!(layer.compressed);
        assert_eq!(
            std::fs::read_to_string(target.join("etc/motd")).unwrap(),
            "hello from gzipped layer"
        );
    }

    #[test]
    fn missing_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_layer(&dir.path().join("missing"), &dir.path().join("out"));
        assert!(result.unwrap_err().is_not_found());
    }
}
