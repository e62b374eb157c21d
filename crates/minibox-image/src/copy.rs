//! Recursive tree copy for private root filesystems.

use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use minibox_common::error::{MiniboxError, Result};
use walkdir::WalkDir;

/// Copies the tree at `src` into `dst`, creating `dst` if needed.
///
/// Regular files keep their permission bits and symlinks are recreated
/// as links. Device nodes, sockets, and FIFOs are skipped. Directory
/// modes are applied once their contents are in place, so read-only
/// directories copy intact.
///
/// # Errors
///
/// Returns an error if any entry cannot be read or written.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let mut dir_modes: Vec<(PathBuf, std::fs::Permissions)> = Vec::new();

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            MiniboxError::io(path, e.into())
        })?;
        let from = entry.path();
        let relative = from.strip_prefix(src).map_err(|_| MiniboxError::Config {
            message: format!("{} escapes {}", from.display(), src.display()),
        })?;
        let to = dst.join(relative);
        let kind = entry.file_type();

        if kind.is_symlink() {
            let link = std::fs::read_link(from).map_err(|e| MiniboxError::io(from, e))?;
            symlink(&link, &to).map_err(|e| MiniboxError::io(&to, e))?;
        } else if kind.is_dir() {
            std::fs::create_dir_all(&to).map_err(|e| MiniboxError::io(&to, e))?;
            let metadata = entry.metadata().map_err(|e| MiniboxError::io(from, e.into()))?;
            dir_modes.push((to, metadata.permissions()));
        } else if kind.is_file() {
            let _ = std::fs::copy(from, &to).map_err(|e| MiniboxError::io(&to, e))?;
        } else {
            tracing::debug!(path = %from.display(), "skipping special file");
        }
    }

    // Deepest first, so a read-only parent does not block its children.
    for (dir, permissions) in dir_modes.into_iter().rev() {
        std::fs::set_permissions(&dir, permissions).map_err(|e| MiniboxError::io(&dir, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    #[test]
    fn copies_files_dirs_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("bin")).unwrap();
        std::fs::write(src.join("bin/busybox"), "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(src.join("bin/busybox"), std::fs::Permissions::from_mode(0o755))
            .unwrap();
        symlink("busybox", src.join("bin/sh")).unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst).unwrap();

        let copied = std::fs::metadata(dst.join("bin/busybox")).unwrap();
        assert_eq!(copied.permissions().mode() & 0o777, 0o755);
        assert_eq!(
            std::fs::read_link(dst.join("bin/sh")).unwrap(),
            Path::new("busybox")
        );
    }

    #[test]
    fn copy_is_independent_of_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("file"), "original").unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst).unwrap();
        std::fs::write(dst.join("file"), "changed").unwrap();

        assert_eq!(std::fs::read_to_string(src.join("file")).unwrap(), "original");
    }

    #[test]
    fn nested_read_only_directories_keep_contents_and_mode() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("usr/share/doc")).unwrap();
        std::fs::write(src.join("usr/share/doc/README"), "docs").unwrap();
        std::fs::set_permissions(src.join("usr/share"), std::fs::Permissions::from_mode(0o555))
            .unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst).unwrap();

        assert_eq!(
            std::fs::read_to_string(dst.join("usr/share/doc/README")).unwrap(),
            "docs"
        );
        let mode = std::fs::metadata(dst.join("usr/share")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o555);

        for tree in [&src, &dst] {
            std::fs::set_permissions(tree.join("usr/share"), std::fs::Permissions::from_mode(0o755))
                .unwrap();
        }
    }
}
