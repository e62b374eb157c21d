//! Pseudo-filesystem mounts inside the container root.
//!
//! The process-information filesystem is required; temporary storage and
//! pseudo-terminal devices are best effort.

use std::path::{Path, PathBuf};

use minibox_common::config::MountConfig;
use minibox_common::error::{MiniboxError, Result};

/// The three mount operations of the container setup.
pub trait Mounter {
    /// Mounts a fresh `proc` instance at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn proc(&self, target: &Path) -> Result<()>;

    /// Mounts an empty `tmpfs` at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn tmpfs(&self, target: &Path) -> Result<()>;

    /// Mounts a private `devpts` instance at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn devpts(&self, target: &Path) -> Result<()>;
}

/// Mounts through `mount(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn proc(&self, target: &Path) -> Result<()> {
        mount_proc(target)
    }

    fn tmpfs(&self, target: &Path) -> Result<()> {
        mount_tmpfs(target)
    }

    fn devpts(&self, target: &Path) -> Result<()> {
        mount_devpts(target)
    }
}

/// Mounts `/proc`, then a tmpfs and devpts, below `root`.
///
/// Mount points are always taken relative to `root`, even when the
/// configuration spells them as absolute paths.
///
/// # Errors
///
/// Returns an error only if the process-information mount fails; the
/// other two failures are logged as warnings.
pub fn mount_pseudo_filesystems<M: Mounter + ?Sized>(
    mounter: &M,
    root: &Path,
    mounts: &MountConfig,
) -> Result<()> {
    mounter.proc(&under(root, &mounts.proc))?;

    if let Err(e) = mounter.tmpfs(&under(root, &mounts.tmpfs)) {
        tracing::warn!(error = %e, "tmpfs unavailable, continuing without it");
    }
    if let Err(e) = mounter.devpts(&under(root, &mounts.devpts)) {
        tracing::warn!(error = %e, "devpts unavailable, continuing without it");
    }
    tracing::info!(root = %root.display(), "pseudo-filesystems mounted");
    Ok(())
}

fn under(root: &Path, target: &Path) -> PathBuf {
    root.join(target.strip_prefix("/").unwrap_or(target))
}

/// Mounts a fresh `proc` instance at `target`.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the mount fails.
#[cfg(target_os = "linux")]
pub fn mount_proc(target: &Path) -> Result<()> {
    use nix::mount::MsFlags;

    let flags = MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC;
    mount_fs("proc", target, "proc", flags, None)
}

/// Mounts an empty `tmpfs` at `target`.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the mount fails.
#[cfg(target_os = "linux")]
pub fn mount_tmpfs(target: &Path) -> Result<()> {
    use nix::mount::MsFlags;

    mount_fs("tmpfs", target, "tmpfs", MsFlags::MS_NOSUID | MsFlags::MS_NODEV, None)
}

/// Mounts a private `devpts` instance at `target`.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the mount fails.
#[cfg(target_os = "linux")]
pub fn mount_devpts(target: &Path) -> Result<()> {
    use nix::mount::MsFlags;

    mount_fs(
        "devpts",
        target,
        "devpts",
        MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC,
        Some("newinstance,ptmxmode=0666"),
    )
}

#[cfg(target_os = "linux")]
fn mount_fs(
    source: &str,
    target: &Path,
    fstype: &str,
    flags: nix::mount::MsFlags,
    data: Option<&str>,
) -> Result<()> {
    std::fs::create_dir_all(target).map_err(|e| MiniboxError::io(target, e))?;
    nix::mount::mount(Some(source), target, Some(fstype), flags, data).map_err(|e| {
        MiniboxError::PermissionDenied {
            message: format!("mount {fstype} at {} failed: {e}", target.display()),
        }
    })?;
    tracing::debug!(fstype, target = %target.display(), "mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error because mounts require Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_proc(_target: &Path) -> Result<()> {
    Err(linux_required())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error because mounts require Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_tmpfs(_target: &Path) -> Result<()> {
    Err(linux_required())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error because mounts require Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_devpts(_target: &Path) -> Result<()> {
    Err(linux_required())
}

#[cfg(not(target_os = "linux"))]
fn linux_required() -> MiniboxError {
    MiniboxError::Config {
        message: "Linux required for native container operations".into(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingMounter {
        calls: Mutex<Vec<String>>,
        fail: Vec<&'static str>,
    }

    impl RecordingMounter {
        fn failing(fail: &[&'static str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: fail.to_vec(),
            }
        }

        fn record(&self, fstype: &'static str, target: &Path) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{fstype} {}", target.display()));
            if self.fail.contains(&fstype) {
                return Err(MiniboxError::PermissionDenied {
                    message: format!("mount {fstype} refused"),
                });
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Mounter for RecordingMounter {
        fn proc(&self, target: &Path) -> Result<()> {
            self.record("proc", target)
        }

        fn tmpfs(&self, target: &Path) -> Result<()> {
            self.record("tmpfs", target)
        }

        fn devpts(&self, target: &Path) -> Result<()> {
            self.record("devpts", target)
        }
    }

    #[test]
    fn mounts_proc_tmpfs_and_devpts_in_order() {
        let mounter = RecordingMounter::default();
        mount_pseudo_filesystems(&mounter, Path::new("/srv/c1"), &MountConfig::default()).unwrap();
        assert_eq!(
            mounter.calls(),
            vec!["proc /srv/c1/proc", "tmpfs /srv/c1/tmp", "devpts /srv/c1/dev/pts"]
        );
    }

    #[test]
    fn proc_failure_is_fatal() {
        let mounter = RecordingMounter::failing(&["proc"]);
        let result = mount_pseudo_filesystems(&mounter, Path::new("/"), &MountConfig::default());
        assert!(result.is_err());
        assert_eq!(mounter.calls(), vec!["proc /proc"]);
    }

    #[test]
    fn tmpfs_and_devpts_failures_only_warn() {
        let mounter = RecordingMounter::failing(&["tmpfs", "devpts"]);
        mount_pseudo_filesystems(&mounter, Path::new("/"), &MountConfig::default()).unwrap();
        assert_eq!(mounter.calls().len(), 3);
    }

    #[test]
    fn absolute_mount_points_stay_below_root() {
        let mounts = MountConfig {
            proc: PathBuf::from("/proc"),
            tmpfs: PathBuf::from("/tmp"),
            devpts: PathBuf::from("/dev/pts"),
        };
        let mounter = RecordingMounter::default();
        mount_pseudo_filesystems(&mounter, Path::new("/srv/c2"), &mounts).unwrap();
        assert_eq!(
            mounter.calls(),
            vec!["proc /srv/c2/proc", "tmpfs /srv/c2/tmp", "devpts /srv/c2/dev/pts"]
        );
    }
}
