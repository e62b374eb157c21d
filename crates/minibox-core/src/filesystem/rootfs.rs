//! Root filesystem switching via `chroot(2)`.

use std::path::Path;

use minibox_common::error::{MiniboxError, Result};

/// Makes `rootfs` the process root and resets the working directory.
///
/// Mount propagation is first made private so that mounts performed
/// afterwards stay inside the container's mount namespace; failure to do
/// so is logged and not fatal.
///
/// # Errors
///
/// Returns an error if `chroot(2)` or `chdir(2)` fails.
#[cfg(target_os = "linux")]
pub fn switch_root(rootfs: &Path) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    if let Err(e) = mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    ) {
        tracing::warn!(error = %e, "could not make mount propagation private");
    }

    nix::unistd::chroot(rootfs).map_err(|e| MiniboxError::PermissionDenied {
        message: format!("chroot to {} failed: {e}", rootfs.display()),
    })?;
    nix::unistd::chdir("/").map_err(|e| MiniboxError::PermissionDenied {
        message: format!("chdir to new root failed: {e}"),
    })?;
    tracing::info!(rootfs = %rootfs.display(), "root filesystem switched");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error because the root switch requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn switch_root(_rootfs: &Path) -> Result<()> {
    Err(MiniboxError::Config {
        message: "Linux required for native container operations".into(),
    })
}
