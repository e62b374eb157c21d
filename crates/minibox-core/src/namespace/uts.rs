//! UTS namespace isolation.
//!
//! Allows the container to have its own hostname.

use minibox_common::error::{MiniboxError, Result};

/// Sets the hostname of the calling process's UTS namespace.
///
/// # Errors
///
/// Returns an error if `sethostname(2)` fails.
pub fn set_hostname(hostname: &str) -> Result<()> {
    nix::unistd::sethostname(hostname).map_err(|e| MiniboxError::PermissionDenied {
        message: format!("sethostname({hostname}) failed: {e}"),
    })?;
    tracing::info!(hostname, "container hostname set");
    Ok(())
}
