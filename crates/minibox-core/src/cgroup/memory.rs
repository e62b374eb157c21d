//! Memory resource control.

use std::path::Path;

use minibox_common::error::{MiniboxError, Result};

/// Sets the hard memory ceiling.
///
/// Writes `memory.limit_in_bytes` on v1 and `memory.max` on v2.
///
/// # Errors
///
/// Returns an error if writing the control file fails.
pub fn set_memory_limit(cgroup_path: &Path, bytes: u64, unified: bool) -> Result<()> {
    let name = if unified { "memory.max" } else { "memory.limit_in_bytes" };
    let file = cgroup_path.join(name);
    std::fs::write(&file, bytes.to_string()).map_err(|e| MiniboxError::io(file, e))?;
    tracing::debug!(bytes, "memory limit set");
    Ok(())
}
