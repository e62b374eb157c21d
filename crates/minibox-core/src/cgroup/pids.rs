//! Process-count control (`pids.max`, same file on v1 and v2).

use std::path::Path;

use minibox_common::error::{MiniboxError, Result};

/// Caps the number of processes in the group.
///
/// # Errors
///
/// Returns an error if writing the control file fails.
pub fn set_pids_max(cgroup_path: &Path, max: u64) -> Result<()> {
    let file = cgroup_path.join("pids.max");
    std::fs::write(&file, max.to_string()).map_err(|e| MiniboxError::io(file, e))?;
    tracing::debug!(max, "pids limit set");
    Ok(())
}
