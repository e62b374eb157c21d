//! CPU resource control.

use std::path::Path;

use minibox_common::error::{MiniboxError, Result};

/// Writes the v1 relative CPU share (`cpu.shares`).
///
/// # Errors
///
/// Returns an error if writing the control file fails.
pub fn set_cpu_shares(cgroup_path: &Path, shares: u64) -> Result<()> {
    let file = cgroup_path.join("cpu.shares");
    std::fs::write(&file, shares.to_string()).map_err(|e| MiniboxError::io(file, e))?;
    tracing::debug!(shares, "CPU shares set");
    Ok(())
}

/// Writes the v2 CPU weight (`cpu.weight`, 1..=10000).
///
/// # Errors
///
/// Returns an error if writing the control file fails.
pub fn set_cpu_weight(cgroup_path: &Path, weight: u64) -> Result<()> {
    let file = cgroup_path.join("cpu.weight");
    std::fs::write(&file, weight.to_string()).map_err(|e| MiniboxError::io(file, e))?;
    tracing::debug!(weight, "CPU weight set");
    Ok(())
}

/// Maps v1 shares (2..=262144) onto the v2 weight range (1..=10000).
#[must_use]
pub fn shares_to_weight(shares: u64) -> u64 {
    let shares = shares.clamp(2, 262_144);
    1 + ((shares - 2) * 9999) / 262_142
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_conversion_covers_range_ends() {
        assert_eq!(shares_to_weight(2), 1);
        assert_eq!(shares_to_weight(262_144), 10_000);
        assert_eq!(shares_to_weight(1024), 39);
        assert_eq!(shares_to_weight(512), 20);
    }

    #[test]
    fn weight_conversion_clamps_out_of_range() {
        assert_eq!(shares_to_weight(0), 1);
        assert_eq!(shares_to_weight(u64::MAX), 10_000);
    }

    #[test]
    fn shares_written_to_control_file() {
        let dir = tempfile::tempdir().unwrap();
        set_cpu_shares(dir.path(), 512).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("cpu.shares")).unwrap(), "512");
    }
}
