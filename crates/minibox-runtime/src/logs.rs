//! Captured output of detached containers.

use std::path::{Path, PathBuf};

use minibox_common::constants::LOG_FILE;
use minibox_common::error::{MiniboxError, Result};

/// Returns the log file path inside a container directory.
#[must_use]
pub fn log_path(container_dir: &Path) -> PathBuf {
    container_dir.join(LOG_FILE)
}

/// Reads a container's captured output.
///
/// # Errors
///
/// Returns a not-found error if the container never had a log, which is
/// the case for interactive containers.
pub fn read_logs(container_dir: &Path) -> Result<String> {
    let path = log_path(container_dir);
    std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MiniboxError::NotFound {
                kind: "log",
                id: path.display().to_string(),
            }
        } else {
            MiniboxError::io(&path, e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_is_inside_container_dir() {
        let p = log_path(Path::new("/var/lib/minibox/containers/42"));
        assert_eq!(p, Path::new("/var/lib/minibox/containers/42/container.log"));
    }

    #[test]
    fn missing_log_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_logs(dir.path()).unwrap_err().is_not_found());
    }

    #[test]
    fn reads_captured_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(log_path(dir.path()), "hi\n").unwrap();
        assert_eq!(read_logs(dir.path()).unwrap(), "hi\n");
    }
}
