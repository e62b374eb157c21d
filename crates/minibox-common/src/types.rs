//! Domain primitive types used across the minibox workspace.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{MiniboxError, Result};

/// Last clock reading handed out by [`ContainerId::generate`].
static LAST_ID_NANOS: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a container instance.
///
/// Derived from a nanosecond wall-clock reading. Within one process the
/// readings are forced to be strictly increasing, so back-to-back calls
/// never collide even on coarse clocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from a string value without validation.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parses a user-supplied container ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is empty or contains anything other than
    /// ASCII alphanumerics, since IDs become directory and interface names.
    pub fn parse(id: &str) -> Result<Self> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MiniboxError::Config {
                message: format!("invalid container id: {id:?}"),
            });
        }
        Ok(Self(id.to_owned()))
    }

    /// Generates a fresh ID from the current clock reading.
    #[must_use]
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));
        let mut prev = LAST_ID_NANOS.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev.saturating_add(1));
            match LAST_ID_NANOS.compare_exchange_weak(
                prev,
                next,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Self(next.to_string()),
                Err(actual) => prev = actual,
            }
        }
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns at most the first eight characters, used in interface names.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a container record.
///
/// Transitions only move away from `Running`; there is no restart path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Init process was started and has not been observed to exit.
    Running,
    /// Init process exited after the stop signal.
    Stopped,
    /// Init process outlived the grace period and was force-killed.
    Killed,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Killed => write!(f, "killed"),
        }
    }
}

/// Resource limits applied to every container's control groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// CPU shares (cgroup v1 relative weight, 2..=262144).
    pub cpu_shares: u64,
    /// Memory ceiling in bytes.
    pub memory_bytes: u64,
    /// Maximum number of processes.
    pub pids_max: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_shares: 512,
            memory_bytes: 100 * 1024 * 1024,
            pids_max: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn generated_ids_are_unique_back_to_back() {
        let ids: HashSet<_> = (0..10_000).map(|_| ContainerId::generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn generated_ids_increase() {
        let a: u64 = ContainerId::generate().as_str().parse().unwrap();
        let b: u64 = ContainerId::generate().as_str().parse().unwrap();
        assert!(b > a);
    }

    #[test]
    fn parse_rejects_path_components() {
        assert!(ContainerId::parse("../etc").is_err());
        assert!(ContainerId::parse("").is_err());
        assert!(ContainerId::parse("1712345678901234567").is_ok());
    }

    #[test]
    fn short_takes_eight_chars() {
        assert_eq!(ContainerId::new("1712345678901234567").short(), "17123456");
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ContainerStatus::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
        assert_eq!(ContainerStatus::Killed.to_string(), "killed");
    }

    #[test]
    fn default_limits_match_documented_values() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.cpu_shares, 512);
        assert_eq!(limits.memory_bytes, 104_857_600);
        assert_eq!(limits.pids_max, 100);
    }
}
