//! Runtime configuration model.
//!
//! Every knob has a default matching the documented behavior, so an
//! empty JSON object is a valid configuration file.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MiniboxError, Result};
use crate::types::ResourceLimits;

/// Root configuration for the minibox runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// On-disk storage layout.
    pub storage: StorageLayout,
    /// Limits applied to every container.
    pub limits: ResourceLimits,
    /// Control-group filesystem settings.
    pub cgroup: CgroupConfig,
    /// Bridge and veth settings.
    pub network: NetworkConfig,
    /// Mount points inside the container root.
    pub mounts: MountConfig,
    /// Command resolution and environment for the container process.
    pub exec: ExecConfig,
    /// Stop grace period and polling.
    pub stop: StopPolicy,
}

impl RuntimeConfig {
    /// Loads configuration from a JSON file, or returns defaults when
    /// `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| MiniboxError::io(path, e))?;
        let config: Self = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Returns a copy with every storage directory rebased under `root`.
    #[must_use]
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage = StorageLayout::under(root);
        self
    }
}

/// The three storage roots the runtime treats as opaque constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageLayout {
    /// Unpacked images, one directory per image reference.
    pub images: PathBuf,
    /// Per-container metadata, logs, and private root filesystems.
    pub containers: PathBuf,
    /// Content-addressed layer blobs.
    pub blobs: PathBuf,
}

impl StorageLayout {
    /// Builds the standard layout below a single root directory.
    #[must_use]
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            images: root.join("images"),
            containers: root.join("containers"),
            blobs: root.join("blobs"),
        }
    }

    /// Returns the metadata directory of one container.
    #[must_use]
    pub fn container_dir(&self, id: &str) -> PathBuf {
        self.containers.join(id)
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::under(crate::constants::SYSTEM_DATA_DIR)
    }
}

/// Control-group filesystem settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CgroupConfig {
    /// Mount point of the cgroup filesystem.
    pub root: PathBuf,
    /// Prefix for per-container group names and the v2 parent group.
    pub prefix: String,
}

impl Default for CgroupConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(crate::constants::CGROUP_ROOT),
            prefix: crate::constants::APP_NAME.to_owned(),
        }
    }
}

/// Bridge, veth, and addressing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Name of the shared bridge device.
    pub bridge: String,
    /// Address assigned to the bridge, in CIDR notation.
    pub bridge_cidr: String,
    /// Default gateway installed inside each container.
    pub gateway: Ipv4Addr,
    /// Base of the container address range; the last octet is computed.
    pub container_base: Ipv4Addr,
    /// Prefix length of container addresses.
    pub container_prefix_len: u8,
    /// Prefix for host-side veth names.
    pub veth_prefix: String,
    /// Name the container-side peer is given inside its namespace.
    pub container_ifname: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bridge: "minibox0".to_owned(),
            bridge_cidr: "172.17.0.1/24".to_owned(),
            gateway: Ipv4Addr::new(172, 17, 0, 1),
            container_base: Ipv4Addr::new(172, 17, 0, 0),
            container_prefix_len: 16,
            veth_prefix: "veth_".to_owned(),
            container_ifname: "eth0".to_owned(),
        }
    }
}

/// Pseudo-filesystem mount points, relative to the container root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Process-information filesystem; a failed mount is fatal.
    pub proc: PathBuf,
    /// Temporary storage; a failed mount is a warning.
    pub tmpfs: PathBuf,
    /// Pseudo-terminal devices; a failed mount is a warning.
    pub devpts: PathBuf,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            proc: PathBuf::from("proc"),
            tmpfs: PathBuf::from("tmp"),
            devpts: PathBuf::from("dev/pts"),
        }
    }
}

/// Command resolution and environment for process-image replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Search path used to resolve the container command.
    pub search_path: String,
    /// Environment handed to the container command, `KEY=VALUE` form.
    ///
    /// The defaults carry empty placeholders; override them here to give
    /// the command a usable `PATH`.
    pub env: Vec<String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            search_path: "/bin:/usr/bin:/sbin:/usr/sbin".to_owned(),
            env: vec!["PATH=".to_owned(), "TERM=".to_owned(), "HOME=".to_owned()],
        }
    }
}

/// Grace period and polling cadence for stopping a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopPolicy {
    /// Total time to wait for exit before force-killing, in milliseconds.
    pub grace_ms: u64,
    /// Interval between liveness probes, in milliseconds.
    pub poll_ms: u64,
}

impl StopPolicy {
    /// Returns the grace period.
    #[must_use]
    pub const fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Returns the probe interval.
    #[must_use]
    pub const fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            grace_ms: 10_000,
            poll_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.storage, StorageLayout::default());
        assert_eq!(config.stop.grace(), Duration::from_secs(10));
        assert_eq!(config.stop.poll(), Duration::from_millis(100));
        assert_eq!(config.network.bridge, "minibox0");
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"limits": {"pids_max": 32}}"#).unwrap();
        assert_eq!(config.limits.pids_max, 32);
        assert_eq!(config.limits.cpu_shares, 512);
    }

    #[test]
    fn load_without_path_returns_defaults() {
        let config = RuntimeConfig::load(None).unwrap();
        assert_eq!(config.exec.env, vec!["PATH=", "TERM=", "HOME="]);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minibox.json");
        std::fs::write(&path, r#"{"stop": {"grace_ms": 500}}"#).unwrap();
        let config = RuntimeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.stop.grace_ms, 500);
        assert_eq!(config.stop.poll_ms, 100);
    }

    #[test]
    fn storage_root_override_rebases_all_dirs() {
        let config = RuntimeConfig::default().with_storage_root("/tmp/mb");
        assert_eq!(config.storage.images, PathBuf::from("/tmp/mb/images"));
        assert_eq!(
            config.storage.container_dir("42"),
            PathBuf::from("/tmp/mb/containers/42")
        );
    }
}
