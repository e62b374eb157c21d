//! Control-group resource management.
//!
//! Each container gets one group per resource subsystem (cpu, memory,
//! pids), named deterministically from its ID. On a v1 host these are
//! three separate paths; on the v2 unified hierarchy the three subsystems
//! share a single group below `<root>/<prefix>`.

pub mod cpu;
pub mod memory;
pub mod pids;

use std::path::{Path, PathBuf};

use minibox_common::config::CgroupConfig;
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::{ContainerId, ResourceLimits};

use crate::teardown::TeardownStack;

/// Resource subsystems every container is limited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// CPU share weight.
    Cpu,
    /// Memory ceiling.
    Memory,
    /// Process count.
    Pids,
}

impl Subsystem {
    /// All subsystems, in configuration order.
    pub const ALL: [Self; 3] = [Self::Cpu, Self::Memory, Self::Pids];

    /// Controller name as it appears in the cgroup filesystem.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Pids => "pids",
        }
    }
}

/// Layout of the host's cgroup filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupVersion {
    /// One hierarchy per controller.
    V1,
    /// Single unified hierarchy.
    V2,
}

impl CgroupVersion {
    /// Detects the layout mounted at `root`.
    #[must_use]
    pub fn detect(root: &Path) -> Self {
        if root.join("cgroup.controllers").exists() {
            Self::V2
        } else {
            Self::V1
        }
    }
}

/// Creates, limits, and removes per-container control groups.
#[derive(Debug, Clone)]
pub struct CgroupController {
    root: PathBuf,
    prefix: String,
    version: CgroupVersion,
    limits: ResourceLimits,
}

impl CgroupController {
    /// Creates a controller for the hierarchy described by `config`.
    #[must_use]
    pub fn new(config: &CgroupConfig, limits: ResourceLimits) -> Self {
        let version = CgroupVersion::detect(&config.root);
        tracing::debug!(root = %config.root.display(), ?version, "cgroup hierarchy detected");
        Self {
            root: config.root.clone(),
            prefix: config.prefix.clone(),
            version,
            limits,
        }
    }

    /// Returns the detected hierarchy layout.
    #[must_use]
    pub const fn version(&self) -> CgroupVersion {
        self.version
    }

    /// Name of the container's group.
    #[must_use]
    pub fn group_name(&self, id: &ContainerId) -> String {
        format!("{}-{id}", self.prefix)
    }

    /// Group path used for `subsystem`.
    #[must_use]
    pub fn path(&self, id: &ContainerId, subsystem: Subsystem) -> PathBuf {
        match self.version {
            CgroupVersion::V1 => self.root.join(subsystem.name()).join(self.group_name(id)),
            CgroupVersion::V2 => self.root.join(&self.prefix).join(self.group_name(id)),
        }
    }

    /// Distinct group paths of a container.
    #[must_use]
    pub fn paths(&self, id: &ContainerId) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::with_capacity(Subsystem::ALL.len());
        for subsystem in Subsystem::ALL {
            let path = self.path(id, subsystem);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    /// Places `pid` in the container's groups and applies the limits.
    ///
    /// Group creation and PID attachment are fatal: the container must not
    /// run unconstrained. A failed limit write only logs a warning. On
    /// failure every group created so far is removed again.
    ///
    /// # Errors
    ///
    /// Returns an error if a group directory cannot be created or the
    /// process cannot be attached to it.
    pub fn configure(&self, id: &ContainerId, pid: u32) -> Result<()> {
        if self.version == CgroupVersion::V2 {
            self.enable_v2_controllers();
        }

        let mut teardown = TeardownStack::new("cgroup");
        let mut attached: Vec<PathBuf> = Vec::new();
        for subsystem in Subsystem::ALL {
            let path = self.path(id, subsystem);
            if !attached.contains(&path) {
                std::fs::create_dir_all(&path).map_err(|e| MiniboxError::io(&path, e))?;
                let undo_path = path.clone();
                teardown.push("cgroup directory", move || remove_group(&undo_path));

                let procs = path.join("cgroup.procs");
                std::fs::write(&procs, pid.to_string()).map_err(|e| MiniboxError::io(&procs, e))?;
                tracing::debug!(pid, path = %path.display(), "process attached to cgroup");
                attached.push(path.clone());
            }

            if let Err(e) = self.apply_limit(&path, subsystem) {
                tracing::warn!(
                    subsystem = subsystem.name(),
                    error = %e,
                    "limit not applied, container runs without it"
                );
            }
        }
        teardown.commit();
        tracing::info!(id = %id, pid, "cgroup limits configured");
        Ok(())
    }

    /// Deletes every group of the container. Missing groups are success.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing group cannot be removed, usually
    /// because processes are still attached.
    pub fn remove(&self, id: &ContainerId) -> Result<()> {
        for path in self.paths(id) {
            remove_group(&path)?;
        }
        tracing::info!(id = %id, "cgroups removed");
        Ok(())
    }

    fn apply_limit(&self, path: &Path, subsystem: Subsystem) -> Result<()> {
        let unified = self.version == CgroupVersion::V2;
        match subsystem {
            Subsystem::Cpu if unified => {
                cpu::set_cpu_weight(path, cpu::shares_to_weight(self.limits.cpu_shares))
            }
            Subsystem::Cpu => cpu::set_cpu_shares(path, self.limits.cpu_shares),
            Subsystem::Memory => memory::set_memory_limit(path, self.limits.memory_bytes, unified),
            Subsystem::Pids => pids::set_pids_max(path, self.limits.pids_max),
        }
    }

    /// Delegates the three controllers down to the per-container groups.
    fn enable_v2_controllers(&self) {
        let parent = self.root.join(&self.prefix);
        if let Err(e) = std::fs::create_dir_all(&parent) {
            tracing::warn!(path = %parent.display(), error = %e, "cannot create parent cgroup");
            return;
        }
        let controllers = Subsystem::ALL
            .iter()
            .map(|s| format!("+{}", s.name()))
            .collect::<Vec<_>>()
            .join(" ");
        for dir in [self.root.as_path(), parent.as_path()] {
            let file = dir.join("cgroup.subtree_control");
            if let Err(e) = std::fs::write(&file, &controllers) {
                tracing::warn!(path = %file.display(), error = %e, "cannot enable controllers");
            }
        }
    }
}

/// Removes one group directory.
///
/// On a cgroup filesystem `rmdir` succeeds despite the control files; on
/// an ordinary directory the contents are removed first.
fn remove_group(path: &Path) -> Result<()> {
    match std::fs::remove_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty => {
            std::fs::remove_dir_all(path).map_err(|_| MiniboxError::io(path, e))
        }
        Err(e) => Err(MiniboxError::io(path, e)),
    }
}
