//! Linux native backend using direct syscalls.

use std::path::Path;

use minibox_common::config::RuntimeConfig;
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::ContainerId;
use minibox_core::cgroup::CgroupController;
use minibox_core::network::NetworkFabric;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

use super::{HostBackend, ProcessSignal};
use crate::isolation::{ProcessIsolationEngine, Spawned, StdioMode};

/// Backend that drives namespaces, cgroups, and networking on the host.
#[derive(Debug, Clone)]
pub struct LinuxBackend {
    engine: ProcessIsolationEngine,
    cgroups: CgroupController,
    network: NetworkFabric,
}

impl LinuxBackend {
    /// Builds the backend from runtime configuration.
    #[must_use]
    pub fn new(config: &RuntimeConfig, config_path: Option<&Path>) -> Self {
        Self {
            engine: ProcessIsolationEngine::new(config.mounts.clone(), config.exec.clone())
                .with_config_path(config_path.map(Path::to_path_buf)),
            cgroups: CgroupController::new(&config.cgroup, config.limits.clone()),
            network: NetworkFabric::new(config.network.clone()),
        }
    }

    /// Returns the isolation engine.
    #[must_use]
    pub const fn engine(&self) -> &ProcessIsolationEngine {
        &self.engine
    }
}

impl HostBackend for LinuxBackend {
    fn spawn(
        &self,
        id: &ContainerId,
        rootfs: &Path,
        cmd: &[String],
        stdio: &StdioMode,
    ) -> Result<Spawned> {
        self.engine.start_container(id, rootfs, cmd, stdio)
    }

    fn limit(&self, id: &ContainerId, pid: u32) -> Result<()> {
        self.cgroups.configure(id, pid)
    }

    fn release_limits(&self, id: &ContainerId) -> Result<()> {
        self.cgroups.remove(id)
    }

    fn attach(&self, id: &ContainerId, pid: u32) -> Result<()> {
        self.network.ensure_bridge()?;
        self.network.attach(id, pid)
    }

    fn detach(&self, id: &ContainerId) -> Result<()> {
        self.network.detach(id)
    }

    fn signal(&self, pid: u32, signal: Option<ProcessSignal>) -> Result<bool> {
        let signal = signal.map(|s| match s {
            ProcessSignal::Interrupt => Signal::SIGINT,
            ProcessSignal::Kill => Signal::SIGKILL,
        });
        match kill(to_pid(pid)?, signal) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(MiniboxError::PermissionDenied {
                message: format!("signal {signal:?} to pid {pid} failed: {e}"),
            }),
        }
    }

    fn wait(&self, pid: u32) -> Result<i32> {
        let pid = to_pid(pid)?;
        loop {
            match waitpid(pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(code),
                Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => {
                    return Err(MiniboxError::PermissionDenied {
                        message: format!("waitpid({pid}) failed: {e}"),
                    });
                }
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn exec(&self, id: &ContainerId, rootfs: &Path, cmd: &[String]) -> Result<i32> {
        use minibox_core::namespace::{NamespaceSet, spawn_isolated};

        let pid = spawn_isolated(&NamespaceSet::uts_only(), || {
            match self.engine.exec_in_container(id, rootfs, cmd) {
                Ok(never) => match never {},
                Err(e) => {
                    tracing::error!(id = %id, error = %e, "exec failed");
                    127
                }
            }
        })?;
        tracing::info!(id = %id, pid, "auxiliary process started");
        self.wait(pid)
    }

    #[cfg(not(target_os = "linux"))]
    fn exec(&self, _id: &ContainerId, _rootfs: &Path, _cmd: &[String]) -> Result<i32> {
        Err(MiniboxError::Config {
            message: "Linux required for native container operations".into(),
        })
    }
}

fn to_pid(pid: u32) -> Result<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(Pid::from_raw(raw)),
        _ => Err(MiniboxError::Config {
            message: format!("invalid pid {pid}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> LinuxBackend {
        LinuxBackend::new(&RuntimeConfig::default(), None)
    }

    #[test]
    fn probe_sees_own_process() {
        assert!(backend().signal(std::process::id(), None).unwrap());
    }

    #[test]
    fn probe_of_reaped_child_is_false() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        let _ = child.wait().unwrap();
        assert!(!backend().signal(pid, None).unwrap());
    }

    #[test]
    fn wait_reports_exit_code() {
        let child = std::process::Command::new("sh")
            .args(["-c", "exit 7"])
            .spawn()
            .unwrap();
        assert_eq!(backend().wait(child.id()).unwrap(), 7);
    }

    #[test]
    fn pid_zero_is_rejected() {
        assert!(to_pid(0).is_err());
        assert!(backend().signal(0, None).is_err());
    }
}
