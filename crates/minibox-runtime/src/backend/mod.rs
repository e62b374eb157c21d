//! Host operations behind the container lifecycle.
//!
//! [`crate::manager::ContainerManager`] sequences create, stop, and exec;
//! everything that touches the kernel goes through [`HostBackend`].

pub mod linux;

use std::path::Path;

use minibox_common::error::Result;
use minibox_common::types::ContainerId;

use crate::isolation::{Spawned, StdioMode};

pub use linux::LinuxBackend;

/// Signals the lifecycle sends to a container's init process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    /// Polite interrupt, the first step of a stop.
    Interrupt,
    /// Forced termination after the grace period.
    Kill,
}

/// Host facilities used by the container lifecycle.
pub trait HostBackend: Send + Sync {
    /// Starts the init process of a container in fresh namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be created.
    fn spawn(&self, id: &ContainerId, rootfs: &Path, cmd: &[String], stdio: &StdioMode)
    -> Result<Spawned>;

    /// Places `pid` under the container's resource limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be constrained.
    fn limit(&self, id: &ContainerId, pid: u32) -> Result<()>;

    /// Removes the container's resource-limit groups.
    ///
    /// # Errors
    ///
    /// Returns an error if the groups exist and cannot be removed.
    fn release_limits(&self, id: &ContainerId) -> Result<()>;

    /// Connects the network namespace of `pid` to the host bridge.
    ///
    /// # Errors
    ///
    /// Returns an error if any networking step fails.
    fn attach(&self, id: &ContainerId, pid: u32) -> Result<()>;

    /// Disconnects the container from the host bridge.
    ///
    /// # Errors
    ///
    /// Returns an error if the host-side interface cannot be removed.
    fn detach(&self, id: &ContainerId) -> Result<()>;

    /// Sends `signal` to `pid`, or only probes liveness when `None`.
    ///
    /// Returns `false` if the process does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal is refused for another reason.
    fn signal(&self, pid: u32, signal: Option<ProcessSignal>) -> Result<bool>;

    /// Waits for a child process and returns its exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if `pid` is not a child of this process.
    fn wait(&self, pid: u32) -> Result<i32>;

    /// Runs `cmd` inside the container's root filesystem and returns its
    /// exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the auxiliary process cannot be created.
    fn exec(&self, id: &ContainerId, rootfs: &Path, cmd: &[String]) -> Result<i32>;
}
