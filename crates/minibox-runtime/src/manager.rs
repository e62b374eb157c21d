//! Top-level container lifecycle.
//!
//! Create persists the record before anything is started, so a record
//! exists for every start attempt. Every resource acquired afterwards is
//! pushed onto a teardown stack and released in reverse if a later step
//! fails. The container command only runs once all of them are in place.

use std::path::Path;
use std::time::Instant;

use minibox_common::config::{RuntimeConfig, StopPolicy};
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::{ContainerId, ContainerStatus};
use minibox_core::teardown::TeardownStack;
use minibox_image::{ImageProvider, LocalImageStore};

use crate::backend::{HostBackend, LinuxBackend, ProcessSignal};
use crate::container::{Container, ContainerSummary};
use crate::isolation::StdioMode;
use crate::logs;
use crate::state::RecordStore;

/// A container whose init process was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launched {
    /// Identifier of the new container.
    pub id: ContainerId,
    /// Host-visible PID of its init process.
    pub pid: u32,
}

/// Persists container records and drives their lifecycle.
#[derive(Debug)]
pub struct ContainerManager<B, I> {
    records: RecordStore,
    backend: B,
    images: I,
    stop_policy: StopPolicy,
}

impl ContainerManager<LinuxBackend, LocalImageStore> {
    /// Builds a manager operating on this host.
    #[must_use]
    pub fn linux(config: &RuntimeConfig, config_path: Option<&Path>) -> Self {
        Self::new(
            RecordStore::new(&config.storage.containers),
            LinuxBackend::new(config, config_path),
            LocalImageStore::new(config.storage.clone()),
            config.stop.clone(),
        )
    }
}

impl<B: HostBackend, I: ImageProvider> ContainerManager<B, I> {
    /// Creates a manager from its parts.
    #[must_use]
    pub const fn new(records: RecordStore, backend: B, images: I, stop_policy: StopPolicy) -> Self {
        Self {
            records,
            backend,
            images,
            stop_policy,
        }
    }

    /// Returns the record store.
    #[must_use]
    pub const fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Returns the host backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Creates and starts a container.
    ///
    /// The record is written with status `running` before the process is
    /// started. On failure every acquired resource is released again,
    /// including the container directory. Detached containers read from
    /// `/dev/null` and log to `container.log`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is empty, the image is unavailable,
    /// or any start, limit, or network step fails.
    pub fn create(
        &self,
        name: &str,
        image: &str,
        command: &[String],
        interactive: bool,
    ) -> Result<Launched> {
        if command.is_empty() {
            return Err(MiniboxError::Config {
                message: "container command must not be empty".into(),
            });
        }

        let id = self.records.allocate()?;
        let mut teardown = TeardownStack::new("create");
        teardown.push("container directory", || self.records.remove(&id));

        let rootfs = self.images.check(image, &id)?;
        let mut record = Container::new(id.clone(), name, image, command);
        self.records.save(&record)?;

        let stdio = if interactive {
            StdioMode::Interactive
        } else {
            StdioMode::Detached {
                log: logs::log_path(&self.records.container_dir(&id)),
            }
        };
        let spawned = self.backend.spawn(&id, &rootfs, command, &stdio)?;
        let pid = spawned.pid;
        teardown.push("init process", move || {
            let _ = self.backend.signal(pid, Some(ProcessSignal::Kill))?;
            self.backend.wait(pid).map(|_| ())
        });

        self.backend.limit(&id, pid)?;
        teardown.push("cgroups", || self.backend.release_limits(&id));

        self.backend.attach(&id, pid)?;
        teardown.push("network", || self.backend.detach(&id));

        record.pid = pid;
        self.records.save(&record)?;
        spawned.gate.release()?;
        teardown.commit();

        tracing::info!(id = %id, name, image, pid, "container running");
        Ok(Launched { id, pid })
    }

    /// Lists every container with a readable record, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the containers directory cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerSummary>> {
        Ok(self
            .records
            .list()?
            .iter()
            .map(ContainerSummary::from)
            .collect())
    }

    /// Stops a container: interrupt, poll for exit, force-kill after the
    /// grace period.
    ///
    /// Returns `stopped` if the process exited (or was already gone) and
    /// `killed` if it had to be force-killed. Stopping a container that is
    /// already stopped or killed returns its status unchanged. Afterwards
    /// the cgroups and network attachment are released best effort.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown, has no recorded PID,
    /// or cannot be signaled.
    pub fn stop(&self, id: &ContainerId) -> Result<ContainerStatus> {
        let record = self.records.load(id)?;
        if record.is_terminal() {
            tracing::info!(id = %id, status = %record.status, "container already stopped");
            return Ok(record.status);
        }
        if record.pid == 0 {
            return Err(MiniboxError::Config {
                message: format!("container {id} has no recorded process"),
            });
        }

        let status = self.terminate(record.pid)?;
        let _ = self.records.update(id, |c| c.status = status)?;
        self.release(id);
        tracing::info!(id = %id, pid = record.pid, %status, "container stopped");
        Ok(status)
    }

    /// Runs an auxiliary command in a container's root filesystem and
    /// returns its exit status.
    ///
    /// The command sees the container's files and hostname but none of
    /// its process, mount, or network namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the container or its root filesystem is
    /// unknown, or the process cannot be started.
    pub fn exec(&self, id: &ContainerId, command: &[String]) -> Result<i32> {
        if command.is_empty() {
            return Err(MiniboxError::Config {
                message: "exec command must not be empty".into(),
            });
        }
        let record = self.records.load(id)?;
        if record.is_terminal() {
            tracing::warn!(id = %id, status = %record.status, "exec into a container that is not running");
        }
        let rootfs = self.images.rootfs(id)?;
        self.backend.exec(id, &rootfs, command)
    }

    /// Waits for an interactive container started by this process, then
    /// marks it stopped and releases its resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be waited for or the record
    /// cannot be updated.
    pub fn wait(&self, launched: &Launched) -> Result<i32> {
        let code = self.backend.wait(launched.pid)?;
        let record = self.records.update(&launched.id, |c| {
            if !c.is_terminal() {
                c.status = ContainerStatus::Stopped;
            }
        })?;
        self.release(&launched.id);
        tracing::info!(id = %launched.id, code, status = %record.status, "container exited");
        Ok(code)
    }

    /// Returns the captured output of a detached container.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the container or its log is unknown.
    pub fn logs(&self, id: &ContainerId) -> Result<String> {
        let _ = self.records.load(id)?;
        logs::read_logs(&self.records.container_dir(id))
    }

    fn terminate(&self, pid: u32) -> Result<ContainerStatus> {
        if !self.backend.signal(pid, Some(ProcessSignal::Interrupt))? {
            tracing::debug!(pid, "process already gone");
            return Ok(ContainerStatus::Stopped);
        }

        let deadline = Instant::now() + self.stop_policy.grace();
        loop {
            std::thread::sleep(self.stop_policy.poll());
            if !self.backend.signal(pid, None)? {
                return Ok(ContainerStatus::Stopped);
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        tracing::warn!(pid, grace = ?self.stop_policy.grace(), "grace period expired, killing");
        let _ = self.backend.signal(pid, Some(ProcessSignal::Kill))?;
        Ok(ContainerStatus::Killed)
    }

    fn release(&self, id: &ContainerId) {
        if let Err(e) = self.backend.release_limits(id) {
            tracing::warn!(id = %id, error = %e, "cgroups not removed");
        }
        if let Err(e) = self.backend.detach(id) {
            tracing::warn!(id = %id, error = %e, "network not detached");
        }
    }
}
