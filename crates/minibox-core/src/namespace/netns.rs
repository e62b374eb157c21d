//! Network namespace switching.
//!
//! `setns(2)` changes the namespace of the calling thread, which is
//! process-global state for a single-threaded runtime. Callers must hold
//! [`NETNS_LOCK`] for the whole switch, operate, restore sequence.

use std::fs::File;
use std::sync::Mutex;

use minibox_common::error::{MiniboxError, Result};

/// Serializes every network namespace switch in this process.
pub static NETNS_LOCK: Mutex<()> = Mutex::new(());

/// Holds the original network namespace while the thread is switched
/// into another one; restores it on [`NetnsGuard::restore`] or drop.
#[derive(Debug)]
pub struct NetnsGuard {
    origin: Option<File>,
}

impl NetnsGuard {
    /// Moves the calling thread into the network namespace of `pid`.
    ///
    /// The target is identified by PID, not by a held handle: if `pid`
    /// has exited this fails, and if it was reused the wrong namespace is
    /// entered.
    ///
    /// # Errors
    ///
    /// Returns an error if either namespace file cannot be opened or
    /// `setns(2)` fails.
    #[cfg(target_os = "linux")]
    pub fn enter(pid: u32) -> Result<Self> {
        use nix::sched::{CloneFlags, setns};

        let origin_path = "/proc/thread-self/ns/net";
        let origin = File::open(origin_path).map_err(|e| MiniboxError::io(origin_path, e))?;
        let target_path = format!("/proc/{pid}/ns/net");
        let target = File::open(&target_path).map_err(|e| MiniboxError::io(&target_path, e))?;

        setns(&target, CloneFlags::CLONE_NEWNET).map_err(|e| MiniboxError::PermissionDenied {
            message: format!("setns into {target_path} failed: {e}"),
        })?;
        tracing::debug!(pid, "entered container network namespace");
        Ok(Self {
            origin: Some(origin),
        })
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error because namespaces require Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn enter(_pid: u32) -> Result<Self> {
        Err(MiniboxError::Config {
            message: "Linux required for native container operations".into(),
        })
    }

    /// A guard that switched nothing and restores nothing.
    #[must_use]
    pub const fn inert() -> Self {
        Self { origin: None }
    }

    /// Switches back to the original namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if `setns(2)` back into the origin fails.
    pub fn restore(mut self) -> Result<()> {
        self.switch_back()
    }

    fn switch_back(&mut self) -> Result<()> {
        let Some(origin) = self.origin.take() else {
            return Ok(());
        };
        restore_origin(&origin)
    }
}

impl Drop for NetnsGuard {
    fn drop(&mut self) {
        if let Err(e) = self.switch_back() {
            tracing::error!(error = %e, "failed to restore host network namespace");
        }
    }
}

#[cfg(target_os = "linux")]
fn restore_origin(origin: &File) -> Result<()> {
    use nix::sched::{CloneFlags, setns};

    setns(origin, CloneFlags::CLONE_NEWNET).map_err(|e| MiniboxError::PermissionDenied {
        message: format!("setns back to host network namespace failed: {e}"),
    })?;
    tracing::debug!("restored host network namespace");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn restore_origin(_origin: &File) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inert_guard_restores_nothing() {
        let guard = NetnsGuard::inert();
        assert!(guard.restore().is_ok());
    }
}
