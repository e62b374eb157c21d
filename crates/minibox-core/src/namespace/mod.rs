//! Linux namespace management for container isolation.
//!
//! The container's init process is created with every requested
//! namespace in a single `clone(2)`, so no instruction of the child ever
//! runs outside its isolation scope.

pub mod netns;
pub mod uts;

use minibox_common::error::{MiniboxError, Result};

/// Stack handed to the cloned child; it only redirects stdio and execs.
#[cfg(target_os = "linux")]
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Which namespaces a new process is created in.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceSet {
    /// Isolate hostname and domain name.
    pub uts: bool,
    /// Isolate the process ID space.
    pub pid: bool,
    /// Isolate the mount table.
    pub mount: bool,
    /// Isolate the network stack.
    pub network: bool,
    /// Isolate System V IPC and POSIX message queues.
    pub ipc: bool,
}

impl NamespaceSet {
    /// The five namespaces every container init process is created in.
    #[must_use]
    pub const fn container() -> Self {
        Self {
            uts: true,
            pid: true,
            mount: true,
            network: true,
            ipc: true,
        }
    }

    /// Only a private hostname scope.
    #[must_use]
    pub const fn uts_only() -> Self {
        Self {
            uts: true,
            pid: false,
            mount: false,
            network: false,
            ipc: false,
        }
    }

    /// Translates the set into `clone(2)` flags.
    #[cfg(target_os = "linux")]
    #[must_use]
    pub fn clone_flags(&self) -> nix::sched::CloneFlags {
        use nix::sched::CloneFlags;

        let mut flags = CloneFlags::empty();
        flags.set(CloneFlags::CLONE_NEWUTS, self.uts);
        flags.set(CloneFlags::CLONE_NEWPID, self.pid);
        flags.set(CloneFlags::CLONE_NEWNS, self.mount);
        flags.set(CloneFlags::CLONE_NEWNET, self.network);
        flags.set(CloneFlags::CLONE_NEWIPC, self.ipc);
        flags
    }
}

impl Default for NamespaceSet {
    fn default() -> Self {
        Self::container()
    }
}

/// Creates a child process inside `namespaces` and runs `child` in it.
///
/// The child's return value becomes its exit status. Returns the
/// host-visible PID as soon as the kernel accepts the process; this is
/// not a readiness signal.
///
/// # Errors
///
/// Returns an error if `clone(2)` fails, typically for lack of
/// `CAP_SYS_ADMIN`.
#[cfg(target_os = "linux")]
pub fn spawn_isolated<F>(namespaces: &NamespaceSet, child: F) -> Result<u32>
where
    F: FnMut() -> isize,
{
    use nix::sched::clone;

    let flags = namespaces.clone_flags();
    let mut stack = vec![0_u8; CHILD_STACK_SIZE];
    // SAFETY: without CLONE_VM the child gets a private copy of this
    // address space. The caller is single-threaded and the callback only
    // performs async-signal-safe work before exec or exit.
    let pid = unsafe { clone(Box::new(child), &mut stack, flags, Some(libc::SIGCHLD)) }
        .map_err(|e| MiniboxError::PermissionDenied {
            message: format!("clone with {flags:?} failed: {e}"),
        })?;
    tracing::debug!(pid = pid.as_raw(), ?flags, "isolated process created");
    u32::try_from(pid.as_raw()).map_err(|_| MiniboxError::PermissionDenied {
        message: format!("clone returned invalid pid {pid}"),
    })
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error because namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn spawn_isolated<F>(_namespaces: &NamespaceSet, _child: F) -> Result<u32>
where
    F: FnMut() -> isize,
{
    Err(MiniboxError::Config {
        message: "Linux required for native container operations".into(),
    })
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use nix::sched::CloneFlags;

    use super::*;

    #[test]
    fn container_set_requests_five_namespaces() {
        let flags = NamespaceSet::container().clone_flags();
        assert_eq!(
            flags,
            CloneFlags::CLONE_NEWUTS
                | CloneFlags::CLONE_NEWPID
                | CloneFlags::CLONE_NEWNS
                | CloneFlags::CLONE_NEWNET
                | CloneFlags::CLONE_NEWIPC
        );
        assert!(!flags.contains(CloneFlags::CLONE_NEWUSER));
    }

    #[test]
    fn uts_only_requests_hostname_scope() {
        assert_eq!(NamespaceSet::uts_only().clone_flags(), CloneFlags::CLONE_NEWUTS);
    }
}
