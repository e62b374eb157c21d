//! Namespace creation and the in-namespace setup sequence.
//!
//! Starting a container re-executes the current binary with the hidden
//! `init` subcommand inside a fresh UTS, PID, mount, network, and IPC
//! namespace set. The re-executed process then walks a fixed sequence:
//!
//! ```text
//! Spawned -> Init -> FilesystemReady -> Running
//! ```
//!
//! It first blocks on a start gate, a pipe whose write end stays with the
//! runtime until cgroup limits and networking are in place. Releasing the
//! gate lets init continue; closing it unreleased makes init exit.

use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::OwnedFd;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use minibox_common::config::{ExecConfig, MountConfig};
use minibox_common::constants::{BIN_NAME, INIT_MARKER};
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::ContainerId;
use minibox_core::filesystem::mount::{Mounter, SystemMounter, mount_pseudo_filesystems};
use minibox_core::namespace::uts;

/// Steps of the in-namespace setup, in the only permitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InitPhase {
    /// The process exists inside its namespaces and waits on the gate.
    Spawned,
    /// The gate opened and the hostname is set.
    Init,
    /// Root switched and pseudo-filesystems mounted.
    FilesystemReady,
    /// The container command replaced the init image.
    Running,
}

/// Where a container's standard streams go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdioMode {
    /// Inherit the caller's terminal.
    Interactive,
    /// Read from `/dev/null`, append output to a log file.
    Detached {
        /// File receiving stdout and stderr.
        log: PathBuf,
    },
}

/// Write end of the start gate held by the runtime.
///
/// Dropping it without [`StartGate::release`] aborts the container.
#[derive(Debug)]
pub struct StartGate {
    writer: Option<OwnedFd>,
}

impl StartGate {
    /// A gate with nothing behind it.
    #[must_use]
    pub const fn none() -> Self {
        Self { writer: None }
    }

    /// Lets the init process proceed past the gate.
    ///
    /// # Errors
    ///
    /// Returns an error if init already exited and the pipe is closed.
    pub fn release(mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let mut pipe = File::from(writer);
        pipe.write_all(&[1]).map_err(|e| MiniboxError::io("start gate", e))?;
        tracing::debug!("start gate released");
        Ok(())
    }
}

/// A process created inside a fresh namespace set.
#[derive(Debug)]
pub struct Spawned {
    /// Host-visible PID of the init process.
    pub pid: u32,
    /// Gate holding the init process before its setup sequence.
    pub gate: StartGate,
}

/// Host operations of the in-namespace setup sequence.
pub trait InitSystem: Mounter {
    /// Sets the hostname of the current UTS namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the hostname cannot be set.
    fn set_hostname(&self, hostname: &str) -> Result<()>;

    /// Makes `rootfs` the process root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be changed.
    fn switch_root(&self, rootfs: &Path) -> Result<()>;

    /// Replaces the process image. Only returns on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if `execve(2)` fails.
    fn execve(&self, program: &CStr, argv: &[CString], env: &[CString]) -> Result<Infallible>;
}

/// The real system calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInit;

impl Mounter for SystemInit {
    fn proc(&self, target: &Path) -> Result<()> {
        SystemMounter.proc(target)
    }

    fn tmpfs(&self, target: &Path) -> Result<()> {
        SystemMounter.tmpfs(target)
    }

    fn devpts(&self, target: &Path) -> Result<()> {
        SystemMounter.devpts(target)
    }
}

impl InitSystem for SystemInit {
    fn set_hostname(&self, hostname: &str) -> Result<()> {
        uts::set_hostname(hostname)
    }

    fn switch_root(&self, rootfs: &Path) -> Result<()> {
        minibox_core::filesystem::rootfs::switch_root(rootfs)
    }

    fn execve(&self, program: &CStr, argv: &[CString], env: &[CString]) -> Result<Infallible> {
        nix::unistd::execve(program, argv, env).map_err(|e| MiniboxError::PermissionDenied {
            message: format!("exec {} failed: {e}", program.to_string_lossy()),
        })
    }
}

/// Drives namespace creation and the in-namespace setup sequence.
#[derive(Debug, Clone)]
pub struct ProcessIsolationEngine<S = SystemInit> {
    mounts: MountConfig,
    exec: ExecConfig,
    config_path: Option<PathBuf>,
    system: S,
}

impl ProcessIsolationEngine {
    /// Creates an engine with the given mount and exec settings.
    #[must_use]
    pub const fn new(mounts: MountConfig, exec: ExecConfig) -> Self {
        Self::with_system(mounts, exec, SystemInit)
    }
}

impl<S: InitSystem> ProcessIsolationEngine<S> {
    /// Creates an engine performing its setup through `system`.
    #[must_use]
    pub const fn with_system(mounts: MountConfig, exec: ExecConfig, system: S) -> Self {
        Self {
            mounts,
            exec,
            config_path: None,
            system,
        }
    }

    /// Forwards a configuration file to the re-executed init process.
    #[must_use]
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Arguments the init process is re-executed with.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument contains an interior NUL byte.
    pub fn init_argv(&self, id: &ContainerId, rootfs: &Path, cmd: &[String]) -> Result<Vec<CString>> {
        let mut argv = vec![cstring(BIN_NAME.as_bytes())?];
        if let Some(path) = &self.config_path {
            argv.push(cstring(b"--config")?);
            argv.push(cstring(path.as_os_str().as_bytes())?);
        }
        argv.push(cstring(INIT_MARKER.as_bytes())?);
        argv.push(cstring(id.as_str().as_bytes())?);
        argv.push(cstring(rootfs.as_os_str().as_bytes())?);
        argv.push(cstring(b"--")?);
        for arg in cmd {
            argv.push(cstring(arg.as_bytes())?);
        }
        Ok(argv)
    }

    /// Re-executes this binary as the container's init process inside a
    /// new UTS, PID, mount, network, and IPC namespace set.
    ///
    /// Returns as soon as the kernel accepted the process. The process
    /// waits on the returned gate before doing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is empty, the gate pipe or log file
    /// cannot be opened, or process creation fails.
    #[cfg(target_os = "linux")]
    pub fn start_container(
        &self,
        id: &ContainerId,
        rootfs: &Path,
        cmd: &[String],
        stdio: &StdioMode,
    ) -> Result<Spawned> {
        use std::os::fd::AsRawFd;

        use minibox_common::constants::{SELF_EXE, START_GATE_FD};
        use minibox_core::namespace::{NamespaceSet, spawn_isolated};
        use nix::fcntl::OFlag;

        if cmd.is_empty() {
            return Err(MiniboxError::Config {
                message: "container command must not be empty".into(),
            });
        }

        let (gate_read, gate_write) =
            nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(|e| MiniboxError::PermissionDenied {
                message: format!("cannot create start gate: {e}"),
            })?;
        let exe = cstring(SELF_EXE.as_bytes())?;
        let argv = self.init_argv(id, rootfs, cmd)?;
        let (stdin, output) = match stdio {
            StdioMode::Interactive => (None, None),
            StdioMode::Detached { log } => {
                let null = File::open("/dev/null").map_err(|e| MiniboxError::io("/dev/null", e))?;
                let out = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(log)
                    .map_err(|e| MiniboxError::io(log, e))?;
                (Some(null), Some(out))
            }
        };

        let gate_fd = gate_read.as_raw_fd();
        let stdin_fd = stdin.as_ref().map(AsRawFd::as_raw_fd);
        let output_fd = output.as_ref().map(AsRawFd::as_raw_fd);

        let pid = spawn_isolated(&NamespaceSet::container(), || {
            // SAFETY: dup2 and fcntl only touch this child's descriptor
            // table; every descriptor is open for the duration of the call.
            unsafe {
                if let Some(fd) = stdin_fd {
                    let _ = libc::dup2(fd, libc::STDIN_FILENO);
                }
                if let Some(fd) = output_fd {
                    let _ = libc::dup2(fd, libc::STDOUT_FILENO);
                    let _ = libc::dup2(fd, libc::STDERR_FILENO);
                }
                if gate_fd == START_GATE_FD {
                    let _ = libc::fcntl(gate_fd, libc::F_SETFD, 0);
                } else if libc::dup2(gate_fd, START_GATE_FD) < 0 {
                    return 126;
                }
            }
            let _ = nix::unistd::execv(&exe, &argv);
            127
        })?;
        drop(gate_read);

        tracing::info!(id = %id, pid, phase = ?InitPhase::Spawned, "container process created");
        Ok(Spawned {
            pid,
            gate: StartGate {
                writer: Some(gate_write),
            },
        })
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error because namespaces require Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn start_container(
        &self,
        _id: &ContainerId,
        _rootfs: &Path,
        _cmd: &[String],
        _stdio: &StdioMode,
    ) -> Result<Spawned> {
        Err(MiniboxError::Config {
            message: "Linux required for native container operations".into(),
        })
    }

    /// Runs the setup sequence inside the new namespaces and replaces the
    /// process image with `cmd`.
    ///
    /// Waits on the gate inherited as `gate_fd`, then sets the hostname to
    /// the container ID, switches root, mounts the pseudo-filesystems,
    /// and executes the command. Only returns on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the gate closes unreleased or any fatal step
    /// fails; the caller must then exit non-zero.
    pub fn init_process(
        &self,
        id: &ContainerId,
        rootfs: &Path,
        cmd: &[String],
        gate_fd: i32,
    ) -> Result<Infallible> {
        wait_for_gate(gate_fd)?;

        self.system.set_hostname(id.as_str())?;
        tracing::debug!(id = %id, phase = ?InitPhase::Init, "hostname set");

        self.system.switch_root(rootfs)?;
        self.init_container(Path::new("/"))?;
        tracing::debug!(id = %id, phase = ?InitPhase::FilesystemReady, "filesystem ready");

        self.exec_command(cmd)
    }

    /// Enters an existing container's filesystem and replaces the process
    /// image with `cmd`.
    ///
    /// Sets the hostname and switches root, but creates and joins no
    /// namespace and mounts nothing; the caller supplies any isolation.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn exec_in_container(&self, id: &ContainerId, rootfs: &Path, cmd: &[String]) -> Result<Infallible> {
        self.system.set_hostname(id.as_str())?;
        self.system.switch_root(rootfs)?;
        self.exec_command(cmd)
    }

    /// Mounts the pseudo-filesystems below `rootfs` without any other
    /// isolation step.
    ///
    /// # Errors
    ///
    /// Returns an error if the process-information filesystem cannot be
    /// mounted.
    pub fn init_container(&self, rootfs: &Path) -> Result<()> {
        mount_pseudo_filesystems(&self.system, rootfs, &self.mounts)
    }

    /// Resolves `cmd[0]` on the configured search path.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is empty or not found.
    pub fn resolve_command(&self, cmd: &[String]) -> Result<PathBuf> {
        let program = cmd.first().ok_or_else(|| MiniboxError::Config {
            message: "container command must not be empty".into(),
        })?;
        which::which_in(program, Some(&self.exec.search_path), "/").map_err(|_| {
            MiniboxError::NotFound {
                kind: "command",
                id: program.clone(),
            }
        })
    }

    fn exec_command(&self, cmd: &[String]) -> Result<Infallible> {
        let program = self.resolve_command(cmd)?;
        let path = cstring(program.as_os_str().as_bytes())?;
        let argv = cmd
            .iter()
            .map(|a| cstring(a.as_bytes()))
            .collect::<Result<Vec<_>>>()?;
        let env = self
            .exec
            .env
            .iter()
            .map(|e| cstring(e.as_bytes()))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(program = %program.display(), phase = ?InitPhase::Running, "replacing process image");
        self.system.execve(&path, &argv, &env)
    }
}

/// Blocks until the runtime releases the gate on `fd`.
fn wait_for_gate(fd: i32) -> Result<()> {
    use std::os::fd::FromRawFd;

    // SAFETY: the descriptor was placed at this number by the parent for
    // this process alone; nothing else in the process owns it.
    let mut gate = unsafe { File::from_raw_fd(fd) };
    let mut byte = [0_u8; 1];
    let read = gate.read(&mut byte).map_err(|e| MiniboxError::io("start gate", e))?;
    if read == 0 {
        return Err(MiniboxError::Config {
            message: "runtime aborted the start before release".into(),
        });
    }
    Ok(())
}

fn cstring(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|_| MiniboxError::Config {
        message: format!("argument contains a NUL byte: {}", String::from_utf8_lossy(bytes)),
    })
}
