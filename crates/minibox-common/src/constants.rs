//! System-wide constants and default paths.

/// Default storage root on a Linux host with root access.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/minibox";

/// Cgroup filesystem mount point.
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Path the runtime re-executes to enter the init phase.
pub const SELF_EXE: &str = "/proc/self/exe";

/// Subcommand marker that dispatches a re-executed binary into init.
pub const INIT_MARKER: &str = "init";

/// File descriptor number the start gate is handed to the init process on.
pub const START_GATE_FD: i32 = 3;

/// Per-container metadata document name.
pub const RECORD_FILE: &str = "container.json";

/// Per-container lock file guarding record read-modify-write.
pub const LOCK_FILE: &str = ".lock";

/// Per-container output log for non-interactive containers.
pub const LOG_FILE: &str = "container.log";

/// Directory name of a container's private root filesystem copy.
pub const ROOTFS_DIR: &str = "rootfs";

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_ENV: &str = "MINIBOX_CONFIG";

/// Application name used in CLI output and cgroup names.
pub const APP_NAME: &str = "minibox";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "minibox";
