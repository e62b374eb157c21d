//! `minibox exec`: Run a command inside a container's filesystem.

use clap::Args;

use super::{GlobalArgs, parse_id};

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container ID.
    pub container: String,

    /// Command to execute.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command and exits with the command's status.
///
/// The command runs in the container's root filesystem with its
/// hostname, but outside its process, mount, and network namespaces.
///
/// # Errors
///
/// Returns an error if the container is unknown or the command cannot be
/// started.
pub fn execute(args: ExecArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.container)?;
    let code = global.manager()?.exec(&id, &args.command)?;
    std::process::exit(code);
}
