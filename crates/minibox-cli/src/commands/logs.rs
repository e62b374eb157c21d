//! `minibox logs`: Print a detached container's output.

use clap::Args;

use super::{GlobalArgs, parse_id};

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container ID.
    pub container: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or was started
/// interactively.
pub fn execute(args: LogsArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.container)?;
    let logs = global.manager()?.logs(&id)?;
    crate::output::print_block(&logs);
    Ok(())
}
