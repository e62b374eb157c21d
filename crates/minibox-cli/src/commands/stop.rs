//! `minibox stop`: Stop running containers.

use clap::Args;

use super::{GlobalArgs, parse_id};

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// IDs of the containers to stop.
    #[arg(required = true)]
    pub containers: Vec<String>,
}

/// Executes the `stop` command.
///
/// Containers are stopped in the order given; the first failure ends the
/// command.
///
/// # Errors
///
/// Returns an error if a container is unknown or cannot be signaled.
pub fn execute(args: StopArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let manager = global.manager()?;
    for raw in &args.containers {
        let id = parse_id(raw)?;
        let status = manager.stop(&id)?;
        crate::output::print_line(&format!("{id} {status}"));
    }
    Ok(())
}
