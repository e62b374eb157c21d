//! `minibox ps`: List containers.

use clap::Args;
use minibox_common::types::ContainerStatus;

use super::GlobalArgs;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Only show running containers.
    #[arg(long)]
    pub running: bool,
}

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the containers directory cannot be read.
pub fn execute(args: PsArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let containers = global.manager()?.list()?;
    let rows: Vec<_> = containers
        .into_iter()
        .filter(|c| !args.running || c.status == ContainerStatus::Running)
        .collect();
    crate::output::print_block(&crate::output::container_table(&rows));
    Ok(())
}
