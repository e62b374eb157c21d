//! `minibox init`: Entry point of a container's init process.
//!
//! The runtime re-executes itself with this subcommand inside the new
//! namespaces. On success the process image is replaced by the container
//! command, so this only ever returns an error.

use std::path::PathBuf;

use clap::Args;
use minibox_common::constants::START_GATE_FD;
use minibox_runtime::isolation::ProcessIsolationEngine;

use super::{GlobalArgs, parse_id};

/// Arguments for the `init` command.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Container ID, used as the hostname.
    pub id: String,

    /// Root filesystem to switch into.
    pub rootfs: PathBuf,

    /// Container command.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `init` command.
///
/// # Errors
///
/// Returns an error if the start is aborted or any setup step fails.
pub fn execute(args: InitArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let config = global.runtime_config()?;
    let id = parse_id(&args.id)?;
    let engine = ProcessIsolationEngine::new(config.mounts, config.exec);
    match engine.init_process(&id, &args.rootfs, &args.command, START_GATE_FD)? {}
}
