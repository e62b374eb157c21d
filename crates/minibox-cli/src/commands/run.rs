//! `minibox run`: Create and start a container.

use clap::Args;

use super::GlobalArgs;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Container name; defaults to the image reference.
    #[arg(long)]
    pub name: Option<String>,

    /// Image to create the container from.
    #[arg(long, default_value = "busybox")]
    pub image: String,

    /// Attach the container to this terminal and wait for it to exit.
    #[arg(short, long, visible_alias = "it")]
    pub interactive: bool,

    /// Command to run inside the container.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `run` command.
///
/// A detached container prints its ID and keeps running after this
/// process exits. An interactive container shares the terminal; this
/// process waits for it and exits with its status.
///
/// # Errors
///
/// Returns an error if the container cannot be created.
pub fn execute(args: RunArgs, global: &GlobalArgs) -> anyhow::Result<()> {
    let manager = global.manager()?;
    let name = args.name.as_deref().unwrap_or(&args.image);
    let launched = manager.create(name, &args.image, &args.command, args.interactive)?;

    if !args.interactive {
        crate::output::print_line(launched.id.as_str());
        return Ok(());
    }

    // The terminal delivers Ctrl-C to the container too; only it should react.
    ctrlc::set_handler(|| {})?;
    let code = manager.wait(&launched)?;
    std::process::exit(code);
}
