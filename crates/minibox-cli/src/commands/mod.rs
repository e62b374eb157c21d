//! CLI command definitions and dispatch.

pub mod exec;
pub mod init;
pub mod logs;
pub mod ps;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use minibox_common::config::RuntimeConfig;
use minibox_common::constants::CONFIG_ENV;
use minibox_common::types::ContainerId;
use minibox_image::LocalImageStore;
use minibox_runtime::backend::LinuxBackend;
use minibox_runtime::manager::ContainerManager;

/// Minimal daemon-less container runtime.
#[derive(Parser, Debug)]
#[command(name = "minibox", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options accepted before or after any subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// JSON configuration file.
    #[arg(long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Storage root overriding the configured images, containers, and
    /// blobs directories.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl GlobalArgs {
    /// Loads the runtime configuration these options select.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read.
    pub fn runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let config = RuntimeConfig::load(self.config.as_deref())
            .with_context(|| format!("loading configuration {:?}", self.config))?;
        Ok(match &self.root {
            Some(root) => config.with_storage_root(root),
            None => config,
        })
    }

    /// Builds the container manager for this host.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn manager(&self) -> anyhow::Result<ContainerManager<LinuxBackend, LocalImageStore>> {
        let config = self.runtime_config()?;
        Ok(ContainerManager::linux(&config, self.config.as_deref()))
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start a container.
    Run(run::RunArgs),
    /// List containers.
    Ps(ps::PsArgs),
    /// Stop running containers.
    Stop(stop::StopArgs),
    /// Run a command inside a container's filesystem.
    Exec(exec::ExecArgs),
    /// Print the captured output of a detached container.
    Logs(logs::LogsArgs),
    /// Container init process; invoked by the runtime, not by users.
    #[command(hide = true)]
    Init(init::InitArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let global = cli.global;
    match cli.command {
        Command::Run(args) => run::execute(args, &global),
        Command::Ps(args) => ps::execute(args, &global),
        Command::Stop(args) => stop::execute(args, &global),
        Command::Exec(args) => exec::execute(args, &global),
        Command::Logs(args) => logs::execute(args, &global),
        Command::Init(args) => init::execute(args, &global),
    }
}

/// Parses a container ID given on the command line.
fn parse_id(raw: &str) -> anyhow::Result<ContainerId> {
    Ok(ContainerId::parse(raw)?)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_collects_trailing_command() {
        let cli = Cli::parse_from(["minibox", "run", "--name", "box", "-i", "/bin/sh", "-c", "echo hi"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.name.as_deref(), Some("box"));
        assert!(args.interactive);
        assert_eq!(args.image, "busybox");
        assert_eq!(args.command, vec!["/bin/sh", "-c", "echo hi"]);
    }

    #[test]
    fn init_is_parsed_after_global_config() {
        let cli = Cli::parse_from([
            "minibox", "--config", "/etc/minibox.json", "init", "42", "/rootfs", "--", "/bin/echo", "hi",
        ]);
        assert_eq!(cli.global.config, Some(PathBuf::from("/etc/minibox.json")));
        let Command::Init(args) = cli.command else {
            panic!("expected init");
        };
        assert_eq!(args.id, "42");
        assert_eq!(args.command, vec!["/bin/echo", "hi"]);
    }

    #[test]
    fn root_override_rebases_storage() {
        let global = GlobalArgs {
            config: None,
            root: Some(PathBuf::from("/tmp/mb")),
            log_json: false,
        };
        let config = global.runtime_config().unwrap();
        assert_eq!(config.storage.containers, PathBuf::from("/tmp/mb/containers"));
    }

    #[test]
    fn invalid_id_is_rejected() {
        assert!(parse_id("../x").is_err());
        assert!(parse_id("1712345678901234567").is_ok());
    }
}
