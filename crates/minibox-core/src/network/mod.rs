//! Container networking: one shared bridge, one veth pair per container.
//!
//! All device manipulation goes through the host's `ip` and `iptables`
//! tools behind the [`HostNet`] seam, so the sequencing and rollback
//! logic can be exercised without privileges.

pub mod address;
pub mod bridge;
pub mod veth;

use minibox_common::config::NetworkConfig;
use minibox_common::error::Result;

use crate::namespace::netns::NetnsGuard;

/// Host operations the network fabric depends on.
pub trait HostNet: Send + Sync {
    /// Runs a host tool and returns its standard output.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool is missing or exits unsuccessfully.
    fn run(&self, program: &str, args: &[&str]) -> Result<String>;

    /// Switches the calling thread into the network namespace of `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace cannot be entered.
    fn enter_netns(&self, pid: u32) -> Result<NetnsGuard>;
}

/// The real host: tools from `PATH`, namespaces via `setns(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostNet;

impl HostNet for SystemHostNet {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        crate::tool::run(program, args)
    }

    fn enter_netns(&self, pid: u32) -> Result<NetnsGuard> {
        NetnsGuard::enter(pid)
    }
}

/// Owns the shared bridge and the per-container veth attachments.
#[derive(Debug, Clone)]
pub struct NetworkFabric<H = SystemHostNet> {
    config: NetworkConfig,
    host: H,
}

impl NetworkFabric<SystemHostNet> {
    /// Creates a fabric operating on the real host.
    #[must_use]
    pub const fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            host: SystemHostNet,
        }
    }
}

impl<H: HostNet> NetworkFabric<H> {
    /// Creates a fabric on top of an arbitrary host implementation.
    #[must_use]
    pub const fn with_host(config: NetworkConfig, host: H) -> Self {
        Self { config, host }
    }

    /// Returns the network settings in use.
    #[must_use]
    pub const fn config(&self) -> &NetworkConfig {
        &self.config
    }

    fn ip(&self, args: &[&str]) -> Result<String> {
        self.host.run("ip", args)
    }
}
