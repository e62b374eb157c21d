//! Per-container veth pairs.

use std::sync::PoisonError;

use minibox_common::error::Result;
use minibox_common::types::ContainerId;

use super::address::container_address;
use super::{HostNet, NetworkFabric};
use crate::namespace::netns::NETNS_LOCK;
use crate::teardown::TeardownStack;

/// Temporary name of the container end until it is renamed in place.
const PEER_PREFIX: &str = "vpeer_";

/// Filter and NAT tables scanned for rules naming a detached interface.
const IPTABLES_TABLES: [&str; 2] = ["filter", "nat"];

impl<H: HostNet> NetworkFabric<H> {
    /// Host-side interface name of a container's veth pair.
    ///
    /// Only the first 8 characters of the ID are used. IDs are nanosecond
    /// timestamps, so containers created within roughly 100 seconds of
    /// each other get the same name, and the later `attach` fails at
    /// `ip link add` until the earlier container is detached.
    #[must_use]
    pub fn host_ifname(&self, id: &ContainerId) -> String {
        format!("{}{}", self.config.veth_prefix, id.short())
    }

    fn peer_ifname(id: &ContainerId) -> String {
        format!("{PEER_PREFIX}{}", id.short())
    }

    /// Connects the network namespace of `pid` to the shared bridge.
    ///
    /// The namespace is addressed by PID; if the process has exited the
    /// move fails, if the PID was reused the wrong namespace is wired.
    /// Any failure deletes the veth pair again.
    ///
    /// # Errors
    ///
    /// Returns an error if any device, address, or route step fails.
    pub fn attach(&self, id: &ContainerId, pid: u32) -> Result<()> {
        let host_if = self.host_ifname(id);
        let peer_if = Self::peer_ifname(id);
        let pid_arg = pid.to_string();
        let ifname = self.config.container_ifname.as_str();
        let address = format!(
            "{}/{}",
            container_address(self.config.container_base, pid),
            self.config.container_prefix_len
        );
        let gateway = self.config.gateway.to_string();

        let mut teardown = TeardownStack::new("network");
        let _ = self.ip(&["link", "add", &host_if, "type", "veth", "peer", "name", &peer_if])?;
        let undo_if = host_if.clone();
        teardown.push("veth pair", move || self.ip(&["link", "del", &undo_if]).map(|_| ()));

        let _ = self.ip(&["link", "set", &peer_if, "netns", &pid_arg])?;
        let _ = self.ip(&["link", "set", &host_if, "master", &self.config.bridge])?;
        let _ = self.ip(&["link", "set", &host_if, "up"])?;

        {
            let _switching = NETNS_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            let netns = self.host.enter_netns(pid)?;
            let _ = self.ip(&["link", "set", &peer_if, "name", ifname])?;
            let _ = self.ip(&["addr", "add", &address, "dev", ifname])?;
            let _ = self.ip(&["link", "set", ifname, "up"])?;
            let _ = self.ip(&["link", "set", "lo", "up"])?;
            let _ = self.ip(&["route", "add", "default", "via", &gateway])?;
            netns.restore()?;
        }

        teardown.commit();
        tracing::info!(id = %id, pid, veth = %host_if, %address, "container network attached");
        Ok(())
    }

    /// Removes a container's veth pair and any rules or routes naming it.
    ///
    /// An already-missing interface counts as success. Rule and route
    /// cleanup is best effort.
    ///
    /// # Errors
    ///
    /// Returns an error only if the interface exists and cannot be deleted.
    pub fn detach(&self, id: &ContainerId) -> Result<()> {
        let host_if = self.host_ifname(id);
        match self.ip(&["link", "del", &host_if]) {
            Ok(_) => tracing::debug!(veth = %host_if, "veth deleted"),
            Err(e) if e.is_not_found() => tracing::debug!(veth = %host_if, "veth already gone"),
            Err(e) => return Err(e),
        }

        for table in IPTABLES_TABLES {
            self.remove_rules(table, &host_if);
        }
        self.remove_routes(&host_if);
        tracing::info!(id = %id, veth = %host_if, "container network detached");
        Ok(())
    }

    fn remove_rules(&self, table: &str, ifname: &str) {
        let rules = match self.host.run("iptables", &["-t", table, "-S"]) {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!(table, error = %e, "cannot list iptables rules");
                return;
            }
        };
        for rule in rules.lines().filter(|r| names_interface(r, ifname)) {
            let Some(spec) = rule.strip_prefix("-A ") else {
                continue;
            };
            let mut args = vec!["-t", table, "-D"];
            args.extend(spec.split_whitespace());
            if let Err(e) = self.host.run("iptables", &args) {
                tracing::warn!(table, rule, error = %e, "cannot delete iptables rule");
            }
        }
    }

    fn remove_routes(&self, ifname: &str) {
        let routes = match self.ip(&["route", "show", "dev", ifname]) {
            Ok(routes) => routes,
            Err(e) if e.is_not_found() => return,
            Err(e) => {
                tracing::warn!(veth = ifname, error = %e, "cannot list routes");
                return;
            }
        };
        for route in routes.lines().map(str::trim).filter(|r| !r.is_empty()) {
            let mut args = vec!["route", "del"];
            args.extend(route.split_whitespace());
            args.extend(["dev", ifname]);
            if let Err(e) = self.ip(&args) {
                tracing::warn!(veth = ifname, route, error = %e, "cannot delete route");
            }
        }
    }
}

fn names_interface(rule: &str, ifname: &str) -> bool {
    rule.split_whitespace().any(|word| word == ifname)
}
