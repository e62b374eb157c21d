//! The shared host bridge.

use minibox_common::error::Result;

use super::{HostNet, NetworkFabric};

impl<H: HostNet> NetworkFabric<H> {
    /// Creates and brings up the shared bridge unless it already exists.
    ///
    /// A half-configured bridge created by this call is deleted again.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge cannot be created, addressed, or
    /// brought up.
    pub fn ensure_bridge(&self) -> Result<()> {
        let bridge = self.config.bridge.as_str();
        if self.ip(&["link", "show", bridge]).is_ok() {
            tracing::debug!(bridge, "bridge already present");
            return Ok(());
        }

        let _ = self.ip(&["link", "add", "name", bridge, "type", "bridge"])?;
        let configured = self
            .ip(&["addr", "add", &self.config.bridge_cidr, "dev", bridge])
            .and_then(|_| self.ip(&["link", "set", bridge, "up"]));
        if let Err(e) = configured {
            if let Err(cleanup) = self.ip(&["link", "del", bridge]) {
                tracing::warn!(bridge, error = %cleanup, "could not delete half-configured bridge");
            }
            return Err(e);
        }
        tracing::info!(bridge, cidr = %self.config.bridge_cidr, "bridge created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use minibox_common::config::NetworkConfig;

    use super::*;
    use crate::network::testing::RecordingHost;

    #[test]
    fn existing_bridge_is_left_alone() {
        let fabric = NetworkFabric::with_host(NetworkConfig::default(), RecordingHost::default());
        fabric.ensure_bridge().unwrap();
        assert_eq!(fabric.host.calls(), vec!["ip link show minibox0"]);
    }

    #[test]
    fn missing_bridge_is_created_and_addressed() {
        let host = RecordingHost::failing("link show", "Device \"minibox0\" does not exist.");
        let fabric = NetworkFabric::with_host(NetworkConfig::default(), host);
        fabric.ensure_bridge().unwrap();
        assert_eq!(
            fabric.host.calls(),
            vec![
                "ip link show minibox0",
                "ip link add name minibox0 type bridge",
                "ip addr add 172.17.0.1/24 dev minibox0",
                "ip link set minibox0 up",
            ]
        );
    }

    #[test]
    fn failed_address_deletes_bridge() {
        let mut host = RecordingHost::failing("link show", "Device \"minibox0\" does not exist.");
        host.fail_on.push(("addr add".into(), "RTNETLINK answers: File exists".into()));
        let fabric = NetworkFabric::with_host(NetworkConfig::default(), host);
        assert!(fabric.ensure_bridge().is_err());
        assert_eq!(fabric.host.calls().last().unwrap(), "ip link del minibox0");
    }
}
