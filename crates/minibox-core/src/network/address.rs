//! Deterministic container addressing.

use std::net::Ipv4Addr;

/// Computes the container address for init process `pid`.
///
/// The last octet is `pid % 254 + 2`, so it never lands on the network
/// address or the gateway. PIDs congruent modulo 254 share an address;
/// no allocation table exists to detect that.
#[must_use]
pub fn container_address(base: Ipv4Addr, pid: u32) -> Ipv4Addr {
    let [a, b, c, _] = base.octets();
    // pid % 254 + 2 is at most 255.
    let host = u8::try_from(pid % 254 + 2).unwrap_or(u8::MAX);
    Ipv4Addr::new(a, b, c, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Ipv4Addr = Ipv4Addr::new(172, 17, 0, 0);

    #[test]
    fn offsets_past_network_and_gateway() {
        assert_eq!(container_address(BASE, 0), Ipv4Addr::new(172, 17, 0, 2));
        assert_eq!(container_address(BASE, 253), Ipv4Addr::new(172, 17, 0, 255));
    }

    #[test]
    fn congruent_pids_collide() {
        assert_eq!(container_address(BASE, 2), Ipv4Addr::new(172, 17, 0, 4));
        assert_eq!(container_address(BASE, 2), container_address(BASE, 256));
        assert_eq!(container_address(BASE, 254), container_address(BASE, 508));
        assert_ne!(container_address(BASE, 2), container_address(BASE, 3));
    }
}
