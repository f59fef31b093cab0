// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! IPv4 and MAC addresses of physical network adapters.

use tracing::debug;

/// Name prefixes of loopback, virtual, bridge and tunnel adapters.
const VIRTUAL_INTERFACE_PREFIXES: [&str; 22] = [
    "lo", "docker", "veth", "br-", "virbr", "vmnet", "vboxnet", "tun", "tap", "utun", "cni",
    "flannel", "cali", "weave", "kube", "vxlan", "gre", "sit", "ip6tnl", "dummy", "awdl", "llw",
];

/// Heuristic on the adapter name only; loopback flags are checked separately.
#[must_use]
pub fn is_physical_interface(name: &str) -> bool {
    !name.is_empty()
        && !VIRTUAL_INTERFACE_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

/// Addresses of physical adapters in adapter enumeration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterfaceAddresses {
    pub ipv4: Vec<String>,
    pub mac: Vec<String>,
}

#[must_use]
pub fn format_mac(octets: [u8; 6]) -> String {
    octets
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(unix)]
pub fn physical_interface_addresses() -> InterfaceAddresses {
    use nix::ifaddrs::getifaddrs;
    use nix::net::if_::InterfaceFlags;
    use std::net::SocketAddrV4;

    let mut addresses = InterfaceAddresses::default();
    let ifaddrs = match getifaddrs() {
        Ok(ifaddrs) => ifaddrs,
        Err(e) => {
            debug!("Could not enumerate network interfaces: {e}");
            return addresses;
        }
    };

    let mut seen_mac_interfaces: Vec<String> = Vec::new();
    for ifaddr in ifaddrs {
        if ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK)
            || !is_physical_interface(&ifaddr.interface_name)
        {
            continue;
        }
        let Some(address) = ifaddr.address else {
            continue;
        };

        if let Some(sin) = address.as_sockaddr_in() {
            let ip = SocketAddrV4::from(*sin).ip().to_string();
            addresses.ipv4.push(ip);
        } else if let Some(mac) = address.as_link_addr().and_then(|link| link.addr()) {
            if mac == [0; 6] || seen_mac_interfaces.contains(&ifaddr.interface_name) {
                continue;
            }
            seen_mac_interfaces.push(ifaddr.interface_name.clone());
            addresses.mac.push(format_mac(mac));
        }
    }
    addresses
}

#[cfg(not(unix))]
pub fn physical_interface_addresses() -> InterfaceAddresses {
    debug!("Network interface enumeration is not supported on this platform");
    InterfaceAddresses::default()
}
