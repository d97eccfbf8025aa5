//! Pin the HTTP listener to one network interface.

use garagemon_core::GarageError;
use std::net::{IpAddr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Replace the host part of `http` with the first address of `interface`,
/// keeping the port. IPv4 addresses win over IPv6.
pub fn restrict_to_interface(http: &str, interface: &str) -> Result<String, GarageError> {
    let fail = |reason: String| GarageError::Interface {
        addr: http.to_string(),
        interface: interface.to_string(),
        reason,
    };

    let port = port_of(http).ok_or_else(|| fail("address has no port".to_string()))?;
    let addrs = nix::ifaddrs::getifaddrs()
        .map_err(|e| fail(format!("listing interfaces: {e}")))?
        .filter_map(|ifa| {
            let ip = ifa.address.as_ref().and_then(|storage| {
                if let Some(sin) = storage.as_sockaddr_in() {
                    Some(IpAddr::V4(*SocketAddrV4::from(*sin).ip()))
                } else {
                    storage
                        .as_sockaddr_in6()
                        .map(|sin6| IpAddr::V6(*SocketAddrV6::from(*sin6).ip()))
                }
            })?;
            Some((ifa.interface_name, ip))
        });

    let ip = pick_address(addrs, interface)
        .ok_or_else(|| fail("no IP address found on interface".to_string()))?;
    let restricted = SocketAddr::new(ip, port).to_string();
    tracing::info!("Restricting HTTP listener to {restricted} ({interface})");
    Ok(restricted)
}

fn port_of(http: &str) -> Option<u16> {
    let (_, port) = http.rsplit_once(':')?;
    port.parse().ok()
}

fn pick_address<I>(addrs: I, interface: &str) -> Option<IpAddr>
where
    I: IntoIterator<Item = (String, IpAddr)>,
{
    let mut v6 = None;
    for (name, ip) in addrs {
        if name != interface {
            continue;
        }
        match ip {
            IpAddr::V4(_) => return Some(ip),
            IpAddr::V6(_) => {
                v6.get_or_insert(ip);
            }
        }
    }
    v6
}
