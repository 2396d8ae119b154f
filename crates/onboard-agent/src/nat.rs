//! Detection of network address translation between the device and the
//! controller.

use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// Resolves the controller-observed client address to an IP.
///
/// Accepts `ip:port`, a bare IP, or a resolvable `host:port`.
pub fn resolve_client_addr(addr: &str) -> io::Result<IpAddr> {
    let addr = addr.trim();
    if let Ok(socket) = addr.parse::<SocketAddr>() {
        return Ok(socket.ip());
    }
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return Ok(ip);
    }
    addr.to_socket_addrs()?
        .next()
        .map(|socket| socket.ip())
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing"))
}

/// Addresses of the local interfaces, loopback excluded.
pub fn local_addresses() -> Vec<IpAddr> {
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => interfaces
            .into_iter()
            .map(|(_, ip)| ip)
            .filter(|ip| !ip.is_loopback())
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to list local interface addresses");
            Vec::new()
        }
    }
}

/// Whether the controller saw an address this device does not own.
pub fn is_behind_nat(observed: IpAddr, local: &[IpAddr]) -> bool {
    !local.contains(&observed)
}
