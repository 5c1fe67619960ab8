use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Probe target used to ask the kernel for the outgoing interface.
/// No packet is sent: connecting a UDP socket only selects a route.
const ROUTE_PROBE: &str = "8.8.8.8:80";

/// Guesses the local IPv4 address other LAN hosts can reach us on.
///
/// Connects an unbound UDP socket towards a public address and reads back
/// the local address the kernel picked. Falls back to `127.0.0.1` when the
/// host has no route.
///
/// Used to build the `LOCATION` URL advertised by the SSDP responder when
/// none is configured.
///
/// ```
/// let ip = pmoutils::guess_local_ip();
/// assert!(ip.is_ipv4());
/// ```
pub fn guess_local_ip() -> IpAddr {
    probe_route(ROUTE_PROBE).unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn probe_route(target: &str) -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(target).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() { None } else { Some(ip) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_local_ip_is_ipv4() {
        assert!(guess_local_ip().is_ipv4());
    }

    #[test]
    fn test_probe_loopback_route() {
        let ip = probe_route("127.0.0.1:9").expect("loopback is always routable");
        assert!(ip.is_loopback());
    }

    #[test]
    fn test_probe_rejects_garbage_target() {
        assert!(probe_route("not-an-address").is_none());
    }
}
