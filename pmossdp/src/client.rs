/*!
One-shot discovery of DIAL receivers.

The client is a *control point*: it binds an ephemeral port, never 1900.
A socket on 1900 would compete with a local responder, and the kernel
load-balances datagrams between sockets sharing a port, so replies would be
lost at random. Replies to an M-SEARCH are unicast to the sender's port
anyway, so no multicast membership is needed either.
*/

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, trace, warn};

use crate::codec::{build_msearch, matching_location, parse_headers};
use crate::{SsdpConfig, SsdpError};

const RECV_BUFFER_SIZE: usize = 8192;
const MULTICAST_TTL: u32 = 4;

/// Options of a single [`discover`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverOptions {
    /// Stop as soon as this many replies were collected. `None` and
    /// `Some(0)` both mean "until the deadline".
    pub max_devices: Option<usize>,
    /// Collection window, measured from the moment the request is sent
    pub timeout: Duration,
    /// Log every raw reply at `info` level instead of `trace`
    pub verbose: bool,
}

impl DiscoverOptions {
    /// Default options for `config`: no limit, timeout of MX + 1 s.
    pub fn from_config(config: &SsdpConfig) -> Self {
        Self {
            max_devices: None,
            timeout: config.discover_timeout,
            verbose: false,
        }
    }

    pub fn max_devices(mut self, max_devices: usize) -> Self {
        self.max_devices = Some(max_devices);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn limit(&self) -> Option<usize> {
        self.max_devices.filter(|max| *max > 0)
    }
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self::from_config(&SsdpConfig::default())
    }
}

/// Sends one M-SEARCH and returns the device description URLs heard.
///
/// Replies are accepted only when they carry a `LOCATION` and an `ST` equal
/// to `config.search_target`; anything else is dropped silently. The request
/// is never resent. URLs are returned in arrival order and are **not**
/// deduplicated: a device answering twice appears twice.
///
/// Returns after `options.timeout`, or earlier once `options.max_devices`
/// replies were collected.
///
/// # Errors
///
/// Only socket setup and the initial send can fail.
///
/// ```no_run
/// use pmossdp::{DiscoverOptions, SsdpConfig, discover};
///
/// let config = SsdpConfig::default();
/// let urls = discover(&config, &DiscoverOptions::from_config(&config))?;
/// for url in urls {
///     println!("{}", url);
/// }
/// # Ok::<(), pmossdp::SsdpError>(())
/// ```
pub fn discover(config: &SsdpConfig, options: &DiscoverOptions) -> Result<Vec<String>, SsdpError> {
    let socket = open_socket()?;
    let request = build_msearch(config);

    socket.send_to(request.as_bytes(), config.group_addr())?;
    let start = Instant::now();
    info!(
        "📤 M-SEARCH sent to {} (ST={}, MX={})",
        config.group_addr(),
        config.search_target,
        config.mx
    );

    let devices = collect_replies(&socket, config, options, start);
    info!("🔍 Discovery finished: {} device(s)", devices.len());
    Ok(devices)
}

fn open_socket() -> Result<UdpSocket, SsdpError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&bind_addr.into())?;
    socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
    Ok(socket.into())
}

fn collect_replies(
    socket: &UdpSocket,
    config: &SsdpConfig,
    options: &DiscoverOptions,
    start: Instant,
) -> Vec<String> {
    let mut devices = Vec::new();
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    loop {
        let Some(remaining) = options.timeout.checked_sub(start.elapsed()) else {
            return devices;
        };
        if remaining.is_zero() {
            return devices;
        }

        // The readiness wait shrinks with the time already spent
        if let Err(e) = socket.set_read_timeout(Some(remaining)) {
            warn!("❌ Failed to set SSDP read timeout: {}", e);
            return devices;
        }

        let (n, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(e) => {
                // ICMP errors surface here on some platforms; keep listening
                debug!("SSDP receive error: {}", e);
                continue;
            }
        };

        let data = String::from_utf8_lossy(&buf[..n]);
        if options.verbose {
            info!("📥 SSDP reply from {}:\n{}", from, data);
        } else {
            trace!("📥 SSDP reply from {}:\n{}", from, data);
        }

        let headers = parse_headers(&data);
        if let Some(location) = matching_location(&headers, &config.search_target) {
            debug!("Found DIAL device at {} (from {})", location, from);
            devices.push(location);

            if options.limit() == Some(devices.len()) {
                return devices;
            }
        }
    }
}
