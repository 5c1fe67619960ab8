//! SSDP responder advertising a DIAL device.
//!
//! The responder answers `M-SEARCH` requests for the DIAL search target
//! with the device description URL. A requester's `MX` bounds a random
//! reply delay; each request is handled by its own task so a long delay
//! never holds back the receive loop or other replies.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::codec::{SearchReply, is_search_request, parse_headers, parse_mx, server_token};
use crate::{DEFAULT_CACHE_MAX_AGE, DEFAULT_MAX_REPLY_DELAY, SsdpConfig, SsdpError};

const RECV_BUFFER_SIZE: usize = 8192;
const MULTICAST_TTL: u32 = 255;

/// What the responder advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderConfig {
    /// Device description URL sent as `LOCATION`
    pub device_url: String,
    pub product_id: String,
    pub product_version: String,
    pub os_id: String,
    pub os_version: String,
    /// `CACHE-CONTROL: max-age` value
    pub cache_expire_seconds: u32,
    /// UUID of this responder instance, without the `uuid:` prefix
    pub instance_uuid: String,
    /// Delay bound (seconds) for requests without a usable `MX`, and
    /// ceiling for the `MX` a requester may ask for
    pub default_max_delay: u32,
    pub bind_host: Ipv4Addr,
}

impl ResponderConfig {
    pub fn new(device_url: impl Into<String>) -> Self {
        let (os_id, os_version) = pmoutils::os_identity();
        Self {
            device_url: device_url.into(),
            product_id: "PMODial".to_string(),
            product_version: env!("CARGO_PKG_VERSION").to_string(),
            os_id,
            os_version,
            cache_expire_seconds: DEFAULT_CACHE_MAX_AGE,
            instance_uuid: Uuid::new_v4().to_string(),
            default_max_delay: DEFAULT_MAX_REPLY_DELAY,
            bind_host: Ipv4Addr::UNSPECIFIED,
        }
    }

    /// `SERVER` header value
    pub fn server(&self) -> String {
        server_token(
            &self.product_id,
            &self.product_version,
            &self.os_id,
            &self.os_version,
        )
    }
}

/// Immutable state shared by every reply task once serving starts.
#[derive(Debug)]
struct ResponderCore {
    ssdp: SsdpConfig,
    config: ResponderConfig,
}

impl ResponderCore {
    /// Reply delay for an incoming datagram, or `None` if it gets no reply.
    fn plan_reply(&self, data: &str) -> Option<Duration> {
        if !is_search_request(data) {
            trace!("Ignoring non M-SEARCH datagram");
            return None;
        }

        let headers = parse_headers(data);
        match headers.get("ST") {
            Some(st) if *st == self.ssdp.search_target => {}
            Some(st) => {
                trace!("Ignoring M-SEARCH for ST={}", st);
                return None;
            }
            None => {
                trace!("Ignoring M-SEARCH without ST");
                return None;
            }
        }

        let ceiling = self.config.default_max_delay;
        let mx = match headers.get("MX").and_then(|value| parse_mx(value)) {
            Some(mx) if mx > ceiling => {
                trace!("M-SEARCH MX={} capped to {}", mx, ceiling);
                ceiling
            }
            Some(mx) => mx,
            None => ceiling,
        };

        Some(random_delay(mx))
    }

    fn reply_message(&self, date: DateTime<Utc>) -> String {
        let server = self.config.server();
        SearchReply {
            location: &self.config.device_url,
            max_age: self.config.cache_expire_seconds,
            server: &server,
            search_target: &self.ssdp.search_target,
            date,
            uuid: &self.config.instance_uuid,
        }
        .to_message()
    }
}

/// Uniform delay in `[0, mx]` seconds, millisecond granularity.
fn random_delay(mx: u32) -> Duration {
    let max_millis = u64::from(mx) * 1000;
    Duration::from_millis(rand::rng().random_range(0..=max_millis))
}

/// SSDP responder, bound and joined but not yet serving.
///
/// Configuration can be changed through the setters until [`start`]
/// consumes the responder; from then on it is frozen and shared read-only
/// with the reply tasks.
///
/// [`start`]: SsdpResponder::start
pub struct SsdpResponder {
    core: ResponderCore,
    socket: StdUdpSocket,
}

impl SsdpResponder {
    /// Binds `bind_host:port` with address reuse and joins the SSDP group.
    pub fn bind(ssdp: SsdpConfig, config: ResponderConfig) -> Result<Self, SsdpError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;

        let bind_addr = SocketAddr::from((config.bind_host, ssdp.port));
        socket.bind(&bind_addr.into())?;
        socket.set_multicast_ttl_v4(MULTICAST_TTL)?;

        if !ssdp.multicast_addr.is_multicast() {
            return Err(SsdpError::InvalidAddress(format!(
                "{} is not a multicast group",
                ssdp.multicast_addr
            )));
        }
        socket.join_multicast_v4(&ssdp.multicast_addr, &Ipv4Addr::UNSPECIFIED)?;

        info!(
            "✅ SSDP responder bound on {} and joined {}",
            bind_addr, ssdp.multicast_addr
        );

        Ok(Self::from_socket(socket.into(), ssdp, config))
    }

    /// Uses an already bound socket. No multicast membership is added.
    pub fn from_socket(socket: StdUdpSocket, ssdp: SsdpConfig, config: ResponderConfig) -> Self {
        Self {
            core: ResponderCore { ssdp, config },
            socket,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SsdpError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.core.config
    }

    pub fn set_device_url(&mut self, device_url: impl Into<String>) {
        self.core.config.device_url = device_url.into();
    }

    pub fn set_product(&mut self, product_id: impl Into<String>, version: impl Into<String>) {
        self.core.config.product_id = product_id.into();
        self.core.config.product_version = version.into();
    }

    pub fn set_os(&mut self, os_id: impl Into<String>, version: impl Into<String>) {
        self.core.config.os_id = os_id.into();
        self.core.config.os_version = version.into();
    }

    pub fn set_cache_expire_seconds(&mut self, seconds: u32) {
        self.core.config.cache_expire_seconds = seconds;
    }

    pub fn set_instance_uuid(&mut self, uuid: impl Into<String>) {
        self.core.config.instance_uuid = uuid.into();
    }

    pub fn set_default_max_delay(&mut self, seconds: u32) {
        self.core.config.default_max_delay = seconds;
    }

    /// Reply delay the responder would use for `data`, `None` for no reply.
    pub fn plan_reply(&self, data: &str) -> Option<Duration> {
        self.core.plan_reply(data)
    }

    /// Starts serving on the current tokio runtime.
    pub fn start(self) -> Result<ResponderHandle, SsdpError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SsdpError::NoRuntime)?;
        let _guard = runtime.enter();

        self.socket.set_nonblocking(true)?;
        let socket = Arc::new(UdpSocket::from_std(self.socket)?);
        let local_addr = socket.local_addr()?;
        let core = Arc::new(self.core);

        info!(
            "📡 SSDP responder serving on {} (LOCATION={})",
            local_addr, core.config.device_url
        );

        let task = tokio::spawn(serve(core, socket));
        Ok(ResponderHandle { local_addr, task })
    }
}

async fn serve(core: Arc<ResponderCore>, socket: Arc<UdpSocket>) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    // Dropping the set (when this task is aborted) cancels pending replies
    let mut replies = JoinSet::new();

    loop {
        while replies.try_join_next().is_some() {}

        let (n, src) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("❌ SSDP read error: {}", e);
                continue;
            }
        };

        let data = String::from_utf8_lossy(&buf[..n]);
        let Some(delay) = core.plan_reply(&data) else {
            continue;
        };
        debug!("M-SEARCH from {}, replying in {:?}", src, delay);

        let core = Arc::clone(&core);
        let socket = Arc::clone(&socket);
        replies.spawn(async move {
            tokio::time::sleep(delay).await;
            let reply = core.reply_message(Utc::now());
            match socket.send_to(reply.as_bytes(), src).await {
                Ok(_) => debug!("📡 M-SEARCH reply sent to {}", src),
                Err(e) => warn!("❌ Failed to send M-SEARCH reply to {}: {}", src, e),
            }
        });
    }
}

/// Running responder. Dropping the handle stops it.
pub struct ResponderHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ResponderHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops receiving and cancels replies still waiting on their delay.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Waits until the responder stops.
    pub async fn wait(mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for ResponderHandle {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            info!("Shutting down SSDP responder on {}", self.local_addr);
            self.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> ResponderCore {
        let mut config = ResponderConfig::new("http://192.0.2.1:8008/ssdp/device-desc.xml");
        config.default_max_delay = 2;
        config.instance_uuid = "0b8d7a8e-1b34-4ad1-a3b2-6fb3a8b5e9a1".to_string();
        ResponderCore {
            ssdp: SsdpConfig::default(),
            config,
        }
    }

    fn msearch(mx: Option<&str>, st: &str) -> String {
        let mut msg = "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\n"
            .to_string();
        if let Some(mx) = mx {
            msg.push_str(&format!("MX: {}\r\n", mx));
        }
        msg.push_str(&format!("ST: {}\r\n\r\n", st));
        msg
    }

    #[test]
    fn test_mx_zero_replies_immediately() {
        let core = core();
        let delay = core.plan_reply(&msearch(Some("0"), crate::DIAL_SEARCH_TARGET));
        assert_eq!(delay, Some(Duration::ZERO));
    }

    #[test]
    fn test_delay_stays_within_mx() {
        let mut core = core();
        core.config.default_max_delay = 10;
        let request = msearch(Some("5"), crate::DIAL_SEARCH_TARGET);
        for _ in 0..200 {
            let delay = core.plan_reply(&request).unwrap();
            assert!(delay <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_huge_mx_is_capped() {
        let core = core();
        for mx in ["4294967295", "3600", "3"] {
            let request = msearch(Some(mx), crate::DIAL_SEARCH_TARGET);
            for _ in 0..50 {
                let delay = core.plan_reply(&request).unwrap();
                assert!(delay <= Duration::from_secs(2), "MX={} gave {:?}", mx, delay);
            }
        }
    }

    #[test]
    fn test_missing_or_bad_mx_uses_default_delay() {
        let core = core();
        for mx in [None, Some("soon"), Some("")] {
            let delay = core
                .plan_reply(&msearch(mx, crate::DIAL_SEARCH_TARGET))
                .unwrap();
            assert!(delay <= Duration::from_secs(2));
        }
    }

    #[test]
    fn test_rejects_other_search_targets() {
        let core = core();
        assert_eq!(core.plan_reply(&msearch(Some("1"), "ssdp:all")), None);
        assert_eq!(
            core.plan_reply("M-SEARCH * HTTP/1.1\r\nMX: 1\r\n\r\n"),
            None
        );
    }

    #[test]
    fn test_rejects_other_start_lines() {
        let core = core();
        let notify = format!(
            "NOTIFY * HTTP/1.1\r\nNT: {}\r\nST: {}\r\n\r\n",
            crate::DIAL_SEARCH_TARGET,
            crate::DIAL_SEARCH_TARGET
        );
        assert_eq!(core.plan_reply(&notify), None);
        assert_eq!(core.plan_reply("garbage"), None);
    }

    #[test]
    fn test_reply_carries_configuration() {
        let core = core();
        let reply = core.reply_message(Utc::now());
        let headers = parse_headers(&reply);

        assert_eq!(
            headers["LOCATION"],
            "http://192.0.2.1:8008/ssdp/device-desc.xml"
        );
        assert_eq!(headers["CACHE-CONTROL"], "max-age=1800");
        assert_eq!(headers["ST"], crate::DIAL_SEARCH_TARGET);
        assert_eq!(headers["USN"], "uuid:0b8d7a8e-1b34-4ad1-a3b2-6fb3a8b5e9a1");
        assert!(headers["SERVER"].starts_with("PMODial/"));
        assert!(headers["SERVER"].contains(" UPnP/1.1 "));
        assert!(headers["DATE"].ends_with(" GMT"));
    }
}
