//! # SSDP for DIAL - Simple Service Discovery Protocol
//!
//! This crate carries the SSDP side of DIAL (Discovery and Launch):
//!
//! - ✅ M-SEARCH / search reply wire format ([`codec`])
//! - ✅ One-shot discovery of DIAL receivers ([`discover`])
//! - ✅ A responder advertising a device description URL ([`SsdpResponder`])
//!
//! ## Architecture
//!
//! Nothing here reads process-wide state. Every component is built from an
//! explicit [`SsdpConfig`] (group address, port, search target, timings), so
//! several clients and responders with different settings can live in one
//! process. [`SsdpConfigExt`] builds these structures from `pmoconfig`.
//!
//! ## Protocol constants
//!
//! - **Multicast Address**: 239.255.255.250:1900
//! - **Search Target**: `urn:dial-multiscreen-org:service:dial:1`
//! - **MX**: 3 seconds, discovery waits MX + 1
//! - **Max-Age**: 1800 seconds

pub mod codec;
mod client;
mod config_ext;
mod errors;
mod server;

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

pub use client::{DiscoverOptions, discover};
pub use config_ext::SsdpConfigExt;
pub use errors::SsdpError;
pub use server::{ResponderConfig, ResponderHandle, SsdpResponder};

/// SSDP multicast group
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// SSDP port
pub const SSDP_PORT: u16 = 1900;

/// Search target of DIAL receivers
pub const DIAL_SEARCH_TARGET: &str = "urn:dial-multiscreen-org:service:dial:1";

/// Seconds a receiver may wait before answering a discovery request
pub const DEFAULT_MX: u32 = 3;

/// Advertisement validity (seconds)
pub const DEFAULT_CACHE_MAX_AGE: u32 = 1800;

/// Reply delay bound used when a request carries no usable MX (seconds)
pub const DEFAULT_MAX_REPLY_DELAY: u32 = 10;

/// Protocol settings shared by the discovery client and the responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsdpConfig {
    pub multicast_addr: Ipv4Addr,
    pub port: u16,
    pub search_target: String,
    /// MX sent in M-SEARCH requests
    pub mx: u32,
    /// How long [`discover`] collects replies by default
    pub discover_timeout: Duration,
}

impl SsdpConfig {
    /// Destination of M-SEARCH requests
    pub fn group_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.multicast_addr, self.port)
    }

    /// Value of the `HOST` header
    pub fn host_header(&self) -> String {
        self.group_addr().to_string()
    }

    /// Changes MX and moves the default discovery timeout to MX + 1 second
    pub fn with_mx(mut self, mx: u32) -> Self {
        self.mx = mx;
        self.discover_timeout = Duration::from_secs(u64::from(mx) + 1);
        self
    }
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            multicast_addr: SSDP_MULTICAST_ADDR,
            port: SSDP_PORT,
            search_target: DIAL_SEARCH_TARGET.to_string(),
            mx: DEFAULT_MX,
            // Wait at least one second past MX so late receivers are heard
            discover_timeout: Duration::from_secs(u64::from(DEFAULT_MX) + 1),
        }
    }
}
