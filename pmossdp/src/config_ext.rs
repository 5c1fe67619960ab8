//! Builds SSDP settings from `pmoconfig`.
//!
//! Same pattern as the other `*ConfigExt` traits: the YAML tree stays in
//! `pmoconfig`, this trait turns the `ssdp` and `responder` sections into
//! [`SsdpConfig`] and [`ResponderConfig`] values.

use anyhow::Result;
use pmoconfig::Config;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::warn;

use crate::{
    DEFAULT_CACHE_MAX_AGE, DEFAULT_MAX_REPLY_DELAY, DEFAULT_MX, DIAL_SEARCH_TARGET,
    ResponderConfig, SSDP_MULTICAST_ADDR, SSDP_PORT, SsdpConfig,
};

/// Extension trait adding SSDP configuration to `pmoconfig::Config`
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmossdp::SsdpConfigExt;
///
/// let config = get_config();
/// let ssdp = config.get_ssdp_config();
/// let responder = config.get_responder_config("http://192.0.2.1:8008/dd.xml")?;
/// ```
pub trait SsdpConfigExt {
    /// Protocol settings from the `ssdp` section
    ///
    /// `discover_timeout_secs` defaults to MX + 1.
    fn get_ssdp_config(&self) -> SsdpConfig;

    /// Sets the MX sent by discovery requests
    fn set_ssdp_mx(&self, mx: u32) -> Result<()>;

    /// Responder settings from the `responder` section
    ///
    /// The instance UUID is generated on first call and persisted, so a
    /// restarted responder keeps its `USN`.
    fn get_responder_config(&self, device_url: &str) -> Result<ResponderConfig>;

    /// Persistent responder UUID (without `uuid:` prefix)
    fn get_responder_uuid(&self) -> Result<String>;

    fn set_responder_cache_max_age(&self, seconds: u32) -> Result<()>;

    fn set_responder_max_delay(&self, seconds: u32) -> Result<()>;
}

fn to_u32(value: u64, what: &str, default: u32) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| {
        warn!("{} {} out of range, using default {}", what, value, default);
        default
    })
}

fn parse_ipv4(value: &str, what: &str, default: Ipv4Addr) -> Ipv4Addr {
    value.parse().unwrap_or_else(|_| {
        warn!("Invalid {} '{}', using default {}", what, value, default);
        default
    })
}

impl SsdpConfigExt for Config {
    fn get_ssdp_config(&self) -> SsdpConfig {
        let multicast_addr = parse_ipv4(
            &self.get_string(&["ssdp", "multicast_addr"], &SSDP_MULTICAST_ADDR.to_string()),
            "SSDP multicast address",
            SSDP_MULTICAST_ADDR,
        );

        let port = u16::try_from(self.get_u64(&["ssdp", "port"], u64::from(SSDP_PORT)))
            .unwrap_or_else(|_| {
                warn!("SSDP port out of range, using default {}", SSDP_PORT);
                SSDP_PORT
            });

        let mx = to_u32(
            self.get_u64(&["ssdp", "mx"], u64::from(DEFAULT_MX)),
            "SSDP MX",
            DEFAULT_MX,
        );

        let timeout = self.get_u64(&["ssdp", "discover_timeout_secs"], u64::from(mx) + 1);

        SsdpConfig {
            multicast_addr,
            port,
            search_target: self.get_string(&["ssdp", "search_target"], DIAL_SEARCH_TARGET),
            mx,
            discover_timeout: Duration::from_secs(timeout),
        }
    }

    fn set_ssdp_mx(&self, mx: u32) -> Result<()> {
        self.set_u64(&["ssdp", "mx"], u64::from(mx))
    }

    fn get_responder_config(&self, device_url: &str) -> Result<ResponderConfig> {
        let mut config = ResponderConfig::new(device_url);

        config.bind_host = parse_ipv4(
            &self.get_string(&["responder", "bind_host"], "0.0.0.0"),
            "responder bind host",
            Ipv4Addr::UNSPECIFIED,
        );
        config.cache_expire_seconds = to_u32(
            self.get_u64(
                &["responder", "cache_max_age"],
                u64::from(DEFAULT_CACHE_MAX_AGE),
            ),
            "Responder cache max-age",
            DEFAULT_CACHE_MAX_AGE,
        );
        config.default_max_delay = to_u32(
            self.get_u64(
                &["responder", "max_reply_delay"],
                u64::from(DEFAULT_MAX_REPLY_DELAY),
            ),
            "Responder max reply delay",
            DEFAULT_MAX_REPLY_DELAY,
        );
        config.product_id = self.get_string(&["responder", "product_id"], &config.product_id);
        config.product_version =
            self.get_string(&["responder", "product_version"], &config.product_version);
        config.instance_uuid = self.get_responder_uuid()?;

        Ok(config)
    }

    fn get_responder_uuid(&self) -> Result<String> {
        self.get_or_create_uuid(&["responder", "uuid"])
    }

    fn set_responder_cache_max_age(&self, seconds: u32) -> Result<()> {
        self.set_u64(&["responder", "cache_max_age"], u64::from(seconds))
    }

    fn set_responder_max_delay(&self, seconds: u32) -> Result<()> {
        self.set_u64(&["responder", "max_reply_delay"], u64::from(seconds))
    }
}
