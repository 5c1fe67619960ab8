//! DIAL client settings from `pmoconfig` (`dial` section).

use anyhow::Result;
use pmoconfig::Config;
use std::time::Duration;

use crate::client::DEFAULT_HTTP_TIMEOUT;

/// Extension trait adding DIAL client configuration to `pmoconfig::Config`
pub trait DialConfigExt {
    /// HTTP timeout for device requests (`dial.http_timeout_secs`)
    fn get_dial_http_timeout(&self) -> Duration;

    fn set_dial_http_timeout(&self, timeout: Duration) -> Result<()>;
}

impl DialConfigExt for Config {
    fn get_dial_http_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64(
            &["dial", "http_timeout_secs"],
            DEFAULT_HTTP_TIMEOUT.as_secs(),
        ))
    }

    fn set_dial_http_timeout(&self, timeout: Duration) -> Result<()> {
        self.set_u64(&["dial", "http_timeout_secs"], timeout.as_secs())
    }
}
