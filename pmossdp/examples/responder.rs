//! Advertises a DIAL device description URL over SSDP.
//!
//! ```text
//! cargo run -p pmossdp --example responder -- http://192.168.1.10:8008/ssdp/device-desc.xml
//! ```
//!
//! Without argument, the URL is built from the guessed local IP.

use anyhow::Result;
use pmoconfig::get_config;
use pmossdp::{SsdpConfigExt, SsdpResponder};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = get_config();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.get_log_min_level().to_lowercase())),
        )
        .init();

    let device_url = std::env::args().nth(1).unwrap_or_else(|| {
        format!(
            "http://{}:8008/ssdp/device-desc.xml",
            pmoutils::guess_local_ip()
        )
    });

    let responder = SsdpResponder::bind(
        config.get_ssdp_config(),
        config.get_responder_config(&device_url)?,
    )?;
    tracing::info!(
        "Advertising {} as uuid:{}",
        device_url,
        responder.config().instance_uuid
    );

    let handle = responder.start()?;

    tokio::signal::ctrl_c().await?;
    handle.stop();
    handle.wait().await;
    Ok(())
}
