//! Lists the DIAL devices answering on the local network.
//!
//! ```text
//! cargo run -p pmodial --example discover -- [max_devices]
//! ```

use anyhow::Result;
use pmoconfig::get_config;
use pmodial::{DialClient, DialConfigExt, DiscoverOptions, SsdpConfigExt, discover};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config = get_config();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.get_log_min_level().to_lowercase())),
        )
        .init();

    let ssdp = config.get_ssdp_config();
    let mut options = DiscoverOptions::from_config(&ssdp).verbose(true);
    if let Some(max) = std::env::args().nth(1) {
        options = options.max_devices(max.parse()?);
    }

    tracing::info!(
        "📡 Searching {} for {:?}",
        ssdp.search_target,
        options.timeout
    );
    let locations = discover(&ssdp, &options)?;

    println!("=====================");
    println!("DIAL devices detected : {}", locations.len());
    for location in &locations {
        let mut client = DialClient::with_timeout(location, config.get_dial_http_timeout())?;
        match client.get_device_description() {
            Ok(device) => println!(
                "- {} ({} / {}) DIAL {} apps={}",
                device.friendly_name,
                device.manufacturer,
                device.model_name,
                device.api_version,
                client.app_url(None).unwrap_or_default()
            ),
            Err(e) => println!("- {} ❌ {}", location, e),
        }
    }
    println!("=====================");

    Ok(())
}
