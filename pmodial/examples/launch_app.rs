//! Launches an application on a DIAL device, shows its status, then stops it.
//!
//! ```text
//! cargo run -p pmodial --example launch_app -- YouTube [device_url] [args]
//! ```
//!
//! Without a device URL, the first discovered device is used.

use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
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

    let mut args = std::env::args().skip(1);
    let app_id = args.next().unwrap_or_else(|| "YouTube".to_string());
    let device_url = match args.next() {
        Some(url) => url,
        None => {
            let ssdp = config.get_ssdp_config();
            discover(&ssdp, &DiscoverOptions::from_config(&ssdp).max_devices(1))?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no DIAL device found"))?
        }
    };
    let launch_args = args.next();

    let mut client = DialClient::with_timeout(&device_url, config.get_dial_http_timeout())?;
    let device = client.get_device_description()?;
    println!("Device: {} ({})", device.friendly_name, device.model_name);

    client.launch_app(&app_id, launch_args.as_deref())?;
    thread::sleep(Duration::from_secs(3));

    match client.get_app_status(&app_id)? {
        Some(status) => println!(
            "{}: {} ({}) options={:?}",
            status.app_id, status.state, status.description, status.options
        ),
        None => println!("{}: not running", app_id),
    }

    println!("Quit: {:?}", client.quit_app(Some(&app_id))?);
    Ok(())
}
