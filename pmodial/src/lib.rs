//! # pmodial - DIAL client
//!
//! Discovers DIAL devices over SSDP and drives their applications through
//! the DIAL REST service.
//!
//! ```rust,ignore
//! use pmodial::{DialClient, DiscoverOptions, SsdpConfig, discover};
//!
//! let ssdp = SsdpConfig::default();
//! for location in discover(&ssdp, &DiscoverOptions::from_config(&ssdp))? {
//!     let mut client = DialClient::new(&location)?;
//!     let device = client.get_device_description()?;
//!     println!("{} ({})", device.friendly_name, device.model_name);
//! }
//! ```

mod client;
mod config_ext;
mod errors;
pub mod model;

pub use client::{DEFAULT_HTTP_TIMEOUT, DialClient, Endpoint, QuitOutcome};
pub use config_ext::DialConfigExt;
pub use errors::DialError;
pub use model::{ApiVersion, AppStatus, DeviceStatus};

pub use pmossdp::{DIAL_SEARCH_TARGET, DiscoverOptions, SsdpConfig, SsdpConfigExt, discover};
