//! Host helpers shared by the PMODial crates.
//!
//! - [`guess_local_ip`] : local address used for outgoing traffic, handy to
//!   build a device URL to advertise.
//! - [`os_identity`] : operating system name and version placed in the
//!   SSDP `SERVER` header.
//!
//! ```
//! use pmoutils::{guess_local_ip, os_identity};
//!
//! let ip = guess_local_ip();
//! let (os, version) = os_identity();
//! println!("{} on {}/{}", ip, os, version);
//! ```
mod ip_utils;

pub use ip_utils::guess_local_ip;

/// Returns the operating system name and version as two separate tokens.
///
/// The version is `"Unknown"` when `os_info` cannot determine it.
///
/// ```
/// let (os, version) = pmoutils::os_identity();
/// assert!(!os.is_empty());
/// assert!(!version.is_empty());
/// ```
pub fn os_identity() -> (String, String) {
    let info = os_info::get();
    let os_type = format!("{:?}", info.os_type());

    let version = info.version();
    if version != &os_info::Version::Unknown {
        (os_type, version.to_string())
    } else {
        (os_type, "Unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_identity_fits_server_token() {
        let (os, version) = os_identity();
        assert!(!os.is_empty());
        assert!(!version.is_empty());
        assert!(!os.contains(' ') && !os.contains('/'));
    }
}
