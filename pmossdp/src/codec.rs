//! SSDP wire format: M-SEARCH requests, search replies and header parsing.
//!
//! SSDP messages are HTTP-like text blocks over UDP. Only the header block
//! matters: it ends at the first blank line, every line is `KEY: value`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::trace;

use crate::SsdpConfig;

/// First line of a search request
pub const MSEARCH_START_LINE: &str = "M-SEARCH * HTTP/1.1";

/// First line of a search reply
pub const REPLY_START_LINE: &str = "HTTP/1.1 200 OK";

/// Builds the M-SEARCH request for `config.search_target`.
///
/// ```
/// use pmossdp::{SsdpConfig, codec::build_msearch};
///
/// let msg = build_msearch(&SsdpConfig::default());
/// assert!(msg.starts_with("M-SEARCH * HTTP/1.1\r\n"));
/// assert!(msg.ends_with("\r\n\r\n"));
/// ```
pub fn build_msearch(config: &SsdpConfig) -> String {
    format!(
        "{}\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         \r\n",
        MSEARCH_START_LINE,
        config.host_header(),
        config.mx,
        config.search_target
    )
}

/// Returns the first line of a datagram, without its line terminator.
pub fn start_line(data: &str) -> Option<&str> {
    data.lines().next().map(|line| line.trim_end_matches('\r'))
}

/// True when the datagram starts with exactly `M-SEARCH * HTTP/1.1`.
pub fn is_search_request(data: &str) -> bool {
    start_line(data) == Some(MSEARCH_START_LINE)
}

/// Parses the header block of a datagram.
///
/// The block stops at the first blank line. Each line is split at its first
/// `:`; names are upper-cased, values trimmed. Lines without a colon (start
/// line included) are skipped. A repeated header keeps its last value.
pub fn parse_headers(data: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for line in data.lines() {
        let line = line.trim_end_matches('\r');

        if line.is_empty() {
            break;
        }

        match line.split_once(':') {
            Some((name, value)) => {
                let name = name.trim().to_ascii_uppercase();
                if name.is_empty() || name.contains(' ') {
                    trace!("Skipping malformed header: '{}'", line);
                    continue;
                }
                headers.insert(name, value.trim().to_string());
            }
            None => trace!("Skipping line without colon: '{}'", line),
        }
    }
    headers
}

/// Extracts the advertised location of a search reply.
///
/// A reply counts only if it has a `LOCATION` and an `ST` equal to
/// `search_target`.
pub fn matching_location(headers: &HashMap<String, String>, search_target: &str) -> Option<String> {
    let st = headers.get("ST")?;
    if st != search_target {
        trace!("Ignoring reply for ST={}", st);
        return None;
    }
    headers
        .get("LOCATION")
        .filter(|location| !location.is_empty())
        .cloned()
}

/// Parses an `MX` header value in seconds.
pub fn parse_mx(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

/// `SERVER` header: `<product>/<version> UPnP/1.1 <os>/<os-version>`
pub fn server_token(product: &str, product_version: &str, os: &str, os_version: &str) -> String {
    format!("{}/{} UPnP/1.1 {}/{}", product, product_version, os, os_version)
}

/// RFC 1123 date in GMT, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Fields of a search reply sent by the responder.
#[derive(Debug, Clone)]
pub struct SearchReply<'a> {
    pub location: &'a str,
    pub max_age: u32,
    pub server: &'a str,
    pub search_target: &'a str,
    pub date: DateTime<Utc>,
    pub uuid: &'a str,
}

impl SearchReply<'_> {
    pub fn to_message(&self) -> String {
        format!(
            "{}\r\n\
             LOCATION: {}\r\n\
             CACHE-CONTROL: max-age={}\r\n\
             EXT:\r\n\
             BOOTID.UPNP.ORG: 1\r\n\
             SERVER: {}\r\n\
             ST: {}\r\n\
             DATE: {}\r\n\
             USN: uuid:{}\r\n\
             \r\n",
            REPLY_START_LINE,
            self.location,
            self.max_age,
            self.server,
            self.search_target,
            http_date(self.date),
            self.uuid
        )
    }
}
