//! Blocking DIAL REST client.
//!
//! A [`DialClient`] talks to one device. The application control URL is not
//! known until the device description has been fetched: the device returns
//! it in the `Application-URL` header of that response, and the client keeps
//! the first value it sees for the rest of its life.

use std::time::Duration;

use tracing::{debug, info, warn};
use ureq::Agent;
use url::Url;

use crate::errors::DialError;
use crate::model::{AppStatus, DeviceStatus};

/// Default timeout applied to every HTTP exchange with the device
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const APPLICATION_URL_HEADER: &str = "application-url";
const STATUS_NO_CONTENT: u16 = 204;
const STATUS_NOT_FOUND: u16 = 404;

/// Host, port and path of an HTTP endpoint on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    /// Splits an absolute `http(s)://host[:port]/path` URL.
    pub fn parse(raw: &str) -> Result<Self, DialError> {
        let url = Url::parse(raw.trim()).map_err(|_| DialError::InvalidUrl(raw.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| DialError::InvalidUrl(raw.to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| DialError::InvalidUrl(raw.to_string()))?;

        Ok(Endpoint {
            scheme: url.scheme().to_string(),
            host,
            port,
            path: url.path().to_string(),
        })
    }

    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }

    /// This endpoint's URL followed by `/<segment>`, with exactly one slash
    /// between them.
    pub fn join(&self, segment: &str) -> String {
        let base = self.url();
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            segment.trim_start_matches('/')
        )
    }
}

/// Result of [`DialClient::quit_app`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuitOutcome {
    /// A DELETE was sent for this application
    Stopped(String),
    /// No application id could be determined, or the device reported none running
    NothingRunning,
}

/// Client for the DIAL REST service of one device.
///
/// ```rust,ignore
/// let mut client = DialClient::new("http://192.168.1.20:8008/ssdp/device-desc.xml")?;
/// let device = client.get_device_description()?;
/// client.launch_app("YouTube", Some("v=dQw4w9WgXcQ"))?;
/// ```
pub struct DialClient {
    agent: Agent,
    device: Endpoint,
    app_control: Option<Endpoint>,
}

impl DialClient {
    pub fn new(device_url: &str) -> Result<Self, DialError> {
        Self::with_timeout(device_url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(device_url: &str, timeout: Duration) -> Result<Self, DialError> {
        let device = Endpoint::parse(device_url)?;

        // 4xx/5xx are answers, not failures: 404 from DELETE means "not running"
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(DialClient {
            agent,
            device,
            app_control: None,
        })
    }

    pub fn device_host(&self) -> &str {
        &self.device.host
    }

    pub fn device_port(&self) -> u16 {
        self.device.port
    }

    pub fn device_description_path(&self) -> &str {
        &self.device.path
    }

    pub fn device_url(&self) -> String {
        self.device.url()
    }

    /// Resolved application control endpoint, if the description was fetched
    pub fn app_control_url(&self) -> Option<&Endpoint> {
        self.app_control.as_ref()
    }

    /// The application control base URL, or the URL of `app_id` under it.
    pub fn app_url(&self, app_id: Option<&str>) -> Result<String, DialError> {
        let control = self.app_control.as_ref().ok_or(DialError::Uninitialized)?;
        Ok(match app_id {
            Some(id) => control.join(id),
            None => control.url(),
        })
    }

    /// Fetches and parses the device description.
    ///
    /// The first successful fetch also resolves the application control URL
    /// from the `Application-URL` response header. Later fetches leave it
    /// untouched even if the device starts announcing another one.
    pub fn get_device_description(&mut self) -> Result<DeviceStatus, DialError> {
        let url = self.device.url();
        debug!("📤 GET device description {}", url);

        let mut response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| DialError::transport(&url, e))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(DialError::http_status(&url, status));
        }

        if self.app_control.is_none() {
            let header = response
                .headers()
                .get(APPLICATION_URL_HEADER)
                .ok_or(DialError::MissingApplicationUrl)?
                .to_str()
                .map_err(|_| DialError::InvalidUrl("<non-ASCII Application-URL>".to_string()))?;
            let endpoint = Endpoint::parse(header)?;
            info!("✅ Application URL for {} is {}", url, endpoint.url());
            self.app_control = Some(endpoint);
        }

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| DialError::MalformedResponse(format!("{}: {}", url, e)))?;
        debug!("📥 Device description from {} ({} bytes)", url, body.len());

        DeviceStatus::from_xml(body.as_bytes())
    }

    /// Status of `app_id`; `Ok(None)` when the device answers 204 No Content.
    pub fn get_app_status(&self, app_id: &str) -> Result<Option<AppStatus>, DialError> {
        let url = self.app_url(Some(app_id))?;
        self.fetch_app_status(&url)
    }

    fn fetch_app_status(&self, url: &str) -> Result<Option<AppStatus>, DialError> {
        debug!("📤 GET app status {}", url);
        let mut response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| DialError::transport(url, e))?;

        let status = response.status().as_u16();
        if status == STATUS_NO_CONTENT {
            debug!("📥 {} answered 204, nothing running", url);
            return Ok(None);
        }

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| DialError::MalformedResponse(format!("{}: {}", url, e)))?;
        debug!("📥 App status from {} (HTTP {})", url, status);

        AppStatus::from_xml(body.as_bytes()).map(Some)
    }

    /// Asks the device to start `app_id`, passing `args` as the request body.
    ///
    /// Without arguments the POST carries an explicit `Content-Length: 0`.
    pub fn launch_app(&self, app_id: &str, args: Option<&str>) -> Result<(), DialError> {
        let url = self.app_url(Some(app_id))?;
        let request = self.agent.post(&url);

        let response = match args.filter(|a| !a.is_empty()) {
            Some(body) => {
                debug!("📤 POST {} ({} bytes)", url, body.len());
                request
                    .header("Content-Type", r#"text/plain; charset="utf-8""#)
                    .send(body)
            }
            None => {
                debug!("📤 POST {} (empty body)", url);
                request.header("Content-Length", "0").send_empty()
            }
        }
        .map_err(|e| DialError::transport(&url, e))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            warn!("❌ Launch of {} refused with HTTP {}", app_id, status);
            return Err(DialError::http_status(&url, status));
        }

        match response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
        {
            Some(instance) => info!("✅ Launched {} (HTTP {}) at {}", app_id, status, instance),
            None => info!("✅ Launched {} (HTTP {})", app_id, status),
        }
        Ok(())
    }

    /// Stops `app_id`, or whatever application the device reports as running.
    ///
    /// Without an id, the application control base URL is queried first and
    /// the application it names is stopped. A 404 answer to the DELETE means
    /// the application was not running.
    pub fn quit_app(&self, app_id: Option<&str>) -> Result<QuitOutcome, DialError> {
        let app_id = match app_id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let base = self.app_url(None)?;
                match self.fetch_app_status(&base)? {
                    Some(status) if !status.app_id.is_empty() => status.app_id,
                    _ => {
                        debug!("No running application reported by {}", base);
                        return Ok(QuitOutcome::NothingRunning);
                    }
                }
            }
        };

        let url = self.app_url(Some(&app_id))?;
        debug!("📤 DELETE {}", url);
        let response = self
            .agent
            .delete(&url)
            .call()
            .map_err(|e| DialError::transport(&url, e))?;

        let status = response.status().as_u16();
        if status == STATUS_NOT_FOUND {
            debug!("📥 {} not running (HTTP 404)", app_id);
            return Ok(QuitOutcome::NothingRunning);
        }
        if !response.status().is_success() {
            return Err(DialError::http_status(&url, status));
        }

        info!("✅ Stopped {}", app_id);
        Ok(QuitOutcome::Stopped(app_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parse() {
        let ep = Endpoint::parse("http://192.0.2.7:8008/ssdp/device-desc.xml").unwrap();
        assert_eq!(ep.host, "192.0.2.7");
        assert_eq!(ep.port, 8008);
        assert_eq!(ep.path, "/ssdp/device-desc.xml");
        assert_eq!(ep.url(), "http://192.0.2.7:8008/ssdp/device-desc.xml");
    }

    #[test]
    fn test_endpoint_default_port() {
        let ep = Endpoint::parse("http://tv.local/dd.xml").unwrap();
        assert_eq!(ep.port, 80);
    }

    #[test]
    fn test_endpoint_invalid() {
        assert!(matches!(
            Endpoint::parse("not a url"),
            Err(DialError::InvalidUrl(_))
        ));
        assert!(matches!(
            Endpoint::parse("mailto:someone@example.com"),
            Err(DialError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_join_uses_a_single_slash() {
        let with_slash = Endpoint::parse("http://192.0.2.7:8008/apps/").unwrap();
        let without_slash = Endpoint::parse("http://192.0.2.7:8008/apps").unwrap();
        assert_eq!(with_slash.join("YouTube"), "http://192.0.2.7:8008/apps/YouTube");
        assert_eq!(without_slash.join("YouTube"), "http://192.0.2.7:8008/apps/YouTube");
    }

    #[test]
    fn test_unresolved_client() {
        let client = DialClient::new("http://192.0.2.7:8008/dd.xml").unwrap();
        assert_eq!(client.device_host(), "192.0.2.7");
        assert_eq!(client.device_port(), 8008);
        assert_eq!(client.device_description_path(), "/dd.xml");
        assert!(client.app_control_url().is_none());
        assert_eq!(client.app_url(None), Err(DialError::Uninitialized));
        assert_eq!(client.get_app_status("YouTube"), Err(DialError::Uninitialized));
        assert_eq!(client.launch_app("YouTube", None), Err(DialError::Uninitialized));
        assert_eq!(client.quit_app(None), Err(DialError::Uninitialized));
        assert_eq!(client.quit_app(Some("YouTube")), Err(DialError::Uninitialized));
    }
}
