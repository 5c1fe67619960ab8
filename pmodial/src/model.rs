//! DIAL XML documents: device description and application status.
//!
//! Every field has a fallback, so a document that parses as XML always
//! yields a value. Only a body that is not XML at all is rejected.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;
use xmltree::{Element, XMLNode};

use crate::errors::DialError;

/// UPnP device description namespace
pub const XML_NS_UPNP_DEVICE: &str = "urn:schemas-upnp-org:device-1-0";
/// DIAL application status namespace
pub const XML_NS_DIAL: &str = "urn:dial-multiscreen-org:schemas:dial";
/// Cast extensions carried inside DIAL application status
pub const XML_NS_CAST: &str = "urn:chrome.google.com:cast";

pub const UNKNOWN_DEVICE: &str = "Unknown device";
pub const UNKNOWN_MODEL_NAME: &str = "Unknown model name";
pub const UNKNOWN_MANUFACTURER: &str = "Unknown manufacturer";
pub const UNKNOWN_APPLICATION: &str = "Unknown application";
pub const UNKNOWN_STATE: &str = "unknown";
pub const UNKNOWN_VERSION: i64 = -1;

/// Application state reported by a running app.
pub const STATE_RUNNING: &str = "running";

/// Finds the first direct child of `parent` named `tag` in namespace `ns`.
pub fn find_child<'a>(parent: &'a Element, ns: &str, tag: &str) -> Option<&'a Element> {
    parent.children.iter().find_map(|node| match node {
        XMLNode::Element(elem) if elem.name == tag && elem.namespace.as_deref() == Some(ns) => {
            Some(elem)
        }
        _ => None,
    })
}

/// Text of the `ns:tag` child of `parent`, if that child exists.
///
/// A present element with no text gives an empty string.
pub fn read_optional_element(parent: Option<&Element>, ns: &str, tag: &str) -> Option<String> {
    let child = find_child(parent?, ns, tag)?;
    Some(child.get_text().map(|t| t.into_owned()).unwrap_or_default())
}

/// Text of the `ns:tag` child of `parent`, or `default` when the parent or
/// the child is missing.
pub fn read_xml_element(parent: Option<&Element>, ns: &str, tag: &str, default: &str) -> String {
    read_optional_element(parent, ns, tag).unwrap_or_else(|| default.to_string())
}

fn read_version_number(parent: Option<&Element>, tag: &str) -> i64 {
    let Some(text) = read_optional_element(parent, XML_NS_UPNP_DEVICE, tag) else {
        return UNKNOWN_VERSION;
    };
    text.trim().parse().unwrap_or_else(|_| {
        warn!("Invalid specVersion/{} '{}', using {}", tag, text, UNKNOWN_VERSION);
        UNKNOWN_VERSION
    })
}

fn parse_root(body: &[u8]) -> Result<Element, DialError> {
    Element::parse(body).map_err(|e| DialError::MalformedResponse(e.to_string()))
}

/// UPnP `specVersion` of a device description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApiVersion {
    pub major: i64,
    pub minor: i64,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary of a DIAL device description document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub friendly_name: String,
    pub model_name: String,
    pub manufacturer: String,
    pub api_version: ApiVersion,
}

impl DeviceStatus {
    /// Parses a `<root xmlns="urn:schemas-upnp-org:device-1-0">` document.
    pub fn from_xml(body: &[u8]) -> Result<Self, DialError> {
        let root = parse_root(body)?;
        let device = find_child(&root, XML_NS_UPNP_DEVICE, "device");
        let spec_version = find_child(&root, XML_NS_UPNP_DEVICE, "specVersion");

        Ok(DeviceStatus {
            friendly_name: read_xml_element(
                device,
                XML_NS_UPNP_DEVICE,
                "friendlyName",
                UNKNOWN_DEVICE,
            ),
            model_name: read_xml_element(
                device,
                XML_NS_UPNP_DEVICE,
                "modelName",
                UNKNOWN_MODEL_NAME,
            ),
            manufacturer: read_xml_element(
                device,
                XML_NS_UPNP_DEVICE,
                "manufacturer",
                UNKNOWN_MANUFACTURER,
            ),
            api_version: ApiVersion {
                major: read_version_number(spec_version, "major"),
                minor: read_version_number(spec_version, "minor"),
            },
        })
    }
}

/// State of one application on a DIAL device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppStatus {
    pub app_id: String,
    pub description: String,
    pub state: String,
    /// Attributes of the `<options>` element
    pub options: HashMap<String, String>,
    /// Cast `servicedata/connectionSvcURL`
    pub service_url: Option<String>,
    /// Cast `servicedata/protocols` children
    pub service_protocols: Vec<String>,
}

impl AppStatus {
    /// Parses a `<service xmlns="urn:dial-multiscreen-org:schemas:dial">` document.
    pub fn from_xml(body: &[u8]) -> Result<Self, DialError> {
        let root = parse_root(body)?;
        let root = Some(&root);

        let app_id = read_xml_element(root, XML_NS_DIAL, "name", UNKNOWN_APPLICATION);
        let state = read_xml_element(root, XML_NS_DIAL, "state", UNKNOWN_STATE);

        let options = root
            .and_then(|r| find_child(r, XML_NS_DIAL, "options"))
            .map(|elem| {
                elem.attributes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let service_data = root.and_then(|r| find_child(r, XML_NS_CAST, "servicedata"));
        let service_url = read_optional_element(service_data, XML_NS_CAST, "connectionSvcURL");
        let service_protocols = service_data
            .and_then(|data| find_child(data, XML_NS_CAST, "protocols"))
            .map(|protocols| {
                protocols
                    .children
                    .iter()
                    .filter_map(XMLNode::as_element)
                    .map(|p| p.get_text().map(|t| t.into_owned()).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();

        let activity = root.and_then(|r| find_child(r, XML_NS_CAST, "activity-status"));
        let description = read_xml_element(activity, XML_NS_CAST, "description", &app_id);

        Ok(AppStatus {
            app_id,
            description,
            state,
            options,
            service_url,
            service_protocols,
        })
    }

    pub fn is_running(&self) -> bool {
        self.state == STATE_RUNNING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_DESC: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:dial-multiscreen-org:device:dial:1</deviceType>
    <friendlyName>Living Room TV</friendlyName>
    <manufacturer>Acme</manufacturer>
    <modelName>Eureka Dongle</modelName>
    <UDN>uuid:3e1cc7c0-f4f3-4f2d-8b5d-bf5e0a2a9a52</UDN>
  </device>
</root>"#;

    const APP_STATUS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<service xmlns="urn:dial-multiscreen-org:schemas:dial" xmlns:cast="urn:chrome.google.com:cast">
  <name>ChromeCast</name>
  <options allowStop="true"/>
  <cast:servicedata>
    <cast:connectionSvcURL>http://192.0.2.1:8008/connection/ChromeCast</cast:connectionSvcURL>
    <cast:protocols>
      <cast:protocol>ramp</cast:protocol>
      <cast:protocol>cast</cast:protocol>
    </cast:protocols>
  </cast:servicedata>
  <state>running</state>
  <cast:activity-status>
    <cast:description>Backdrop</cast:description>
  </cast:activity-status>
</service>"#;

    #[test]
    fn test_device_description() {
        let status = DeviceStatus::from_xml(DEVICE_DESC.as_bytes()).unwrap();
        assert_eq!(status.friendly_name, "Living Room TV");
        assert_eq!(status.model_name, "Eureka Dongle");
        assert_eq!(status.manufacturer, "Acme");
        assert_eq!(status.api_version, ApiVersion { major: 1, minor: 0 });
        assert_eq!(status.api_version.to_string(), "1.0");
    }

    #[test]
    fn test_device_description_defaults() {
        let xml = r#"<root xmlns="urn:schemas-upnp-org:device-1-0"><device/></root>"#;
        let status = DeviceStatus::from_xml(xml.as_bytes()).unwrap();
        assert_eq!(status.friendly_name, UNKNOWN_DEVICE);
        assert_eq!(status.model_name, UNKNOWN_MODEL_NAME);
        assert_eq!(status.manufacturer, UNKNOWN_MANUFACTURER);
        assert_eq!(status.api_version, ApiVersion { major: -1, minor: -1 });
    }

    #[test]
    fn test_wrong_namespace_is_ignored() {
        let xml = r#"<root><device><friendlyName>Nope</friendlyName></device></root>"#;
        let status = DeviceStatus::from_xml(xml.as_bytes()).unwrap();
        assert_eq!(status.friendly_name, UNKNOWN_DEVICE);
    }

    #[test]
    fn test_non_numeric_version() {
        let xml = r#"<root xmlns="urn:schemas-upnp-org:device-1-0">
            <specVersion><major> 2 </major><minor>x</minor></specVersion></root>"#;
        let status = DeviceStatus::from_xml(xml.as_bytes()).unwrap();
        assert_eq!(status.api_version, ApiVersion { major: 2, minor: -1 });
    }

    #[test]
    fn test_not_xml_is_malformed() {
        assert!(matches!(
            DeviceStatus::from_xml(b"this is not xml"),
            Err(DialError::MalformedResponse(_))
        ));
        assert!(matches!(
            AppStatus::from_xml(b""),
            Err(DialError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_read_xml_element() {
        let root = Element::parse(
            r#"<a xmlns="urn:x"><b>text</b><c/></a>"#.as_bytes(),
        )
        .unwrap();
        assert_eq!(read_xml_element(Some(&root), "urn:x", "b", "d"), "text");
        assert_eq!(read_xml_element(Some(&root), "urn:x", "c", "d"), "");
        assert_eq!(read_xml_element(Some(&root), "urn:x", "z", "d"), "d");
        assert_eq!(read_xml_element(Some(&root), "urn:y", "b", "d"), "d");
        assert_eq!(read_xml_element(None, "urn:x", "b", "d"), "d");
    }

    #[test]
    fn test_cast_app_status() {
        let status = AppStatus::from_xml(APP_STATUS.as_bytes()).unwrap();
        assert_eq!(status.app_id, "ChromeCast");
        assert_eq!(status.state, "running");
        assert!(status.is_running());
        assert_eq!(status.description, "Backdrop");
        assert_eq!(status.options.get("allowStop").map(String::as_str), Some("true"));
        assert_eq!(
            status.service_url.as_deref(),
            Some("http://192.0.2.1:8008/connection/ChromeCast")
        );
        assert_eq!(status.service_protocols, vec!["ramp", "cast"]);
    }

    #[test]
    fn test_plain_dial_app_status() {
        let xml = r#"<service xmlns="urn:dial-multiscreen-org:schemas:dial">
            <name>YouTube</name><state>stopped</state></service>"#;
        let status = AppStatus::from_xml(xml.as_bytes()).unwrap();
        assert_eq!(status.app_id, "YouTube");
        assert_eq!(status.state, "stopped");
        assert!(!status.is_running());
        assert_eq!(status.description, "YouTube");
        assert!(status.options.is_empty());
        assert_eq!(status.service_url, None);
        assert!(status.service_protocols.is_empty());
    }

    #[test]
    fn test_empty_service_defaults() {
        let xml = r#"<service xmlns="urn:dial-multiscreen-org:schemas:dial"/>"#;
        let status = AppStatus::from_xml(xml.as_bytes()).unwrap();
        assert_eq!(status.app_id, UNKNOWN_APPLICATION);
        assert_eq!(status.state, UNKNOWN_STATE);
        assert_eq!(status.description, UNKNOWN_APPLICATION);
    }
}
