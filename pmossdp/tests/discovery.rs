//! Discovery against a fake receiver on loopback.
//!
//! The "group" address of the config points at a unicast loopback socket,
//! which answers the M-SEARCH like a set of devices would.

use std::net::{Ipv4Addr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use pmossdp::{DIAL_SEARCH_TARGET, DiscoverOptions, SsdpConfig, discover};

fn reply(st: &str, location: Option<&str>) -> String {
    let mut msg = format!(
        "HTTP/1.1 200 OK\r\nCACHE-CONTROL: max-age=1800\r\nEXT:\r\nST: {}\r\n",
        st
    );
    if let Some(location) = location {
        msg.push_str(&format!("LOCATION: {}\r\n", location));
    }
    msg.push_str("USN: uuid:test\r\n\r\n");
    msg
}

/// Binds a fake receiver that answers the first M-SEARCH with `replies`.
fn fake_receiver(replies: Vec<Vec<u8>>) -> SsdpConfig {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = socket.local_addr().unwrap().port();

    thread::spawn(move || {
        let mut buf = [0u8; 2048];
        socket
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let Ok((n, from)) = socket.recv_from(&mut buf) else {
            return;
        };
        let request = String::from_utf8_lossy(&buf[..n]);
        assert!(request.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(request.contains(&format!("ST: {}\r\n", DIAL_SEARCH_TARGET)));

        for reply in replies {
            socket.send_to(&reply, from).unwrap();
        }
    });

    SsdpConfig {
        multicast_addr: Ipv4Addr::LOCALHOST,
        port,
        ..SsdpConfig::default()
    }
}

#[test]
fn test_only_matching_replies_are_kept_in_order() {
    let config = fake_receiver(vec![
        reply(DIAL_SEARCH_TARGET, Some("http://192.0.2.1:8008/ssdp/device-desc.xml")).into_bytes(),
        reply("upnp:rootdevice", Some("http://192.0.2.9/other.xml")).into_bytes(),
        reply(DIAL_SEARCH_TARGET, None).into_bytes(),
        vec![0xff, 0xfe, 0x00, 0x13],
        reply(DIAL_SEARCH_TARGET, Some("http://192.0.2.1:8008/ssdp/device-desc.xml")).into_bytes(),
        reply(DIAL_SEARCH_TARGET, Some("http://192.0.2.2:8008/dd.xml")).into_bytes(),
    ]);

    let options = DiscoverOptions::from_config(&config).timeout(Duration::from_millis(800));
    let devices = discover(&config, &options).unwrap();

    // Duplicates are kept: the same device answering twice shows up twice
    assert_eq!(
        devices,
        vec![
            "http://192.0.2.1:8008/ssdp/device-desc.xml",
            "http://192.0.2.1:8008/ssdp/device-desc.xml",
            "http://192.0.2.2:8008/dd.xml",
        ]
    );
}

#[test]
fn test_max_devices_stops_early() {
    let replies = (0..5)
        .map(|i| reply(DIAL_SEARCH_TARGET, Some(&format!("http://192.0.2.{}/dd.xml", i))).into_bytes())
        .collect();
    let config = fake_receiver(replies);

    let options = DiscoverOptions::from_config(&config)
        .timeout(Duration::from_secs(5))
        .max_devices(2);

    let start = Instant::now();
    let devices = discover(&config, &options).unwrap();

    assert_eq!(devices, vec!["http://192.0.2.0/dd.xml", "http://192.0.2.1/dd.xml"]);
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[test]
fn test_deadline_is_respected_without_replies() {
    let config = fake_receiver(Vec::new());
    let timeout = Duration::from_millis(300);
    let options = DiscoverOptions::from_config(&config).timeout(timeout);

    let start = Instant::now();
    let devices = discover(&config, &options).unwrap();
    let elapsed = start.elapsed();

    assert!(devices.is_empty());
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_millis(500));
}

#[test]
fn test_deadline_holds_under_reply_flood() {
    let replies = (0..200)
        .map(|_| reply("upnp:rootdevice", Some("http://192.0.2.9/x.xml")).into_bytes())
        .collect();
    let config = fake_receiver(replies);
    let timeout = Duration::from_millis(300);

    let start = Instant::now();
    let devices = discover(&config, &DiscoverOptions::from_config(&config).timeout(timeout)).unwrap();

    assert!(devices.is_empty());
    assert!(start.elapsed() < timeout + Duration::from_millis(500));
}
