use rdisco::probe::nmap::{parse_scan_output, parse_version, scan_args};
use rdisco::probe::netbios::{decode_status_response, encode_status_request};

// ---- nmap version detection and argument selection ----

#[test]
fn test_parse_version_modern() {
    let banner = "Nmap version 7.94SVN ( https://nmap.org )";
    assert_eq!(parse_version(banner), Some((7, 94)));
}

#[test]
fn test_parse_version_legacy() {
    let banner = "Nmap version 5.00 ( http://nmap.org )";
    assert_eq!(parse_version(banner), Some((5, 0)));
}

#[test]
fn test_parse_version_garbage() {
    assert_eq!(parse_version("command not found"), None);
    assert_eq!(parse_version(""), None);
}

#[test]
fn test_scan_args_split_at_5_30() {
    assert!(scan_args((5, 30)).contains(&"-PP"));
    assert!(scan_args((7, 94)).contains(&"-PP"));
    assert!(scan_args((7, 94)).contains(&"1000ms"));

    let legacy = scan_args((5, 21));
    assert!(!legacy.contains(&"-PP"));
    assert!(legacy.contains(&"1000"));
    assert!(!scan_args((4, 76)).contains(&"-PP"));
}

// ---- nmap XML output parsing ----

const SCAN_XML: &str = r#"<?xml version="1.0"?>
<nmaprun scanner="nmap" args="nmap -sP -oX -" start="1700000000" version="7.94">
<host><status state="up" reason="arp-response"/>
<address addr="10.0.0.5" addrtype="ipv4"/>
<address addr="00:11:22:33:44:55" addrtype="mac" vendor="Acme Networks"/>
<hostnames><hostname name="host1.example.com" type="PTR"/></hostnames>
<times srtt="226" rttvar="5000" to="100000"/>
</host>
<runstats><finished time="1700000001" elapsed="0.05"/><hosts up="1" down="0" total="1"/></runstats>
</nmaprun>"#;

#[test]
fn test_parse_scan_output_extracts_mac_vendor_hostname() {
    let report = parse_scan_output(SCAN_XML).unwrap();
    assert_eq!(report.mac.as_deref(), Some("00:11:22:33:44:55"));
    assert_eq!(report.vendor.as_deref(), Some("Acme Networks"));
    assert_eq!(report.hostname.as_deref(), Some("host1.example.com"));
}

#[test]
fn test_parse_scan_output_host_without_mac() {
    let xml = r#"<nmaprun><host><status state="up"/>
<address addr="10.0.0.9" addrtype="ipv4"/>
</host></nmaprun>"#;
    let report = parse_scan_output(xml).unwrap();
    assert!(report.mac.is_none());
    assert!(report.vendor.is_none());
    assert!(report.hostname.is_none());
}

#[test]
fn test_parse_scan_output_no_host() {
    let report = parse_scan_output("<nmaprun></nmaprun>").unwrap();
    assert_eq!(report, Default::default());
}

#[test]
fn test_parse_scan_output_rejects_garbage() {
    assert!(parse_scan_output("this is not xml <<<").is_err());
}

// ---- NetBIOS node status wire format ----

#[test]
fn test_status_request_shape() {
    let packet = encode_status_request(0x4242);
    assert_eq!(packet.len(), 50);
    assert_eq!(&packet[0..2], &[0x42, 0x42]); // transaction id
    assert_eq!(&packet[2..4], &[0x00, 0x00]); // query flags
    assert_eq!(&packet[4..6], &[0x00, 0x01]); // one question
    assert_eq!(packet[12], 0x20); // encoded name length
    assert_eq!(&packet[13..15], b"CK"); // '*' first-level encoded
    assert_eq!(&packet[46..48], &[0x00, 0x21]); // NBSTAT qtype
}

/// Build a minimal node status answer with the given 18-byte name entries
/// and unit ID.
fn status_response(names: &[(&str, u8, u16)], unit_id: [u8; 6]) -> Vec<u8> {
    let mut packet = vec![0u8; 56];
    packet.push(names.len() as u8);
    for (name, suffix, flags) in names {
        let mut entry = [b' '; 18];
        entry[..name.len()].copy_from_slice(name.as_bytes());
        entry[15] = *suffix;
        entry[16..18].copy_from_slice(&flags.to_be_bytes());
        packet.extend_from_slice(&entry);
    }
    packet.extend_from_slice(&unit_id);
    packet
}

#[test]
fn test_decode_status_response_names_and_mac() {
    let packet = status_response(
        &[
            ("HOST1", 0x00, 0x0400),
            ("WG", 0x00, 0x8400),
            ("ALICE", 0x03, 0x0400),
        ],
        [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
    );

    let status = decode_status_response(&packet).unwrap();
    assert_eq!(status.records.len(), 3);

    assert_eq!(status.records[0].name, "HOST1");
    assert_eq!(status.records[0].suffix, 0);
    assert!(!status.records[0].group);

    assert_eq!(status.records[1].name, "WG");
    assert!(status.records[1].group);

    assert_eq!(status.records[2].name, "ALICE");
    assert_eq!(status.records[2].suffix, 3);

    assert_eq!(status.mac.as_deref(), Some("00-11-22-33-44-55"));
}

#[test]
fn test_decode_status_response_zero_unit_id_has_no_mac() {
    let packet = status_response(&[("HOST1", 0x00, 0x0400)], [0; 6]);
    let status = decode_status_response(&packet).unwrap();
    assert!(status.mac.is_none());
}

#[test]
fn test_decode_status_response_truncated_packet() {
    assert!(decode_status_response(&[0u8; 10]).is_none());

    // Claims two names but carries only one
    let mut packet = status_response(&[("HOST1", 0x00, 0x0400)], [0; 6]);
    packet[56] = 2;
    assert!(decode_status_response(&packet).is_none());
}
