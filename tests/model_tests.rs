use chrono::TimeZone;
use rdisco::model::{
    is_canonical_mac, is_zero_mac, normalize_mac, process_number_at, sanitize, DeviceBatch,
    DiscoveredDevice, DiscoveryJob, SnmpVersion,
};

#[test]
fn test_sanitize_strips_and_trims() {
    assert_eq!(sanitize("  HOST1 \u{0}"), "HOST1");
    assert_eq!(sanitize("line\r\nbreak"), "linebreak");
    assert_eq!(sanitize("h\u{e9}llo"), "hllo");
    assert_eq!(sanitize("   "), "");
    assert_eq!(sanitize("Acme Router X"), "Acme Router X");
}

#[test]
fn test_canonical_mac() {
    assert!(is_canonical_mac("00:11:22:aa:bb:cc"));
    assert!(is_canonical_mac("00:11:22:AA:BB:CC"));
    assert!(!is_canonical_mac("0:1:2:a:b:c"));
    assert!(!is_canonical_mac("00-11-22-aa-bb-cc"));
    assert!(!is_canonical_mac("00:11:22:aa:bb"));
    assert!(!is_canonical_mac("00:11:22:aa:bb:cc:dd"));
    assert!(!is_canonical_mac("zz:11:22:aa:bb:cc"));
    assert!(!is_canonical_mac(""));
}

#[test]
fn test_normalize_mac() {
    assert_eq!(
        normalize_mac("00-11-22-33-44-55").as_deref(),
        Some("00:11:22:33:44:55")
    );
    assert_eq!(
        normalize_mac("001122334455").as_deref(),
        Some("00:11:22:33:44:55")
    );
    assert_eq!(
        normalize_mac("00:11:22:33:44:55").as_deref(),
        Some("00:11:22:33:44:55")
    );
    assert!(normalize_mac("not a mac").is_none());
}

#[test]
fn test_zero_macs_are_recognized() {
    assert!(is_zero_mac("00:00:00:00:00:00"));
    assert!(is_zero_mac("0:0:0:0:0:0"));
    assert!(!is_zero_mac("00:00:00:00:00:01"));
}

#[test]
fn test_process_number_format() {
    // February 10th is day-of-year 41
    let at = chrono::Local.with_ymd_and_hms(2023, 2, 10, 9, 5, 30).unwrap();
    assert_eq!(process_number_at(&at), "0410905");

    let end_of_year = chrono::Local
        .with_ymd_and_hms(2023, 12, 31, 23, 59, 0)
        .unwrap();
    assert_eq!(process_number_at(&end_of_year), "3652359");
}

#[test]
fn test_device_wire_field_names() {
    let device = DiscoveredDevice {
        ip: Some("10.0.0.5".to_string()),
        mac: Some("00:11:22:33:44:55".to_string()),
        dns_hostname: Some("host1.example.com".to_string()),
        netbios_name: Some("HOST1".to_string()),
        user_session: Some("alice".to_string()),
        snmp_hostname: Some("sw-01".to_string()),
        device_type: Some("NETWORKING".to_string()),
        netport_vendor: Some("Acme".to_string()),
        auth_snmp: Some("2".to_string()),
        ..Default::default()
    };

    let value = serde_json::to_value(&device).unwrap();
    assert_eq!(value["dnsHostname"], "host1.example.com");
    assert_eq!(value["netbiosName"], "HOST1");
    assert_eq!(value["userSession"], "alice");
    assert_eq!(value["snmpHostname"], "sw-01");
    assert_eq!(value["type"], "NETWORKING");
    assert_eq!(value["netportVendor"], "Acme");
    assert_eq!(value["authSnmp"], "2");
    // Unset fields stay off the wire
    assert!(value.get("workgroup").is_none());
    assert!(value.get("serial").is_none());
}

#[test]
fn test_batch_wire_shape() {
    let batch = DeviceBatch {
        devices: vec![DiscoveredDevice {
            ip: Some("10.0.0.5".to_string()),
            ..Default::default()
        }],
        module_version: "0.3.1".to_string(),
        process_number: "0410905".to_string(),
    };

    let value = serde_json::to_value(&batch).unwrap();
    assert_eq!(value["DEVICE"].as_array().unwrap().len(), 1);
    assert_eq!(value["MODULEVERSION"], "0.3.1");
    assert_eq!(value["PROCESSNUMBER"], "0410905");
}

#[test]
fn test_job_deserializes_server_options() {
    let raw = r#"{
        "PARAM": [{"THREADS_DISCOVERY": 10}],
        "RANGEIP": [{"IPSTART": "10.0.0.1", "IPEND": "10.0.0.9", "ENTITY": "3"}],
        "AUTHENTICATION": [
            {"ID": "1", "VERSION": "2c", "COMMUNITY": "public"},
            {"ID": "2", "VERSION": "3", "USERNAME": "admin"}
        ],
        "DICOHASH": "abc123"
    }"#;

    let job: DiscoveryJob = serde_json::from_str(raw).unwrap();
    assert_eq!(job.threads(1), 10);
    assert_eq!(job.ranges.len(), 1);
    assert_eq!(job.ranges[0].ip_start.as_deref(), Some("10.0.0.1"));
    assert_eq!(job.ranges[0].entity.as_deref(), Some("3"));
    assert_eq!(job.credentials.len(), 2);
    assert_eq!(job.credentials[0].version, SnmpVersion::V2c);
    assert_eq!(job.credentials[1].version, SnmpVersion::V3);
    assert_eq!(job.dico_hash.as_deref(), Some("abc123"));
    assert!(job.dico.is_none());
}

#[test]
fn test_job_threads_fall_back_and_clamp() {
    // No PARAM: the caller's default wins
    let job: DiscoveryJob = serde_json::from_str("{}").unwrap();
    assert_eq!(job.threads(1), 1);
    assert_eq!(job.threads(4), 4);

    // A nonsense zero is clamped, whatever the default
    let raw = r#"{"PARAM": [{"THREADS_DISCOVERY": 0}]}"#;
    let job: DiscoveryJob = serde_json::from_str(raw).unwrap();
    assert_eq!(job.threads(0), 1);
}

#[test]
fn test_snmp_version_rejects_unknown() {
    assert!(serde_json::from_str::<SnmpVersion>("\"4\"").is_err());
    assert!(serde_json::from_str::<SnmpVersion>("\"2c\"").is_ok());
}
