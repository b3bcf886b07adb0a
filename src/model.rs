use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};

/// One inclusive IPv4 range from the server job, scoped by an opaque entity tag
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpRange {
    #[serde(rename = "IPSTART", default)]
    pub ip_start: Option<String>,
    #[serde(rename = "IPEND", default)]
    pub ip_end: Option<String>,
    #[serde(rename = "ENTITY", default)]
    pub entity: Option<String>,
}

/// A single address to probe, derived from range expansion.
/// The IP is kept as a string and validated again at the pipeline boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressItem {
    pub ip: String,
    pub entity: Option<String>,
}

/// SNMP protocol version carried by a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmpVersion {
    V1,
    V2c,
    V3,
}

impl<'de> Deserialize<'de> for SnmpVersion {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "1" => Ok(SnmpVersion::V1),
            "2" | "2c" => Ok(SnmpVersion::V2c),
            "3" => Ok(SnmpVersion::V3),
            other => Err(serde::de::Error::custom(format!(
                "unsupported SNMP version: {other}"
            ))),
        }
    }
}

/// One SNMP credential from the server, tried in order per address
#[derive(Debug, Clone, Deserialize)]
pub struct SnmpCredential {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "VERSION")]
    pub version: SnmpVersion,
    #[serde(rename = "COMMUNITY", default)]
    pub community: Option<String>,
    #[serde(rename = "USERNAME", default)]
    pub username: Option<String>,
    #[serde(rename = "AUTHPASSWORD", default)]
    pub auth_password: Option<String>,
    #[serde(rename = "AUTHPROTOCOL", default)]
    pub auth_protocol: Option<String>,
    #[serde(rename = "PRIVPASSWORD", default)]
    pub priv_password: Option<String>,
    #[serde(rename = "PRIVPROTOCOL", default)]
    pub priv_protocol: Option<String>,
}

/// Dictionary entry: OID bindings for one device model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnmpModel {
    #[serde(default)]
    pub modelsnmp: Option<String>,
    #[serde(rename = "type", default)]
    pub device_type: Option<String>,
    /// OID of the serial number
    #[serde(default)]
    pub serial: Option<String>,
    /// OID of the primary MAC address
    #[serde(default)]
    pub mac: Option<String>,
    /// OID subtree walked when the primary MAC is absent or not canonical
    #[serde(default)]
    pub macdyn: Option<String>,
}

/// A device record as reported to the server.
/// Field names follow the server wire contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(rename = "dnsHostname", default, skip_serializing_if = "Option::is_none")]
    pub dns_hostname: Option<String>,
    #[serde(rename = "netbiosName", default, skip_serializing_if = "Option::is_none")]
    pub netbios_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workgroup: Option<String>,
    #[serde(rename = "userSession", default, skip_serializing_if = "Option::is_none")]
    pub user_session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "snmpHostname", default, skip_serializing_if = "Option::is_none")]
    pub snmp_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modelsnmp: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(rename = "netportVendor", default, skip_serializing_if = "Option::is_none")]
    pub netport_vendor: Option<String>,
    #[serde(rename = "authSnmp", default, skip_serializing_if = "Option::is_none")]
    pub auth_snmp: Option<String>,
}

impl DiscoveredDevice {
    /// A record is worth reporting only when at least one identity field
    /// (MAC, DNS hostname, NetBIOS name) was found.
    pub fn is_identified(&self) -> bool {
        has_value(&self.mac) || has_value(&self.dns_hostname) || has_value(&self.netbios_name)
    }
}

fn has_value(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

/// One spool entry: up to DEVICE_PER_MESSAGE devices plus the job stamps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceBatch {
    #[serde(rename = "DEVICE")]
    pub devices: Vec<DiscoveredDevice>,
    #[serde(rename = "MODULEVERSION")]
    pub module_version: String,
    #[serde(rename = "PROCESSNUMBER")]
    pub process_number: String,
}

/// Per-job tuning parameters from the server prolog
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobParam {
    #[serde(rename = "THREADS_DISCOVERY", default)]
    pub threads_discovery: Option<usize>,
}

/// The NETDISCOVERY options block of a server prolog response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryJob {
    #[serde(rename = "PARAM", default)]
    pub params: Vec<JobParam>,
    #[serde(rename = "RANGEIP", default)]
    pub ranges: Vec<IpRange>,
    #[serde(rename = "AUTHENTICATION", default)]
    pub credentials: Vec<SnmpCredential>,
    #[serde(rename = "DICO", default)]
    pub dico: Option<String>,
    #[serde(rename = "DICOHASH", default)]
    pub dico_hash: Option<String>,
}

impl DiscoveryJob {
    /// Worker pool size requested by the server, falling back to the
    /// given default and clamped to at least one
    pub fn threads(&self, default: usize) -> usize {
        self.params
            .first()
            .and_then(|p| p.threads_discovery)
            .unwrap_or(default)
            .max(1)
    }
}

/// Shared sanitizer applied to every string a probe hands back: trims and
/// strips control and non-printable characters.
pub fn sanitize(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// True when the string is a canonical colon-separated MAC
/// (six groups of two hex digits), either case.
pub fn is_canonical_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Normalize a MAC address to colon-separated form.
/// Accepts `-` or `.` separators and raw 12-digit hex strings.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let clean = mac.replace('-', ":").replace('.', ":");
    let parts: Vec<&str> = clean.split(':').collect();

    if parts.len() == 6 && parts.iter().all(|p| p.len() == 2) {
        return Some(clean);
    }

    // Raw hex string (XXXXXXXXXXXX)
    if clean.len() == 12 && clean.chars().all(|c| c.is_ascii_hexdigit()) {
        let mut formatted = String::with_capacity(17);
        for (i, chunk) in clean.as_bytes().chunks(2).enumerate() {
            if i > 0 {
                formatted.push(':');
            }
            formatted.push_str(&String::from_utf8_lossy(chunk));
        }
        return Some(formatted);
    }

    None
}

/// All-zero MAC values returned by SNMP walks that must be skipped
pub fn is_zero_mac(mac: &str) -> bool {
    matches!(mac, "0:0:0:0:0:0" | "00:00:00:00:00:00")
}

/// Job identifier echoed in every outbound message:
/// day-of-year (3 digits) + hour (2) + minute (2), zero-padded.
pub fn process_number_at(now: &DateTime<Local>) -> String {
    format!(
        "{:03}{:02}{:02}",
        now.ordinal(),
        now.hour(),
        now.minute()
    )
}

/// Process number for the current local time
pub fn process_number() -> String {
    process_number_at(&Local::now())
}
