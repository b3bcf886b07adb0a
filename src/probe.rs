use crate::errors::Result;
use crate::model::SnmpCredential;
use async_trait::async_trait;

/// What the nmap stage learned about one address
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostScanReport {
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub hostname: Option<String>,
}

/// External host scanner capability (nmap)
#[async_trait]
pub trait HostScanner: Send + Sync {
    async fn scan(&self, ip: &str) -> Result<HostScanReport>;
    fn name(&self) -> &'static str;
}

/// One name record from a NetBIOS node status answer
#[derive(Debug, Clone, PartialEq)]
pub struct NetbiosRecord {
    pub name: String,
    pub suffix: u8,
    pub group: bool,
}

/// Full NetBIOS node status answer for one address
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeStatus {
    pub records: Vec<NetbiosRecord>,
    pub mac: Option<String>,
}

/// NetBIOS name service capability
#[async_trait]
pub trait NetbiosProbe: Send + Sync {
    /// Returns `None` when the address did not answer the status query
    async fn node_status(&self, ip: &str) -> Result<Option<NodeStatus>>;
    fn name(&self) -> &'static str;
}

/// A value read from an SNMP agent
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    OctetString(Vec<u8>),
    Integer(i64),
    Oid(String),
    IpAddress(String),
    Null,
}

impl SnmpValue {
    /// Render the value as display text, if it has one
    pub fn as_text(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) => {
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
            SnmpValue::Integer(n) => Some(n.to_string()),
            SnmpValue::Oid(oid) => Some(oid.clone()),
            SnmpValue::IpAddress(ip) => Some(ip.clone()),
            SnmpValue::Null => None,
        }
    }

    /// Render the value as a MAC address candidate. A six-byte octet string
    /// becomes colon-separated hex; anything else falls back to its text.
    pub fn as_mac_candidate(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) if bytes.len() == 6 => Some(
                bytes
                    .iter()
                    .map(|b| format!("{b:02x}"))
                    .collect::<Vec<_>>()
                    .join(":"),
            ),
            other => other.as_text(),
        }
    }
}

/// An open SNMP session against one agent
#[async_trait]
pub trait SnmpSession: Send + Sync {
    /// GET a single OID. `Ok(None)` means the agent answered without a
    /// usable value, or did not answer at all.
    async fn get(&self, oid: &str) -> Result<Option<SnmpValue>>;

    /// Walk a subtree with GETNEXT, returning `(oid, value)` pairs in
    /// traversal order.
    async fn walk(&self, oid: &str) -> Result<Vec<(String, SnmpValue)>>;
}

/// Opens SNMP sessions from credentials; the seam that lets tests (or a
/// richer client) replace the built-in v1/v2c implementation.
#[async_trait]
pub trait SnmpSessionFactory: Send + Sync {
    async fn open(&self, ip: &str, credential: &SnmpCredential) -> Result<Box<dyn SnmpSession>>;
}

/// Manufacturer refiner capability: given a system description and the live
/// session, may produce a more specific description.
#[async_trait]
pub trait DescriptionRefiner: Send + Sync {
    async fn refine(&self, description: &str, session: &dyn SnmpSession) -> Option<String>;
    fn name(&self) -> &'static str;
}

/// External nmap invocation: version detection, argument selection, XML parsing
pub mod nmap {
    use super::*;
    use crate::errors::DiscoveryError;
    use serde::Deserialize;
    use tokio::process::Command;
    use tracing::{debug, warn};

    /// Minimal nmap XML schema: only the parts of `-oX -` output the
    /// pipeline consumes (first host, MAC + vendor, first hostname).
    #[derive(Debug, Deserialize)]
    pub struct NmapRun {
        #[serde(rename = "host", default)]
        pub hosts: Vec<Host>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Host {
        #[serde(rename = "address", default)]
        pub addresses: Vec<Address>,
        #[serde(rename = "hostnames", default)]
        pub hostnames: Option<Hostnames>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Address {
        #[serde(rename = "@addr")]
        pub addr: String,
        #[serde(rename = "@addrtype")]
        pub addr_type: String,
        #[serde(rename = "@vendor", default)]
        pub vendor: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Hostnames {
        #[serde(rename = "hostname", default)]
        pub hostnames: Vec<Hostname>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Hostname {
        #[serde(rename = "@name")]
        pub name: String,
    }

    /// Parse `nmap -V` output into a `(major, minor)` pair
    pub fn parse_version(output: &str) -> Option<(u32, u32)> {
        let rest = output.split("Nmap version ").nth(1)?;
        let token = rest.split_whitespace().next()?;
        let mut parts = token.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor: u32 = parts
            .next()
            .map(|m| m.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
            .and_then(|m| m.parse().ok())
            .unwrap_or(0);
        Some((major, minor))
    }

    /// Scan arguments for a given nmap version. 5.30 introduced `-PP` and
    /// unit-suffixed timeouts.
    pub fn scan_args(version: (u32, u32)) -> Vec<&'static str> {
        if version >= (5, 30) {
            vec![
                "-sP",
                "-PP",
                "--system-dns",
                "--max-retries",
                "1",
                "--max-rtt-timeout",
                "1000ms",
            ]
        } else {
            vec![
                "-sP",
                "--system-dns",
                "--max-retries",
                "1",
                "--max-rtt-timeout",
                "1000",
            ]
        }
    }

    /// Extract the pipeline's fields from one scan's XML output:
    /// the first `addrtype=mac` address with its vendor, and the first
    /// hostname of the first host.
    pub fn parse_scan_output(xml: &str) -> Result<HostScanReport> {
        let run: NmapRun = quick_xml::de::from_str(xml)
            .map_err(|e| DiscoveryError::Probe(format!("nmap XML parse: {e}")))?;

        let mut report = HostScanReport::default();
        let Some(host) = run.hosts.first() else {
            return Ok(report);
        };

        if let Some(mac_addr) = host.addresses.iter().find(|a| a.addr_type == "mac") {
            report.mac = Some(mac_addr.addr.clone());
            report.vendor = mac_addr.vendor.clone();
        }
        report.hostname = host
            .hostnames
            .as_ref()
            .and_then(|h| h.hostnames.first())
            .map(|h| h.name.clone());

        Ok(report)
    }

    /// Host scanner backed by the installed nmap binary
    pub struct NmapScanner {
        path: String,
        args: Vec<&'static str>,
        version: (u32, u32),
    }

    impl NmapScanner {
        /// Probe for an installed nmap. `None` when the binary is missing
        /// or its version line is unreadable; the stage is then skipped
        /// for the whole job.
        pub async fn detect(path: &str) -> Option<NmapScanner> {
            let output = match Command::new(path).arg("-V").output().await {
                Ok(out) => out,
                Err(e) => {
                    warn!("nmap not available at {path}: {e}");
                    return None;
                }
            };
            let stdout = String::from_utf8_lossy(&output.stdout);
            let Some(version) = parse_version(&stdout) else {
                warn!("could not read nmap version from {path}");
                return None;
            };
            debug!("nmap {}.{} detected", version.0, version.1);
            Some(NmapScanner {
                path: path.to_string(),
                args: scan_args(version),
                version,
            })
        }

        pub fn version(&self) -> (u32, u32) {
            self.version
        }
    }

    #[async_trait]
    impl HostScanner for NmapScanner {
        fn name(&self) -> &'static str {
            "nmap host scan"
        }

        async fn scan(&self, ip: &str) -> Result<HostScanReport> {
            let output = Command::new(&self.path)
                .args(&self.args)
                .arg(ip)
                .arg("-oX")
                .arg("-")
                .output()
                .await
                .map_err(|e| DiscoveryError::Probe(format!("nmap spawn: {e}")))?;

            let xml = String::from_utf8_lossy(&output.stdout);
            parse_scan_output(&xml)
        }
    }
}

/// NetBIOS name service: node status query over UDP/137
pub mod netbios {
    use super::*;
    use crate::errors::DiscoveryError;
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tokio::time::timeout;
    use tracing::debug;

    const NETBIOS_PORT: u16 = 137;
    /// NBSTAT resource record type
    const QTYPE_NBSTAT: u16 = 0x0021;
    /// Group bit in a name record's flags word
    const FLAG_GROUP: u16 = 0x8000;

    /// Build a node status request for the wildcard name `*`
    pub fn encode_status_request(transaction_id: u16) -> Vec<u8> {
        let mut packet = Vec::with_capacity(50);
        packet.extend_from_slice(&transaction_id.to_be_bytes());
        packet.extend_from_slice(&[0x00, 0x00]); // flags: query
        packet.extend_from_slice(&[0x00, 0x01]); // one question
        packet.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        // First-level encoding of "*" padded with NULs: each nibble maps
        // to 'A' + nibble, so 0x2A -> "CK" and 0x00 -> "AA".
        packet.push(0x20);
        packet.push(b'C');
        packet.push(b'K');
        for _ in 0..15 {
            packet.push(b'A');
            packet.push(b'A');
        }
        packet.push(0x00);

        packet.extend_from_slice(&QTYPE_NBSTAT.to_be_bytes());
        packet.extend_from_slice(&[0x00, 0x01]); // class IN
        packet
    }

    /// Decode a node status answer into name records and the unit MAC.
    /// Returns `None` when the packet is not a well-formed NBSTAT answer.
    pub fn decode_status_response(packet: &[u8]) -> Option<NodeStatus> {
        // Header (12) + echoed name (34) + type/class/TTL/RDLENGTH (10)
        let rdata = 56;
        let num_names = *packet.get(rdata)? as usize;
        let mut records = Vec::with_capacity(num_names);

        let mut offset = rdata + 1;
        for _ in 0..num_names {
            let entry = packet.get(offset..offset + 18)?;
            let name = String::from_utf8_lossy(&entry[..15])
                .trim_end_matches(&[' ', '\0'][..])
                .to_string();
            let suffix = entry[15];
            let flags = u16::from_be_bytes([entry[16], entry[17]]);
            records.push(NetbiosRecord {
                name,
                suffix,
                group: flags & FLAG_GROUP != 0,
            });
            offset += 18;
        }

        // Statistics block starts with the six-byte unit ID
        let unit_id = packet.get(offset..offset + 6)?;
        let mac = if unit_id.iter().any(|b| *b != 0) {
            Some(
                unit_id
                    .iter()
                    .map(|b| format!("{b:02X}"))
                    .collect::<Vec<_>>()
                    .join("-"),
            )
        } else {
            None
        };

        Some(NodeStatus { records, mac })
    }

    /// NetBIOS client over a throwaway UDP socket per query
    pub struct UdpNetbiosClient {
        timeout: Duration,
        transaction: AtomicU16,
    }

    impl UdpNetbiosClient {
        pub fn new(timeout: Duration) -> Self {
            Self {
                timeout,
                transaction: AtomicU16::new(0x4000),
            }
        }
    }

    #[async_trait]
    impl NetbiosProbe for UdpNetbiosClient {
        fn name(&self) -> &'static str {
            "NetBIOS node status"
        }

        async fn node_status(&self, ip: &str) -> Result<Option<NodeStatus>> {
            let socket = UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(|e| DiscoveryError::Probe(format!("netbios socket: {e}")))?;

            let txn = self.transaction.fetch_add(1, Ordering::Relaxed);
            let request = encode_status_request(txn);
            socket
                .send_to(&request, (ip, NETBIOS_PORT))
                .await
                .map_err(|e| DiscoveryError::Probe(format!("netbios send: {e}")))?;

            let mut buf = vec![0u8; 1024];
            let received = match timeout(self.timeout, socket.recv_from(&mut buf)).await {
                Ok(Ok((n, _))) => n,
                Ok(Err(e)) => {
                    debug!("netbios recv error for {ip}: {e}");
                    return Ok(None);
                }
                Err(_) => return Ok(None), // no answer
            };
            buf.truncate(received);

            Ok(decode_status_response(&buf))
        }
    }
}

/// SNMP: minimal BER v1/v2c client, classifier and refiner plumbing
pub mod snmp {
    use super::*;
    use crate::constants::{OID_BRIDGE_ADDRESS, OID_IF_PHYS_ADDRESS, OID_SYS_DESCR, OID_SYS_NAME};
    use crate::dictionary::Dictionary;
    use crate::errors::DiscoveryError;
    use crate::model::{is_canonical_mac, is_zero_mac, sanitize, SnmpVersion};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tokio::time::timeout;
    use tracing::debug;

    const SNMP_PORT: u16 = 161;
    const TAG_SEQUENCE: u8 = 0x30;
    const TAG_INTEGER: u8 = 0x02;
    const TAG_OCTET_STRING: u8 = 0x04;
    const TAG_NULL: u8 = 0x05;
    const TAG_OID: u8 = 0x06;
    const TAG_IP_ADDRESS: u8 = 0x40;
    const TAG_COUNTER32: u8 = 0x41;
    const TAG_GAUGE32: u8 = 0x42;
    const TAG_TIMETICKS: u8 = 0x43;
    const PDU_GET: u8 = 0xA0;
    const PDU_GETNEXT: u8 = 0xA1;
    const PDU_RESPONSE: u8 = 0xA2;
    /// Walk iteration cap against agents that loop their MIB view
    const WALK_LIMIT: usize = 1_024;

    fn encode_length(len: usize) -> Vec<u8> {
        if len < 0x80 {
            vec![len as u8]
        } else if len <= 0xFF {
            vec![0x81, len as u8]
        } else {
            vec![0x82, (len >> 8) as u8, (len & 0xFF) as u8]
        }
    }

    fn encode_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend_from_slice(&encode_length(content.len()));
        out.extend_from_slice(content);
        out
    }

    fn encode_integer(value: i64) -> Vec<u8> {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < 7 && bytes[start] == 0 && bytes[start + 1] < 0x80 {
            start += 1;
        }
        encode_tlv(TAG_INTEGER, &bytes[start..])
    }

    /// Encode a dotted OID (leading dot tolerated) into BER form
    pub fn encode_oid(oid: &str) -> Result<Vec<u8>> {
        let arcs: Vec<u64> = oid
            .trim_start_matches('.')
            .split('.')
            .map(|p| {
                p.parse()
                    .map_err(|_| DiscoveryError::Snmp(format!("invalid OID: {oid}")))
            })
            .collect::<Result<_>>()?;
        if arcs.len() < 2 {
            return Err(DiscoveryError::Snmp(format!("invalid OID: {oid}")));
        }

        let mut content = vec![(arcs[0] * 40 + arcs[1]) as u8];
        for &arc in &arcs[2..] {
            let mut chunk = Vec::new();
            let mut rest = arc;
            loop {
                chunk.push((rest & 0x7F) as u8);
                rest >>= 7;
                if rest == 0 {
                    break;
                }
            }
            chunk.reverse();
            let last = chunk.len() - 1;
            for (i, byte) in chunk.iter().enumerate() {
                content.push(if i == last { *byte } else { byte | 0x80 });
            }
        }
        Ok(encode_tlv(TAG_OID, &content))
    }

    fn decode_oid(content: &[u8]) -> String {
        let mut arcs: Vec<u64> = Vec::new();
        if let Some(first) = content.first() {
            arcs.push((*first / 40) as u64);
            arcs.push((*first % 40) as u64);
        }
        let mut value: u64 = 0;
        for byte in &content[1.min(content.len())..] {
            value = (value << 7) | (byte & 0x7F) as u64;
            if byte & 0x80 == 0 {
                arcs.push(value);
                value = 0;
            }
        }
        arcs.iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Read one TLV header; returns `(tag, content_start, content_end)`
    fn read_tlv(buf: &[u8], pos: usize) -> Option<(u8, usize, usize)> {
        let tag = *buf.get(pos)?;
        let first = *buf.get(pos + 1)? as usize;
        let (len, content_start) = if first < 0x80 {
            (first, pos + 2)
        } else {
            let count = first & 0x7F;
            if count == 0 || count > 2 {
                return None;
            }
            let mut len = 0usize;
            for i in 0..count {
                len = (len << 8) | *buf.get(pos + 2 + i)? as usize;
            }
            (len, pos + 2 + count)
        };
        let content_end = content_start.checked_add(len)?;
        if content_end > buf.len() {
            return None;
        }
        Some((tag, content_start, content_end))
    }

    fn read_integer(content: &[u8]) -> i64 {
        let mut value: i64 = if content.first().is_some_and(|b| b & 0x80 != 0) {
            -1
        } else {
            0
        };
        for byte in content {
            value = (value << 8) | *byte as i64;
        }
        value
    }

    /// Build a GET/GETNEXT message for a single OID
    pub fn encode_request(
        version: SnmpVersion,
        community: &str,
        pdu_type: u8,
        request_id: i32,
        oid: &str,
    ) -> Result<Vec<u8>> {
        let mut varbind = encode_oid(oid)?;
        varbind.extend_from_slice(&[TAG_NULL, 0x00]);
        let varbind = encode_tlv(TAG_SEQUENCE, &varbind);
        let varbind_list = encode_tlv(TAG_SEQUENCE, &varbind);

        let mut pdu_body = encode_integer(request_id as i64);
        pdu_body.extend_from_slice(&encode_integer(0)); // error-status
        pdu_body.extend_from_slice(&encode_integer(0)); // error-index
        pdu_body.extend_from_slice(&varbind_list);
        let pdu = encode_tlv(pdu_type, &pdu_body);

        let version_byte = match version {
            SnmpVersion::V1 => 0,
            SnmpVersion::V2c => 1,
            SnmpVersion::V3 => {
                return Err(DiscoveryError::Snmp("SNMPv3 has no community message".into()))
            }
        };
        let mut message = encode_integer(version_byte);
        message.extend_from_slice(&encode_tlv(TAG_OCTET_STRING, community.as_bytes()));
        message.extend_from_slice(&pdu);
        Ok(encode_tlv(TAG_SEQUENCE, &message))
    }

    /// First varbind of a decoded response message
    #[derive(Debug, Clone, PartialEq)]
    pub struct DecodedVarBind {
        pub request_id: i64,
        pub error_status: i64,
        pub oid: String,
        pub value: SnmpValue,
    }

    /// Decode a response message down to its first varbind.
    /// Returns `None` for anything that is not a well-formed GetResponse.
    pub fn decode_response(buf: &[u8]) -> Option<DecodedVarBind> {
        let (tag, start, end) = read_tlv(buf, 0)?;
        if tag != TAG_SEQUENCE {
            return None;
        }
        let message = &buf[start..end];

        let (tag, vstart, vend) = read_tlv(message, 0)?;
        if tag != TAG_INTEGER {
            return None;
        }
        let _version = read_integer(&message[vstart..vend]);

        let (tag, _community_start, cend) = read_tlv(message, vend)?;
        if tag != TAG_OCTET_STRING {
            return None;
        }

        let (tag, pstart, pend) = read_tlv(message, cend)?;
        if tag != PDU_RESPONSE {
            return None;
        }
        let pdu = &message[pstart..pend];

        let (_, rstart, rend) = read_tlv(pdu, 0)?;
        let request_id = read_integer(&pdu[rstart..rend]);
        let (_, estart, eend) = read_tlv(pdu, rend)?;
        let error_status = read_integer(&pdu[estart..eend]);
        let (_, _, iend) = read_tlv(pdu, eend)?;

        let (tag, lstart, _lend) = read_tlv(pdu, iend)?;
        if tag != TAG_SEQUENCE {
            return None;
        }
        let (tag, bstart, bend) = read_tlv(pdu, lstart)?;
        if tag != TAG_SEQUENCE {
            return None;
        }
        let varbind = &pdu[bstart..bend];

        let (tag, ostart, oend) = read_tlv(varbind, 0)?;
        if tag != TAG_OID {
            return None;
        }
        let oid = decode_oid(&varbind[ostart..oend]);

        let (tag, dstart, dend) = read_tlv(varbind, oend)?;
        let content = &varbind[dstart..dend];
        let value = match tag {
            TAG_OCTET_STRING => SnmpValue::OctetString(content.to_vec()),
            TAG_INTEGER | TAG_COUNTER32 | TAG_GAUGE32 | TAG_TIMETICKS => {
                SnmpValue::Integer(read_integer(content))
            }
            TAG_OID => SnmpValue::Oid(decode_oid(content)),
            TAG_IP_ADDRESS => SnmpValue::IpAddress(
                content
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join("."),
            ),
            // Null and the v2c exceptions (noSuchObject, noSuchInstance,
            // endOfMibView) all mean "nothing here"
            _ => SnmpValue::Null,
        };

        Some(DecodedVarBind {
            request_id,
            error_status,
            oid,
            value,
        })
    }

    /// SNMP v1/v2c session over a connected UDP socket.
    /// One session per credential per address; dropped when probing moves on.
    pub struct CommunitySession {
        socket: UdpSocket,
        version: SnmpVersion,
        community: String,
        timeout: Duration,
        request_id: AtomicI32,
    }

    impl CommunitySession {
        pub async fn open(ip: &str, credential: &SnmpCredential, timeout: Duration) -> Result<Self> {
            if credential.version == SnmpVersion::V3 {
                return Err(DiscoveryError::Snmp(
                    "SNMPv3 is not supported by the built-in client".into(),
                ));
            }
            let community = credential
                .community
                .clone()
                .filter(|c| !c.is_empty())
                .ok_or_else(|| {
                    DiscoveryError::Snmp(format!("credential {} has no community", credential.id))
                })?;

            let socket = UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(|e| DiscoveryError::Snmp(format!("socket: {e}")))?;
            socket
                .connect((ip, SNMP_PORT))
                .await
                .map_err(|e| DiscoveryError::Snmp(format!("connect {ip}: {e}")))?;

            Ok(Self {
                socket,
                version: credential.version,
                community,
                timeout,
                request_id: AtomicI32::new(1),
            })
        }

        async fn request(&self, pdu_type: u8, oid: &str) -> Result<Option<DecodedVarBind>> {
            let request_id = self.request_id.fetch_add(1, Ordering::Relaxed);
            let message =
                encode_request(self.version, &self.community, pdu_type, request_id, oid)?;
            self.socket
                .send(&message)
                .await
                .map_err(|e| DiscoveryError::Snmp(format!("send: {e}")))?;

            let mut buf = vec![0u8; 8 * 1024];
            let received = match timeout(self.timeout, self.socket.recv(&mut buf)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(DiscoveryError::Snmp(format!("recv: {e}"))),
                Err(_) => return Ok(None), // agent silent
            };
            buf.truncate(received);

            let Some(decoded) = decode_response(&buf) else {
                debug!("undecodable SNMP answer for {oid}");
                return Ok(None);
            };
            if decoded.error_status != 0 {
                return Ok(None);
            }
            Ok(Some(decoded))
        }
    }

    #[async_trait]
    impl SnmpSession for CommunitySession {
        async fn get(&self, oid: &str) -> Result<Option<SnmpValue>> {
            let answer = self.request(PDU_GET, oid).await?;
            Ok(answer.and_then(|vb| match vb.value {
                SnmpValue::Null => None,
                value => Some(value),
            }))
        }

        async fn walk(&self, oid: &str) -> Result<Vec<(String, SnmpValue)>> {
            let root = oid.trim_start_matches('.').to_string();
            let prefix = format!("{root}.");
            let mut current = root.clone();
            let mut rows = Vec::new();

            for _ in 0..WALK_LIMIT {
                let Some(answer) = self.request(PDU_GETNEXT, &current).await? else {
                    break;
                };
                if !answer.oid.starts_with(&prefix) || matches!(answer.value, SnmpValue::Null) {
                    break;
                }
                current = answer.oid.clone();
                rows.push((answer.oid, answer.value));
            }
            Ok(rows)
        }
    }

    /// Default session factory producing [`CommunitySession`]s
    pub struct UdpSnmpFactory {
        timeout: Duration,
    }

    impl UdpSnmpFactory {
        pub fn new(timeout: Duration) -> Self {
            Self { timeout }
        }
    }

    #[async_trait]
    impl SnmpSessionFactory for UdpSnmpFactory {
        async fn open(
            &self,
            ip: &str,
            credential: &SnmpCredential,
        ) -> Result<Box<dyn SnmpSession>> {
            let session = CommunitySession::open(ip, credential, self.timeout).await?;
            Ok(Box::new(session))
        }
    }

    /// What the SNMP stage contributes to a device record
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct SnmpOutcome {
        pub description: String,
        pub snmp_hostname: Option<String>,
        pub serial: Option<String>,
        pub mac: Option<String>,
        pub modelsnmp: Option<String>,
        pub device_type: Option<String>,
        pub auth_snmp: String,
    }

    /// Serial numbers come back with stray line endings and filler dot
    /// runs; strip both and trim.
    pub fn clean_serial(raw: &str) -> String {
        let no_eol: String = raw.chars().filter(|c| *c != '\r' && *c != '\n').collect();
        let mut out = String::with_capacity(no_eol.len());
        let mut dots = 0usize;
        for c in no_eol.chars() {
            if c == '.' {
                dots += 1;
                continue;
            }
            if dots == 1 {
                out.push('.');
            }
            dots = 0;
            out.push(c);
        }
        if dots == 1 {
            out.push('.');
        }
        out.trim().to_string()
    }

    /// Characterize one address over SNMP: iterate credentials until one
    /// yields a system description, refine it, classify it against the
    /// dictionary, and extract the model's bindings.
    pub async fn characterize(
        ip: &str,
        credentials: &[SnmpCredential],
        dictionary: &Dictionary,
        factory: &dyn SnmpSessionFactory,
        refiners: &[std::sync::Arc<dyn DescriptionRefiner>],
    ) -> Option<SnmpOutcome> {
        for credential in credentials {
            let session = match factory.open(ip, credential).await {
                Ok(session) => session,
                Err(e) => {
                    debug!("snmp session {ip} credential {}: {e}", credential.id);
                    continue;
                }
            };

            let raw_description = match session.get(OID_SYS_DESCR).await {
                Ok(Some(value)) => value.as_text(),
                Ok(None) => None,
                Err(e) => {
                    debug!("snmp sysDescr {ip}: {e}");
                    None
                }
            };
            // No description through an open session ends the SNMP stage
            // for this address; further credentials would not do better.
            let Some(raw_description) = raw_description.filter(|d| !d.is_empty()) else {
                return None;
            };

            let mut description = raw_description;
            for refiner in refiners {
                if let Some(better) = refiner.refine(&description, session.as_ref()).await {
                    if !better.is_empty() {
                        description = better;
                        break;
                    }
                }
            }
            let description = sanitize(&description);

            let model = dictionary.classify(&description);

            let serial = match model.and_then(|m| m.serial.as_deref()) {
                Some(oid) => match session.get(oid).await {
                    Ok(Some(value)) => value
                        .as_text()
                        .map(|raw| clean_serial(&raw))
                        .filter(|s| !s.is_empty()),
                    _ => None,
                },
                None => None,
            };

            let (mac_oid, mac_walk_oid) = match model {
                Some(m) => (m.mac.as_deref(), m.macdyn.as_deref()),
                None => (Some(OID_BRIDGE_ADDRESS), Some(OID_IF_PHYS_ADDRESS)),
            };
            let mac = resolve_mac(session.as_ref(), mac_oid, mac_walk_oid).await;

            let snmp_hostname = match session.get(OID_SYS_NAME).await {
                Ok(Some(value)) => value.as_text().map(|h| sanitize(&h)).filter(|h| !h.is_empty()),
                _ => None,
            };

            return Some(SnmpOutcome {
                description,
                snmp_hostname,
                serial,
                mac,
                modelsnmp: model.and_then(|m| m.modelsnmp.clone()),
                device_type: model.and_then(|m| m.device_type.clone()),
                auth_snmp: credential.id.clone(),
            });
        }

        None
    }

    /// MAC extraction: primary OID first; when that yields nothing
    /// canonical, walk the dynamic subtree and keep the last non-zero value.
    async fn resolve_mac(
        session: &dyn SnmpSession,
        primary: Option<&str>,
        walk_root: Option<&str>,
    ) -> Option<String> {
        if let Some(oid) = primary {
            if let Ok(Some(value)) = session.get(oid).await {
                if let Some(candidate) = value.as_mac_candidate() {
                    if is_canonical_mac(&candidate) && !is_zero_mac(&candidate) {
                        return Some(candidate);
                    }
                }
            }
        }

        let root = walk_root?;
        let rows = match session.walk(root).await {
            Ok(rows) => rows,
            Err(e) => {
                debug!("snmp mac walk {root}: {e}");
                return None;
            }
        };
        rows.iter()
            .rev()
            .filter_map(|(_, value)| value.as_mac_candidate())
            .find(|mac| is_canonical_mac(mac) && !is_zero_mac(mac))
    }
}
