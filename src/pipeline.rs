use crate::dictionary::Dictionary;
use crate::model::{is_canonical_mac, sanitize, AddressItem, DiscoveredDevice, SnmpCredential};
use crate::probe::{
    snmp, DescriptionRefiner, HostScanner, NetbiosProbe, SnmpSessionFactory,
};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// The probe capabilities available to a job. A missing capability skips
/// its stage for every address.
#[derive(Clone, Default)]
pub struct ProbeCapabilities {
    pub scanner: Option<Arc<dyn HostScanner>>,
    pub netbios: Option<Arc<dyn NetbiosProbe>>,
    pub snmp: Option<Arc<dyn SnmpSessionFactory>>,
}

impl ProbeCapabilities {
    /// True when at least one probe stage can run
    pub fn any(&self) -> bool {
        self.scanner.is_some() || self.netbios.is_some() || self.snmp.is_some()
    }
}

/// Everything a worker needs to probe a single address
pub struct ProbeContext {
    pub capabilities: ProbeCapabilities,
    pub credentials: Vec<SnmpCredential>,
    pub dictionary: Dictionary,
    pub refiners: Vec<Arc<dyn DescriptionRefiner>>,
}

/// Probe one address and fuse the stage results into a device record.
///
/// Stages run in nmap, NetBIOS, SNMP order; each only touches the fields
/// it found values for. The record is kept only when at least one identity
/// field (MAC, DNS hostname, NetBIOS name) came back.
pub async fn probe_address(ctx: &ProbeContext, item: &AddressItem) -> Option<DiscoveredDevice> {
    if item.ip.is_empty() || Ipv4Addr::from_str(&item.ip).is_err() {
        debug!("dropping invalid address {:?}", item.ip);
        return None;
    }

    let mut device = DiscoveredDevice::default();

    if let Some(scanner) = &ctx.capabilities.scanner {
        match scanner.scan(&item.ip).await {
            Ok(report) => {
                if report.mac.is_some() {
                    device.mac = report.mac;
                }
                if report.vendor.is_some() {
                    device.netport_vendor = report.vendor;
                }
                if report.hostname.is_some() {
                    device.dns_hostname = report.hostname;
                }
            }
            Err(e) => debug!("{} failed for {}: {e}", scanner.name(), item.ip),
        }
    }

    if let Some(netbios) = &ctx.capabilities.netbios {
        match netbios.node_status(&item.ip).await {
            Ok(Some(status)) => apply_node_status(&mut device, &status),
            Ok(None) => {}
            Err(e) => debug!("{} failed for {}: {e}", netbios.name(), item.ip),
        }
    }

    if let Some(factory) = &ctx.capabilities.snmp {
        if !ctx.credentials.is_empty() {
            if let Some(outcome) = snmp::characterize(
                &item.ip,
                &ctx.credentials,
                &ctx.dictionary,
                factory.as_ref(),
                &ctx.refiners,
            )
            .await
            {
                device.description = Some(outcome.description);
                device.auth_snmp = Some(outcome.auth_snmp);
                if outcome.snmp_hostname.is_some() {
                    device.snmp_hostname = outcome.snmp_hostname;
                }
                if outcome.serial.is_some() {
                    device.serial = outcome.serial;
                }
                if outcome.mac.is_some() {
                    device.mac = outcome.mac;
                }
                if outcome.modelsnmp.is_some() {
                    device.modelsnmp = outcome.modelsnmp;
                }
                if outcome.device_type.is_some() {
                    device.device_type = outcome.device_type;
                }
            }
        }
    }

    if let Some(mac) = device.mac.take() {
        device.mac = Some(mac.to_lowercase());
    }

    if !device.is_identified() {
        debug!("no identity found for {}", item.ip);
        return None;
    }

    device.ip = Some(item.ip.clone());
    device.entity = item.entity.clone();
    Some(device)
}

/// Fold NetBIOS name records into the device:
/// suffix 0 group -> workgroup, suffix 3 unique -> user session,
/// suffix 0 unique -> netbios name (ignoring IS~ service names).
fn apply_node_status(device: &mut DiscoveredDevice, status: &crate::probe::NodeStatus) {
    for record in &status.records {
        let name = sanitize(&record.name);
        if name.is_empty() {
            continue;
        }
        match (record.suffix, record.group) {
            (0, true) => device.workgroup = Some(name),
            (3, false) => device.user_session = Some(name),
            (0, false) => {
                if !name.starts_with("IS~") {
                    device.netbios_name = Some(name);
                }
            }
            _ => {}
        }
    }

    let has_valid_mac = device
        .mac
        .as_deref()
        .is_some_and(|m| is_canonical_mac(m));
    if !has_valid_mac {
        if let Some(mac) = &status.mac {
            device.mac = Some(mac.replace('-', ":"));
        }
    }
}
