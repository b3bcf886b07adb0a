/// Maximum number of devices carried by one batch message to the server.
pub const DEVICE_PER_MESSAGE: usize = 4;

/// Number of addresses handed to each worker per block cycle.
pub const ADDRESS_PER_THREAD: usize = 25;

/// Well-known spool key holding the persisted dictionary between jobs.
pub const DICTIONARY_SPOOL_KEY: u32 = 999_999;

/// Version stamp echoed as MODULEVERSION in every outbound message.
pub const MODULE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version stamp sent in the START message as AGENTVERSION.
pub const AGENT_VERSION: &str = concat!("rdisco/", env!("CARGO_PKG_VERSION"));

/// sysDescr.0
pub const OID_SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";

/// sysName.0
pub const OID_SYS_NAME: &str = "1.3.6.1.2.1.1.5.0";

/// dot1dBaseBridgeAddress.0, the primary MAC source when no model matched.
pub const OID_BRIDGE_ADDRESS: &str = "1.3.6.1.2.1.17.1.1.0";

/// ifPhysAddress column, the MAC walk fallback when no model matched.
pub const OID_IF_PHYS_ADDRESS: &str = "1.3.6.1.2.1.2.2.1.6";

/// Built-in model dictionary, used when neither the server nor the spool
/// provides one. Keys are exact SNMP system descriptions.
pub const BUILTIN_DICTIONARY: &str = r#"{
  "HP ETHERNET MULTI-ENVIRONMENT": {
    "modelsnmp": "HP Jetdirect",
    "type": "PRINTER",
    "serial": ".1.3.6.1.4.1.11.2.3.9.4.2.1.1.3.3.0"
  },
  "Cisco IOS Software, C2960 Software (C2960-LANBASEK9-M), Version 12.2(55)SE5, RELEASE SOFTWARE (fc1)": {
    "modelsnmp": "Cisco 2960",
    "type": "NETWORKING",
    "serial": ".1.3.6.1.4.1.9.3.6.3.0",
    "mac": ".1.3.6.1.2.1.17.1.1.0",
    "macdyn": ".1.3.6.1.2.1.2.2.1.6"
  },
  "RICOH Aficio MP C2051 1.00 / RICOH Network Printer C model": {
    "modelsnmp": "Ricoh Aficio MP C2051",
    "type": "PRINTER",
    "serial": ".1.3.6.1.4.1.367.3.2.1.2.1.4.0"
  },
  "Brother NC-8300h, Firmware Ver.1.11  (11.01.13),MID 8C5-B35,FID 2": {
    "modelsnmp": "Brother NC-8300h",
    "type": "PRINTER",
    "serial": ".1.3.6.1.4.1.2435.2.3.9.4.2.1.5.5.1.0"
  },
  "APC Web/SNMP Management Card (MB:v3.9.2 PF:v3.7.3 PN:apc_hw02_aos_373.bin AF1:v3.7.3 AN1:apc_hw02_sumx_373.bin MN:AP9619)": {
    "modelsnmp": "APC AP9619",
    "type": "NETWORKING",
    "mac": ".1.3.6.1.2.1.2.2.1.6.2"
  },
  "ZebraNet PrintServer": {
    "modelsnmp": "ZebraNet PrintServer",
    "type": "PRINTER"
  }
}"#;
