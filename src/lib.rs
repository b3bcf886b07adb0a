//! rdisco - the discovery engine of a network inventory agent
//!
//! Given a server-supplied job (IP ranges, SNMP credentials, model
//! dictionary), the engine probes every address with up to three
//! capabilities (nmap host scan, NetBIOS node status, SNMP), classifies
//! SNMP devices against the dictionary, and streams device records back in
//! bounded batches through a persisted spool.

pub mod config;
pub mod constants;
pub mod dictionary;
pub mod engine;
pub mod errors;
pub mod expand;
pub mod model;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod spool;
pub mod worker;

// Re-export commonly used types for convenience
pub use config::EngineConfig;
pub use dictionary::{Dictionary, DictionaryResolution};
pub use engine::{DiscoveryEngine, JobOutcome, JobSummary};
pub use errors::{DiscoveryError, Result};
pub use expand::expand_ranges;
pub use model::{AddressItem, DiscoveredDevice, DiscoveryJob, IpRange, SnmpCredential, SnmpModel};
pub use pipeline::{probe_address, ProbeCapabilities, ProbeContext};
pub use probe::{
    DescriptionRefiner, HostScanner, NetbiosProbe, SnmpSession, SnmpSessionFactory, SnmpValue,
};
pub use report::{JsonLinesSink, Reporter, ReportSink};
pub use spool::{FileSpool, MemorySpool, ResultSpool};
pub use worker::{WorkerAction, WorkerSlot, WorkerState};
