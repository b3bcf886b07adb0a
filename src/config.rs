use std::path::PathBuf;

/// Tuning knobs for a discovery job.
/// Timing values exist so tests can shrink the coordinator/worker pacing.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker pool size (overridden by the job's THREADS_DISCOVERY)
    pub threads: usize,

    /// Enable the external nmap host scan stage
    pub nmap_enabled: bool,

    /// Enable the NetBIOS node status stage
    pub netbios_enabled: bool,

    /// Enable the SNMP stage
    pub snmp_enabled: bool,

    /// Path of the nmap binary probed at startup
    pub nmap_path: String,

    /// Timeout in milliseconds for one NetBIOS node status query
    pub netbios_timeout_ms: u64,

    /// Timeout in milliseconds for one SNMP request
    pub snmp_timeout_ms: u64,

    /// Interval in milliseconds workers sleep while parked in PAUSE
    pub worker_poll_ms: u64,

    /// Interval in milliseconds between outbound sends while draining
    pub send_pacing_ms: u64,

    /// Pause in milliseconds after every fourth worker spawn
    pub spawn_throttle_ms: u64,

    /// Directory backing the file spool; `None` selects the in-memory
    /// spool (no crash diagnostics between flush and send)
    pub spool_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            nmap_enabled: true,
            netbios_enabled: true,
            snmp_enabled: true,
            nmap_path: "nmap".to_string(),
            netbios_timeout_ms: 1_000,
            snmp_timeout_ms: 1_000,
            worker_poll_ms: 1_000,
            send_pacing_ms: 1_000,
            spawn_throttle_ms: 1_000,
            spool_dir: Some(PathBuf::from("rdisco-spool")),
        }
    }
}
