use crate::config::EngineConfig;
use crate::constants::{ADDRESS_PER_THREAD, MODULE_VERSION};
use crate::dictionary::{self, DictionaryResolution};
use crate::errors::Result;
use crate::expand::expand_ranges;
use crate::model::{process_number, DiscoveryJob};
use crate::pipeline::{ProbeCapabilities, ProbeContext};
use crate::probe::netbios::UdpNetbiosClient;
use crate::probe::nmap::NmapScanner;
use crate::probe::snmp::UdpSnmpFactory;
use crate::probe::{DescriptionRefiner, HostScanner, NetbiosProbe, SnmpSessionFactory};
use crate::report::{Reporter, ReportSink};
use crate::spool::ResultSpool;
use crate::worker::{run_worker, WorkerAction, WorkerShared, WorkerSlot, WorkerState};
use futures::future::join_all;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// How a job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// All blocks probed, END sent
    Completed,
    /// The dictionary hash handshake failed; a refresh was requested and
    /// the job stopped before any probing
    DictionaryOutOfDate,
}

/// Counters returned to the caller after a job
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub outcome: JobOutcome,
    pub addresses_probed: usize,
    pub devices_reported: usize,
    pub batches_sent: usize,
    pub send_failures: usize,
}

/// Top-level coordinator: expands the job's ranges, drives the worker pool
/// through block cycles, drains the spool between cycles and ships every
/// message of the discovery protocol in order.
pub struct DiscoveryEngine {
    config: EngineConfig,
    spool: Arc<dyn ResultSpool>,
    sink: Arc<dyn ReportSink>,
    scanner: Option<Arc<dyn HostScanner>>,
    netbios: Option<Arc<dyn NetbiosProbe>>,
    snmp: Option<Arc<dyn SnmpSessionFactory>>,
    refiners: Vec<Arc<dyn DescriptionRefiner>>,
}

impl DiscoveryEngine {
    pub fn new(
        config: EngineConfig,
        spool: Arc<dyn ResultSpool>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            config,
            spool,
            sink,
            scanner: None,
            netbios: None,
            snmp: None,
            refiners: Vec::new(),
        }
    }

    /// Replace the autodetected nmap capability (tests, alternate scanners)
    pub fn with_host_scanner(mut self, scanner: Arc<dyn HostScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Replace the built-in NetBIOS client
    pub fn with_netbios_probe(mut self, netbios: Arc<dyn NetbiosProbe>) -> Self {
        self.netbios = Some(netbios);
        self
    }

    /// Replace the built-in SNMP session factory
    pub fn with_snmp_factory(mut self, snmp: Arc<dyn SnmpSessionFactory>) -> Self {
        self.snmp = Some(snmp);
        self
    }

    /// Register a manufacturer description refiner. Refiners are consulted
    /// in registration order; the first non-empty replacement wins.
    pub fn register_refiner(&mut self, refiner: Arc<dyn DescriptionRefiner>) {
        self.refiners.push(refiner);
    }

    /// Execute one discovery job end to end
    pub async fn run(&self, job: &DiscoveryJob) -> Result<JobSummary> {
        let process_number = process_number();
        let reporter = Reporter::new(self.sink.clone(), process_number.clone());
        info!("discovery job {process_number} starting");

        let dictionary = match dictionary::resolve(
            job.dico.as_deref(),
            job.dico_hash.as_deref(),
            self.spool.as_ref(),
        )? {
            DictionaryResolution::Ready(dictionary) => dictionary,
            DictionaryResolution::OutOfDate => {
                if let Err(e) = reporter.send_dictionary_request().await {
                    warn!("dictionary refresh request not sent: {e}");
                }
                return Ok(JobSummary {
                    outcome: JobOutcome::DictionaryOutOfDate,
                    addresses_probed: 0,
                    devices_reported: 0,
                    batches_sent: 0,
                    send_failures: 0,
                });
            }
        };

        let capabilities = self.assemble_capabilities().await;
        if !capabilities.any() {
            warn!("no probe capability available; every block will come back empty");
        }

        let addresses = expand_ranges(&job.ranges);
        let threads = job.threads(self.config.threads);
        info!(
            "probing {} addresses with {threads} workers",
            addresses.len()
        );

        let shared = Arc::new(WorkerShared {
            block: Mutex::new(Vec::new()),
            batch_counter: AtomicU32::new(0),
            spool: self.spool.clone(),
            context: ProbeContext {
                capabilities,
                credentials: job.credentials.clone(),
                dictionary,
                refiners: self.refiners.clone(),
            },
            module_version: MODULE_VERSION.to_string(),
            process_number,
            poll_interval: Duration::from_millis(self.config.worker_poll_ms),
            failure: parking_lot::Mutex::new(None),
        });

        let slots: Vec<Arc<WorkerSlot>> = (0..threads).map(|_| Arc::new(WorkerSlot::new())).collect();
        let mut handles = Vec::with_capacity(threads);
        for (id, slot) in slots.iter().enumerate() {
            handles.push(tokio::spawn(run_worker(shared.clone(), slot.clone(), id)));
            // Throttle spawning so sessions and processes ramp up smoothly
            if (id + 1) % 4 == 0 {
                sleep(Duration::from_millis(self.config.spawn_throttle_ms)).await;
            }
        }

        if let Err(e) = reporter.send_start().await {
            warn!("start message not sent: {e}");
        }

        let mut summary = JobSummary {
            outcome: JobOutcome::Completed,
            addresses_probed: addresses.len(),
            devices_reported: 0,
            batches_sent: 0,
            send_failures: 0,
        };

        let block_size = threads * ADDRESS_PER_THREAD;
        for block in addresses.chunks(block_size) {
            debug!("starting block of {} addresses", block.len());
            {
                let mut shared_block = shared.block.lock().await;
                shared_block.extend(block.iter().cloned());
            }
            if let Err(e) = reporter.send_block_size(block.len()).await {
                warn!("block announce not sent: {e}");
            }

            for slot in &slots {
                slot.set_action(WorkerAction::Run);
            }
            self.wait_until(|| slots.iter().all(|s| s.is_parked())).await;

            self.drain_spool(&reporter, &shared, &mut summary).await?;
        }

        for slot in &slots {
            slot.set_action(WorkerAction::Stop);
        }
        self.wait_until(|| slots.iter().all(|s| s.state() == WorkerState::Stop))
            .await;
        join_all(handles).await;

        if let Err(e) = reporter.send_end().await {
            warn!("end message not sent: {e}");
        }

        if let Some(failure) = shared.failure.lock().take() {
            return Err(failure);
        }

        info!(
            "discovery job done: {} devices in {} batches",
            summary.devices_reported, summary.batches_sent
        );
        Ok(summary)
    }

    /// Ship every spool entry of the finished cycle in ascending key order,
    /// then reset the key allocator for the next cycle.
    async fn drain_spool(
        &self,
        reporter: &Reporter,
        shared: &WorkerShared,
        summary: &mut JobSummary,
    ) -> Result<()> {
        let max_idx = shared.batch_counter.load(Ordering::SeqCst);
        for idx in 1..=max_idx {
            let Some(entry) = self.spool.restore(idx)? else {
                continue;
            };
            let device_count = entry
                .get("DEVICE")
                .and_then(|d| d.as_array())
                .map_or(0, |d| d.len());

            match reporter.send_batch(entry).await {
                Ok(()) => {
                    summary.batches_sent += 1;
                    summary.devices_reported += device_count;
                }
                Err(e) => {
                    // No retry: the batch is dropped and counted
                    warn!("device batch {idx} not sent: {e}");
                    summary.send_failures += 1;
                }
            }
            self.spool.remove(idx)?;
            sleep(Duration::from_millis(self.config.send_pacing_ms)).await;
        }
        shared.batch_counter.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Poll a convergence condition at the worker pacing interval
    async fn wait_until<F: Fn() -> bool>(&self, done: F) {
        loop {
            if done() {
                return;
            }
            sleep(Duration::from_millis(self.config.worker_poll_ms)).await;
        }
    }

    /// Bring up the probe capabilities: injected ones win, otherwise the
    /// built-in implementations are constructed, with nmap detected from
    /// the installed binary. Missing capabilities degrade the pipeline
    /// instead of failing the job.
    async fn assemble_capabilities(&self) -> ProbeCapabilities {
        let scanner = if !self.config.nmap_enabled {
            None
        } else if let Some(scanner) = &self.scanner {
            Some(scanner.clone())
        } else {
            match NmapScanner::detect(&self.config.nmap_path).await {
                Some(scanner) => {
                    let (major, minor) = scanner.version();
                    info!("nmap {major}.{minor} available");
                    Some(Arc::new(scanner) as Arc<dyn HostScanner>)
                }
                None => {
                    warn!("nmap stage disabled");
                    None
                }
            }
        };

        let netbios = if !self.config.netbios_enabled {
            None
        } else if let Some(netbios) = &self.netbios {
            Some(netbios.clone())
        } else {
            Some(Arc::new(UdpNetbiosClient::new(Duration::from_millis(
                self.config.netbios_timeout_ms,
            ))) as Arc<dyn NetbiosProbe>)
        };

        let snmp = if !self.config.snmp_enabled {
            None
        } else if let Some(snmp) = &self.snmp {
            Some(snmp.clone())
        } else {
            Some(Arc::new(UdpSnmpFactory::new(Duration::from_millis(
                self.config.snmp_timeout_ms,
            ))) as Arc<dyn SnmpSessionFactory>)
        };

        ProbeCapabilities {
            scanner,
            netbios,
            snmp,
        }
    }
}
