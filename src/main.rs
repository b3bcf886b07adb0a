use async_trait::async_trait;
use comfy_table::{Cell, Table};
use parking_lot::Mutex;
use rdisco::errors::{DiscoveryError, Result as DiscoResult};
use rdisco::model::DiscoveredDevice;
use rdisco::report::{JsonLinesSink, ReportSink};
use rdisco::spool::ResultSpool;
use rdisco::{DiscoveryEngine, DiscoveryJob, EngineConfig, FileSpool, MemorySpool};
use serde_json::Value;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Forwards every envelope to stdout as a JSON line and keeps the reported
/// devices so the run can end with a summary table.
struct SummarySink {
    inner: JsonLinesSink,
    devices: Arc<Mutex<Vec<DiscoveredDevice>>>,
}

#[async_trait]
impl ReportSink for SummarySink {
    async fn send(&self, message: Value) -> DiscoResult<()> {
        if let Some(batch) = message
            .get("CONTENT")
            .and_then(|c| c.get("DEVICE"))
            .and_then(|d| d.as_array())
        {
            let mut devices = self.devices.lock();
            for entry in batch {
                if let Ok(device) = serde_json::from_value(entry.clone()) {
                    devices.push(device);
                }
            }
        }
        self.inner.send(message).await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(job_path) = args.get(1) else {
        eprintln!("usage: rdisco <job.json>");
        std::process::exit(2);
    };

    let raw = std::fs::read_to_string(job_path)?;
    let job: DiscoveryJob = serde_json::from_str(&raw)
        .map_err(|e| DiscoveryError::InvalidJob(format!("{job_path}: {e}")))?;

    let config = EngineConfig::default();
    let spool: Arc<dyn ResultSpool> = match &config.spool_dir {
        Some(dir) => Arc::new(FileSpool::new(dir)?),
        None => Arc::new(MemorySpool::new()),
    };
    let devices = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::new(SummarySink {
        inner: JsonLinesSink::stdout(),
        devices: devices.clone(),
    });

    let engine = DiscoveryEngine::new(config, spool, sink);
    let summary = engine.run(&job).await?;

    let devices = devices.lock();
    if !devices.is_empty() {
        eprintln!("{}", device_table(&devices));
    }
    eprintln!(
        "Probed {} addresses: {} devices in {} batches ({} send failures), outcome {:?}",
        summary.addresses_probed,
        summary.devices_reported,
        summary.batches_sent,
        summary.send_failures,
        summary.outcome,
    );

    Ok(())
}

/// Render the discovered devices the way a run report reads best
fn device_table(devices: &[DiscoveredDevice]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "IP",
        "MAC",
        "DNS name",
        "NetBIOS name",
        "Model",
        "Type",
        "Serial",
    ]);

    for device in devices {
        let field = |value: &Option<String>| {
            value.clone().unwrap_or_else(|| "—".to_string())
        };
        table.add_row(vec![
            Cell::new(field(&device.ip)),
            Cell::new(field(&device.mac)),
            Cell::new(field(&device.dns_hostname)),
            Cell::new(field(&device.netbios_name)),
            Cell::new(field(&device.modelsnmp)),
            Cell::new(field(&device.device_type)),
            Cell::new(field(&device.serial)),
        ]);
    }

    table
}
