use crate::constants::{AGENT_VERSION, MODULE_VERSION};
use crate::errors::{DiscoveryError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;

/// Outbound transport seam. Receives fully enveloped messages; the concrete
/// HTTP/XML client to the server lives behind this trait.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn send(&self, message: Value) -> Result<()>;
}

/// Wrap a payload in the discovery envelope
pub fn envelope(content: Value) -> Value {
    json!({
        "QUERY": "NETDISCOVERY",
        "CONTENT": content,
    })
}

/// Thin sender constructing each message shape of the discovery protocol
pub struct Reporter {
    sink: Arc<dyn ReportSink>,
    process_number: String,
}

impl Reporter {
    pub fn new(sink: Arc<dyn ReportSink>, process_number: String) -> Self {
        Self {
            sink,
            process_number,
        }
    }

    async fn send(&self, content: Value) -> Result<()> {
        self.sink.send(envelope(content)).await
    }

    /// Job opening: `{AGENT:{START, AGENTVERSION}, MODULEVERSION, PROCESSNUMBER}`
    pub async fn send_start(&self) -> Result<()> {
        self.send(json!({
            "AGENT": { "START": "1", "AGENTVERSION": AGENT_VERSION },
            "MODULEVERSION": MODULE_VERSION,
            "PROCESSNUMBER": self.process_number,
        }))
        .await
    }

    /// Announce the size of the block about to be probed
    pub async fn send_block_size(&self, addresses: usize) -> Result<()> {
        self.send(json!({
            "AGENT": { "NBIP": addresses },
            "PROCESSNUMBER": self.process_number,
        }))
        .await
    }

    /// Forward one spooled device batch unchanged
    pub async fn send_batch(&self, batch: Value) -> Result<()> {
        self.send(batch).await
    }

    /// Ask the server to ship a fresh dictionary with the next prolog
    pub async fn send_dictionary_request(&self) -> Result<()> {
        self.send(json!({
            "AGENT": { "END": "1" },
            "MODULEVERSION": MODULE_VERSION,
            "PROCESSNUMBER": self.process_number,
            "DICO": "REQUEST",
        }))
        .await
    }

    /// Job closing marker
    pub async fn send_end(&self) -> Result<()> {
        self.send(json!({
            "AGENT": { "END": "1" },
            "MODULEVERSION": MODULE_VERSION,
            "PROCESSNUMBER": self.process_number,
        }))
        .await
    }
}

/// Default sink: one envelope per line onto any writer (stdout by default).
/// Stands in for the real server transport in standalone runs.
pub struct JsonLinesSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    pub fn stdout() -> Self {
        Self {
            out: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl ReportSink for JsonLinesSink {
    async fn send(&self, message: Value) -> Result<()> {
        let line = serde_json::to_string(&message)?;
        let mut out = self.out.lock();
        writeln!(out, "{line}").map_err(|e| DiscoveryError::Report(e.to_string()))?;
        out.flush().map_err(|e| DiscoveryError::Report(e.to_string()))?;
        Ok(())
    }
}
