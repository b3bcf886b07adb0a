use async_trait::async_trait;
use parking_lot::Mutex;
use rdisco::errors::{DiscoveryError, Result};
use rdisco::model::{IpRange, SnmpCredential, SnmpVersion};
use rdisco::probe::{
    HostScanReport, HostScanner, NetbiosProbe, NetbiosRecord, NodeStatus, SnmpSession,
    SnmpSessionFactory, SnmpValue,
};
use rdisco::report::ReportSink;
use rdisco::EngineConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Build a complete range record
#[allow(dead_code)]
pub fn range(start: &str, end: &str, entity: Option<&str>) -> IpRange {
    IpRange {
        ip_start: Some(start.to_string()),
        ip_end: Some(end.to_string()),
        entity: entity.map(|e| e.to_string()),
    }
}

/// v1/v2c credential with a community string
#[allow(dead_code)]
pub fn v2c_credential(id: &str, community: &str) -> SnmpCredential {
    SnmpCredential {
        id: id.to_string(),
        version: SnmpVersion::V2c,
        community: Some(community.to_string()),
        username: None,
        auth_password: None,
        auth_protocol: None,
        priv_password: None,
        priv_protocol: None,
    }
}

/// v3 credential (unsupported by the built-in client and the mocks)
#[allow(dead_code)]
pub fn v3_credential(id: &str) -> SnmpCredential {
    SnmpCredential {
        id: id.to_string(),
        version: SnmpVersion::V3,
        community: None,
        username: Some("admin".to_string()),
        auth_password: Some("secret".to_string()),
        auth_protocol: Some("SHA".to_string()),
        priv_password: None,
        priv_protocol: None,
    }
}

/// Node status answer from name records `(name, suffix, group)` plus a MAC
#[allow(dead_code)]
pub fn node_status(records: &[(&str, u8, bool)], mac: Option<&str>) -> NodeStatus {
    NodeStatus {
        records: records
            .iter()
            .map(|(name, suffix, group)| NetbiosRecord {
                name: name.to_string(),
                suffix: *suffix,
                group: *group,
            })
            .collect(),
        mac: mac.map(|m| m.to_string()),
    }
}

/// Engine config with pacing shrunk so protocol tests run in milliseconds
#[allow(dead_code)]
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        worker_poll_ms: 10,
        send_pacing_ms: 1,
        spawn_throttle_ms: 1,
        ..EngineConfig::default()
    }
}

/// Host scanner answering from a fixed table; unknown addresses scan empty
#[derive(Default)]
pub struct ScriptedScanner {
    pub reports: HashMap<String, HostScanReport>,
}

#[async_trait]
impl HostScanner for ScriptedScanner {
    fn name(&self) -> &'static str {
        "scripted scanner"
    }

    async fn scan(&self, ip: &str) -> Result<HostScanReport> {
        Ok(self.reports.get(ip).cloned().unwrap_or_default())
    }
}

/// NetBIOS probe answering from a fixed table; unknown addresses stay silent
#[derive(Default)]
pub struct ScriptedNetbios {
    pub answers: HashMap<String, NodeStatus>,
}

#[async_trait]
impl NetbiosProbe for ScriptedNetbios {
    fn name(&self) -> &'static str {
        "scripted netbios"
    }

    async fn node_status(&self, ip: &str) -> Result<Option<NodeStatus>> {
        Ok(self.answers.get(ip).cloned())
    }
}

/// One scripted SNMP agent: its community, GET table and walk table.
/// OID keys are stored without a leading dot.
#[derive(Default)]
pub struct ScriptedAgent {
    pub community: String,
    pub values: HashMap<String, SnmpValue>,
    pub walks: HashMap<String, Vec<(String, SnmpValue)>>,
}

#[allow(dead_code)]
impl ScriptedAgent {
    pub fn new(community: &str) -> Self {
        Self {
            community: community.to_string(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, oid: &str, value: SnmpValue) -> Self {
        self.values
            .insert(oid.trim_start_matches('.').to_string(), value);
        self
    }

    pub fn with_text(self, oid: &str, text: &str) -> Self {
        self.with_value(oid, SnmpValue::OctetString(text.as_bytes().to_vec()))
    }

    pub fn with_walk(mut self, root: &str, rows: Vec<(&str, SnmpValue)>) -> Self {
        self.walks.insert(
            root.trim_start_matches('.').to_string(),
            rows.into_iter()
                .map(|(oid, value)| (oid.trim_start_matches('.').to_string(), value))
                .collect(),
        );
        self
    }
}

struct ScriptedSession {
    agent: Arc<ScriptedAgent>,
}

#[async_trait]
impl SnmpSession for ScriptedSession {
    async fn get(&self, oid: &str) -> Result<Option<SnmpValue>> {
        Ok(self.agent.values.get(oid.trim_start_matches('.')).cloned())
    }

    async fn walk(&self, oid: &str) -> Result<Vec<(String, SnmpValue)>> {
        Ok(self
            .agent
            .walks
            .get(oid.trim_start_matches('.'))
            .cloned()
            .unwrap_or_default())
    }
}

/// Session factory over a table of scripted agents keyed by IP. Sessions
/// open only for v1/v2c credentials carrying the agent's community, which
/// is what lets tests exercise the credential iteration.
#[derive(Default)]
pub struct ScriptedSnmpFactory {
    pub agents: HashMap<String, Arc<ScriptedAgent>>,
}

#[allow(dead_code)]
impl ScriptedSnmpFactory {
    pub fn with_agent(mut self, ip: &str, agent: ScriptedAgent) -> Self {
        self.agents.insert(ip.to_string(), Arc::new(agent));
        self
    }
}

#[async_trait]
impl SnmpSessionFactory for ScriptedSnmpFactory {
    async fn open(&self, ip: &str, credential: &SnmpCredential) -> Result<Box<dyn SnmpSession>> {
        if credential.version == SnmpVersion::V3 {
            return Err(DiscoveryError::Snmp("v3 not supported".to_string()));
        }
        let agent = self
            .agents
            .get(ip)
            .ok_or_else(|| DiscoveryError::Snmp(format!("no agent at {ip}")))?;
        if credential.community.as_deref() != Some(agent.community.as_str()) {
            return Err(DiscoveryError::Snmp("session refused".to_string()));
        }
        Ok(Box::new(ScriptedSession {
            agent: agent.clone(),
        }))
    }
}

/// Sink keeping every envelope for ordering and shape assertions
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<Value>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> Vec<Value> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn send(&self, message: Value) -> Result<()> {
        self.messages.lock().push(message);
        Ok(())
    }
}
