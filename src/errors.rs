use thiserror::Error;

/// Result alias used by every public operation in the crate.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Error types for the discovery engine and its collaborators
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid job options: {0}")]
    InvalidJob(String),

    #[error("Dictionary error: {0}")]
    Dictionary(String),

    #[error("Spool error: {0}")]
    Spool(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("SNMP error: {0}")]
    Snmp(String),

    #[error("Report send failed: {0}")]
    Report(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
