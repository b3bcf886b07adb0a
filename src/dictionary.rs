use crate::constants::{BUILTIN_DICTIONARY, DICTIONARY_SPOOL_KEY};
use crate::errors::{DiscoveryError, Result};
use crate::model::SnmpModel;
use crate::spool::ResultSpool;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, info};

/// Parsed built-in dictionary, loaded lazily on first fallback
static BUILTIN: Lazy<Dictionary> = Lazy::new(|| {
    Dictionary::from_payload(BUILTIN_DICTIONARY).expect("built-in dictionary is valid")
});

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Model dictionary: maps an SNMP system description to a model with its
/// OID bindings, identified by a content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dictionary {
    models: HashMap<String, SnmpModel>,
    hash: String,
}

impl Dictionary {
    /// Parse a dictionary payload (a JSON object mapping descriptions to
    /// models). The hash identifying this dictionary is the SHA-256 digest
    /// of the raw payload.
    pub fn from_payload(payload: &str) -> Result<Self> {
        let models: HashMap<String, SnmpModel> = serde_json::from_str(payload)
            .map_err(|e| DiscoveryError::Dictionary(format!("invalid payload: {e}")))?;
        Ok(Self {
            models,
            hash: sha256_hex(payload.as_bytes()),
        })
    }

    /// The built-in fallback dictionary
    pub fn builtin() -> &'static Dictionary {
        &BUILTIN
    }

    /// Look up the model for a system description.
    /// Matching is exact on the full description.
    pub fn classify(&self, description: &str) -> Option<&SnmpModel> {
        self.models.get(description)
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Persistence form stored under the well-known spool key
#[derive(Debug, Serialize, Deserialize)]
struct StoredDictionary {
    dictionary: HashMap<String, SnmpModel>,
    hash: String,
}

/// Outcome of the dictionary handshake
#[derive(Debug)]
pub enum DictionaryResolution {
    /// A dictionary is in force; discovery may proceed
    Ready(Dictionary),
    /// The in-hand dictionary does not match the server's expected hash;
    /// the job must request a refresh and stop
    OutOfDate,
}

/// Negotiate which dictionary is in force for this job.
///
/// Order: server payload (persisted for later jobs), then the spooled copy,
/// then the built-in fallback. When the server announced an expected hash,
/// a mismatch refuses the job so the next prolog can carry a fresh payload.
pub fn resolve(
    payload: Option<&str>,
    expected_hash: Option<&str>,
    spool: &dyn ResultSpool,
) -> Result<DictionaryResolution> {
    let dictionary = match payload {
        Some(raw) => {
            let dictionary = Dictionary::from_payload(raw)?;
            persist(&dictionary, spool)?;
            info!(
                "using server dictionary ({} models, hash {})",
                dictionary.len(),
                dictionary.hash()
            );
            Some(dictionary)
        }
        None => restore(spool)?,
    };

    let dictionary = match dictionary {
        Some(d) => d,
        None => {
            debug!("no stored dictionary, falling back to built-in");
            Dictionary::builtin().clone()
        }
    };

    if let Some(expected) = expected_hash {
        if expected != dictionary.hash() {
            info!(
                "dictionary hash mismatch (have {}, server expects {expected})",
                dictionary.hash()
            );
            return Ok(DictionaryResolution::OutOfDate);
        }
    }

    Ok(DictionaryResolution::Ready(dictionary))
}

fn persist(dictionary: &Dictionary, spool: &dyn ResultSpool) -> Result<()> {
    let stored = StoredDictionary {
        dictionary: dictionary.models.clone(),
        hash: dictionary.hash.clone(),
    };
    spool.save(DICTIONARY_SPOOL_KEY, &serde_json::to_value(&stored)?)
}

fn restore(spool: &dyn ResultSpool) -> Result<Option<Dictionary>> {
    let Some(value) = spool.restore(DICTIONARY_SPOOL_KEY)? else {
        return Ok(None);
    };
    let stored: StoredDictionary = serde_json::from_value(value)
        .map_err(|e| DiscoveryError::Dictionary(format!("corrupt stored dictionary: {e}")))?;
    debug!(
        "restored dictionary from spool ({} models, hash {})",
        stored.dictionary.len(),
        stored.hash
    );
    Ok(Some(Dictionary {
        models: stored.dictionary,
        hash: stored.hash,
    }))
}
