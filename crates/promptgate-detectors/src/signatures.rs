//! Signature rules file loading.
//!
//! The injection and jailbreak detectors share one JSON rules file of the
//! shape `{"injection": ["...", ...], "jailbreak": ["...", ...]}`. A missing
//! file degrades to empty lists so the detectors become no-ops instead of
//! failing startup; a present but malformed file is a configuration error.

use promptgate_core::{GatewayError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Signature phrase lists loaded from the rules file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignatureRules {
    /// Prompt injection signatures.
    #[serde(default)]
    pub injection: Vec<String>,
    /// Jailbreak signatures.
    #[serde(default)]
    pub jailbreak: Vec<String>,
}

impl SignatureRules {
    /// Load rules from a JSON file, degrading to empty lists when the file
    /// does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Signature rules file not found, using empty rule set");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("Failed to read rules file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            GatewayError::Config(format!("Invalid rules file {}: {e}", path.display()))
        })
    }
}
