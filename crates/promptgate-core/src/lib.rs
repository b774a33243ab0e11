//! Core types, traits, and errors for PromptGate
//!
//! This crate contains the foundational pieces shared across all PromptGate
//! components: the detector contract, scan result and incident data model,
//! the incident store abstraction, gateway configuration, and the error
//! taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Scan result types
// ---------------------------------------------------------------------------

/// Output of a single detector run over one piece of text.
///
/// Produced fresh on every [`Detector::scan`] call and immutable once
/// returned; the caller owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Severity score in `[0, 100]`.
    pub score: f64,
    /// Human-readable threat descriptions, in detection order.
    pub threats: Vec<String>,
    /// Detector-specific metadata (match counts, matched categories, ...).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ScanResult {
    /// A clean result: score zero, no threats, no metadata.
    pub fn clean() -> Self {
        Self {
            score: 0.0,
            threats: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

/// Four-band categorical severity label derived from a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Score in `[0, 20]`.
    Low,
    /// Score in `(20, 50]`.
    Medium,
    /// Score in `(50, 80]`.
    High,
    /// Score above 80.
    Critical,
}

impl RiskLevel {
    /// Derive the level from a risk score.
    ///
    /// Band edges are inclusive on the low side: a score of exactly 20 is
    /// `Low`, 50 is `Medium`, 80 is `High`.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score <= 20.0 {
            Self::Low
        } else if score <= 50.0 {
            Self::Medium
        } else if score <= 80.0 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(format!("unknown risk level: {s}")),
        }
    }
}

/// Enforcement decision derived from a risk score and the block threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanAction {
    /// Forward the request to the backend.
    Allow,
    /// Reject the request without contacting the backend.
    Block,
}

impl ScanAction {
    /// Decide the action for a risk score against a configured threshold.
    ///
    /// Scores of 80 and above always block regardless of the threshold, so
    /// raising the threshold past 80 cannot permit critical requests. Below
    /// that tier the configurable threshold applies; everything else is
    /// allowed (scores in `(20, threshold)` are observable-but-permitted).
    #[must_use]
    pub fn decide(score: f64, threshold: f64) -> Self {
        if score >= 80.0 {
            Self::Block
        } else if score >= threshold {
            Self::Block
        } else {
            Self::Allow
        }
    }
}

impl std::fmt::Display for ScanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "ALLOW"),
            Self::Block => write!(f, "BLOCK"),
        }
    }
}

/// One detector's contribution to an aggregate scan, keyed by detector name.
///
/// Kept as an ordered list entry rather than a map so that registration
/// order is preserved when iterating the details of an aggregate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorReport {
    /// Stable detector name (see [`Detector::name`]).
    pub detector: String,
    /// The detector's result for this text.
    pub result: ScanResult,
}

/// Aggregate outcome of running every registered detector over one text.
///
/// `risk_level` and `action` are pure functions of `risk_score` (and, for
/// the action, the configured threshold) — they are derived at construction
/// and never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateScanResult {
    /// Maximum over all detector scores (0 when no detectors are registered).
    pub risk_score: f64,
    /// Severity band derived from `risk_score`.
    pub risk_level: RiskLevel,
    /// All detectors' threat lists concatenated in registration order.
    pub threats: Vec<String>,
    /// Enforcement decision derived from `risk_score` and the threshold.
    pub action: ScanAction,
    /// Per-detector results, in registration order.
    pub details: Vec<DetectorReport>,
}

impl AggregateScanResult {
    /// Aggregate per-detector reports into a single scan outcome.
    ///
    /// The risk score is the maximum of the individual scores — a single
    /// high-confidence detector is never diluted by quiet ones. Threat
    /// lists are concatenated in the order the reports are given.
    #[must_use]
    pub fn aggregate(details: Vec<DetectorReport>, threshold: f64) -> Self {
        let risk_score = details
            .iter()
            .map(|r| r.result.score)
            .fold(0.0_f64, f64::max);
        let threats = details
            .iter()
            .flat_map(|r| r.result.threats.iter().cloned())
            .collect();
        Self {
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            threats,
            action: ScanAction::decide(risk_score, threshold),
            details,
        }
    }

    /// Look up one detector's result by name.
    #[must_use]
    pub fn detail(&self, detector: &str) -> Option<&ScanResult> {
        self.details
            .iter()
            .find(|r| r.detector == detector)
            .map(|r| &r.result)
    }
}

// ---------------------------------------------------------------------------
// Incident types
// ---------------------------------------------------------------------------

/// Direction of the inspected traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Caller → LLM backend.
    Inbound,
    /// LLM backend → caller. Reserved: the current pipeline scans inbound
    /// text only, but the record schema supports response-direction audits.
    Outbound,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbound => write!(f, "INBOUND"),
            Self::Outbound => write!(f, "OUTBOUND"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INBOUND" => Ok(Self::Inbound),
            "OUTBOUND" => Ok(Self::Outbound),
            _ => Err(format!("unknown direction: {s}")),
        }
    }
}

/// Action recorded against a persisted incident.
///
/// `Quarantine` and `Escalate` are reserved extension points for future
/// policy tiers; current policy only ever produces `Allow` and `Block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionTaken {
    Allow,
    Block,
    Quarantine,
    Escalate,
}

impl From<ScanAction> for ActionTaken {
    fn from(action: ScanAction) -> Self {
        match action {
            ScanAction::Allow => Self::Allow,
            ScanAction::Block => Self::Block,
        }
    }
}

impl std::fmt::Display for ActionTaken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "ALLOW"),
            Self::Block => write!(f, "BLOCK"),
            Self::Quarantine => write!(f, "QUARANTINE"),
            Self::Escalate => write!(f, "ESCALATE"),
        }
    }
}

impl std::str::FromStr for ActionTaken {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ALLOW" => Ok(Self::Allow),
            "BLOCK" => Ok(Self::Block),
            "QUARANTINE" => Ok(Self::Quarantine),
            "ESCALATE" => Ok(Self::Escalate),
            _ => Err(format!("unknown action: {s}")),
        }
    }
}

/// An incident record that has not yet been persisted.
///
/// The store assigns the id and creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIncident {
    /// Traffic direction this incident was observed on.
    pub direction: Direction,
    /// Peer address of the caller, when the transport knows it.
    pub source_ip: Option<String>,
    /// The exact text that was scanned.
    pub input_text: String,
    /// Aggregate risk score at scan time.
    pub risk_score: f64,
    /// Severity band at scan time.
    pub risk_level: RiskLevel,
    /// Threat descriptions, in detection order.
    pub detected_threats: Vec<String>,
    /// Enforcement action recorded for this request.
    pub action_taken: ActionTaken,
    /// Free-form request metadata (model name, request type, ...).
    pub extra_info: Option<serde_json::Value>,
}

impl NewIncident {
    /// Build an incident from an aggregate scan outcome.
    pub fn from_scan(
        direction: Direction,
        input_text: impl Into<String>,
        scan: &AggregateScanResult,
        extra_info: Option<serde_json::Value>,
    ) -> Self {
        Self {
            direction,
            source_ip: None,
            input_text: input_text.into(),
            risk_score: scan.risk_score,
            risk_level: scan.risk_level,
            detected_threats: scan.threats.clone(),
            action_taken: scan.action.into(),
            extra_info,
        }
    }

    /// Attach the caller's source address.
    #[must_use]
    pub fn with_source_ip(mut self, ip: impl Into<String>) -> Self {
        self.source_ip = Some(ip.into());
        self
    }
}

/// A persisted, immutable audit record of one scanned request.
///
/// Created exactly once per request that reaches the scan step, never
/// mutated afterwards, never deleted by the core (retention is an external
/// concern).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// Storage-assigned identifier (unique, monotonically increasing).
    pub id: i64,
    /// When the record was created (UTC).
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub source_ip: Option<String>,
    pub input_text: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub detected_threats: Vec<String>,
    pub action_taken: ActionTaken,
    pub extra_info: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address and port to bind the gateway server to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Deployment environment name, reported by the health endpoint.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Base URL of the cloud chat-completion backend.
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    /// Bearer token injected on cloud-backend requests that carry none.
    #[serde(default)]
    pub openai_api_key: String,
    /// Base URL of the locally hosted generation backend.
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,
    /// Risk score at or above which requests are blocked. Scores of 80 and
    /// above block regardless of this value.
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: f64,
    /// Path to the JSON signature rules file. A missing file degrades the
    /// signature detectors to no-ops rather than failing startup.
    #[serde(default = "default_rules_path")]
    pub rules_path: String,
    /// SQLite database URL for incident storage.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Connect timeout for outbound backend calls, in milliseconds. There is
    /// deliberately no overall request timeout: generation can be slow.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_risk_threshold() -> f64 {
    50.0
}

fn default_rules_path() -> String {
    "rules/signatures.json".to_string()
}

fn default_database_url() -> String {
    "sqlite://incidents.db?mode=rwc".to_string()
}

fn default_connection_timeout_ms() -> u64 {
    5000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            environment: default_environment(),
            openai_base_url: default_openai_base_url(),
            openai_api_key: String::new(),
            ollama_base_url: default_ollama_base_url(),
            risk_threshold: default_risk_threshold(),
            rules_path: default_rules_path(),
            database_url: default_database_url(),
            connection_timeout_ms: default_connection_timeout_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. `info`, `promptgate=debug`).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: `text` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Core error types.
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    /// Configuration load or parse failure.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Detector construction failure (e.g. a pattern failed to compile).
    #[error("Detector error: {0}")]
    Detector(String),

    /// Incident persistence failure. A request whose incident could not be
    /// written must not be forwarded.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Outbound backend call failure. Surfaced distinctly from a block
    /// decision and never retried by the core.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for `std::result::Result<T, GatewayError>`.
pub type Result<T> = std::result::Result<T, GatewayError>;

// ---------------------------------------------------------------------------
// Detector contract
// ---------------------------------------------------------------------------

/// A unit that scores arbitrary text for one category of risk.
///
/// Implementations hold their configuration immutably (signature lists,
/// compiled patterns) and keep no mutable state between calls, so one
/// instance can serve unlimited concurrent scans.
pub trait Detector: Send + Sync {
    /// Stable, human-readable identifier. Used as the detail key in
    /// aggregate results and in generated threat descriptions.
    fn name(&self) -> &str;

    /// Score `text` against this detector's static configuration.
    ///
    /// Must be a pure function of the text and the configuration: empty
    /// input yields a clean result, and repeated calls with the same input
    /// yield identical results.
    fn scan(&self, text: &str) -> ScanResult;
}

// ---------------------------------------------------------------------------
// Incident store abstraction
// ---------------------------------------------------------------------------

/// Append/query interface for incident records.
#[async_trait::async_trait]
pub trait IncidentStore: Send + Sync {
    /// Persist an incident, returning the stored record with its assigned
    /// id and creation timestamp.
    async fn record(&self, incident: &NewIncident) -> Result<Incident>;

    /// Fetch the most recent incidents, newest first.
    async fn recent(&self, limit: u32) -> Result<Vec<Incident>>;

    /// Health check for the store.
    async fn health_check(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_band_boundaries() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20.01), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50.01), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80.01), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::Critical);
    }

    #[test]
    fn test_action_two_tier_policy() {
        // Configurable tier at the default threshold.
        assert_eq!(ScanAction::decide(49.0, 50.0), ScanAction::Allow);
        assert_eq!(ScanAction::decide(50.0, 50.0), ScanAction::Block);
        assert_eq!(ScanAction::decide(79.0, 50.0), ScanAction::Block);
        // MEDIUM scores are observable but permitted.
        assert_eq!(ScanAction::decide(21.0, 50.0), ScanAction::Allow);
        // Hardcoded critical tier.
        assert_eq!(ScanAction::decide(80.0, 50.0), ScanAction::Block);
    }

    #[test]
    fn test_action_critical_tier_ignores_raised_threshold() {
        // Raising the threshold above 80 must not permit critical scores.
        assert_eq!(ScanAction::decide(80.0, 95.0), ScanAction::Block);
        assert_eq!(ScanAction::decide(85.0, 95.0), ScanAction::Block);
        assert_eq!(ScanAction::decide(79.0, 95.0), ScanAction::Allow);
    }

    #[test]
    fn test_aggregate_takes_max_not_sum() {
        let details = vec![
            DetectorReport {
                detector: "a".to_string(),
                result: ScanResult {
                    score: 25.0,
                    threats: vec!["t1".to_string()],
                    metadata: HashMap::new(),
                },
            },
            DetectorReport {
                detector: "b".to_string(),
                result: ScanResult {
                    score: 40.0,
                    threats: vec!["t2".to_string(), "t3".to_string()],
                    metadata: HashMap::new(),
                },
            },
        ];
        let agg = AggregateScanResult::aggregate(details, 50.0);
        assert_eq!(agg.risk_score, 40.0);
        assert_eq!(agg.risk_level, RiskLevel::Medium);
        assert_eq!(agg.action, ScanAction::Allow);
        assert_eq!(agg.threats, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_aggregate_empty_registry() {
        let agg = AggregateScanResult::aggregate(Vec::new(), 50.0);
        assert_eq!(agg.risk_score, 0.0);
        assert_eq!(agg.risk_level, RiskLevel::Low);
        assert_eq!(agg.action, ScanAction::Allow);
        assert!(agg.threats.is_empty());
        assert!(agg.details.is_empty());
    }

    #[test]
    fn test_aggregate_detail_lookup_preserves_order() {
        let details = vec![
            DetectorReport {
                detector: "first".to_string(),
                result: ScanResult::clean(),
            },
            DetectorReport {
                detector: "second".to_string(),
                result: ScanResult {
                    score: 10.0,
                    threats: Vec::new(),
                    metadata: HashMap::new(),
                },
            },
        ];
        let agg = AggregateScanResult::aggregate(details, 50.0);
        assert_eq!(agg.details[0].detector, "first");
        assert_eq!(agg.details[1].detector, "second");
        assert_eq!(agg.detail("second").unwrap().score, 10.0);
        assert!(agg.detail("missing").is_none());
    }

    #[test]
    fn test_new_incident_from_scan() {
        let details = vec![DetectorReport {
            detector: "d".to_string(),
            result: ScanResult {
                score: 90.0,
                threats: vec!["bad".to_string()],
                metadata: HashMap::new(),
            },
        }];
        let agg = AggregateScanResult::aggregate(details, 50.0);
        let incident = NewIncident::from_scan(
            Direction::Inbound,
            "some text",
            &agg,
            Some(serde_json::json!({"model": "gpt-4"})),
        )
        .with_source_ip("10.0.0.1");

        assert_eq!(incident.direction, Direction::Inbound);
        assert_eq!(incident.input_text, "some text");
        assert_eq!(incident.risk_score, 90.0);
        assert_eq!(incident.risk_level, RiskLevel::Critical);
        assert_eq!(incident.action_taken, ActionTaken::Block);
        assert_eq!(incident.detected_threats, vec!["bad"]);
        assert_eq!(incident.source_ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_action_taken_round_trip() {
        for action in [
            ActionTaken::Allow,
            ActionTaken::Block,
            ActionTaken::Quarantine,
            ActionTaken::Escalate,
        ] {
            let parsed: ActionTaken = action.to_string().parse().unwrap();
            assert_eq!(parsed, action);
        }
    }

    #[test]
    fn test_risk_level_round_trip() {
        for level in [
            RiskLevel::Low,
            RiskLevel::Medium,
            RiskLevel::High,
            RiskLevel::Critical,
        ] {
            let parsed: RiskLevel = level.to_string().parse().unwrap();
            assert_eq!(parsed, level);
        }
    }

    #[test]
    fn test_gateway_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.risk_threshold, 50.0);
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(config.ollama_base_url, "http://localhost:11434");
        assert_eq!(config.logging.level, "info");
    }
}
