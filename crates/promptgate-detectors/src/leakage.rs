//! Pattern-based data leakage (PII) detection.

use promptgate_core::{Detector, GatewayError, Result, ScanResult};
use regex::Regex;

const TYPE_WEIGHT: f64 = 50.0;
const SCORE_CAP: f64 = 100.0;

/// One PII pattern category.
struct PiiPattern {
    label: &'static str,
    regex: Regex,
}

/// Detects PII in text via three fixed regex patterns (email, credit-card
/// digit runs, SSN-like digits).
///
/// Scoring is per pattern *type*, not per occurrence: three credit-card
/// numbers contribute 50 once, but a credit card plus an email contribute
/// 100. The patterns are deliberately simplistic and both over- and
/// under-match; downstream behavior depends on their exact shape, so they
/// are kept verbatim.
pub struct LeakageDetector {
    patterns: Vec<PiiPattern>,
}

impl LeakageDetector {
    /// Compile the fixed PII patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern fails to compile.
    pub fn new() -> Result<Self> {
        let defs: [(&'static str, &'static str); 3] = [
            ("Email", r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+"),
            ("Credit Card", r"\b(?:\d[ -]*?){13,16}\b"),
            ("SSN", r"\b\d{3}-\d{2}-\d{4}\b"),
        ];
        let patterns = defs
            .into_iter()
            .map(|(label, pattern)| {
                let regex = Regex::new(pattern).map_err(|e| {
                    GatewayError::Detector(format!("Failed to compile {label} pattern: {e}"))
                })?;
                Ok(PiiPattern { label, regex })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

impl Detector for LeakageDetector {
    fn name(&self) -> &str {
        "Data Leakage Detector"
    }

    fn scan(&self, text: &str) -> ScanResult {
        let mut threats = Vec::new();
        let mut score = 0.0;

        for pattern in &self.patterns {
            let occurrences = pattern.regex.find_iter(text).count();
            if occurrences > 0 {
                threats.push(format!(
                    "Detected {}: {occurrences} occurrence(s)",
                    pattern.label
                ));
                score += TYPE_WEIGHT;
            }
        }

        let mut result = ScanResult::clean();
        result.score = score.min(SCORE_CAP);
        result.metadata.insert(
            "leaked_types".to_string(),
            serde_json::Value::from(threats.clone()),
        );
        result.threats = threats;
        result
    }
}
