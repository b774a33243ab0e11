//! Signature-based jailbreak detection.
//!
//! Same matching rule as the injection detector but with a separate
//! signature list and a heavier per-match weight: jailbreak phrasing is a
//! stronger signal than generic instruction override.

use promptgate_core::{Detector, ScanResult};

const MATCH_WEIGHT: f64 = 40.0;
const SCORE_CAP: f64 = 100.0;

/// Matches a configured list of jailbreak phrases as case-insensitive
/// substrings, +40 per matched signature up to the score cap.
pub struct JailbreakDetector {
    signatures: Vec<(String, String)>,
}

impl JailbreakDetector {
    /// Build a detector over the given signature phrases.
    pub fn new(signatures: impl IntoIterator<Item = String>) -> Self {
        Self {
            signatures: signatures
                .into_iter()
                .map(|s| {
                    let lower = s.to_lowercase();
                    (s, lower)
                })
                .collect(),
        }
    }
}

impl Detector for JailbreakDetector {
    fn name(&self) -> &str {
        "Jailbreak Detector"
    }

    fn scan(&self, text: &str) -> ScanResult {
        let haystack = text.to_lowercase();
        let mut threats = Vec::new();
        let mut score = 0.0;

        for (original, lowered) in &self.signatures {
            if haystack.contains(lowered.as_str()) {
                threats.push(format!("Matched jailbreak signature: {original}"));
                score += MATCH_WEIGHT;
            }
        }

        let mut result = ScanResult::clean();
        result.score = score.min(SCORE_CAP);
        result.metadata
            .insert("match_count".to_string(), threats.len().into());
        result.threats = threats;
        result
    }
}
