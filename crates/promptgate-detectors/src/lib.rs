//! Content detectors and scan aggregation for PromptGate
//!
//! This crate provides the three concrete [`Detector`](promptgate_core::Detector)
//! implementations — signature-based prompt injection and jailbreak
//! detection, and pattern-based data leakage detection — plus the
//! [`Scanner`] that runs a registry of detectors over a text and turns
//! their outputs into one risk score, level, and enforcement action.

mod injection;
mod jailbreak;
mod leakage;
mod scanner;
mod signatures;

pub use injection::InjectionDetector;
pub use jailbreak::JailbreakDetector;
pub use leakage::LeakageDetector;
pub use scanner::Scanner;
pub use signatures::SignatureRules;
