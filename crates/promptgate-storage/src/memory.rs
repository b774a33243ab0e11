//! In-memory incident store for testing.

use async_trait::async_trait;
use chrono::Utc;
use promptgate_core::{Incident, IncidentStore, NewIncident, Result};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

/// In-memory incident store.
///
/// Mirrors the SQLite semantics (monotonic ids, newest-first queries) but
/// loses everything on drop. Not intended for production use.
pub struct InMemoryIncidentStore {
    incidents: RwLock<Vec<Incident>>,
    next_id: AtomicI64,
}

impl InMemoryIncidentStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self {
            incidents: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored incidents. Handy for test assertions.
    pub async fn len(&self) -> usize {
        self.incidents.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.incidents.read().await.is_empty()
    }
}

impl Default for InMemoryIncidentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn record(&self, incident: &NewIncident) -> Result<Incident> {
        let stored = Incident {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            timestamp: Utc::now(),
            direction: incident.direction,
            source_ip: incident.source_ip.clone(),
            input_text: incident.input_text.clone(),
            risk_score: incident.risk_score,
            risk_level: incident.risk_level,
            detected_threats: incident.detected_threats.clone(),
            action_taken: incident.action_taken,
            extra_info: incident.extra_info.clone(),
        };
        self.incidents.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<Incident>> {
        let incidents = self.incidents.read().await;
        let mut out: Vec<Incident> = incidents.clone();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptgate_core::{ActionTaken, Direction, RiskLevel};

    fn sample(text: &str) -> NewIncident {
        NewIncident {
            direction: Direction::Inbound,
            source_ip: None,
            input_text: text.to_string(),
            risk_score: 25.0,
            risk_level: RiskLevel::Medium,
            detected_threats: Vec::new(),
            action_taken: ActionTaken::Allow,
            extra_info: None,
        }
    }

    #[tokio::test]
    async fn test_record_assigns_increasing_ids() {
        let store = InMemoryIncidentStore::new();
        let a = store.record(&sample("a")).await.unwrap();
        let b = store.record(&sample("b")).await.unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_recent_newest_first_with_limit() {
        let store = InMemoryIncidentStore::new();
        for i in 0..4 {
            store.record(&sample(&format!("text-{i}"))).await.unwrap();
        }
        let recent = store.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].input_text, "text-3");
        assert_eq!(recent[1].input_text, "text-2");
    }
}
