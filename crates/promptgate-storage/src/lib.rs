//! Incident persistence backends for PromptGate
//!
//! Provides [`SqliteIncidentStore`] for durable storage and
//! [`InMemoryIncidentStore`] for tests. Both implement the
//! [`IncidentStore`](promptgate_core::IncidentStore) append/query contract:
//! records are written once, never mutated, never deleted.

mod memory;
mod sqlite;

pub use memory::InMemoryIncidentStore;
pub use sqlite::SqliteIncidentStore;
