//! SQLite incident store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use promptgate_core::{
    ActionTaken, Direction, GatewayError, Incident, IncidentStore, NewIncident, Result, RiskLevel,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Row, Sqlite, SqlitePool};
use std::str::FromStr;

const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS incidents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        direction TEXT NOT NULL,
        source_ip TEXT,
        input_text TEXT NOT NULL,
        risk_score REAL NOT NULL,
        risk_level TEXT NOT NULL,
        detected_threats TEXT NOT NULL DEFAULT '[]',
        action_taken TEXT NOT NULL,
        extra_info TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_incidents_time ON incidents(timestamp)",
];

/// Open (or create) a SQLite connection pool for incident storage.
async fn open_pool(database_url: &str) -> Result<SqlitePool> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| GatewayError::Storage(format!("Invalid database URL: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    // In-memory databases give every connection its own database, so keep a
    // single connection for a consistent view.
    let max_conns: u32 = if database_url.contains(":memory:") {
        1
    } else {
        10
    };

    sqlx::pool::PoolOptions::<Sqlite>::new()
        .max_connections(max_conns)
        .connect_with(connect_opts)
        .await
        .map_err(|e| GatewayError::Storage(format!("Failed to connect to SQLite: {e}")))
}

/// Reconstruct an [`Incident`] from a SQLite row.
fn incident_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Incident> {
    let timestamp = parse_datetime(&row.get::<String, _>("timestamp"))?;
    let direction: Direction = row
        .get::<String, _>("direction")
        .parse()
        .map_err(GatewayError::Storage)?;
    let risk_level: RiskLevel = row
        .get::<String, _>("risk_level")
        .parse()
        .map_err(GatewayError::Storage)?;
    let action_taken: ActionTaken = row
        .get::<String, _>("action_taken")
        .parse()
        .map_err(GatewayError::Storage)?;
    let detected_threats: Vec<String> = {
        let raw: String = row.get("detected_threats");
        serde_json::from_str(&raw)
            .map_err(|e| GatewayError::Storage(format!("Invalid detected_threats JSON: {e}")))?
    };
    let extra_info: Option<serde_json::Value> = row
        .get::<Option<String>, _>("extra_info")
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| GatewayError::Storage(format!("Invalid extra_info JSON: {e}")))
        })
        .transpose()?;

    Ok(Incident {
        id: row.get::<i64, _>("id"),
        timestamp,
        direction,
        source_ip: row.get("source_ip"),
        input_text: row.get("input_text"),
        risk_score: row.get("risk_score"),
        risk_level,
        detected_threats,
        action_taken,
        extra_info,
    })
}

/// Parse a [`DateTime<Utc>`] from an RFC 3339 TEXT column value.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GatewayError::Storage(format!("Invalid datetime '{s}': {e}")))
}

/// SQLite-backed incident store.
///
/// Assigns monotonically increasing ids via AUTOINCREMENT and stores
/// timestamps as RFC 3339 TEXT. Threat lists and extra metadata are stored
/// as JSON TEXT columns.
pub struct SqliteIncidentStore {
    pool: SqlitePool,
}

impl SqliteIncidentStore {
    /// Open (or create) the database and run schema migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = open_pool(database_url).await?;
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| GatewayError::Storage(format!("Migration failed: {e}")))?;
        }
        Ok(Self { pool })
    }
}

#[async_trait]
impl IncidentStore for SqliteIncidentStore {
    async fn record(&self, incident: &NewIncident) -> Result<Incident> {
        let timestamp = Utc::now();
        let threats_json = serde_json::to_string(&incident.detected_threats)
            .map_err(|e| GatewayError::Storage(format!("serialize detected_threats: {e}")))?;
        let extra_json = incident
            .extra_info
            .as_ref()
            .map(|v| {
                serde_json::to_string(v)
                    .map_err(|e| GatewayError::Storage(format!("serialize extra_info: {e}")))
            })
            .transpose()?;

        let result = sqlx::query(
            "INSERT INTO incidents (
                timestamp, direction, source_ip, input_text, risk_score,
                risk_level, detected_threats, action_taken, extra_info
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(timestamp.to_rfc3339())
        .bind(incident.direction.to_string())
        .bind(incident.source_ip.as_deref())
        .bind(&incident.input_text)
        .bind(incident.risk_score)
        .bind(incident.risk_level.to_string())
        .bind(&threats_json)
        .bind(incident.action_taken.to_string())
        .bind(extra_json.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("Failed to insert incident: {e}")))?;

        Ok(Incident {
            id: result.last_insert_rowid(),
            timestamp,
            direction: incident.direction,
            source_ip: incident.source_ip.clone(),
            input_text: incident.input_text.clone(),
            risk_score: incident.risk_score,
            risk_level: incident.risk_level,
            detected_threats: incident.detected_threats.clone(),
            action_taken: incident.action_taken,
            extra_info: incident.extra_info.clone(),
        })
    }

    async fn recent(&self, limit: u32) -> Result<Vec<Incident>> {
        let rows = sqlx::query(
            "SELECT id, timestamp, direction, source_ip, input_text, risk_score,
                    risk_level, detected_threats, action_taken, extra_info
             FROM incidents
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::Storage(format!("Failed to query incidents: {e}")))?;

        rows.iter().map(incident_from_row).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::Storage(format!("Health check failed: {e}")))?;
        Ok(())
    }
}
