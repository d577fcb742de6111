//! Persistence collaborator
//!
//! A small data-access API over SQLite: automation metadata in, value
//! domains in, generated test cases and their results out. The contract
//! is read-before-use / write-after-computation; nothing else in the
//! workspace touches SQL.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use hat_core::{CaseOutcome, CaseStatus, Priority, TestCase};
use hat_rule::{AdmissionMode, Automation};
use hat_testgen::ValueDomain;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the data-access layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored value could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("stored timestamp could not be parsed: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// Automation metadata as the scheduler reads it back
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationRecord {
    pub id: String,
    pub alias: Option<String>,
    pub mode: AdmissionMode,
    pub max: usize,
    pub created_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// SQLite-backed record store
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!(path = ?path.as_ref(), "opened store");
        Self::init(conn)
    }

    /// In-memory store, used by tests and dry runs
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS automations (
                 id         TEXT PRIMARY KEY,
                 alias      TEXT,
                 mode       TEXT NOT NULL,
                 max        INTEGER NOT NULL,
                 created_at TEXT NOT NULL,
                 last_error TEXT
             );
             CREATE TABLE IF NOT EXISTS value_domains (
                 automation_id TEXT NOT NULL,
                 entity_name   TEXT NOT NULL,
                 domain        TEXT NOT NULL,
                 PRIMARY KEY (automation_id, entity_name)
             );
             CREATE TABLE IF NOT EXISTS test_cases (
                 id            TEXT PRIMARY KEY,
                 automation_id TEXT NOT NULL,
                 requirement   TEXT,
                 priority      TEXT NOT NULL,
                 inputs        TEXT NOT NULL,
                 created_at    TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS case_results (
                 case_id     TEXT NOT NULL,
                 status      TEXT NOT NULL,
                 detail      TEXT,
                 finished_at TEXT NOT NULL
             );",
        )?;
        Ok(Self { conn })
    }

    /// Insert or refresh an automation's metadata
    pub fn upsert_automation(&self, automation: &Automation) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO automations (id, alias, mode, max, created_at, last_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 alias = excluded.alias,
                 mode = excluded.mode,
                 max = excluded.max,
                 last_error = excluded.last_error",
            params![
                automation.id,
                automation.alias,
                enum_tag(&automation.mode)?,
                automation.max as i64,
                automation.created_at.to_rfc3339(),
                automation.last_error,
            ],
        )?;
        debug!(automation = %automation.id, "stored automation metadata");
        Ok(())
    }

    /// Load one automation's metadata
    pub fn load_automation(&self, id: &str) -> StoreResult<Option<AutomationRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, alias, mode, max, created_at, last_error
                 FROM automations WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, alias, mode, max, created_at, last_error)) = row else {
            return Ok(None);
        };

        Ok(Some(AutomationRecord {
            id,
            alias,
            mode: parse_tag(&mode)?,
            max: max.max(0) as usize,
            created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
            last_error,
        }))
    }

    /// Replace the per-entity domain declarations of one automation
    pub fn save_domains(
        &mut self,
        automation_id: &str,
        domains: &HashMap<String, ValueDomain>,
    ) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM value_domains WHERE automation_id = ?1",
            params![automation_id],
        )?;
        for (entity_name, domain) in domains {
            tx.execute(
                "INSERT INTO value_domains (automation_id, entity_name, domain)
                 VALUES (?1, ?2, ?3)",
                params![automation_id, entity_name, serde_json::to_string(domain)?],
            )?;
        }
        tx.commit()?;
        debug!(automation = automation_id, count = domains.len(), "stored domains");
        Ok(())
    }

    /// Load the per-entity domain declarations of one automation
    pub fn load_domains(&self, automation_id: &str) -> StoreResult<HashMap<String, ValueDomain>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_name, domain FROM value_domains WHERE automation_id = ?1",
        )?;
        let rows = stmt.query_map(params![automation_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut domains = HashMap::new();
        for row in rows {
            let (entity_name, raw) = row?;
            domains.insert(entity_name, serde_json::from_str(&raw)?);
        }
        Ok(domains)
    }

    /// Persist a generated batch of test cases
    pub fn save_cases(&mut self, cases: &[TestCase]) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        for case in cases {
            tx.execute(
                "INSERT OR REPLACE INTO test_cases
                     (id, automation_id, requirement, priority, inputs, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    case.id,
                    case.automation_id,
                    case.requirement,
                    enum_tag(&case.priority)?,
                    case.payload().to_string(),
                    case.created_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        debug!(count = cases.len(), "stored test cases");
        Ok(())
    }

    /// Load every stored case of one automation, oldest first
    pub fn load_cases(&self, automation_id: &str) -> StoreResult<Vec<TestCase>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, automation_id, requirement, priority, inputs, created_at
             FROM test_cases WHERE automation_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![automation_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut cases = Vec::new();
        for row in rows {
            let (id, automation_id, requirement, priority, inputs, created_at) = row?;
            let payload: [Vec<serde_json::Value>; 3] = serde_json::from_str(&inputs)?;
            let [trigger_inputs, condition_inputs, action_inputs] = payload;
            cases.push(TestCase {
                id,
                automation_id,
                requirement,
                priority: parse_tag::<Priority>(&priority)?,
                trigger_inputs,
                condition_inputs,
                action_inputs,
                created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
            });
        }
        Ok(cases)
    }

    /// Record the outcomes of a batch run
    pub fn record_results(&mut self, outcomes: &[CaseOutcome]) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        for outcome in outcomes {
            tx.execute(
                "INSERT INTO case_results (case_id, status, detail, finished_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    outcome.case_id,
                    enum_tag(&outcome.status)?,
                    outcome.detail,
                    outcome.finished_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        debug!(count = outcomes.len(), "recorded results");
        Ok(())
    }

    /// Latest recorded status per case of one automation
    pub fn load_results(&self, automation_id: &str) -> StoreResult<Vec<(String, CaseStatus)>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.case_id, r.status
             FROM case_results r
             JOIN test_cases c ON c.id = r.case_id
             WHERE c.automation_id = ?1
             ORDER BY r.finished_at",
        )?;
        let rows = stmt.query_map(params![automation_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (case_id, status) = row?;
            results.push((case_id, parse_tag::<CaseStatus>(&status)?));
        }
        Ok(results)
    }
}

/// Store serde-tagged enums as their bare snake_case tag
fn enum_tag<T: serde::Serialize>(value: &T) -> StoreResult<String> {
    let tagged = serde_json::to_string(value)?;
    Ok(tagged.trim_matches('"').to_string())
}

fn parse_tag<T: serde::de::DeserializeOwned>(tag: &str) -> StoreResult<T> {
    Ok(serde_json::from_str(&format!("\"{tag}\""))?)
}
