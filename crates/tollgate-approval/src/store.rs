use chrono::SecondsFormat;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use tollgate_core::{GateError, Result};

use crate::record::ApprovalRecord;

/// Durable backing for the approval ledger.
///
/// The ledger keeps every record in memory; the store is the audit trail and
/// the arbiter when several processes decide on the same database.
pub trait ApprovalStore: Send + Sync {
    /// Every persisted record, oldest first.
    fn load_all(&self) -> Result<Vec<ApprovalRecord>>;

    fn get(&self, id: Uuid) -> Result<Option<ApprovalRecord>>;

    fn insert(&self, record: &ApprovalRecord) -> Result<()>;

    /// Persist a decided record. Returns `false`, writing nothing, when the
    /// stored record is no longer pending.
    fn record_decision(&self, record: &ApprovalRecord) -> Result<bool>;
}

/// SQLite-backed approval store.
pub struct SqliteApprovalStore {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> GateError {
    GateError::Storage(e.to_string())
}

impl SqliteApprovalStore {
    /// Open or create the approvals database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening approval store");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(db_err)?;

        // Enable WAL mode for concurrent readers (CLI next to a running host)
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;

        Self::init(conn)
    }

    /// A private in-memory database (tests, ephemeral hosts).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS approvals (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                session_id TEXT,
                call_id TEXT,
                tool_name TEXT NOT NULL,
                decision TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                record_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_approvals_agent ON approvals(agent_id);
            CREATE INDEX IF NOT EXISTS idx_approvals_session ON approvals(session_id);
            CREATE INDEX IF NOT EXISTS idx_approvals_call ON approvals(call_id);
            CREATE INDEX IF NOT EXISTS idx_approvals_decision ON approvals(decision);
            ",
        )
        .map_err(db_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn decode(json: &str) -> Result<ApprovalRecord> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ApprovalStore for SqliteApprovalStore {
    fn load_all(&self) -> Result<Vec<ApprovalRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT record_json FROM approvals ORDER BY created_at ASC, rowid ASC")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(Self::decode(&row.map_err(db_err)?)?);
        }
        Ok(records)
    }

    fn get(&self, id: Uuid) -> Result<Option<ApprovalRecord>> {
        let conn = self.conn.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT record_json FROM approvals WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        json.as_deref().map(Self::decode).transpose()
    }

    fn insert(&self, record: &ApprovalRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO approvals (id, agent_id, session_id, call_id, tool_name, decision, created_at, record_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.approval_id.to_string(),
                record.agent_id,
                record.session_id,
                record.call_id,
                record.tool_name,
                record.decision.as_str(),
                record
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Nanos, true),
                json,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn record_decision(&self, record: &ApprovalRecord) -> Result<bool> {
        let json = serde_json::to_string(record)?;
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE approvals SET decision = ?2, record_json = ?3
                 WHERE id = ?1 AND decision = 'pending'",
                params![record.approval_id.to_string(), record.decision.as_str(), json],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }
}
