use crate::index::CreditorRecord;
use crate::loader::AliasSource;
use crate::reporter::{MissRecord, MissStore};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Creditors Table (master alias list, maintained by the admin path)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS creditors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Miss Reports Table (append-only, read by curation tooling)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS miss_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id TEXT NOT NULL,
            code TEXT NOT NULL,
            case_reference TEXT NOT NULL,
            reported_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_creditors_code ON creditors(code)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_miss_reports_code ON miss_reports(code)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_miss_reports_case ON miss_reports(case_reference)",
        [],
    )?;

    Ok(())
}

/// Replace the whole master list in one transaction
///
/// Rows with a blank code are skipped. Returns the number of rows written.
pub fn replace_creditors(conn: &mut Connection, records: &[CreditorRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM creditors", [])?;

    let mut inserted = 0;
    {
        let mut stmt = tx.prepare("INSERT INTO creditors (code, name) VALUES (?1, ?2)")?;
        for record in records.iter().filter(|r| r.has_code()) {
            stmt.execute(params![record.code.trim(), record.name.trim()])?;
            inserted += 1;
        }
    }

    tx.commit()?;
    Ok(inserted)
}

/// Master list ordered by code (then insertion order for equal codes)
pub fn fetch_creditors(conn: &Connection) -> Result<Vec<CreditorRecord>> {
    let mut stmt = conn.prepare(
        "SELECT code, name
         FROM creditors
         WHERE TRIM(code) <> ''
         ORDER BY code, id",
    )?;

    let records = stmt
        .query_map([], |row| {
            Ok(CreditorRecord {
                code: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn count_creditors(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM creditors", [], |row| row.get(0))?;

    Ok(count)
}

/// Append miss rows atomically: all rows land or none do
pub fn append_miss_records(conn: &mut Connection, rows: &[MissRecord]) -> Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO miss_reports (report_id, code, case_reference, reported_at)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for row in rows {
            stmt.execute(params![
                row.report_id,
                row.code,
                row.case_reference,
                row.reported_at.to_rfc3339(),
            ])?;
        }
    }
    tx.commit()?;

    Ok(())
}

/// Recorded misses, newest first
pub fn get_miss_records(conn: &Connection) -> Result<Vec<MissRecord>> {
    let mut stmt = conn.prepare(
        "SELECT report_id, code, case_reference, reported_at
         FROM miss_reports
         ORDER BY reported_at DESC, id DESC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            let reported_at_str: String = row.get(3)?;

            Ok(MissRecord {
                report_id: row.get(0)?,
                code: row.get(1)?,
                case_reference: row.get(2)?,
                reported_at: DateTime::parse_from_rfc3339(&reported_at_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            3,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// SQLITE STORE - both collaborator boundaries over one connection
// ============================================================================

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn replace_creditors(&self, records: &[CreditorRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        replace_creditors(&mut conn, records)
    }

    pub fn count_creditors(&self) -> Result<i64> {
        let conn = self.lock()?;
        count_creditors(&conn)
    }

    pub fn get_miss_records(&self) -> Result<Vec<MissRecord>> {
        let conn = self.lock()?;
        get_miss_records(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }
}

impl AliasSource for SqliteStore {
    fn fetch_alias_table(&self) -> Result<Vec<CreditorRecord>> {
        let conn = self.lock()?;
        fetch_creditors(&conn)
    }

    fn describe(&self) -> String {
        "sqlite:creditors".to_string()
    }
}

impl MissStore for SqliteStore {
    fn append_miss_records(&self, rows: &[MissRecord]) -> Result<()> {
        let mut conn = self.lock()?;
        append_miss_records(&mut conn, rows)
    }
}
