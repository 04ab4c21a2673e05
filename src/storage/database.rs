//! SQLite database module with schema migrations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::{debug, info};

use crate::error::AppError;
use crate::filter::Predicate;
use crate::model::{is_storable_date, NewRecord, Record};
use crate::storage::store::{InsertOutcome, WriteMode};

/// Current schema version. Increment when adding new migrations.
const SCHEMA_VERSION: i32 = 1;

/// V1 schema: the records table and its date index.
const V1_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_date TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    sur_name TEXT NOT NULL,
    city TEXT NOT NULL,
    country TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_record_date ON records(record_date);
"#;

const INSERT_RECORD: &str = r#"
INSERT INTO records (record_date, first_name, last_name, sur_name, city, country)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, record_date, first_name, last_name, sur_name, city, country FROM records";

/// SQLite database handle.
///
/// Holds only the file path; every operation opens its own connection on a
/// blocking thread, so concurrent runs never share a cursor.
#[derive(Debug)]
pub struct Database {
    db_path: PathBuf,
}

impl Database {
    /// Initializes the database at the given path.
    /// Creates parent directories if needed, opens the SQLite file, and runs migrations.
    pub async fn init(db_path: PathBuf) -> Result<Self, AppError> {
        let path = db_path.clone();

        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Store(format!("Failed to create database directory: {e}"))
                })?;
            }

            let mut conn = Connection::open(&path)
                .map_err(|e| AppError::Store(format!("Failed to open database: {e}")))?;

            configure_connection(&conn)?;
            run_migrations(&mut conn)?;

            Ok::<_, AppError>(())
        })
        .await
        .map_err(|e| AppError::Internal(format!("Database init task failed: {e}")))??;

        info!("[STORE] Database ready at {}", db_path.display());

        Ok(Self { db_path })
    }

    /// Simple health check: executes SELECT 1.
    pub async fn health_check(&self) -> Result<(), AppError> {
        let db_path = self.db_path.clone();

        tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;

            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| AppError::Store(format!("Health check failed: {e}")))?;

            Ok::<_, AppError>(())
        })
        .await
        .map_err(|e| AppError::Internal(format!("Health check task failed: {e}")))??;

        Ok(())
    }

    // ── Records ───────────────────────────────────────────────────────────────

    /// Inserts a batch of records inside one transaction.
    ///
    /// `WriteMode::Bulk` relaxes fsync to `synchronous = NORMAL` and does not
    /// read back assigned ids. `WriteMode::Tracked` keeps full durability and
    /// returns the id assigned to each record, in input order.
    ///
    /// A batch holding a date outside years 0000-9999 is rejected whole.
    pub async fn insert_records(
        &self,
        records: Vec<NewRecord>,
        mode: WriteMode,
    ) -> Result<InsertOutcome, AppError> {
        if records.is_empty() {
            return Ok(InsertOutcome::default());
        }
        if let Some(record) = records.iter().find(|r| !is_storable_date(r.record_date)) {
            return Err(AppError::Store(format!(
                "Record date {} is outside years 0000-9999",
                record.record_date
            )));
        }

        let db_path = self.db_path.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = open_connection(&db_path)?;

            if mode == WriteMode::Bulk {
                conn.pragma_update(None, "synchronous", "NORMAL")
                    .map_err(|e| AppError::Store(format!("Failed to relax synchronous mode: {e}")))?;
            }

            let tx = conn
                .transaction()
                .map_err(|e| AppError::Store(format!("Failed to start insert transaction: {e}")))?;

            let mut assigned_ids = Vec::new();
            {
                let mut stmt = tx
                    .prepare_cached(INSERT_RECORD)
                    .map_err(|e| AppError::Store(format!("Failed to prepare insert: {e}")))?;

                for record in &records {
                    stmt.execute(params![
                        record.record_date,
                        record.first_name,
                        record.last_name,
                        record.sur_name,
                        record.city,
                        record.country,
                    ])
                    .map_err(|e| AppError::Store(format!("Failed to insert record: {e}")))?;

                    if mode == WriteMode::Tracked {
                        assigned_ids.push(tx.last_insert_rowid());
                    }
                }
            }

            tx.commit()
                .map_err(|e| AppError::Store(format!("Failed to commit insert: {e}")))?;

            Ok::<_, AppError>(InsertOutcome {
                inserted: records.len() as u64,
                assigned_ids,
            })
        })
        .await
        .map_err(|e| AppError::Internal(format!("Insert records task failed: {e}")))?
    }

    /// Returns records matching the predicate, ordered by id.
    pub async fn query_records(&self, predicate: &Predicate) -> Result<Vec<Record>, AppError> {
        let db_path = self.db_path.clone();
        let fragment = predicate.to_sql();

        tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;

            let sql = format!(
                "{} {} ORDER BY id ASC",
                SELECT_COLUMNS, fragment.where_clause
            );
            debug!(sql = %sql, params = fragment.params.len(), "[STORE] Querying records");

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| AppError::Store(format!("Failed to prepare query: {e}")))?;

            let records = stmt
                .query_map(params_from_iter(fragment.params.iter()), row_to_record)
                .map_err(|e| AppError::Store(format!("Failed to query records: {e}")))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AppError::Store(format!("Failed to collect records: {e}")))?;

            Ok::<_, AppError>(records)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Query records task failed: {e}")))?
    }

    /// Counts all stored records.
    pub async fn count_records(&self) -> Result<u64, AppError> {
        let db_path = self.db_path.clone();

        tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;

            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
                .map_err(|e| AppError::Store(format!("Failed to count records: {e}")))?;

            Ok::<_, AppError>(count as u64)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Count records task failed: {e}")))?
    }

    /// Removes every record and resets id assignment, in one transaction.
    /// Returns the number of records removed.
    pub async fn clear_records(&self) -> Result<u64, AppError> {
        let db_path = self.db_path.clone();

        let removed = tokio::task::spawn_blocking(move || {
            let mut conn = open_connection(&db_path)?;

            let tx = conn
                .transaction()
                .map_err(|e| AppError::Store(format!("Failed to start clear transaction: {e}")))?;

            // Unqualified DELETE hits SQLite's truncate optimization.
            let removed = tx
                .execute("DELETE FROM records", [])
                .map_err(|e| AppError::Store(format!("Failed to clear records: {e}")))?;

            tx.execute("DELETE FROM sqlite_sequence WHERE name = 'records'", [])
                .map_err(|e| AppError::Store(format!("Failed to reset record ids: {e}")))?;

            tx.commit()
                .map_err(|e| AppError::Store(format!("Failed to commit clear: {e}")))?;

            Ok::<_, AppError>(removed as u64)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Clear records task failed: {e}")))??;

        info!("[STORE] Cleared {} records", removed);

        Ok(removed)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        record_date: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        sur_name: row.get(4)?,
        city: row.get(5)?,
        country: row.get(6)?,
    })
}

/// Opens a configured connection.
fn open_connection(db_path: &Path) -> Result<Connection, AppError> {
    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Store(format!("Failed to open database: {e}")))?;

    configure_connection(&conn)?;

    Ok(conn)
}

/// Configures connection with busy timeout and WAL mode.
fn configure_connection(conn: &Connection) -> Result<(), AppError> {
    conn.busy_timeout(Duration::from_secs(10))
        .map_err(|e| AppError::Store(format!("Failed to set busy timeout: {e}")))?;

    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| AppError::Store(format!("Failed to set WAL mode: {e}")))?;

    Ok(())
}

/// Runs database migrations using PRAGMA user_version.
fn run_migrations(conn: &mut Connection) -> Result<(), AppError> {
    let current_version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| AppError::Store(format!("Failed to get schema version: {e}")))?;

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .map_err(|e| AppError::Store(format!("Failed to start migration transaction: {e}")))?;

    if current_version < 1 {
        tx.execute_batch(V1_SCHEMA)
            .map_err(|e| AppError::Store(format!("V1 migration failed: {e}")))?;
    }

    tx.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|e| AppError::Store(format!("Failed to update schema version: {e}")))?;

    tx.commit()
        .map_err(|e| AppError::Store(format!("Failed to commit migration: {e}")))?;

    info!(
        "[STORE] Migrated schema from v{} to v{}",
        current_version, SCHEMA_VERSION
    );

    Ok(())
}
