use crate::error::StorageError;
use crate::record::Record;
use crate::schema::{Schema, field, quote_ident, sql_value};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params, params_from_iter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Internal table holding one row per committed run.
pub const RUNS_TABLE: &str = "fetchload_runs";

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    /// Plain inserts; repeated runs accumulate duplicates.
    Append,
    /// Insert, or update the row already holding the same `merge_column`.
    Upsert { merge_column: String },
}

impl WriteMode {
    pub fn label(&self) -> String {
        match self {
            WriteMode::Append => "append".to_string(),
            WriteMode::Upsert { merge_column } => format!("upsert:{}", merge_column),
        }
    }

    fn merge_column(&self) -> Option<&str> {
        match self {
            WriteMode::Append => None,
            WriteMode::Upsert { merge_column } => Some(merge_column),
        }
    }
}

/// Who is writing: logged alongside the records in the same transaction.
#[derive(Debug, Clone)]
pub struct RunMeta {
    pub run_id: String,
    pub url: String,
    pub records_decoded: usize,
    pub started_at: i64,
}

/// A row of the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub url: String,
    pub table_name: String,
    pub records_decoded: i64,
    pub rows_written: i64,
    pub mode: String,
    pub started_at: i64,
    pub finished_at: i64,
}

pub struct Store {
    conn: Connection,
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

// SQLite table names are ASCII case-insensitive
fn ensure_not_run_log(table: &str) -> Result<()> {
    if table.eq_ignore_ascii_case(RUNS_TABLE) {
        return Err(StorageError::InvalidIdentifier(format!(
            "{} is reserved for the run log",
            table
        )));
    }
    Ok(())
}

fn columns_of(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map(params![table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn insert_sql(table: &str, columns: &[&str], merge_column: Option<&str>) -> Result<String> {
    let quoted = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Result<Vec<_>>>()?;
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table)?,
        quoted.join(", "),
        placeholders
    );

    if let Some(merge) = merge_column {
        let merge_quoted = quote_ident(merge)?;
        let mut updates: Vec<String> = columns
            .iter()
            .zip(&quoted)
            .filter(|(name, _)| !name.eq_ignore_ascii_case(merge))
            .map(|(_, q)| format!("{q}=excluded.{q}"))
            .collect();
        if updates.is_empty() {
            // Keep the conflicting row counted as written
            updates.push(format!("{m}=excluded.{m}", m = merge_quoted));
        }
        sql.push_str(&format!(
            " ON CONFLICT({}) DO UPDATE SET {}",
            merge_quoted,
            updates.join(", ")
        ));
    }

    Ok(sql)
}

impl Store {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn remove(path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    /// Open (or create) the database file, creating missing parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let store = Store { conn };
        store.init_schema()?;
        debug!("Opened database at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Store {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS fetchload_runs (
                run_id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                table_name TEXT NOT NULL,
                records_decoded INTEGER NOT NULL,
                rows_written INTEGER NOT NULL,
                mode TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                finished_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_fetchload_runs_table ON fetchload_runs(table_name);
            ",
        )?;
        Ok(())
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        columns_of(&self.conn, table)
    }

    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table)?);
        let count = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    /// Drop `table`; returns whether it existed.
    pub fn drop_table(&self, table: &str) -> Result<bool> {
        ensure_not_run_log(table)?;
        let existed = self.table_exists(table)?;
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)?), [])?;
        info!("Dropped table {} (existed: {})", table, existed);
        Ok(existed)
    }

    /// Write every record into `table` inside one transaction.
    ///
    /// The table is created from the inferred schema when missing. Against an
    /// existing table every record field must already have a column; absent
    /// fields become NULL. Any error rolls the whole batch back.
    pub fn write_records(
        &mut self,
        table: &str,
        records: &[Record],
        mode: &WriteMode,
        meta: &RunMeta,
    ) -> Result<usize> {
        ensure_not_run_log(table)?;
        quote_ident(table)?;

        let merge_column = mode.merge_column();
        if let Some(merge) = merge_column {
            quote_ident(merge)?;
            for (index, record) in records.iter().enumerate() {
                if field(record, merge).is_none_or(|v| v.is_null()) {
                    return Err(StorageError::MissingMergeColumn {
                        index,
                        column: merge.to_string(),
                    });
                }
            }
        }

        let schema = Schema::infer(records);
        let tx = self.conn.transaction()?;

        // Column names as the table spells them
        let existing = columns_of(&tx, table)?;
        let columns: Vec<String> = if existing.is_empty() {
            if schema.is_empty() {
                if !records.is_empty() {
                    return Err(StorageError::NoColumns {
                        table: table.to_string(),
                    });
                }
            } else {
                let create = schema.create_table_sql(table, merge_column)?;
                debug!("Creating table: {}", create);
                tx.execute(&create, [])?;
            }
            schema.columns.iter().map(|c| c.name.clone()).collect()
        } else {
            let mut matched = Vec::with_capacity(schema.columns.len());
            for column in &schema.columns {
                match existing.iter().find(|e| e.eq_ignore_ascii_case(&column.name)) {
                    Some(name) => matched.push(name.clone()),
                    None => {
                        return Err(StorageError::SchemaMismatch {
                            table: table.to_string(),
                            column: column.name.clone(),
                        });
                    }
                }
            }
            if let Some(merge) = merge_column {
                if !existing.iter().any(|c| c.eq_ignore_ascii_case(merge)) {
                    return Err(StorageError::SchemaMismatch {
                        table: table.to_string(),
                        column: merge.to_string(),
                    });
                }
                let index_name = format!("fetchload_{}_{}_key", table, merge);
                tx.execute(
                    &format!(
                        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {}({})",
                        quote_ident(&index_name)?,
                        quote_ident(table)?,
                        quote_ident(merge)?
                    ),
                    [],
                )?;
            }
            matched
        };

        let mut written = 0;
        if !records.is_empty() {
            let sql = if columns.is_empty() {
                // Only empty objects: every column takes its default (NULL)
                format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table)?)
            } else {
                let names: Vec<&str> = columns.iter().map(String::as_str).collect();
                insert_sql(table, &names, merge_column)?
            };
            debug!("Insert statement: {}", sql);

            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                let values = columns.iter().map(|c| {
                    field(record, c)
                        .map(sql_value)
                        .unwrap_or(SqlValue::Null)
                });
                written += stmt.execute(params_from_iter(values))?;
            }
        }

        tx.execute(
            "INSERT INTO fetchload_runs (
                run_id, url, table_name, records_decoded, rows_written, mode, started_at, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &meta.run_id,
                &meta.url,
                table,
                meta.records_decoded as i64,
                written as i64,
                mode.label(),
                meta.started_at,
                current_timestamp(),
            ],
        )?;

        tx.commit()?;
        info!("Committed {} rows to {}", written, table);
        Ok(written)
    }

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, url, table_name, records_decoded, rows_written, mode, started_at, finished_at
             FROM fetchload_runs ORDER BY finished_at DESC, rowid DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunSummary {
                    run_id: row.get(0)?,
                    url: row.get(1)?,
                    table_name: row.get(2)?,
                    records_decoded: row.get(3)?,
                    rows_written: row.get(4)?,
                    mode: row.get(5)?,
                    started_at: row.get(6)?,
                    finished_at: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(runs)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}
