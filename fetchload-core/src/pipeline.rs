// The fetch -> decode -> transform -> store run

use crate::data::{RunMeta, Store, WriteMode};
use crate::error::{LoadError, Result};
use crate::record::decode_records;
use crate::report::RunReport;
use crate::schema::default_table_name;
use crate::transform::{add_length, filter_min_length, length_key};
use fetchload_client::{DEFAULT_TIMEOUT_SECS, Fetcher, Method};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Everything a load run needs, fixed before the run starts.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub url: String,
    pub db_path: PathBuf,
    /// Defaults to the last path segment of the URL
    pub table: Option<String>,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub timeout_secs: u64,
    /// JSON pointer to the record array inside the body
    pub records_pointer: Option<String>,
    pub mode: WriteMode,
    /// Field to measure with `add_length`
    pub measure: Option<String>,
    /// Minimum `<measure>_length` a record needs to be kept
    pub min_length: Option<i64>,
}

impl LoadOptions {
    pub fn new(url: impl Into<String>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            db_path: db_path.into(),
            table: None,
            method: Method::GET,
            headers: Vec::new(),
            query: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            records_pointer: None,
            mode: WriteMode::Append,
            measure: None,
            min_length: None,
        }
    }

    /// Check the options without touching the network or the disk.
    /// Returns the parsed URL and the target table name.
    pub fn validate(&self) -> Result<(Url, String)> {
        let raw = self.url.trim();
        if raw.is_empty() {
            return Err(LoadError::Config("URL must not be empty".to_string()));
        }
        let url = Url::parse(raw)
            .map_err(|e| LoadError::Config(format!("invalid URL '{}': {}", raw, e)))?;

        if self.db_path.as_os_str().is_empty() {
            return Err(LoadError::Config("database path must not be empty".to_string()));
        }

        if let Some(pointer) = &self.records_pointer
            && !pointer.is_empty()
            && !pointer.starts_with('/')
        {
            return Err(LoadError::Config(format!(
                "JSON pointer '{}' must start with '/'",
                pointer
            )));
        }

        if self.min_length.is_some() && self.measure.is_none() {
            return Err(LoadError::Config(
                "a minimum length needs a field to measure".to_string(),
            ));
        }

        let table = match &self.table {
            Some(name) if name.trim().is_empty() => {
                return Err(LoadError::Config("table name must not be empty".to_string()));
            }
            Some(name) => name.clone(),
            None => default_table_name(&url),
        };

        Ok((url, table))
    }
}

/// Callback for reporting which step the run is on
pub type LoadProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

fn report_progress(callback: &Option<LoadProgressCallback>, msg: String) {
    if let Some(cb) = callback {
        cb(msg);
    }
}

/// Run one load with the given options.
///
/// The database is only opened once the body has been fetched and decoded,
/// so fetch and decode failures never touch the file.
pub async fn execute_load(
    options: LoadOptions,
    progress_callback: Option<LoadProgressCallback>,
) -> Result<RunReport> {
    let started = Instant::now();
    let started_at = chrono::Utc::now().timestamp();
    let (url, table) = options.validate()?;
    let run_id = uuid::Uuid::new_v4().to_string();

    info!("Starting run {} for {} into table {}", run_id, url, table);

    // Fetch
    report_progress(&progress_callback, format!("Requesting {}", url));
    let fetcher = Fetcher::with_timeout(options.timeout_secs)
        .with_method(options.method.clone())
        .with_headers(options.headers.clone())
        .with_query(options.query.clone());
    let fetched = fetcher.fetch(url.as_str()).await?;
    info!(
        "Successful response: {} bytes in {:?}",
        fetched.body.len(),
        fetched.response_time
    );
    if !fetched.is_json() {
        debug!(
            "Content-Type is {:?}, decoding as JSON anyway",
            fetched.content_type
        );
    }

    // Decode
    report_progress(&progress_callback, "Decoding response".to_string());
    let mut records = decode_records(&fetched.body, options.records_pointer.as_deref())?;
    let records_decoded = records.len();
    info!("Decoded {} records", records_decoded);

    // Transform
    if let Some(key) = &options.measure {
        add_length(&mut records, key)?;
        if let Some(min) = options.min_length {
            records = filter_min_length(records, &length_key(key), min);
            if records.len() < records_decoded {
                warn!(
                    "{} records shorter than {} dropped",
                    records_decoded - records.len(),
                    min
                );
            }
        }
    }

    // Store
    report_progress(
        &progress_callback,
        format!("Writing {} records to {}", records.len(), table),
    );
    let mut store = Store::open(&options.db_path)?;
    let meta = RunMeta {
        run_id: run_id.clone(),
        url: url.to_string(),
        records_decoded,
        started_at,
    };
    let rows_written = store.write_records(&table, &records, &options.mode, &meta)?;
    drop(store);

    let report = RunReport {
        run_id,
        url: url.to_string(),
        table,
        db_path: options.db_path.display().to_string(),
        records_decoded,
        rows_written,
        mode: options.mode.label(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!("Process complete: {} rows written", report.rows_written);
    Ok(report)
}

/// Fetch `url` and append its records to `db_path`; returns the rows written.
pub async fn run(url: &str, db_path: &Path) -> Result<usize> {
    let report = execute_load(LoadOptions::new(url, db_path), None).await?;
    Ok(report.rows_written)
}
