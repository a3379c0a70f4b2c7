use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use fetchload_client::Method;
use fetchload_core::data::{Store, WriteMode};
use fetchload_core::pipeline::{LoadOptions, LoadProgressCallback, execute_load};
use fetchload_core::report::{
    ReportFormat, RunReport, generate_json_report, generate_load_report, generate_runs_report,
};
use fetchload_core::LoadError;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

/// Install the stderr log subscriber.
pub fn init_tracing(verbosity: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    // A second init (e.g. from tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Parse a `Name: value` header argument
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("Header '{}' must look like 'Name: value'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Header '{}' has an empty name", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parse a `key=value` query parameter argument
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Parameter '{}' must look like 'key=value'", raw))?;
    if key.is_empty() {
        return Err(format!("Parameter '{}' has an empty key", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Expand a leading `~` in a user supplied path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Turn `load` arguments into pipeline options
pub fn load_options_from_matches(args: &ArgMatches) -> anyhow::Result<LoadOptions> {
    let url = args
        .get_one::<String>("url")
        .context("--url (or FETCHLOAD_URL) is required")?;
    let db = args
        .get_one::<String>("db")
        .context("--db (or FETCHLOAD_DB) is required")?;

    let mut options = LoadOptions::new(url.clone(), expand_path(db));
    options.table = args.get_one::<String>("table").cloned();

    if let Some(method) = args.get_one::<String>("method") {
        options.method = method
            .parse::<Method>()
            .map_err(|e| LoadError::Config(format!("invalid method '{}': {}", method, e)))?;
    }

    if let Some(headers) = args.get_many::<String>("header") {
        for raw in headers {
            options
                .headers
                .push(parse_header(raw).map_err(LoadError::Config)?);
        }
    }

    if let Some(params) = args.get_many::<String>("param") {
        for raw in params {
            options.query.push(parse_param(raw).map_err(LoadError::Config)?);
        }
    }

    options.records_pointer = args.get_one::<String>("pointer").cloned();

    if let Some(column) = args.get_one::<String>("merge-column") {
        options.mode = WriteMode::Upsert {
            merge_column: column.clone(),
        };
    }

    options.measure = args.get_one::<String>("measure").cloned();
    options.min_length = args.get_one::<i64>("min-length").copied();

    if let Some(timeout) = args.get_one::<u64>("timeout") {
        options.timeout_secs = *timeout;
    }

    Ok(options)
}

/// Message printed when a command fails; names the pipeline stage when known
pub fn describe_failure(err: &anyhow::Error) -> String {
    match err.downcast_ref::<LoadError>() {
        Some(load_err) => format!("{} failed: {}", load_err.stage(), load_err),
        None => format!("{:#}", err),
    }
}

fn render_report(report: &RunReport, format: ReportFormat) -> anyhow::Result<String> {
    match format {
        ReportFormat::Text => Ok(generate_load_report(report)),
        ReportFormat::Json => Ok(format!("{}\n", generate_json_report(report)?)),
    }
}

pub async fn handle_load(args: &ArgMatches) -> anyhow::Result<RunReport> {
    let quiet = args.get_flag("quiet");
    let verbose = args.get_count("verbose") > 0;
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    let options = load_options_from_matches(args)?;

    // Spinner only when logs are not already narrating each step
    let spinner = if quiet || verbose || format == ReportFormat::Json {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(Arc::new(pb))
    };

    let progress_callback: Option<LoadProgressCallback> = spinner.clone().map(|pb| {
        let callback: LoadProgressCallback = Arc::new(move |msg: String| pb.set_message(msg));
        callback
    });

    let result = execute_load(options, progress_callback).await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let report = result?;

    if !quiet {
        print!("{}", render_report(&report, format)?);
    }
    Ok(report)
}

pub fn handle_drop(args: &ArgMatches) -> anyhow::Result<()> {
    let db_path = expand_path(args.get_one::<String>("db").context("--db is required")?);
    let table = args.get_one::<String>("table").context("--table is required")?;
    let quiet = args.get_flag("quiet");

    if !Store::exists(&db_path) {
        bail!("No database at {}", db_path.display());
    }

    let store = Store::open(&db_path).map_err(LoadError::from)?;
    let existed = store.drop_table(table).map_err(LoadError::from)?;

    if !quiet {
        if existed {
            println!("{} Dropped table {}", "✓".green().bold(), table.bright_white());
        } else {
            println!("{} Table {} did not exist", "→".blue(), table.bright_white());
        }
    }
    Ok(())
}

pub fn handle_runs(args: &ArgMatches) -> anyhow::Result<()> {
    let db_path = expand_path(args.get_one::<String>("db").context("--db is required")?);
    let limit = *args.get_one::<usize>("limit").unwrap_or(&10);

    if !Store::exists(&db_path) {
        bail!("No database at {}", db_path.display());
    }

    let store = Store::open(&db_path).map_err(LoadError::from)?;
    let runs = store.recent_runs(limit).map_err(LoadError::from)?;
    print!("{}", generate_runs_report(&runs));
    Ok(())
}
