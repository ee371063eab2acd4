use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::exit;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use clap::Parser;
use search_revenue_core::log::log_error;
use search_revenue_core::{
    export_report, parse_report_tz, report_date_in, AttributionEngine, ConfigError, EngineConfig,
    InputError, DEFAULT_REPORT_TZ,
};
use serde_json::json;

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "search-revenue",
    about = "Attribute purchase revenue to the external search keyword that last preceded it",
    long_about = "Reads tab-separated hit data, credits each purchase to the visitor's most\n\
                  recent external search (engine, keyword) and writes a ranked revenue report."
)]
struct Cli {
    /// Tab-separated hit data with a header line
    input: PathBuf,
    /// Directory the dated report is written into
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    /// JSON engine config (internal_hosts, extra_engines, purchase_event_code)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Site host whose referrers count as internal navigation (repeatable)
    #[arg(
        long = "internal-host",
        env = "SEARCH_REVENUE_INTERNAL_HOSTS",
        value_delimiter = ','
    )]
    internal_hosts: Vec<String>,
    /// Date used in the report filename, defaults to today in --report-tz
    #[arg(long, value_parser = parse_report_date)]
    report_date: Option<NaiveDate>,
    /// IANA time zone whose calendar date names the report
    #[arg(
        long,
        env = "SEARCH_REVENUE_REPORT_TZ",
        default_value = DEFAULT_REPORT_TZ,
        value_parser = parse_tz_arg
    )]
    report_tz: Tz,
}

#[derive(Debug)]
enum CliError {
    InputNotFound(PathBuf),
    Config(ConfigError),
    Input(InputError),
    Export(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputNotFound(path) => write!(f, "Input file not found: {}", path.display()),
            Self::Config(error) => write!(f, "{error}"),
            Self::Input(error) => write!(f, "{error}"),
            Self::Export(message) => write!(f, "Failed to write report: {message}"),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        CliError::Config(error)
    }
}

impl From<InputError> for CliError {
    fn from(error: InputError) -> Self {
        CliError::Input(error)
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn parse_report_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|error| format!("expected YYYY-MM-DD ({error})"))
}

fn parse_tz_arg(value: &str) -> Result<Tz, String> {
    parse_report_tz(value).map_err(|error| error.to_string())
}

fn resolve_config(
    config_path: Option<&Path>,
    internal_hosts: &[String],
) -> Result<EngineConfig, ConfigError> {
    let mut config = match config_path {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    let overrides: Vec<String> = internal_hosts
        .iter()
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .collect();
    if !overrides.is_empty() {
        config.internal_hosts = overrides;
    }

    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<PathBuf, CliError> {
    if !cli.input.is_file() {
        return Err(CliError::InputNotFound(cli.input.clone()));
    }

    let config = resolve_config(cli.config.as_deref(), &cli.internal_hosts)?;
    let engine = AttributionEngine::new(&config);

    let file = File::open(&cli.input).map_err(InputError::from)?;
    let outcome = engine.run_tsv(file)?;

    let report_date = cli
        .report_date
        .unwrap_or_else(|| report_date_in(Utc::now(), cli.report_tz));
    export_report(&outcome.ranked(), &cli.output_dir, report_date)
        .map_err(|error| CliError::Export(error.to_string()))
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(path) => println!("{}", path.display()),
        Err(error) => {
            log_error(
                "cli",
                "run_failed",
                json!({
                    "input": cli.input.display().to_string(),
                    "message": error.to_string(),
                }),
            );
            eprintln!("{error}");
            exit(1);
        }
    }
}
