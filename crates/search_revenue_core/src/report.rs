//! Tab-separated report rendering.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use csv::{QuoteStyle, WriterBuilder};
use serde_json::json;

use crate::config::ConfigError;
use crate::log::log_info;
use crate::totals::AttributionKey;

pub const REPORT_HEADER: [&str; 3] = ["Search Engine Domain", "Search Keyword", "Revenue"];
pub const REPORT_FILE_SUFFIX: &str = "_SearchKeywordPerformance.tab";
/// Zone whose calendar date names the report file unless overridden.
pub const DEFAULT_REPORT_TZ: &str = "America/Chicago";

/// Parses an IANA zone name such as `America/Chicago`.
pub fn parse_report_tz(name: &str) -> Result<Tz, ConfigError> {
    let name = name.trim();
    name.parse::<Tz>()
        .map_err(|error| ConfigError::new(format!("Unknown report time zone '{name}': {error}")))
}

/// Calendar date of `now` in `tz`, daylight saving included.
pub fn report_date_in(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// `2026-02-15` → `2026-02-15_SearchKeywordPerformance.tab`.
pub fn report_filename(date: NaiveDate) -> String {
    format!("{}{REPORT_FILE_SUFFIX}", date.format("%Y-%m-%d"))
}

/// Writes ranked rows as TSV with revenue rounded to two decimals.
pub fn write_report<W: Write>(
    ranked: &[(AttributionKey, f64)],
    writer: W,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);

    wtr.write_record(REPORT_HEADER)?;
    for (key, revenue) in ranked {
        let revenue = format!("{revenue:.2}");
        wtr.write_record([
            key.engine_domain.as_str(),
            key.keyword.as_str(),
            revenue.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn render_report(
    ranked: &[(AttributionKey, f64)],
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut body = Vec::new();
    write_report(ranked, &mut body)?;
    Ok(body)
}

/// Writes the dated report into `output_dir`, creating the directory first.
pub fn export_report(
    ranked: &[(AttributionKey, f64)],
    output_dir: impl AsRef<Path>,
    date: NaiveDate,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let path = output_dir.join(report_filename(date));
    let file = fs::File::create(&path)?;
    write_report(ranked, file)?;

    log_info(
        "report",
        "report_written",
        json!({
            "path": path.display().to_string(),
            "rows": ranked.len(),
        }),
    );
    Ok(path)
}
