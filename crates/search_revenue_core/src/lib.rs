//! Last-touch search keyword revenue attribution.
//!
//! This crate owns the streaming attribution engine: referrer interpretation,
//! per-visitor last-touch tracking and purchase revenue aggregation. It
//! intentionally excludes storage triggers, CLI handling and cloud SDK concerns;
//! callers hand it a row stream and render the resulting totals.
//!
//! # Quick Start
//!
//! ```no_run
//! use search_revenue_core::{AttributionEngine, EngineConfig};
//!
//! let engine = AttributionEngine::new(&EngineConfig::with_internal_hosts(["esshopzilla.com"]));
//! let file = std::fs::File::open("hit_data.tsv").unwrap();
//! let outcome = engine.run_tsv(file).unwrap();
//!
//! for (key, revenue) in outcome.ranked() {
//!     println!("{}\t{}\t{revenue:.2}", key.engine_domain, key.keyword);
//! }
//! ```
//!
//! # Architecture
//!
//! - [`referrer`]: decides whether a referrer is an external search hit
//! - [`tracker`]: visitor → most recent search touch
//! - [`revenue`]: purchase detection and product list revenue parsing
//! - [`engine`]: single forward pass over rows, counters and outcome
//! - [`totals`]: attribution keys, revenue totals and ranking
//! - [`input`]: row abstraction and the streaming TSV reader
//! - [`report`]: tab-separated report rendering and file naming
//! - [`config`]: injectable engine configuration

pub mod config;
pub mod engine;
pub mod input;
pub mod log;
pub mod referrer;
pub mod report;
pub mod revenue;
pub mod totals;
pub mod tracker;

pub use config::{ConfigError, EngineConfig, SearchEngineRule};
pub use engine::{AttributionEngine, AttributionRun, RunCounters, RunOutcome};
pub use input::{HitRecord, InputError, TsvHitReader, TsvRecord, REQUIRED_COLUMNS};
pub use referrer::{normalize_keyword, ReferrerInterpreter, SearchTouch};
pub use report::{
    export_report, parse_report_tz, render_report, report_date_in, report_filename, write_report,
    DEFAULT_REPORT_TZ,
};
pub use totals::{rank, AttributionKey, Totals};
pub use tracker::{LastTouchTracker, VisitorKey};
