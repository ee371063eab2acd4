//! Single forward pass over hit rows.
//!
//! Per row, the referrer is interpreted first and, when it is an external
//! search touch, recorded as the visitor's last touch. Only then is a purchase
//! on the same row resolved, so a hit that both arrives from a search page and
//! completes a purchase is credited to that search.

use std::io::Read;

use serde::Serialize;
use serde_json::json;

use crate::config::EngineConfig;
use crate::input::{
    HitRecord, InputError, TsvHitReader, TsvRecord, EVENT_LIST_COLUMN, IP_COLUMN,
    PRODUCT_LIST_COLUMN, REFERRER_COLUMN, USER_AGENT_COLUMN,
};
use crate::log::{log_info, log_warn};
use crate::referrer::ReferrerInterpreter;
use crate::revenue::{is_purchase, parse_purchase_revenue};
use crate::totals::{rank, AttributionKey, Totals};
use crate::tracker::{LastTouchTracker, VisitorKey};

const COMPONENT: &str = "attribution_engine";

/// Skipped rows beyond this many are only counted, not logged one by one.
const MAX_LOGGED_SKIPS: u64 = 20;

/// Observability counters for one run. They never influence the totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunCounters {
    pub rows_seen: u64,
    pub rows_skipped: u64,
    pub search_referrers_seen: u64,
    pub purchases_seen: u64,
    pub purchases_attributed: u64,
    pub revenue_attributed: f64,
    pub bad_revenue_values: u64,
    pub purchases_missing_prior_search: u64,
}

impl RunCounters {
    pub fn merge(&mut self, other: &RunCounters) {
        self.rows_seen += other.rows_seen;
        self.rows_skipped += other.rows_skipped;
        self.search_referrers_seen += other.search_referrers_seen;
        self.purchases_seen += other.purchases_seen;
        self.purchases_attributed += other.purchases_attributed;
        self.revenue_attributed += other.revenue_attributed;
        self.bad_revenue_values += other.bad_revenue_values;
        self.purchases_missing_prior_search += other.purchases_missing_prior_search;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub totals: Totals,
    pub counters: RunCounters,
    /// 1-based input lines of the first skipped rows, when the source has
    /// line numbers.
    pub skipped_lines: Vec<u64>,
}

impl RunOutcome {
    pub fn ranked(&self) -> Vec<(AttributionKey, f64)> {
        rank(&self.totals)
    }
}

/// Stateless entry point; every run gets its own tracker and totals.
#[derive(Debug, Clone)]
pub struct AttributionEngine {
    interpreter: ReferrerInterpreter,
    purchase_event_code: String,
}

impl AttributionEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            interpreter: ReferrerInterpreter::new(config),
            purchase_event_code: config.purchase_event_code.trim().to_string(),
        }
    }

    pub fn start_run(&self) -> AttributionRun<'_> {
        AttributionRun {
            interpreter: &self.interpreter,
            purchase_event_code: &self.purchase_event_code,
            tracker: LastTouchTracker::new(),
            totals: Totals::new(),
            counters: RunCounters::default(),
            skipped_lines: Vec::new(),
        }
    }

    /// Scans an in-memory or streamed row sequence to completion.
    pub fn run<I>(&self, rows: I) -> RunOutcome
    where
        I: IntoIterator,
        I::Item: HitRecord,
    {
        log_info(COMPONENT, "run_started", json!({ "source": "rows" }));
        let mut run = self.start_run();
        for row in rows {
            run.process_row(&row);
        }
        let outcome = run.finish();
        log_run_completed(&outcome);
        outcome
    }

    /// Scans tab-separated hit data with a header line.
    ///
    /// Undecodable lines are skipped and counted; a header missing required
    /// columns or an I/O failure of `source` aborts the run.
    pub fn run_tsv<R: Read>(&self, source: R) -> Result<RunOutcome, InputError> {
        let mut reader = TsvHitReader::new(source)?;
        log_info(
            COMPONENT,
            "run_started",
            json!({ "source": "tsv", "columns": reader.column_count() }),
        );

        let mut run = self.start_run();
        while let Some(record) = reader.next_record()? {
            match record {
                TsvRecord::Hit(row) => run.process_row_at(row.line(), &row),
                TsvRecord::Malformed { line, reason } => run.skip_row(line, &reason),
            }
        }

        let outcome = run.finish();
        log_run_completed(&outcome);
        Ok(outcome)
    }
}

/// State owned by one scan. Dropping it mid-stream discards the run;
/// [`AttributionRun::finish`] at any point yields the partial outcome.
pub struct AttributionRun<'e> {
    interpreter: &'e ReferrerInterpreter,
    purchase_event_code: &'e str,
    tracker: LastTouchTracker,
    totals: Totals,
    counters: RunCounters,
    skipped_lines: Vec<u64>,
}

struct RequiredFields<'r> {
    ip: &'r str,
    user_agent: &'r str,
    referrer: &'r str,
    event_list: &'r str,
    product_list: &'r str,
}

impl<'r> RequiredFields<'r> {
    fn extract<R: HitRecord + ?Sized>(row: &'r R) -> Option<Self> {
        Some(Self {
            ip: row.field(IP_COLUMN)?,
            user_agent: row.field(USER_AGENT_COLUMN)?,
            referrer: row.field(REFERRER_COLUMN)?,
            event_list: row.field(EVENT_LIST_COLUMN)?,
            product_list: row.field(PRODUCT_LIST_COLUMN)?,
        })
    }
}

impl AttributionRun<'_> {
    pub fn process_row<R: HitRecord + ?Sized>(&mut self, row: &R) {
        self.process_row_at(None, row);
    }

    /// Like [`AttributionRun::process_row`]; `line` is reported if the row
    /// has to be skipped.
    pub fn process_row_at<R: HitRecord + ?Sized>(&mut self, line: Option<u64>, row: &R) {
        let Some(fields) = RequiredFields::extract(row) else {
            self.skip_row(line, "row is missing a required column");
            return;
        };
        self.counters.rows_seen += 1;

        let touch = self.interpreter.interpret(fields.referrer);
        let purchase = is_purchase(fields.event_list, self.purchase_event_code);
        if touch.is_none() && !purchase {
            return;
        }

        let visitor = VisitorKey::new(fields.ip, fields.user_agent);
        if let Some(touch) = touch {
            self.counters.search_referrers_seen += 1;
            self.tracker.observe(&visitor, touch);
        }

        if purchase {
            self.record_purchase(&visitor, fields.product_list);
        }
    }

    /// Counts a row that could not be processed; the scan carries on.
    pub fn skip_row(&mut self, line: Option<u64>, reason: &str) {
        self.counters.rows_seen += 1;
        self.counters.rows_skipped += 1;
        if self.counters.rows_skipped <= MAX_LOGGED_SKIPS {
            self.skipped_lines.extend(line);
            log_warn(
                COMPONENT,
                "row_skipped",
                json!({
                    "row": self.counters.rows_seen,
                    "line": line,
                    "reason": reason,
                }),
            );
        }
    }

    pub fn visitors_tracked(&self) -> usize {
        self.tracker.visitor_count()
    }

    pub fn finish(self) -> RunOutcome {
        RunOutcome {
            totals: self.totals,
            counters: self.counters,
            skipped_lines: self.skipped_lines,
        }
    }

    fn record_purchase(&mut self, visitor: &VisitorKey, product_list: &str) {
        self.counters.purchases_seen += 1;

        let revenue = parse_purchase_revenue(product_list);
        self.counters.bad_revenue_values += revenue.bad_values;

        match self.tracker.lookup(visitor) {
            None => self.counters.purchases_missing_prior_search += 1,
            Some(touch) if revenue.total > 0.0 => {
                self.totals.add(touch, revenue.total);
                self.counters.purchases_attributed += 1;
                self.counters.revenue_attributed += revenue.total;
            }
            Some(_) => {}
        }
    }
}

fn log_run_completed(outcome: &RunOutcome) {
    let counters = &outcome.counters;
    log_info(
        COMPONENT,
        "run_completed",
        json!({
            "rows_seen": counters.rows_seen,
            "rows_skipped": counters.rows_skipped,
            "search_referrers_seen": counters.search_referrers_seen,
            "purchases_seen": counters.purchases_seen,
            "purchases_attributed": counters.purchases_attributed,
            "revenue_attributed": format!("{:.2}", counters.revenue_attributed),
            "bad_revenue_values": counters.bad_revenue_values,
            "purchases_missing_prior_search": counters.purchases_missing_prior_search,
            "skipped_lines": outcome.skipped_lines,
            "attribution_keys": outcome.totals.len(),
        }),
    );
}
