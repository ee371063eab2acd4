#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use search_revenue_core::{AttributionEngine, EngineConfig, RunOutcome};
use tempfile::NamedTempFile;

pub const HIT_COLUMNS: [&str; 6] = [
    "hit_time_gmt",
    "ip",
    "user_agent",
    "referrer",
    "event_list",
    "product_list",
];

/// One hit line; only the columns the engine reads are configurable.
#[derive(Clone, Debug, Default)]
pub struct TestHit {
    pub ip: String,
    pub user_agent: String,
    pub referrer: String,
    pub event_list: String,
    pub product_list: String,
}

impl TestHit {
    pub fn search(ip: &str, user_agent: &str, referrer: &str) -> Self {
        Self {
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
            referrer: referrer.to_string(),
            ..Self::default()
        }
    }

    pub fn purchase(ip: &str, user_agent: &str, product_list: &str) -> Self {
        Self {
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
            event_list: "1".to_string(),
            product_list: product_list.to_string(),
            ..Self::default()
        }
    }

    pub fn with_events(mut self, event_list: &str) -> Self {
        self.event_list = event_list.to_string();
        self
    }

    pub fn with_referrer(mut self, referrer: &str) -> Self {
        self.referrer = referrer.to_string();
        self
    }
}

/// Writes a TSV with a header and one line per hit into a temp file.
pub fn write_hit_file(hits: &[TestHit]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file should be created");
    writeln!(file, "{}", HIT_COLUMNS.join("\t")).expect("header should be written");
    for (index, hit) in hits.iter().enumerate() {
        writeln!(
            file,
            "{}\t{}\t{}\t{}\t{}\t{}",
            1_254_033_280 + index,
            hit.ip,
            hit.user_agent,
            hit.referrer,
            hit.event_list,
            hit.product_list
        )
        .expect("hit should be written");
    }
    file.flush().expect("hit file should flush");
    file
}

pub fn shop_engine() -> AttributionEngine {
    AttributionEngine::new(&EngineConfig::with_internal_hosts(["esshopzilla.com"]))
}

pub fn run_file(engine: &AttributionEngine, path: &Path) -> RunOutcome {
    let file = File::open(path).expect("hit file should open");
    engine.run_tsv(file).expect("run should succeed")
}

pub fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("expected an attributed total");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
