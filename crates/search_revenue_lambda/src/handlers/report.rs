use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use search_revenue_core::log::{log_info, log_warn};
use search_revenue_core::{
    parse_report_tz, render_report, report_date_in, report_filename, AttributionEngine,
    EngineConfig, DEFAULT_REPORT_TZ,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::form_urlencoded;

use crate::adapters::object_store::{ObjectSource, ReportStore};

pub const REPORT_CONTENT_TYPE: &str = "text/tab-separated-values";
pub const DEFAULT_OUTPUT_PREFIX: &str = "reports/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHandlerConfig {
    /// Only events from this bucket are processed.
    pub input_bucket: String,
    /// Keys outside this prefix are ignored; empty accepts every key.
    pub raw_prefix: String,
    pub output_bucket: String,
    pub output_prefix: String,
    pub report_date: NaiveDate,
    pub engine: EngineConfig,
}

impl ReportHandlerConfig {
    /// Builds the handler config from environment-style lookups.
    ///
    /// `INPUT_BUCKET` and `OUTPUT_BUCKET` are required. `RAW_PREFIX`,
    /// `OUTPUT_PREFIX`, `INTERNAL_HOSTS` (comma separated) and `REPORT_TZ`
    /// (IANA zone, default `America/Chicago`) are optional.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ReportHandlerError> {
        let required = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ReportHandlerError::new(format!("{name} must be configured")))
        };

        let input_bucket = required("INPUT_BUCKET")?;
        let output_bucket = required("OUTPUT_BUCKET")?;
        let raw_prefix = lookup("RAW_PREFIX")
            .map(|prefix| prefix.trim_start_matches('/').to_string())
            .unwrap_or_default();
        let output_prefix =
            lookup("OUTPUT_PREFIX").unwrap_or_else(|| DEFAULT_OUTPUT_PREFIX.to_string());

        let mut engine = EngineConfig::default();
        if let Some(hosts) = lookup("INTERNAL_HOSTS") {
            let hosts: Vec<String> = hosts
                .split(',')
                .map(|host| host.trim().to_string())
                .filter(|host| !host.is_empty())
                .collect();
            if !hosts.is_empty() {
                engine.internal_hosts = hosts;
            }
        }
        engine
            .validate()
            .map_err(|error| ReportHandlerError::new(error.to_string()))?;

        let report_tz_name =
            lookup("REPORT_TZ").unwrap_or_else(|| DEFAULT_REPORT_TZ.to_string());
        let report_tz = parse_report_tz(&report_tz_name)
            .map_err(|error| ReportHandlerError::new(format!("REPORT_TZ: {error}")))?;

        Ok(Self {
            input_bucket,
            raw_prefix,
            output_bucket,
            output_prefix,
            report_date: report_date_in(now, report_tz),
            engine,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl ReportResponse {
    fn ok(body: Value) -> Self {
        Self {
            status_code: 200,
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHandlerError {
    pub message: String,
}

impl ReportHandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ReportHandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ReportHandlerError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

/// Reads bucket and key of the first record of an S3 notification.
///
/// Keys arrive form-encoded (`+` for spaces) and are decoded here. S3 escapes
/// `&` and `=` in event keys, so the whole key decodes as a single form name.
pub fn parse_s3_event(event: &Value) -> Result<ObjectLocation, ReportHandlerError> {
    let record = event
        .get("Records")
        .and_then(Value::as_array)
        .and_then(|records| records.first())
        .ok_or_else(|| ReportHandlerError::new("S3 event must include a Records array"))?;

    let bucket = record
        .pointer("/s3/bucket/name")
        .and_then(Value::as_str)
        .ok_or_else(|| ReportHandlerError::new("S3 record is missing s3.bucket.name"))?;
    let raw_key = record
        .pointer("/s3/object/key")
        .and_then(Value::as_str)
        .ok_or_else(|| ReportHandlerError::new("S3 record is missing s3.object.key"))?;

    let key = form_urlencoded::parse(raw_key.as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
        .ok_or_else(|| ReportHandlerError::new("S3 record has an empty s3.object.key"))?;

    Ok(ObjectLocation {
        bucket: bucket.to_string(),
        key,
    })
}

/// `reports` or `reports/` → `reports/<date>_SearchKeywordPerformance.tab`.
pub fn report_object_key(output_prefix: &str, date: NaiveDate) -> String {
    let prefix = output_prefix.trim_end_matches('/');
    if prefix.is_empty() {
        report_filename(date)
    } else {
        format!("{prefix}/{}", report_filename(date))
    }
}

pub fn handle_s3_event(
    event: &Value,
    config: &ReportHandlerConfig,
    source: &impl ObjectSource,
    store: &impl ReportStore,
) -> Result<ReportResponse, ReportHandlerError> {
    let location = parse_s3_event(event)?;

    if location.bucket != config.input_bucket {
        log_warn(
            "report_handler",
            "object_ignored",
            json!({
                "reason": "unexpected_bucket",
                "bucket": location.bucket.clone(),
                "expected_bucket": config.input_bucket.clone(),
                "key": location.key.clone(),
            }),
        );
        return Ok(ReportResponse::ok(json!({
            "message": "Ignored event for unexpected bucket.",
            "bucket": location.bucket,
            "key": location.key,
        })));
    }

    if !config.raw_prefix.is_empty() && !location.key.starts_with(&config.raw_prefix) {
        log_info(
            "report_handler",
            "object_ignored",
            json!({
                "reason": "outside_raw_prefix",
                "bucket": location.bucket.clone(),
                "key": location.key.clone(),
                "raw_prefix": config.raw_prefix.clone(),
            }),
        );
        return Ok(ReportResponse::ok(json!({
            "message": "Ignored object outside RAW_PREFIX.",
            "bucket": location.bucket,
            "key": location.key,
            "raw_prefix": config.raw_prefix.clone(),
        })));
    }

    let started_at = Instant::now();
    let reader = source
        .open_object(&location.bucket, &location.key)
        .map_err(|error| {
            ReportHandlerError::new(format!(
                "failed to open s3://{}/{}: {error}",
                location.bucket, location.key
            ))
        })?;

    let engine = AttributionEngine::new(&config.engine);
    let outcome = engine.run_tsv(reader).map_err(|error| {
        ReportHandlerError::new(format!(
            "failed to analyze s3://{}/{}: {error}",
            location.bucket, location.key
        ))
    })?;

    let ranked = outcome.ranked();
    let body = render_report(&ranked)
        .map_err(|error| ReportHandlerError::new(format!("failed to render report: {error}")))?;

    let output_key = report_object_key(&config.output_prefix, config.report_date);
    store
        .write_object(&output_key, &body, REPORT_CONTENT_TYPE)
        .map_err(|error| {
            ReportHandlerError::new(format!(
                "failed to write s3://{}/{output_key}: {error}",
                config.output_bucket
            ))
        })?;

    log_info(
        "report_handler",
        "report_uploaded",
        json!({
            "input_bucket": location.bucket.clone(),
            "input_key": location.key.clone(),
            "output_bucket": config.output_bucket.clone(),
            "output_key": output_key.clone(),
            "rows": ranked.len(),
            "counters": outcome.counters.clone(),
            "duration_ms": started_at.elapsed().as_millis() as u64,
        }),
    );

    Ok(ReportResponse::ok(json!({
        "message": "External search revenue report generated.",
        "input_bucket": location.bucket,
        "input_key": location.key,
        "output_bucket": config.output_bucket.clone(),
        "output_key": output_key,
        "rows": ranked.len(),
    })))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Cursor, Read};
    use std::sync::Mutex;

    use chrono::TimeZone;

    use super::*;

    const HITS: &str = "hit_time_gmt\tip\tuser_agent\treferrer\tevent_list\tproduct_list\n\
        1\t10.0.0.1\tUA\thttp://www.google.com/search?q=Ipod\t\t\n\
        2\t10.0.0.2\tUA\thttp://www.bing.com/search?q=Zune\t\t\n\
        3\t10.0.0.1\tUA\thttp://www.esshopzilla.com/checkout/\t1\tElectronics;Ipod;1;290;\n\
        4\t10.0.0.2\tUA\thttp://www.esshopzilla.com/checkout/\t1\tElectronics;Zune;1;250;\n";

    struct MemorySource {
        objects: HashMap<(String, String), Vec<u8>>,
    }

    impl MemorySource {
        fn with_object(bucket: &str, key: &str, body: &[u8]) -> Self {
            Self {
                objects: HashMap::from([(
                    (bucket.to_string(), key.to_string()),
                    body.to_vec(),
                )]),
            }
        }
    }

    impl ObjectSource for MemorySource {
        fn open_object(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>, String> {
            self.objects
                .get(&(bucket.to_string(), key.to_string()))
                .map(|body| Box::new(Cursor::new(body.clone())) as Box<dyn Read + Send>)
                .ok_or_else(|| format!("no such object: {bucket}/{key}"))
        }
    }

    struct RecordingStore {
        writes: Mutex<HashMap<String, (Vec<u8>, String)>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                writes: Mutex::new(HashMap::new()),
            }
        }

        fn keys(&self) -> Vec<String> {
            self.writes
                .lock()
                .expect("poisoned mutex")
                .keys()
                .cloned()
                .collect()
        }

        fn object(&self, key: &str) -> Option<(Vec<u8>, String)> {
            self.writes
                .lock()
                .expect("poisoned mutex")
                .get(key)
                .cloned()
        }
    }

    impl ReportStore for RecordingStore {
        fn write_object(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), String> {
            self.writes
                .lock()
                .expect("poisoned mutex")
                .insert(key.to_string(), (body.to_vec(), content_type.to_string()));
            Ok(())
        }
    }

    struct FailingStore;

    impl ReportStore for FailingStore {
        fn write_object(
            &self,
            _key: &str,
            _body: &[u8],
            _content_type: &str,
        ) -> Result<(), String> {
            Err("access denied".to_string())
        }
    }

    fn s3_event(bucket: &str, key: &str) -> Value {
        json!({
            "Records": [{
                "eventSource": "aws:s3",
                "s3": {
                    "bucket": { "name": bucket },
                    "object": { "key": key },
                }
            }]
        })
    }

    fn config() -> ReportHandlerConfig {
        ReportHandlerConfig {
            input_bucket: "hits-in".to_string(),
            raw_prefix: "raw/".to_string(),
            output_bucket: "reports-out".to_string(),
            output_prefix: "reports/".to_string(),
            report_date: NaiveDate::from_ymd_opt(2026, 2, 15).expect("valid date"),
            engine: EngineConfig::default(),
        }
    }

    fn response_body(response: &ReportResponse) -> Value {
        serde_json::from_str(&response.body).expect("body should be json")
    }

    fn handle(
        bucket: &str,
        key: &str,
        source: &MemorySource,
        store: &impl ReportStore,
    ) -> Result<ReportResponse, ReportHandlerError> {
        handle_s3_event(&s3_event(bucket, key), &config(), source, store)
    }

    fn env_lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    const BUCKETS: [(&str, &str); 2] = [
        ("INPUT_BUCKET", "hits-in"),
        ("OUTPUT_BUCKET", "reports-out"),
    ];

    #[test]
    fn writes_ranked_report_for_raw_object() {
        let source = MemorySource::with_object("hits-in", "raw/data.tsv", HITS.as_bytes());
        let store = RecordingStore::new();

        let response =
            handle("hits-in", "raw/data.tsv", &source, &store).expect("handler should succeed");

        assert_eq!(response.status_code, 200);
        let body = response_body(&response);
        assert_eq!(body["input_key"], "raw/data.tsv");
        assert_eq!(body["output_bucket"], "reports-out");
        assert_eq!(
            body["output_key"],
            "reports/2026-02-15_SearchKeywordPerformance.tab"
        );
        assert_eq!(body["rows"], 2);

        assert_eq!(
            store.keys(),
            vec!["reports/2026-02-15_SearchKeywordPerformance.tab".to_string()]
        );
        let (report, content_type) = store
            .object("reports/2026-02-15_SearchKeywordPerformance.tab")
            .expect("report should be written");
        assert_eq!(content_type, REPORT_CONTENT_TYPE);
        assert_eq!(
            String::from_utf8(report).expect("report should be utf-8"),
            "Search Engine Domain\tSearch Keyword\tRevenue\n\
             google.com\tipod\t290.00\n\
             bing.com\tzune\t250.00\n"
        );
    }

    #[test]
    fn ignores_unexpected_bucket_without_reading() {
        let source = MemorySource::with_object("other", "raw/data.tsv", HITS.as_bytes());
        let store = RecordingStore::new();

        let response = handle("other", "raw/data.tsv", &source, &store)
            .expect("ignored events still succeed");

        assert_eq!(response.status_code, 200);
        assert_eq!(
            response_body(&response)["message"],
            "Ignored event for unexpected bucket."
        );
        assert!(store.keys().is_empty());
    }

    #[test]
    fn ignores_keys_outside_raw_prefix() {
        let source = MemorySource::with_object("hits-in", "reports/old.tab", b"");
        let store = RecordingStore::new();

        let response = handle("hits-in", "reports/old.tab", &source, &store)
            .expect("ignored events still succeed");

        let body = response_body(&response);
        assert_eq!(body["message"], "Ignored object outside RAW_PREFIX.");
        assert_eq!(body["raw_prefix"], "raw/");
        assert!(store.keys().is_empty());
    }

    #[test]
    fn decodes_form_encoded_object_keys() {
        let location = parse_s3_event(&s3_event("hits-in", "raw/hit+data%282%29%2B.tsv"))
            .expect("event should parse");
        assert_eq!(location.key, "raw/hit data(2)+.tsv");
    }

    #[test]
    fn empty_object_key_is_an_error() {
        let error = parse_s3_event(&s3_event("hits-in", "")).expect_err("empty key should fail");
        assert!(error.message.contains("empty"));
    }

    #[test]
    fn malformed_event_is_an_error() {
        let source = MemorySource::with_object("hits-in", "raw/data.tsv", HITS.as_bytes());
        let event = json!({ "Records": [] });

        let error = handle_s3_event(&event, &config(), &source, &RecordingStore::new())
            .expect_err("empty records should fail");

        assert!(error.message.contains("Records"));
    }

    #[test]
    fn missing_columns_fail_without_writing() {
        let source =
            MemorySource::with_object("hits-in", "raw/data.tsv", b"ip\treferrer\n1.1.1.1\t-\n");
        let store = RecordingStore::new();

        let error = handle("hits-in", "raw/data.tsv", &source, &store)
            .expect_err("bad header should fail");

        assert!(error.message.contains("missing required columns"));
        assert!(store.keys().is_empty());
    }

    #[test]
    fn store_failures_surface_output_location() {
        let source = MemorySource::with_object("hits-in", "raw/data.tsv", HITS.as_bytes());

        let error = handle("hits-in", "raw/data.tsv", &source, &FailingStore)
            .expect_err("write failure should fail the handler");

        assert!(error.message.contains("s3://reports-out/reports/"));
        assert!(error.message.contains("access denied"));
    }

    #[test]
    fn output_key_handles_prefix_shapes() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 15).expect("valid date");
        assert_eq!(
            report_object_key("reports", date),
            "reports/2026-02-15_SearchKeywordPerformance.tab"
        );
        assert_eq!(
            report_object_key("reports//", date),
            "reports/2026-02-15_SearchKeywordPerformance.tab"
        );
        assert_eq!(
            report_object_key("", date),
            "2026-02-15_SearchKeywordPerformance.tab"
        );
    }

    #[test]
    fn config_reads_environment_with_defaults() {
        let env = [
            BUCKETS[0],
            BUCKETS[1],
            ("RAW_PREFIX", "/raw/"),
            ("INTERNAL_HOSTS", "shop.example, cdn.shop.example"),
        ];

        let config = ReportHandlerConfig::from_lookup(env_lookup(&env), utc(2026, 2, 15, 3, 0))
            .expect("config should load");

        assert_eq!(config.raw_prefix, "raw/");
        assert_eq!(config.output_prefix, DEFAULT_OUTPUT_PREFIX);
        assert_eq!(
            config.engine.internal_hosts,
            vec!["shop.example", "cdn.shop.example"]
        );
        // 21:00 CST on the 14th in the default zone.
        assert_eq!(
            config.report_date,
            NaiveDate::from_ymd_opt(2026, 2, 14).expect("valid date")
        );
    }

    #[test]
    fn report_date_uses_daylight_time_in_summer() {
        // 00:30 CDT; a fixed UTC-6 offset would still be on the 14th.
        let config = ReportHandlerConfig::from_lookup(env_lookup(&BUCKETS), utc(2026, 7, 15, 5, 30))
            .expect("config should load");

        assert_eq!(
            config.report_date,
            NaiveDate::from_ymd_opt(2026, 7, 15).expect("valid date")
        );
    }

    #[test]
    fn report_zone_is_configurable() {
        let env = [BUCKETS[0], BUCKETS[1], ("REPORT_TZ", "Asia/Tokyo")];

        let config = ReportHandlerConfig::from_lookup(env_lookup(&env), utc(2026, 2, 15, 16, 0))
            .expect("config should load");

        assert_eq!(
            config.report_date,
            NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
        );
    }

    #[test]
    fn unknown_report_zone_is_rejected() {
        let env = [BUCKETS[0], BUCKETS[1], ("REPORT_TZ", "Central")];

        let error = ReportHandlerConfig::from_lookup(env_lookup(&env), Utc::now())
            .expect_err("unknown zone should fail");

        assert!(error.message.starts_with("REPORT_TZ:"));
    }

    #[test]
    fn config_requires_buckets() {
        let error = ReportHandlerConfig::from_lookup(|_| None, Utc::now())
            .expect_err("buckets are required");
        assert_eq!(error.message, "INPUT_BUCKET must be configured");
    }
}
