//! JSON-line event logging on stderr.

use serde_json::{json, Value};

pub fn log_info(component: &str, event: &str, details: Value) {
    eprintln!(
        "{}",
        json!({
            "component": component,
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

pub fn log_warn(component: &str, event: &str, details: Value) {
    log_with_level(component, "warn", event, details);
}

pub fn log_error(component: &str, event: &str, details: Value) {
    log_with_level(component, "error", event, details);
}

fn log_with_level(component: &str, level: &str, event: &str, details: Value) {
    eprintln!(
        "{}",
        json!({
            "component": component,
            "level": level,
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}
