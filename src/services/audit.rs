//! Append-only audit trail for security decisions.
//!
//! Two rules drive everything here:
//! - `record` never fails and never panics: an audit problem must not
//!   change the outcome of the request that triggered it. Failed writes
//!   are counted and dropped.
//! - entries never contain secrets. Secret-shaped fields are redacted and
//!   control characters are stripped before anything is written, so a
//!   hostile username cannot forge log lines and a careless caller cannot
//!   leak a password into the trail.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Field keys whose values are always redacted, matched case-insensitively
/// as substrings ("new_password", "sessionToken", ...).
const SECRET_KEYS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "authorization",
    "cookie",
    "card",
    "cvv",
    "pan",
];

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Admitted,
    Rejected,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Admitted => "admitted",
            AuditOutcome::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    /// Principal id, or "anonymous".
    pub subject: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub outcome: AuditOutcome,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl AuditEntry {
    pub fn new(
        subject: impl Into<String>,
        action: impl Into<String>,
        outcome: AuditOutcome,
        reason: &'static str,
    ) -> Self {
        Self {
            at: Utc::now(),
            subject: subject.into(),
            action: action.into(),
            resource: None,
            outcome,
            reason,
            source: None,
            fields: Map::new(),
        }
    }

    pub fn resource(mut self, id: impl Into<String>) -> Self {
        self.resource = Some(id.into());
        self
    }

    pub fn source(mut self, source: Option<&str>) -> Self {
        self.source = source.map(|s| s.to_string());
        self
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }
}

/// Destination for audit entries.
///
/// Implementations scrub on write and swallow their own failures.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);

    /// Number of entries that could not be written.
    fn dropped_writes(&self) -> u64 {
        0
    }
}

/// Scrub an entry in place: strip control characters everywhere, redact
/// secret-shaped keys and card-number-shaped values.
pub fn scrub_entry(entry: &mut AuditEntry) {
    entry.subject = clean_text(&entry.subject);
    entry.action = clean_text(&entry.action);
    if let Some(r) = entry.resource.take() {
        entry.resource = Some(clean_text(&r));
    }
    if let Some(s) = entry.source.take() {
        entry.source = Some(clean_text(&s));
    }
    for (key, value) in entry.fields.iter_mut() {
        if is_secret_key(key) {
            *value = Value::String(REDACTED.to_string());
        } else {
            scrub_value(value);
        }
    }
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SECRET_KEYS.iter().any(|s| key.contains(s))
}

fn scrub_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            if looks_like_card_number(s) {
                *s = REDACTED.to_string();
            } else {
                *s = clean_text(s);
            }
        }
        Value::Array(items) => {
            for item in items {
                scrub_value(item);
            }
        }
        Value::Object(map) => {
            for (key, nested) in map.iter_mut() {
                if is_secret_key(key) {
                    *nested = Value::String(REDACTED.to_string());
                } else {
                    scrub_value(nested);
                }
            }
        }
        _ => {}
    }
}

// CR/LF in a logged value is a forged log line waiting to happen.
fn clean_text(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn looks_like_card_number(s: &str) -> bool {
    let digits: String = s.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    (13..=19).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Sink that emits structured `tracing` events under the `audit` target.
#[derive(Default)]
pub struct TracingAuditSink {
    dropped: AtomicU64,
}

impl TracingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, mut entry: AuditEntry) {
        scrub_entry(&mut entry);
        match serde_json::to_string(&entry.fields) {
            Ok(fields) => {
                tracing::info!(
                    target: "audit",
                    at = %entry.at.to_rfc3339(),
                    subject = %entry.subject,
                    action = %entry.action,
                    resource = entry.resource.as_deref(),
                    outcome = entry.outcome.as_str(),
                    reason = entry.reason,
                    source = entry.source.as_deref(),
                    fields = %fields,
                    "security decision"
                );
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn dropped_writes(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// In-memory sink for tests and inspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    dropped: AtomicU64,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(_) => Vec::new(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, mut entry: AuditEntry) {
        scrub_entry(&mut entry);
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn dropped_writes(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn secret_shaped_keys_are_redacted() {
        let entry = AuditEntry::new("u-1", "login", AuditOutcome::Rejected, "invalid_credential")
            .field("password", json!("hunter2"))
            .field("new_password", json!("hunter3"))
            .field("session_token", json!("eyJhbGciOi..."))
            .field("note", json!("plain"));

        let sink = MemoryAuditSink::new();
        sink.record(entry);

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        let fields = &entries[0].fields;
        assert_eq!(fields["password"], json!(REDACTED));
        assert_eq!(fields["new_password"], json!(REDACTED));
        assert_eq!(fields["session_token"], json!(REDACTED));
        assert_eq!(fields["note"], json!("plain"));
    }

    #[test]
    fn card_shaped_values_are_redacted() {
        let entry = AuditEntry::new("u-1", "purchase", AuditOutcome::Admitted, "owner")
            .field("number", json!("4111 1111 1111 1111"))
            .field("order", json!("12345"));

        let sink = MemoryAuditSink::new();
        sink.record(entry);

        let fields = &sink.entries()[0].fields;
        assert_eq!(fields["number"], json!(REDACTED));
        assert_eq!(fields["order"], json!("12345"));
    }

    #[test]
    fn control_characters_are_stripped() {
        let entry = AuditEntry::new(
            "anonymous",
            "login",
            AuditOutcome::Rejected,
            "invalid_credential",
        )
        .field(
            "username",
            json!("alice\r\n2026-01-01 admin login succeeded"),
        );

        let sink = MemoryAuditSink::new();
        sink.record(entry);

        let fields = &sink.entries()[0].fields;
        let logged = fields["username"].as_str().unwrap();
        assert!(!logged.contains('\r'));
        assert!(!logged.contains('\n'));
    }

    #[test]
    fn nested_fields_are_scrubbed() {
        let entry = AuditEntry::new("u-1", "update", AuditOutcome::Admitted, "owner").field(
            "payload",
            json!({"profile": {"api_token": "abc", "name": "ok\r\n"}}),
        );

        let sink = MemoryAuditSink::new();
        sink.record(entry);

        let fields = &sink.entries()[0].fields;
        assert_eq!(fields["payload"]["profile"]["api_token"], json!(REDACTED));
        assert_eq!(fields["payload"]["profile"]["name"], json!("ok  "));
    }

    #[test]
    fn tracing_sink_never_fails() {
        let sink = TracingAuditSink::new();
        sink.record(AuditEntry::new(
            "u-1",
            "read",
            AuditOutcome::Admitted,
            "owner",
        ));
        assert_eq!(sink.dropped_writes(), 0);
    }
}
