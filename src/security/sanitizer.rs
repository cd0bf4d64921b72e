use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use serde_json::Value;

use super::audit::{AuditEvent, AuditSink, TracingAuditSink};

/// Patterns that mark a value as dangerous regardless of later escaping.
static DANGEROUS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)<script",
        r"(?i)javascript:",
        r"(?i)on\w+\s*=",
        r"(?i)<iframe",
        r"(?i)<object",
        r"(?i)<embed",
    ])
    .expect("dangerous pattern set is static and valid")
});

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Input sanitizer. All untrusted strings pass through here before they reach
/// business logic; a value matching a dangerous pattern degrades to the empty
/// string and produces exactly one audit event. No method can fail.
#[derive(Clone)]
pub struct Sanitizer {
    sink: Arc<dyn AuditSink>,
    value_cap: usize,
    origin: Option<String>,
}

impl Sanitizer {
    pub fn new(sink: Arc<dyn AuditSink>, value_cap: usize) -> Self {
        Self {
            sink,
            value_cap,
            origin: None,
        }
    }

    /// Scoped copy carrying the caller's network origin for audit events.
    pub fn for_origin(&self, origin: impl Into<String>) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            value_cap: self.value_cap,
            origin: Some(origin.into()),
        }
    }

    /// General mode: reject dangerous values, otherwise strip markup, escape
    /// HTML metacharacters and trim surrounding whitespace.
    pub fn sanitize(&self, input: &str, source: &str) -> String {
        if !self.check(input, source) {
            return String::new();
        }
        let stripped = TAGS.replace_all(input, "");
        escape_html(stripped.trim())
    }

    /// Email mode: markup is stripped but `@` and `.` survive unescaped.
    pub fn sanitize_email(&self, input: &str, source: &str) -> String {
        if !self.check(input, source) {
            return String::new();
        }
        TAGS.replace_all(input, "").trim().to_string()
    }

    /// Password mode: trim only, so legitimate punctuation is preserved.
    pub fn sanitize_password(&self, input: &str, source: &str) -> String {
        if !self.check(input, source) {
            return String::new();
        }
        input.trim().to_string()
    }

    /// Structured mode: apply the general rule to every string leaf,
    /// recursively; non-string leaves pass through untouched.
    pub fn sanitize_value(&self, value: &Value, source: &str) -> Value {
        match value {
            Value::String(s) => Value::String(self.sanitize(s, source)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.sanitize_value(item, source))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| (key.clone(), self.sanitize_value(item, key)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Whether the value is free of dangerous patterns.
    pub fn is_safe(&self, input: &str) -> bool {
        !DANGEROUS.is_match(input)
    }

    fn check(&self, input: &str, source: &str) -> bool {
        if self.is_safe(input) {
            return true;
        }
        let capped: String = input.chars().take(self.value_cap).collect();
        self.sink.record(AuditEvent {
            value: capped,
            source: source.to_string(),
            client: self.origin.clone(),
            at: Utc::now(),
        });
        false
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(Arc::new(TracingAuditSink), 100)
    }
}

/// Escape characters with special meaning in HTML output.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}
