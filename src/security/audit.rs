use chrono::{DateTime, Utc};

/// Structured record of a rejected, potentially malicious input value.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Offending value, capped to a bounded prefix by the sanitizer
    pub value: String,
    /// Caller-supplied tag naming the field the value arrived in
    pub source: String,
    /// Network origin of the caller, when known
    pub client: Option<String>,
    pub at: DateTime<Utc>,
}

/// Destination for audit events. The sink is injected into the sanitizer so
/// tests can substitute their own.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink: structured warning in the server log.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::warn!(
            value = %event.value,
            source = %event.source,
            client = event.client.as_deref().unwrap_or("unknown"),
            at = %event.at.to_rfc3339(),
            "dangerous input rejected"
        );
    }
}
