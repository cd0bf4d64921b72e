use std::sync::{Arc, Mutex};

use crate::config::DatabaseConfig;
use crate::database::gateway::Database;
use crate::database::property_repository::PropertyRepository;
use crate::security::audit::{AuditEvent, AuditSink};

/// Audit sink that keeps events in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit sink lock").clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().expect("audit sink lock").push(event);
    }
}

/// Fresh in-memory database with both tables provisioned.
///
/// A single pooled connection keeps every query on the same `:memory:`
/// instance.
pub async fn memory_db() -> Database {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        connection_timeout_secs: 5,
    };
    let db = Database::connect(&config).await.expect("in-memory database");
    PropertyRepository::provision(&db).await.expect("properties table");
    db
}

/// Convenience: a sanitizer wired to a memory sink, plus the sink itself.
pub fn capturing_sanitizer() -> (crate::security::Sanitizer, Arc<MemoryAuditSink>) {
    let sink = Arc::new(MemoryAuditSink::default());
    (crate::security::Sanitizer::new(sink.clone(), 100), sink)
}
