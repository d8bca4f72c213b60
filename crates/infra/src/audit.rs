use std::sync::Mutex;

use permscope_auth::{AuditSink, DenialEvent};

/// Keeps denial events in memory for inspection, and also traces them.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<DenialEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DenialEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_denial(&self, event: &DenialEvent) {
        tracing::debug!(actor = %event.actor, operation = %event.operation, "denial recorded");
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
