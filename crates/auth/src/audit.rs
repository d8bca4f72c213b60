use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use permscope_core::{BoundaryId, ScopeRef, SubjectRef};

use crate::operations::OperationName;

/// Structured record of a denied `check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialEvent {
    pub actor: SubjectRef,
    pub operation: OperationName,
    pub boundary_id: BoundaryId,
    pub context: ScopeRef,
    pub occurred_at: DateTime<Utc>,
}

impl DenialEvent {
    pub fn new(
        actor: SubjectRef,
        operation: OperationName,
        boundary_id: BoundaryId,
        context: ScopeRef,
    ) -> Self {
        Self {
            actor,
            operation,
            boundary_id,
            context,
            occurred_at: Utc::now(),
        }
    }
}

/// Receiver of denial events. Must not fail the request it observes.
pub trait AuditSink: Send + Sync {
    fn record_denial(&self, event: &DenialEvent);
}

impl<T> AuditSink for std::sync::Arc<T>
where
    T: AuditSink + ?Sized,
{
    fn record_denial(&self, event: &DenialEvent) {
        (**self).record_denial(event)
    }
}

/// Emits denials as `warn` level tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record_denial(&self, event: &DenialEvent) {
        tracing::warn!(
            target: "permscope::audit",
            actor = %event.actor,
            operation = %event.operation,
            boundary_id = %event.boundary_id,
            context = %event.context,
            occurred_at = %event.occurred_at,
            "permission denied"
        );
    }
}
