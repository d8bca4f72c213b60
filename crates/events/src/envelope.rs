use serde::{Deserialize, Serialize};
use uuid::Uuid;

use permscope_core::BoundaryId;

use crate::Event;

/// Envelope for an event published within one security boundary.
///
/// Consumers filter on `boundary_id` to fan notifications out to the members
/// of that boundary only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    boundary_id: BoundaryId,
    event_type: String,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        boundary_id: BoundaryId,
        event_type: impl Into<String>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            boundary_id,
            event_type: event_type.into(),
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn boundary_id(&self) -> BoundaryId {
        self.boundary_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, taking its type name from the [`Event`] contract.
    pub fn wrap(boundary_id: BoundaryId, event: E) -> Self {
        Self::new(Uuid::now_v7(), boundary_id, event.event_type(), event)
    }
}
