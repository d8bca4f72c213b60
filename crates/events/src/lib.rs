//! `permscope-events`: change notifications for permission data.
//!
//! Mechanics only: an event contract, a boundary-scoped envelope and a
//! pub/sub bus. Concrete event payloads live with the code that emits them.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
