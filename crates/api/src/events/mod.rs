//! Event collection during message execution.

use veid_types::app::IdentityEvent;

/// Collects the typed events emitted during a single message execution or
/// lifecycle hook.
///
/// The host drains the sink after each message and folds the events into the
/// block's result. Emission never fails; an absent event is an operational
/// bug, not a consensus bug.
#[derive(Default, Debug)]
pub struct EventSink {
    events: Vec<IdentityEvent>,
}

impl EventSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one event.
    pub fn emit(&mut self, event: IdentityEvent) {
        log::debug!("[event] {:?}", event);
        self.events.push(event);
    }

    /// The events emitted so far, in emission order.
    pub fn events(&self) -> &[IdentityEvent] {
        &self.events
    }

    /// Drains the sink, returning the collected events.
    pub fn take(&mut self) -> Vec<IdentityEvent> {
        std::mem::take(&mut self.events)
    }
}
