#![forbid(unsafe_code)]

//! Named events fired by event-trigger rules
//!
//! An [`EventHub`] is an ordinary value: it travels inside the
//! [`ValidationContext`](super::ValidationContext) of a call, so two
//! validators never share handlers unless they are handed the same hub.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Callback invoked when its event is triggered
pub type EventHandler = Arc<dyn Fn() + Send + Sync>;

/// Handlers keyed by event name
///
/// Cloning is cheap; the clone shares the handler closures but has its own
/// table, so registering on one copy does not affect the other.
#[derive(Clone, Default)]
pub struct EventHub {
    handlers: HashMap<String, Vec<EventHandler>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handler` to the handlers of `event`
    pub fn register<F>(&mut self, event: impl Into<String>, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers
            .entry(event.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Builder form of [`register`](Self::register)
    pub fn on<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(event, handler);
        self
    }

    /// Invokes every handler of `event` in registration order
    ///
    /// Returns how many handlers ran. An event nobody listens to is dropped.
    pub fn trigger(&self, event: &str) -> usize {
        let Some(handlers) = self.handlers.get(event) else {
            tracing::trace!(event, "event has no handlers");
            return 0;
        };

        for handler in handlers {
            handler();
        }
        tracing::trace!(event, handlers = handlers.len(), "event triggered");
        handlers.len()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.get(event).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Removes every handler of every event
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<(&str, usize)> = self
            .handlers
            .iter()
            .map(|(event, handlers)| (event.as_str(), handlers.len()))
            .collect();
        events.sort_unstable();
        f.debug_struct("EventHub").field("events", &events).finish()
    }
}
