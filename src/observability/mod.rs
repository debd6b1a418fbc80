//! Observability subsystem
//!
//! - Structured logging (JSON lines on stderr)
//! - Typed lifecycle events
//! - Monotonic engine counters
//!
//! Observability is read-only: nothing here influences a decision.
//!
//! ```ignore
//! use proxemo::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::RunComplete, &[("halted_by", "resolve-automatic")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{EngineMetrics, MetricsSnapshot};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // Verifies no panic
        log_event(Event::RunBegin);
        log_event(Event::RunComplete);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ConfigLoaded, &[("path", "/tmp/proxemo.json")]);
    }
}
