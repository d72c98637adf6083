//! Observability
//!
//! Structured JSON line logging of typed events.
//!
//! # Usage
//!
//! ```ignore
//! use wireform::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::SchemasLoaded, &[("models", "4")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

#[cfg(test)]
pub(crate) use logger::capture_log;

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
