//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production). Lines
//! carry the same subsystem prefixes as the rest of the firmware.

use log::{Level, log};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

/// Level and text of the log line for `event`.
fn render(event: &AppEvent) -> (Level, String) {
    match event {
        AppEvent::LinkStateChanged { from, to } => {
            (Level::Info, format!("WiFi: link {:?} -> {:?}", from, to))
        }
        AppEvent::IdentityEstablished { name, ip } => {
            (Level::Info, format!("WiFi: identity {} at {}", name, ip))
        }
        AppEvent::NameServiceStarted => (Level::Info, "mDNS: responder started".into()),
        AppEvent::PinChanged(level) => (Level::Info, format!("GPIO: pin -> {:?}", level)),
        AppEvent::ConnectionServed => (Level::Info, "HTTP: client served".into()),
        AppEvent::ConnectionAborted(reason) => {
            (Level::Warn, format!("HTTP: client aborted: {}", reason))
        }
        AppEvent::Fault(fault) => (Level::Error, format!("FATAL: {}", fault)),
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let (level, line) = render(event);
        log!(level, "{}", line);
    }
}
