//! Application service: the steady-state loop.
//!
//! [`LedService`] owns the HTTP switch and the name responder once boot
//! has finished. Each [`tick`](LedService::tick) polls the responder,
//! then serves at most one client, passing the responder down so it keeps
//! answering while the client is in flight.
//!
//! ```text
//!  Listener ──▶ ┌────────────────────────┐ ──▶ EventSink
//!               │       LedService       │
//!  Datagram ◀──▶│  HttpLedServer · mDNS  │──▶ GPIO
//!               └────────────────────────┘
//! ```

use embedded_hal::digital::{OutputPin, PinState};
use log::info;

use crate::config::DeviceConfig;
use crate::http::{AbortReason, ConnectionOutcome, HttpLedServer};
use crate::mdns::MdnsResponder;

use super::events::AppEvent;
use super::ports::{DatagramPort, EventSink, Listener, TimePort};

/// Connection counters since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    /// Clients that received the page.
    pub served: u32,
    /// Clients dropped without a response, for any reason.
    pub aborted: u32,
    /// Subset of `aborted` that stalled past the read timeout.
    pub timed_out: u32,
}

pub struct LedService<L: Listener, P: OutputPin, S: DatagramPort> {
    server: HttpLedServer<L, P>,
    mdns: MdnsResponder<S>,
    stats: ServiceStats,
    idle_ms: u32,
}

impl<L: Listener, P: OutputPin, S: DatagramPort> LedService<L, P, S> {
    /// `mdns` must already be started; see
    /// [`start_name_service`](super::boot::start_name_service).
    pub fn new(server: HttpLedServer<L, P>, mdns: MdnsResponder<S>, config: &DeviceConfig) -> Self {
        Self {
            server,
            mdns,
            stats: ServiceStats::default(),
            idle_ms: config.loop_idle_ms,
        }
    }

    /// One scheduling pass. Returns `true` if a client was served.
    pub fn tick(&mut self, clock: &mut impl TimePort, sink: &mut impl EventSink) -> bool {
        self.mdns.poll();

        let Some(report) = self.server.serve_next(&mut self.mdns, clock) else {
            return false;
        };

        if let Some(level) = report.pin_changed {
            sink.emit(&AppEvent::PinChanged(level));
        }
        match report.outcome {
            ConnectionOutcome::Responded => {
                self.stats.served = self.stats.served.saturating_add(1);
                sink.emit(&AppEvent::ConnectionServed);
            }
            ConnectionOutcome::Aborted(reason) => {
                self.stats.aborted = self.stats.aborted.saturating_add(1);
                if reason == AbortReason::TimedOut {
                    self.stats.timed_out = self.stats.timed_out.saturating_add(1);
                }
                sink.emit(&AppEvent::ConnectionAborted(reason));
            }
        }
        true
    }

    /// Tick forever, idling briefly whenever no client was waiting.
    pub fn run(&mut self, clock: &mut impl TimePort, sink: &mut impl EventSink) -> ! {
        info!("Service: entering main loop");
        loop {
            if !self.tick(clock, sink) {
                clock.delay_ms(self.idle_ms);
            }
        }
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats
    }

    pub fn pin_state(&self) -> PinState {
        self.server.pin_state()
    }

    pub fn responder(&self) -> &MdnsResponder<S> {
        &self.mdns
    }
}
