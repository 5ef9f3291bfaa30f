//! One-connection-at-a-time HTTP switch.
//!
//! [`HttpLedServer`] owns the listener and the actuator pin. Each accepted
//! client is driven to completion before the next is accepted:
//!
//! ```text
//!  accept ─▶ read chunk ─▶ feed bytes ─▶ Command? set pin
//!              ▲   │                  └▶ HeadersDone ─▶ write page ─▶ close
//!              └───┘ (background.service() between reads)
//! ```
//!
//! Every failure local to a connection ends that connection only; the
//! caller gets a [`ConnectionReport`] describing what happened.

use embedded_hal::digital::{OutputPin, PinState};
use log::{debug, info, warn};

use crate::app::ports::{BackgroundTask, Listener, TimePort, Transport};
use crate::config::{DeviceConfig, MatchScope};
use crate::drivers::gpio_output::GpioOutput;
use crate::error::{ActuatorError, TransportError};

use super::parser::{LINE_CAPACITY, ParseEvent, RequestParser};
use super::response::{self, ResponseBytes};

/// Bytes pulled from the socket per read call.
const READ_CHUNK: usize = 64;
/// Yield between empty reads or blocked writes.
const IO_IDLE_MS: u32 = 1;

/// Why a connection ended without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A line outgrew the request buffer.
    LineOverflow,
    /// No byte arrived (or could be sent) within the read timeout.
    TimedOut,
    /// The client closed before the request was complete.
    PeerClosed,
    Transport(TransportError),
    Actuator(ActuatorError),
}

impl core::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::LineOverflow => write!(f, "request line too long"),
            Self::TimedOut => write!(f, "client timed out"),
            Self::PeerClosed => write!(f, "client closed early"),
            Self::Transport(e) => write!(f, "{e}"),
            Self::Actuator(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// The fixed page was sent and the connection closed.
    Responded,
    Aborted(AbortReason),
}

/// Summary of one served connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionReport {
    pub outcome: ConnectionOutcome,
    /// New pin level, if a command changed it.
    pub pin_changed: Option<PinState>,
    pub bytes_read: usize,
}

pub struct HttpLedServer<L: Listener, P: OutputPin> {
    listener: L,
    output: GpioOutput<P>,
    page: ResponseBytes,
    scope: MatchScope,
    read_timeout_ms: u32,
}

impl<L: Listener, P: OutputPin> HttpLedServer<L, P> {
    pub fn new(listener: L, output: GpioOutput<P>, config: &DeviceConfig) -> Self {
        Self {
            listener,
            output,
            page: response::render(config.refresh_secs),
            scope: config.match_scope,
            read_timeout_ms: config.read_timeout_ms,
        }
    }

    /// Current actuator level.
    pub fn pin_state(&self) -> PinState {
        self.output.state()
    }

    /// Accept one waiting client and serve it to completion.
    ///
    /// Returns `None` when nobody is waiting. Accept errors are logged and
    /// treated as "nobody waiting"; the listener stays up.
    pub fn serve_next(
        &mut self,
        background: &mut impl BackgroundTask,
        clock: &mut impl TimePort,
    ) -> Option<ConnectionReport> {
        let mut conn = match self.listener.accept() {
            Ok(Some(conn)) => conn,
            Ok(None) => return None,
            Err(e) => {
                warn!("HTTP: accept failed: {}", e);
                return None;
            }
        };
        info!("HTTP: new client");
        Some(self.serve(&mut conn, background, clock))
    }

    /// Drive one connection: parse, actuate, respond, close.
    pub fn serve<C: Transport>(
        &mut self,
        conn: &mut C,
        background: &mut impl BackgroundTask,
        clock: &mut impl TimePort,
    ) -> ConnectionReport {
        let mut report = ConnectionReport {
            outcome: ConnectionOutcome::Responded,
            pin_changed: None,
            bytes_read: 0,
        };

        let result = self
            .read_request(conn, background, clock, &mut report)
            .and_then(|()| self.write_page(conn, background, clock));

        if let Err(reason) = result {
            warn!("HTTP: connection aborted: {}", reason);
            report.outcome = ConnectionOutcome::Aborted(reason);
        }
        conn.close();
        info!("HTTP: client disconnected");
        report
    }

    fn read_request<C: Transport>(
        &mut self,
        conn: &mut C,
        background: &mut impl BackgroundTask,
        clock: &mut impl TimePort,
        report: &mut ConnectionReport,
    ) -> Result<(), AbortReason> {
        let mut parser = RequestParser::<LINE_CAPACITY>::new(self.scope);
        let mut buf = [0u8; READ_CHUNK];
        let mut last_activity = clock.now_ms();

        loop {
            // Name queries must be answered even while a client dribbles bytes.
            background.service();

            let n = match conn.read(&mut buf) {
                Ok(0) => {
                    if clock.now_ms().saturating_sub(last_activity) >= u64::from(self.read_timeout_ms) {
                        return Err(AbortReason::TimedOut);
                    }
                    clock.delay_ms(IO_IDLE_MS);
                    continue;
                }
                Ok(n) => n,
                Err(TransportError::Closed) => return Err(AbortReason::PeerClosed),
                Err(e) => return Err(AbortReason::Transport(e)),
            };
            last_activity = clock.now_ms();
            report.bytes_read += n;

            for &byte in &buf[..n] {
                match parser.feed(byte) {
                    ParseEvent::Pending => {}
                    // Reported only for completed lines; an aborted line never actuates.
                    ParseEvent::Command(level) => {
                        let before = self.output.state();
                        self.output.set(level).map_err(AbortReason::Actuator)?;
                        if before != level {
                            info!("HTTP: pin -> {:?}", level);
                            report.pin_changed = Some(level);
                        }
                    }
                    ParseEvent::HeadersDone => return Ok(()),
                    ParseEvent::Overflow => return Err(AbortReason::LineOverflow),
                }
            }
        }
    }

    fn write_page<C: Transport>(
        &self,
        conn: &mut C,
        background: &mut impl BackgroundTask,
        clock: &mut impl TimePort,
    ) -> Result<(), AbortReason> {
        let mut remaining = self.page.as_bytes();
        let mut last_progress = clock.now_ms();
        while !remaining.is_empty() {
            match conn.write(remaining) {
                Ok(0) => {
                    if clock.now_ms().saturating_sub(last_progress) >= u64::from(self.read_timeout_ms) {
                        return Err(AbortReason::TimedOut);
                    }
                    background.service();
                    clock.delay_ms(IO_IDLE_MS);
                }
                Ok(n) => {
                    remaining = &remaining[n.min(remaining.len())..];
                    last_progress = clock.now_ms();
                }
                Err(TransportError::Closed) => return Err(AbortReason::PeerClosed),
                Err(e) => return Err(AbortReason::Transport(e)),
            }
        }
        conn.flush().map_err(AbortReason::Transport)?;
        debug!("HTTP: sent {} byte page", self.page.len());
        // Give the client a moment to drain before the socket is closed.
        clock.delay_ms(IO_IDLE_MS);
        Ok(())
    }
}
