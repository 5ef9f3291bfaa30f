//! Mock hardware and network adapters for integration tests.
//!
//! Each mock records what the firmware did to it behind an `Rc` handle,
//! so tests can inspect the history after the mock has been moved into
//! the server or responder.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddrV4;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, OutputPin};
use ledthing::app::events::AppEvent;
use ledthing::app::ports::{
    DatagramPort, EventSink, IndicatorPort, Listener, TimePort, Transport,
};
use ledthing::error::{MdnsError, TransportError};

// ── GPIO ──────────────────────────────────────────────────────

/// Output pin that records every level written to it.
#[derive(Clone, Default)]
pub struct MockPin {
    pub writes: Rc<RefCell<Vec<bool>>>,
}

#[allow(dead_code)]
impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.writes.borrow().last().copied().unwrap_or(false)
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.writes.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.writes.borrow_mut().push(true);
        Ok(())
    }
}

/// Status light that records its level changes.
#[derive(Clone, Default)]
pub struct MockIndicator {
    pub levels: Rc<RefCell<Vec<bool>>>,
}

impl IndicatorPort for MockIndicator {
    fn set_indicator(&mut self, on: bool) {
        self.levels.borrow_mut().push(on);
    }
}

// ── Time ──────────────────────────────────────────────────────

/// Clock that only moves when the code under test delays.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl TimePort for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

// ── Events ────────────────────────────────────────────────────

#[derive(Default)]
pub struct EventLog {
    pub events: Vec<AppEvent>,
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── TCP ───────────────────────────────────────────────────────

/// One scripted read result.
pub enum Step {
    /// Delivered by the next read (split across reads if the buffer is small).
    Data(Vec<u8>),
    /// `n` reads that find nothing waiting.
    Idle(u32),
    /// Runs when reached; the read itself finds nothing waiting.
    Call(Box<dyn FnMut()>),
    /// Peer shut down its side.
    Close,
}

/// What the server did to a [`MockConnection`].
#[derive(Default)]
pub struct ConnectionLog {
    pub written: Vec<u8>,
    pub flushed: bool,
    pub closed: bool,
    pub reads: u32,
}

#[allow(dead_code)]
impl ConnectionLog {
    pub fn response(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }
}

pub struct MockConnection {
    script: VecDeque<Step>,
    /// Accept at most this many bytes per write call (0 = unlimited).
    write_limit: usize,
    /// Writes that accept nothing before the first success.
    stalled_writes: u32,
    pub log: Rc<RefCell<ConnectionLog>>,
}

#[allow(dead_code)]
impl MockConnection {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: script.into(),
            write_limit: 0,
            stalled_writes: 0,
            log: Rc::new(RefCell::new(ConnectionLog::default())),
        }
    }

    /// The whole request in one segment.
    pub fn request(text: &str) -> Self {
        Self::new(vec![Step::Data(text.as_bytes().to_vec())])
    }

    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = limit;
        self
    }

    pub fn with_stalled_writes(mut self, count: u32) -> Self {
        self.stalled_writes = count;
        self
    }

    pub fn log(&self) -> Rc<RefCell<ConnectionLog>> {
        Rc::clone(&self.log)
    }
}

impl Transport for MockConnection {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.log.borrow_mut().reads += 1;
        if self.log.borrow().closed {
            return Err(TransportError::Closed);
        }
        match self.script.pop_front() {
            // Script exhausted: the client has gone quiet.
            None => Ok(0),
            Some(Step::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    bytes.drain(..n);
                    self.script.push_front(Step::Data(bytes));
                }
                Ok(n)
            }
            Some(Step::Idle(n)) => {
                if n > 1 {
                    self.script.push_front(Step::Idle(n - 1));
                }
                Ok(0)
            }
            Some(Step::Call(mut f)) => {
                f();
                Ok(0)
            }
            Some(Step::Close) => {
                self.script.push_front(Step::Close);
                Err(TransportError::Closed)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut log = self.log.borrow_mut();
        if log.closed {
            return Err(TransportError::Closed);
        }
        if self.stalled_writes > 0 {
            self.stalled_writes -= 1;
            return Ok(0);
        }
        let n = match self.write_limit {
            0 => data.len(),
            limit => data.len().min(limit),
        };
        log.written.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.log.borrow_mut().flushed = true;
        Ok(())
    }

    fn close(&mut self) {
        self.log.borrow_mut().closed = true;
    }
}

/// Hands out queued connections in order.
#[derive(Default)]
pub struct MockListener {
    pub pending: VecDeque<MockConnection>,
}

#[allow(dead_code)]
impl MockListener {
    pub fn with(connections: Vec<MockConnection>) -> Self {
        Self {
            pending: connections.into(),
        }
    }
}

impl Listener for MockListener {
    type Conn = MockConnection;

    fn accept(&mut self) -> Result<Option<MockConnection>, TransportError> {
        Ok(self.pending.pop_front())
    }
}

// ── UDP ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct DatagramState {
    pub open: bool,
    /// Returned by `open` instead of opening.
    pub open_error: Option<MdnsError>,
    pub inbox: VecDeque<(Vec<u8>, SocketAddrV4)>,
    pub sent: Vec<(Vec<u8>, SocketAddrV4)>,
}

/// Datagram socket backed by shared queues; clone the handle to feed
/// queries or inspect replies while the responder owns the socket.
#[derive(Clone, Default)]
pub struct MockDatagram {
    pub state: Rc<RefCell<DatagramState>>,
}

#[allow(dead_code)]
impl MockDatagram {
    pub fn new() -> Self {
        Self::default()
    }

    /// A socket whose `open` fails with `error`.
    pub fn failing(error: MdnsError) -> Self {
        let socket = Self::default();
        socket.state.borrow_mut().open_error = Some(error);
        socket
    }

    pub fn deliver(&self, packet: &[u8], src: SocketAddrV4) {
        self.state
            .borrow_mut()
            .inbox
            .push_back((packet.to_vec(), src));
    }

    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddrV4)> {
        self.state.borrow().sent.clone()
    }
}

impl DatagramPort for MockDatagram {
    fn open(&mut self) -> Result<(), MdnsError> {
        let mut state = self.state.borrow_mut();
        if let Some(e) = state.open_error {
            return Err(e);
        }
        state.open = true;
        Ok(())
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddrV4)>, MdnsError> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(MdnsError::NotStarted);
        }
        match state.inbox.pop_front() {
            Some((packet, src)) => {
                let n = packet.len().min(buf.len());
                buf[..n].copy_from_slice(&packet[..n]);
                Ok(Some((n, src)))
            }
            None => Ok(None),
        }
    }

    fn send_to(&mut self, data: &[u8], dest: SocketAddrV4) -> Result<(), MdnsError> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(MdnsError::NotStarted);
        }
        state.sent.push((data.to_vec(), dest));
        Ok(())
    }
}
