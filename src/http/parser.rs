//! Incremental, byte-at-a-time request parser.
//!
//! The parser never sees more than one byte at a time and never owns the
//! socket, so a request split across any number of TCP segments parses
//! identically to one delivered in a single read.
//!
//! ```text
//!   byte ──▶ '\r'  discarded
//!            '\n'  line complete → latched Command(High|Low)? → buffer cleared
//!                  (empty line after a request line → HeadersDone)
//!            else  appended → suffix checked → latch updated
//! ```
//!
//! A command is only reported once its line is complete, so a line that
//! never finishes cannot move the pin.
//!
//! The line buffer is fixed-capacity. A line that would outgrow it yields
//! [`ParseEvent::Overflow`], drops any latched command and the parser
//! refuses further input.

use embedded_hal::digital::PinState;

use crate::config::MatchScope;

/// Capacity of the per-connection line buffer.
pub const LINE_CAPACITY: usize = 256;

const CMD_HIGH: &[u8] = b"GET /H";
const CMD_LOW: &[u8] = b"GET /L";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseEvent {
    /// Nothing actionable yet.
    Pending,
    /// A completed line ended in a command token at some point.
    Command(PinState),
    /// The blank line ending the request was seen.
    HeadersDone,
    /// The current line exceeded the buffer capacity.
    Overflow,
}

#[derive(Debug)]
pub struct RequestParser<const N: usize = LINE_CAPACITY> {
    line: heapless::Vec<u8, N>,
    scope: MatchScope,
    /// Last command matched on the line in progress.
    latched: Option<PinState>,
    /// Non-empty lines completed so far.
    lines: u32,
    finished: bool,
}

impl<const N: usize> RequestParser<N> {
    pub fn new(scope: MatchScope) -> Self {
        Self {
            line: heapless::Vec::new(),
            scope,
            latched: None,
            lines: 0,
            finished: false,
        }
    }

    /// Consume one byte.
    ///
    /// After `HeadersDone` or `Overflow` every further byte returns
    /// `Pending` without touching state.
    pub fn feed(&mut self, byte: u8) -> ParseEvent {
        if self.finished {
            return ParseEvent::Pending;
        }
        match byte {
            b'\r' => ParseEvent::Pending,
            b'\n' => {
                let was_empty = self.line.is_empty();
                self.line.clear();
                if !was_empty {
                    self.lines = self.lines.saturating_add(1);
                    match self.latched.take() {
                        Some(level) => ParseEvent::Command(level),
                        None => ParseEvent::Pending,
                    }
                } else if self.lines > 0 {
                    self.finished = true;
                    ParseEvent::HeadersDone
                } else {
                    // Stray CRLF before the request line.
                    ParseEvent::Pending
                }
            }
            _ => {
                if self.line.push(byte).is_err() {
                    self.finished = true;
                    self.line.clear();
                    self.latched = None;
                    return ParseEvent::Overflow;
                }
                if let Some(level) = self.match_command() {
                    self.latched = Some(level);
                }
                ParseEvent::Pending
            }
        }
    }

    fn match_command(&self) -> Option<PinState> {
        if self.scope == MatchScope::RequestLine && self.lines > 0 {
            return None;
        }
        if self.line.ends_with(CMD_HIGH) {
            Some(PinState::High)
        } else if self.line.ends_with(CMD_LOW) {
            Some(PinState::Low)
        } else {
            None
        }
    }

    /// Bytes held for the line in progress.
    pub fn pending_len(&self) -> usize {
        self.line.len()
    }

    /// Non-empty lines completed so far.
    pub fn lines_completed(&self) -> u32 {
        self.lines
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
