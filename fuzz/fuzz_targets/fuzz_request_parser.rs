//! Fuzz target: `RequestParser::feed`
//!
//! Drives arbitrary byte sequences into the incremental request parser
//! under both match scopes and asserts that the pending line stays within
//! capacity and that nothing is reported after the parser has finished.
//!
//! cargo fuzz run fuzz_request_parser

#![no_main]

use ledthing::config::MatchScope;
use ledthing::http::parser::{LINE_CAPACITY, ParseEvent, RequestParser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for scope in [MatchScope::AnyLine, MatchScope::RequestLine] {
        let mut parser = RequestParser::<LINE_CAPACITY>::new(scope);
        let mut finished = false;
        for &byte in data {
            let event = parser.feed(byte);
            assert!(parser.pending_len() <= LINE_CAPACITY, "line buffer overflowed");
            if finished {
                assert_eq!(event, ParseEvent::Pending, "event after parser finished");
            }
            finished = parser.is_finished();
        }
    }
});
