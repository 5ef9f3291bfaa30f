//! Fuzz target: mDNS query decoding
//!
//! Feeds arbitrary datagrams to the query decoder. Compression pointers,
//! truncated labels and oversized names must all end in an error, never
//! a panic or an unbounded loop. Decoded names must fit their buffer.
//!
//! cargo fuzz run fuzz_mdns_packet

#![no_main]

use ledthing::mdns::packet::{self, MAX_NAME_LEN, MAX_QUESTIONS};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(query) = packet::parse_query(data) {
        assert!(query.questions.len() <= MAX_QUESTIONS);
        for question in &query.questions {
            assert!(question.name.len() <= MAX_NAME_LEN);
            let _ = question.asks_for("wifi101-020100.local");
        }
    }
});
