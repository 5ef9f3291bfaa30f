//! Multicast DNS: wire format and the single-name responder.

pub mod packet;
pub mod responder;

pub use responder::MdnsResponder;
