//! Minimal HTTP/1.x front end for the LED switch.
//!
//! Only two request paths mean anything (`GET /H`, `GET /L`); every
//! completed request gets the same fixed page.

pub mod parser;
pub mod response;
pub mod server;

pub use server::{AbortReason, ConnectionOutcome, ConnectionReport, HttpLedServer};
