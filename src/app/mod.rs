//! Application core: boot sequencing and the service loop.
//!
//! All interaction with hardware and the network happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod boot;
pub mod events;
pub mod ports;
pub mod service;
