//! LedThing firmware library.
//!
//! A network-attached switch: the device joins Wi-Fi (provisioning an
//! access point when it has no working credentials), announces itself as
//! `<base>-XXYYZZ.local` over mDNS and drives one GPIO from `GET /H` and
//! `GET /L`.
//!
//! Everything outside `adapters` is target-independent and runs on the
//! host under test. ESP-IDF code is guarded by
//! `#[cfg(target_os = "espidf")]` within each adapter.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod drivers;
pub mod error;
pub mod http;
pub mod identity;
pub mod mdns;
pub mod pins;
pub mod provisioning;
