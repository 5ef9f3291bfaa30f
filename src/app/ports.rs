//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Provisioner / HttpLedServer / MdnsResponder
//! ```
//!
//! Driven adapters (radio, sockets, clock, storage, event sinks) implement
//! these traits. The domain types consume them via generics, so nothing in
//! the core touches ESP-IDF directly and every path runs on the host under
//! test with mock adapters.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::{LinkError, MdnsError, TransportError};
use crate::identity::HardwareAddress;
use crate::provisioning::WifiCredentials;

// ───────────────────────────────────────────────────────────────
// Network link (driven adapter: domain → radio)
// ───────────────────────────────────────────────────────────────

/// Join / address / signal capabilities of the wireless radio.
///
/// Join calls may block for the duration of one association attempt;
/// everything else returns immediately.
pub trait NetworkLink {
    /// Check that the radio is present and responding.
    fn probe(&mut self) -> Result<(), LinkError>;

    /// Join using previously stored credentials.
    /// Returns [`LinkError::NoCredentials`] when nothing is stored.
    fn join_stored(&mut self) -> Result<(), LinkError>;

    /// Open the local access point and configuration surface.
    fn start_provisioning(&mut self) -> Result<(), LinkError>;

    /// Tear down the access point once the station link is up.
    fn stop_provisioning(&mut self);

    /// Entry point for the configuration surface: validate, persist and
    /// restart the join with the supplied credentials.
    fn submit_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError>;

    /// Drive pending radio work (DHCP, reconnects, configuration surface).
    fn poll(&mut self);

    /// Whether the station is associated and holds an IP address.
    fn is_connected(&self) -> bool;

    /// The interface hardware address.
    fn hardware_address(&self) -> HardwareAddress;

    /// Station IPv4 address, once leased.
    fn local_ip(&self) -> Option<Ipv4Addr>;

    /// Received signal strength in dBm, when associated.
    fn rssi(&self) -> Option<i8>;

    /// SSID of the joined network.
    fn ssid(&self) -> Option<heapless::String<32>>;
}

// ───────────────────────────────────────────────────────────────
// Status indicator (driven adapter: domain → LED)
// ───────────────────────────────────────────────────────────────

/// A boolean status light. Failures are not reported: the indicator is
/// incidental and must never stall the caller.
pub trait IndicatorPort {
    fn set_indicator(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Time (driven adapter: domain → system timer)
// ───────────────────────────────────────────────────────────────

/// Monotonic time and cooperative delay.
pub trait TimePort {
    /// Milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Yield the CPU for roughly `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Cooperative background work
// ───────────────────────────────────────────────────────────────

/// Work that must be serviced between I/O waits so it never starves.
///
/// The HTTP server calls [`service`](Self::service) on every read
/// iteration of an in-flight connection; the name responder implements it.
pub trait BackgroundTask {
    fn service(&mut self);
}

impl BackgroundTask for () {
    fn service(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Stream transport (driven adapter: domain ↔ TCP)
// ───────────────────────────────────────────────────────────────

/// Byte-oriented, non-blocking client connection.
pub trait Transport {
    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns 0 if no data is available yet; [`TransportError::Closed`]
    /// once the peer has shut down its side.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write part of `data`. Returns 0 when the send buffer is full.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Release the connection. Further calls fail with `Closed`.
    fn close(&mut self);
}

/// Accepts client connections without blocking.
pub trait Listener {
    type Conn: Transport;

    /// Returns `Ok(None)` when no client is waiting.
    fn accept(&mut self) -> Result<Option<Self::Conn>, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Datagram socket (driven adapter: domain ↔ UDP multicast)
// ───────────────────────────────────────────────────────────────

/// Non-blocking UDP endpoint joined to the mDNS multicast group.
pub trait DatagramPort {
    /// Bind UDP 5353 and join 224.0.0.251.
    fn open(&mut self) -> Result<(), MdnsError>;

    /// Receive one datagram. `Ok(None)` when nothing is queued.
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddrV4)>, MdnsError>;

    /// Send one datagram.
    fn send_to(&mut self, data: &[u8], dest: SocketAddrV4) -> Result<(), MdnsError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists device configuration.
///
/// Implementations MUST validate before persisting; invalid values are
/// rejected with [`ConfigError::ValidationFailed`], never clamped.
pub trait ConfigPort {
    /// Returns [`DeviceConfig::default()`](crate::config::DeviceConfig) if nothing is stored.
    fn load(&self) -> Result<crate::config::DeviceConfig, ConfigError>;

    fn save(&self, config: &crate::config::DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage (credentials, configuration).
///
/// Write operations MUST be atomic: no partial writes on power loss.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
