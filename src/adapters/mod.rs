//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements          | Connects to               |
//! |---------------|---------------------|---------------------------|
//! | `log_sink`    | EventSink           | Serial log output         |
//! | `mdns_socket` | DatagramPort        | UDP 5353 / 224.0.0.251    |
//! | `nvs`         | ConfigPort          | NVS / in-memory store     |
//! |               | StoragePort         |                           |
//! | `tcp`         | Listener, Transport | lwIP / host TCP sockets   |
//! | `time`        | TimePort            | ESP32 system timer        |
//! | `wifi`        | NetworkLink         | ESP-IDF Wi-Fi STA + AP    |

pub mod log_sink;
pub mod mdns_socket;
pub mod nvs;
pub mod tcp;
pub mod time;
pub mod wifi;
