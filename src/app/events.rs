//! Outbound application events.
//!
//! The provisioning sequence and the [`LedService`](super::service::LedService)
//! emit these through the [`EventSink`](super::ports::EventSink) port.
//! Adapters on the other side decide what to do with them; the firmware
//! image logs them to the serial console.

use core::net::Ipv4Addr;

use embedded_hal::digital::PinState;

use crate::error::FatalFault;
use crate::http::server::AbortReason;
use crate::identity::ServiceName;
use crate::provisioning::LinkState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The provisioning state machine moved between states.
    LinkStateChanged { from: LinkState, to: LinkState },

    /// The service name was derived and the station address is known.
    IdentityEstablished { name: ServiceName, ip: Ipv4Addr },

    /// The name responder is registered and announcing.
    NameServiceStarted,

    /// A request matched a command and the actuator level changed.
    PinChanged(PinState),

    /// A client received the fixed response and was disconnected.
    ConnectionServed,

    /// A client was disconnected without a response.
    ConnectionAborted(AbortReason),

    /// A terminal boot fault; the device halts after this.
    Fault(FatalFault),
}
