//! Unified error types for the LedThing firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! boot sequence's error handling uniform. All variants are `Copy` so
//! they can be passed through the service loop and event sink without
//! allocation.
//!
//! Errors local to one HTTP connection never reach this level: the server
//! swallows them at the connection boundary and reports an outcome
//! instead. Everything that *does* reach [`FatalFault`] ends the boot.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The output pin could not be driven.
    Actuator(ActuatorError),
    /// The network link failed or is not in the required state.
    Link(LinkError),
    /// The multicast name responder failed.
    Mdns(MdnsError),
    /// The service name could not be derived.
    Identity(IdentityError),
    /// A socket-level failure on the HTTP listener or a client.
    Transport(TransportError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Mdns(e) => write!(f, "mdns: {e}"),
            Self::Identity(e) => write!(f, "identity: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// The GPIO driver rejected the level change.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The radio did not respond during bring-up.
    RadioAbsent,
    /// No credentials have been stored or submitted yet.
    NoCredentials,
    /// SSID must be 1-32 printable ASCII bytes.
    InvalidSsid,
    /// Password must be empty (open network) or 8-64 bytes.
    InvalidPassword,
    /// The association or DHCP lease did not complete.
    JoinFailed,
    /// The local access point could not be started.
    AccessPointFailed,
    /// The operation needs an established link.
    NotConnected,
    /// Credentials could not be persisted.
    Storage,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RadioAbsent => write!(f, "WiFi radio not present"),
            Self::NoCredentials => write!(f, "no WiFi credentials stored"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::JoinFailed => write!(f, "WiFi join failed"),
            Self::AccessPointFailed => write!(f, "provisioning access point failed to start"),
            Self::NotConnected => write!(f, "link not connected"),
            Self::Storage => write!(f, "credential storage failed"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// mDNS errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdnsError {
    /// UDP port 5353 could not be bound.
    Bind,
    /// Joining the 224.0.0.251 multicast group failed.
    JoinGroup,
    /// The hostname is empty, too long, or contains invalid characters.
    InvalidName,
    /// `poll()` was called before a successful `begin()`.
    NotStarted,
    /// Socket I/O failed while sending or receiving.
    Io,
}

impl fmt::Display for MdnsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind => write!(f, "bind to UDP 5353 failed"),
            Self::JoinGroup => write!(f, "multicast group join failed"),
            Self::InvalidName => write!(f, "invalid hostname label"),
            Self::NotStarted => write!(f, "responder not started"),
            Self::Io => write!(f, "socket I/O error"),
        }
    }
}

impl From<MdnsError> for Error {
    fn from(e: MdnsError) -> Self {
        Self::Mdns(e)
    }
}

// ---------------------------------------------------------------------------
// Identity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    /// The hardware address was requested before the link reached Connected.
    LinkNotConnected,
    /// The base label is empty or would push the name past 63 bytes.
    InvalidBaseLabel,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkNotConnected => write!(f, "hardware address unavailable before link is up"),
            Self::InvalidBaseLabel => write!(f, "base label invalid"),
        }
    }
}

impl From<IdentityError> for Error {
    fn from(e: IdentityError) -> Self {
        Self::Identity(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// TCP socket I/O failure.
    Io,
    /// The listener could not be bound.
    Bind,
    /// The peer closed the connection.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "TCP/socket I/O error"),
            Self::Bind => write!(f, "listener bind failed"),
            Self::Closed => write!(f, "peer closed connection"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Terminal boot faults
// ---------------------------------------------------------------------------

/// A failure that ends the boot sequence. The device reports it through
/// [`halt`](crate::diagnostics::halt) and stops serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalFault {
    /// The radio is missing or did not come up.
    RadioAbsent,
    /// The retry policy gave up before the link reached Connected.
    ProvisioningExhausted { attempts: u32 },
    /// The service name could not be derived.
    Identity(IdentityError),
    /// The name responder failed to register.
    NameServiceFailed(MdnsError),
    /// The HTTP listener could not be bound.
    ListenerFailed(TransportError),
}

impl fmt::Display for FatalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RadioAbsent => write!(f, "WiFi radio not present"),
            Self::ProvisioningExhausted { attempts } => {
                write!(f, "network join abandoned after {attempts} attempts")
            }
            Self::Identity(e) => write!(f, "identity: {e}"),
            Self::NameServiceFailed(e) => write!(f, "failed to start MDNS responder: {e}"),
            Self::ListenerFailed(e) => write!(f, "HTTP listener: {e}"),
        }
    }
}

impl From<FatalFault> for Error {
    fn from(e: FatalFault) -> Self {
        match e {
            FatalFault::RadioAbsent => Self::Link(LinkError::RadioAbsent),
            FatalFault::ProvisioningExhausted { .. } => Self::Link(LinkError::JoinFailed),
            FatalFault::Identity(e) => Self::Identity(e),
            FatalFault::NameServiceFailed(e) => Self::Mdns(e),
            FatalFault::ListenerFailed(e) => Self::Transport(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
