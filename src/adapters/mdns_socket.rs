//! UDP multicast socket for the name responder.
//!
//! Implements [`DatagramPort`] over `std::net::UdpSocket`: binds the mDNS
//! port on every interface and joins the link-local group. Until
//! [`open`](DatagramPort::open) succeeds every call fails with
//! [`MdnsError::NotStarted`].

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use log::{info, warn};

use crate::app::ports::DatagramPort;
use crate::error::MdnsError;
use crate::mdns::packet::{MDNS_GROUP, MDNS_PORT};

pub struct UdpMulticastSocket {
    port: u16,
    interface: Ipv4Addr,
    socket: Option<UdpSocket>,
}

impl UdpMulticastSocket {
    /// Standard mDNS port, group joined on the default interface.
    pub fn new() -> Self {
        Self::with_port(MDNS_PORT)
    }

    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            interface: Ipv4Addr::UNSPECIFIED,
            socket: None,
        }
    }

    /// Join the group on a specific interface (the station address).
    pub fn on_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn socket(&self) -> Result<&UdpSocket, MdnsError> {
        self.socket.as_ref().ok_or(MdnsError::NotStarted)
    }
}

impl Default for UdpMulticastSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramPort for UdpMulticastSocket {
    fn open(&mut self) -> Result<(), MdnsError> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port))
            .map_err(|e| {
                warn!("mDNS: bind :{} failed: {}", self.port, e);
                MdnsError::Bind
            })?;
        socket
            .join_multicast_v4(&MDNS_GROUP, &self.interface)
            .map_err(|e| {
                warn!("mDNS: join {} failed: {}", MDNS_GROUP, e);
                MdnsError::JoinGroup
            })?;
        socket.set_multicast_ttl_v4(255).map_err(|_| MdnsError::Io)?;
        socket.set_nonblocking(true).map_err(|_| MdnsError::Io)?;
        info!("mDNS: joined {} on port {}", MDNS_GROUP, self.port);
        self.socket = Some(socket);
        Ok(())
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddrV4)>, MdnsError> {
        match self.socket()?.recv_from(buf) {
            Ok((n, SocketAddr::V4(src))) => Ok(Some((n, src))),
            // IPv6 sources are never answered; drop and report nothing.
            Ok((_, SocketAddr::V6(_))) => Ok(None),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(None),
            Err(_) => Err(MdnsError::Io),
        }
    }

    fn send_to(&mut self, data: &[u8], dest: SocketAddrV4) -> Result<(), MdnsError> {
        match self.socket()?.send_to(data, dest) {
            Ok(_) => Ok(()),
            Err(_) => Err(MdnsError::Io),
        }
    }
}
