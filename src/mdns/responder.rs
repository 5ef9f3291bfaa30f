//! Single-name mDNS responder.
//!
//! Answers A (and ANY) questions for `<service name>.local` with the
//! station address. Must be polled frequently: from the service loop on
//! every pass, and from the HTTP server between reads of a slow client.

use core::net::{Ipv4Addr, SocketAddrV4};

use log::{debug, info, warn};

use crate::app::ports::{BackgroundTask, DatagramPort};
use crate::error::MdnsError;
use crate::identity::{Fqdn, MAX_LABEL_LEN, ServiceName};

use super::packet::{self, AnswerStyle, MAX_PACKET, MDNS_GROUP, MDNS_PORT, Packet};

/// Datagrams handled per poll, so a flood cannot stall the caller.
const MAX_PACKETS_PER_POLL: usize = 4;

struct Registration {
    fqdn: Fqdn,
    addr: Ipv4Addr,
}

pub struct MdnsResponder<S: DatagramPort> {
    socket: S,
    ttl_secs: u32,
    registration: Option<Registration>,
    answered: u32,
}

impl<S: DatagramPort> MdnsResponder<S> {
    pub fn new(socket: S, ttl_secs: u32) -> Self {
        Self {
            socket,
            ttl_secs,
            registration: None,
            answered: 0,
        }
    }

    /// Open the socket, remember the name and announce it once.
    ///
    /// Call only after the link is up and `addr` is leased.
    pub fn begin(&mut self, name: &ServiceName, addr: Ipv4Addr) -> Result<(), MdnsError> {
        let label = name.as_str();
        if label.is_empty()
            || label.len() > MAX_LABEL_LEN
            || !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(MdnsError::InvalidName);
        }
        self.socket.open()?;
        let registration = Registration {
            fqdn: name.fqdn(),
            addr,
        };
        info!("mDNS: responding to {} -> {}", registration.fqdn, addr);
        self.registration = Some(registration);

        if let Err(e) = self.send(AnswerStyle::Multicast, SocketAddrV4::new(MDNS_GROUP, MDNS_PORT)) {
            warn!("mDNS: announcement failed: {}", e);
        }
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.registration.is_some()
    }

    /// Total queries answered since `begin`.
    pub fn answered(&self) -> u32 {
        self.answered
    }

    /// Drain pending queries and answer those naming us.
    /// Returns how many were answered during this call.
    pub fn poll(&mut self) -> usize {
        if self.registration.is_none() {
            return 0;
        }
        let mut answered = 0;
        let mut buf = [0u8; MAX_PACKET];
        for _ in 0..MAX_PACKETS_PER_POLL {
            let (len, src) = match self.socket.recv_from(&mut buf) {
                Ok(Some(datagram)) => datagram,
                Ok(None) => break,
                Err(e) => {
                    warn!("mDNS: receive failed: {}", e);
                    break;
                }
            };
            if self.handle(&buf[..len.min(MAX_PACKET)], src) {
                answered += 1;
            }
        }
        self.answered = self.answered.saturating_add(answered as u32);
        answered
    }

    fn handle(&mut self, datagram: &[u8], src: SocketAddrV4) -> bool {
        let Some(reg) = &self.registration else {
            return false;
        };
        let query = match packet::parse_query(datagram) {
            Ok(q) => q,
            Err(e) => {
                debug!("mDNS: dropped datagram from {}: {}", src, e);
                return false;
            }
        };
        if !query.header.is_standard_query() {
            return false;
        }
        let Some(question) = query.questions.iter().find(|q| q.asks_for(&reg.fqdn)) else {
            return false;
        };

        let legacy = src.port() != MDNS_PORT;
        let (style, dest) = if legacy {
            let style = AnswerStyle::Legacy {
                id: query.header.id,
                qtype: question.qtype,
            };
            (style, src)
        } else if question.unicast_response {
            (AnswerStyle::Multicast, src)
        } else {
            (AnswerStyle::Multicast, SocketAddrV4::new(MDNS_GROUP, MDNS_PORT))
        };

        match self.send(style, dest) {
            Ok(()) => {
                debug!("mDNS: answered query from {}", src);
                true
            }
            Err(e) => {
                warn!("mDNS: reply to {} failed: {}", src, e);
                false
            }
        }
    }

    fn send(&mut self, style: AnswerStyle, dest: SocketAddrV4) -> Result<(), MdnsError> {
        let reg = self.registration.as_ref().ok_or(MdnsError::NotStarted)?;
        let mut out = Packet::new();
        packet::build_answer(style, &reg.fqdn, reg.addr, self.ttl_secs, &mut out)
            .map_err(|_| MdnsError::InvalidName)?;
        self.socket.send_to(&out, dest)
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }
}

impl<S: DatagramPort> BackgroundTask for MdnsResponder<S> {
    fn service(&mut self) {
        self.poll();
    }
}
