//! DNS message subset used by the responder.
//!
//! Decodes the header and question section of incoming queries
//! (compression pointers included) and encodes single-A-record answers.
//! Everything is bounded: names by [`MAX_NAME_LEN`], packets by
//! [`MAX_PACKET`], questions by [`MAX_QUESTIONS`].

use core::net::Ipv4Addr;

/// mDNS UDP port (RFC 6762).
pub const MDNS_PORT: u16 = 5353;
/// mDNS IPv4 multicast group.
pub const MDNS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
/// Largest datagram read or written.
pub const MAX_PACKET: usize = 512;
/// Longest dotted name accepted from the wire.
pub const MAX_NAME_LEN: usize = 255;
/// Questions examined per query; extras are ignored.
pub const MAX_QUESTIONS: usize = 4;

pub const TYPE_A: u16 = 1;
pub const TYPE_ANY: u16 = 255;
pub const CLASS_IN: u16 = 1;
const CLASS_ANY: u16 = 255;

const HEADER_LEN: usize = 12;
const FLAG_RESPONSE: u16 = 0x8000;
const OPCODE_MASK: u16 = 0x7800;
/// QR + AA.
const RESPONSE_FLAGS: u16 = 0x8400;
const UNICAST_RESPONSE_BIT: u16 = 0x8000;
const CACHE_FLUSH_BIT: u16 = 0x8000;
/// Legacy unicast answers must not be cached for long (RFC 6762 §6.7).
const LEGACY_MAX_TTL: u32 = 10;
const MAX_POINTER_JUMPS: usize = 8;

pub type Packet = heapless::Vec<u8, MAX_PACKET>;
pub type Name = heapless::String<MAX_NAME_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// The message ended in the middle of a field.
    Truncated,
    /// A label length byte used the reserved 0x40/0x80 prefixes.
    BadLabel,
    /// Too many compression pointers; probably a loop.
    PointerLoop,
    /// The decoded name is longer than [`MAX_NAME_LEN`].
    NameTooLong,
    /// The output buffer is full.
    Overflow,
}

impl core::fmt::Display for PacketError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated message"),
            Self::BadLabel => write!(f, "bad label"),
            Self::PointerLoop => write!(f, "compression pointer loop"),
            Self::NameTooLong => write!(f, "name too long"),
            Self::Overflow => write!(f, "packet buffer full"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub questions: u16,
    pub answers: u16,
    pub authorities: u16,
    pub additionals: u16,
}

impl Header {
    pub fn parse(packet: &[u8]) -> Result<Self, PacketError> {
        if packet.len() < HEADER_LEN {
            return Err(PacketError::Truncated);
        }
        Ok(Self {
            id: read_u16(packet, 0)?,
            flags: read_u16(packet, 2)?,
            questions: read_u16(packet, 4)?,
            answers: read_u16(packet, 6)?,
            authorities: read_u16(packet, 8)?,
            additionals: read_u16(packet, 10)?,
        })
    }

    /// Standard query (QR clear, opcode 0).
    pub fn is_standard_query(&self) -> bool {
        self.flags & (FLAG_RESPONSE | OPCODE_MASK) == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Dotted, lower-cased name.
    pub name: Name,
    pub qtype: u16,
    /// Class with the unicast-response bit removed.
    pub qclass: u16,
    /// The QU bit: the querier asked for a unicast reply.
    pub unicast_response: bool,
}

impl Question {
    /// Whether this question asks for the A record of `fqdn`.
    pub fn asks_for(&self, fqdn: &str) -> bool {
        matches!(self.qtype, TYPE_A | TYPE_ANY)
            && matches!(self.qclass, CLASS_IN | CLASS_ANY)
            && self.name.eq_ignore_ascii_case(fqdn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub header: Header,
    pub questions: heapless::Vec<Question, MAX_QUESTIONS>,
}

/// Decode the header and up to [`MAX_QUESTIONS`] questions.
pub fn parse_query(packet: &[u8]) -> Result<Query, PacketError> {
    let header = Header::parse(packet)?;
    let mut questions = heapless::Vec::new();
    let mut pos = HEADER_LEN;
    for _ in 0..header.questions.min(MAX_QUESTIONS as u16) {
        let mut name = Name::new();
        pos = read_name(packet, pos, &mut name)?;
        let qtype = read_u16(packet, pos)?;
        let raw_class = read_u16(packet, pos + 2)?;
        pos += 4;
        // Capacity equals the loop bound.
        let _ = questions.push(Question {
            name,
            qtype,
            qclass: raw_class & !UNICAST_RESPONSE_BIT,
            unicast_response: raw_class & UNICAST_RESPONSE_BIT != 0,
        });
    }
    Ok(Query { header, questions })
}

/// Decode the (possibly compressed) name at `pos` into `out`.
/// Returns the offset just past the name in the original byte stream.
pub fn read_name(packet: &[u8], mut pos: usize, out: &mut Name) -> Result<usize, PacketError> {
    let mut resume = None;
    let mut jumps = 0;
    loop {
        let len = *packet.get(pos).ok_or(PacketError::Truncated)?;
        match len & 0xC0 {
            0x00 if len == 0 => return Ok(resume.unwrap_or(pos + 1)),
            0x00 => {
                let len = usize::from(len);
                let label = packet
                    .get(pos + 1..pos + 1 + len)
                    .ok_or(PacketError::Truncated)?;
                if !out.is_empty() {
                    out.push('.').map_err(|()| PacketError::NameTooLong)?;
                }
                for &b in label {
                    // Bytes that can never match a hostname become '?'.
                    let c = if b.is_ascii_graphic() && b != b'.' {
                        char::from(b.to_ascii_lowercase())
                    } else {
                        '?'
                    };
                    out.push(c).map_err(|()| PacketError::NameTooLong)?;
                }
                pos += 1 + len;
            }
            0xC0 => {
                let low = *packet.get(pos + 1).ok_or(PacketError::Truncated)?;
                resume.get_or_insert(pos + 2);
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(PacketError::PointerLoop);
                }
                pos = (usize::from(len & 0x3F) << 8) | usize::from(low);
            }
            _ => return Err(PacketError::BadLabel),
        }
    }
}

/// How an answer is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStyle {
    /// Multicast or QU reply: id 0, no question, cache-flush set.
    Multicast,
    /// Reply to a querier not on port 5353: echo id and question,
    /// no cache-flush, short TTL.
    Legacy { id: u16, qtype: u16 },
}

/// Encode a response carrying one A record for `fqdn`.
pub fn build_answer(
    style: AnswerStyle,
    fqdn: &str,
    addr: Ipv4Addr,
    ttl_secs: u32,
    out: &mut Packet,
) -> Result<(), PacketError> {
    out.clear();
    let (id, question) = match style {
        AnswerStyle::Multicast => (0, None),
        AnswerStyle::Legacy { id, qtype } => (id, Some(qtype)),
    };
    put_u16(out, id)?;
    put_u16(out, RESPONSE_FLAGS)?;
    put_u16(out, u16::from(question.is_some()))?;
    put_u16(out, 1)?;
    put_u16(out, 0)?;
    put_u16(out, 0)?;

    let (class, ttl) = if let Some(qtype) = question {
        put_name(out, fqdn)?;
        put_u16(out, qtype)?;
        put_u16(out, CLASS_IN)?;
        // Answer name points back at the question name.
        put_u16(out, 0xC000 | HEADER_LEN as u16)?;
        (CLASS_IN, ttl_secs.min(LEGACY_MAX_TTL))
    } else {
        put_name(out, fqdn)?;
        (CLASS_IN | CACHE_FLUSH_BIT, ttl_secs)
    };
    put_u16(out, TYPE_A)?;
    put_u16(out, class)?;
    put_u16(out, (ttl >> 16) as u16)?;
    put_u16(out, ttl as u16)?;
    put_u16(out, 4)?;
    out.extend_from_slice(&addr.octets())
        .map_err(|()| PacketError::Overflow)
}

/// Encode a one-question query. Used for probing and by test tooling.
pub fn build_query(id: u16, name: &str, qtype: u16, unicast_response: bool, out: &mut Packet) -> Result<(), PacketError> {
    out.clear();
    put_u16(out, id)?;
    put_u16(out, 0)?;
    put_u16(out, 1)?;
    put_u16(out, 0)?;
    put_u16(out, 0)?;
    put_u16(out, 0)?;
    put_name(out, name)?;
    put_u16(out, qtype)?;
    let class = if unicast_response { CLASS_IN | UNICAST_RESPONSE_BIT } else { CLASS_IN };
    put_u16(out, class)
}

fn read_u16(packet: &[u8], pos: usize) -> Result<u16, PacketError> {
    match packet.get(pos..pos + 2) {
        Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
        _ => Err(PacketError::Truncated),
    }
}

fn put_u16(out: &mut Packet, value: u16) -> Result<(), PacketError> {
    out.extend_from_slice(&value.to_be_bytes())
        .map_err(|()| PacketError::Overflow)
}

fn put_name(out: &mut Packet, name: &str) -> Result<(), PacketError> {
    for label in name.split('.').filter(|l| !l.is_empty()) {
        if label.len() > 63 {
            return Err(PacketError::BadLabel);
        }
        out.push(label.len() as u8).map_err(|_| PacketError::Overflow)?;
        out.extend_from_slice(label.as_bytes())
            .map_err(|()| PacketError::Overflow)?;
    }
    out.push(0).map_err(|_| PacketError::Overflow)
}
