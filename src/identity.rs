//! Device identity derived from the radio's hardware address.
//!
//! The service name is `<base>-XXYYZZ`, where `XXYYZZ` are the three
//! least-significant address octets in uppercase hex, most significant
//! first. It is:
//! - Deterministic across reboots (factory-burned address)
//! - Announced over mDNS as `<base>-XXYYZZ.local`
//! - Printed in the link report at boot
//!
//! The provisioning access point uses the shorter `<base>-YYZZ`.

use core::fmt::{self, Write};

use crate::error::IdentityError;

/// Longest DNS label.
pub const MAX_LABEL_LEN: usize = 63;

/// `<label>.local`
pub type Fqdn = heapless::String<{ MAX_LABEL_LEN + 6 }>;

/// Six-octet hardware address, stored least-significant octet first.
///
/// ESP-IDF reports addresses in transmission order (most significant
/// first); use [`from_transmission_order`](Self::from_transmission_order)
/// for those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    /// Build from octets ordered least-significant first.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Build from octets in wire order, e.g. `[0xDE, 0xAD, ..]` for `DE:AD:..`.
    pub const fn from_transmission_order(mac: [u8; 6]) -> Self {
        Self([mac[5], mac[4], mac[3], mac[2], mac[1], mac[0]])
    }

    /// Octets, least-significant first.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for HardwareAddress {
    /// Colon-separated, most significant octet first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[5], m[4], m[3], m[2], m[1], m[0]
        )
    }
}

/// A single DNS label naming this device, e.g. `wifi101-020100`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceName(heapless::String<MAX_LABEL_LEN>);

impl ServiceName {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Fully-qualified mDNS hostname: `<label>.local`.
    pub fn fqdn(&self) -> Fqdn {
        let mut out = Fqdn::new();
        // Capacity covers the longest label plus ".local".
        let _ = write!(out, "{}.local", self.0);
        out
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the service name from the three least-significant address octets.
///
/// Pure: the same address and base always give the same name.
pub fn derive_name(addr: &HardwareAddress, base_label: &str) -> Result<ServiceName, IdentityError> {
    check_base(base_label)?;
    let m = addr.octets();
    let mut name = heapless::String::new();
    write!(name, "{}-{:02X}{:02X}{:02X}", base_label, m[2], m[1], m[0])
        .map_err(|_| IdentityError::InvalidBaseLabel)?;
    Ok(ServiceName(name))
}

/// SSID of the provisioning access point: `<base>-YYZZ`.
pub fn access_point_name(
    addr: &HardwareAddress,
    base_label: &str,
) -> Result<heapless::String<32>, IdentityError> {
    check_base(base_label)?;
    let m = addr.octets();
    let mut ssid = heapless::String::new();
    write!(ssid, "{}-{:02X}{:02X}", base_label, m[1], m[0])
        .map_err(|_| IdentityError::InvalidBaseLabel)?;
    Ok(ssid)
}

fn check_base(base_label: &str) -> Result<(), IdentityError> {
    if base_label.is_empty()
        || !base_label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return Err(IdentityError::InvalidBaseLabel);
    }
    Ok(())
}

/// Hardware address and service name, computed once after the link is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    address: HardwareAddress,
    name: ServiceName,
}

impl NetworkIdentity {
    /// The address is only meaningful once the radio has joined, so this
    /// refuses to run before then.
    pub fn establish(
        link_connected: bool,
        address: HardwareAddress,
        base_label: &str,
    ) -> Result<Self, IdentityError> {
        if !link_connected {
            return Err(IdentityError::LinkNotConnected);
        }
        let name = derive_name(&address, base_label)?;
        Ok(Self { address, name })
    }

    pub fn address(&self) -> HardwareAddress {
        self.address
    }

    pub fn name(&self) -> &ServiceName {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: HardwareAddress = HardwareAddress::new([0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);

    #[test]
    fn name_uses_low_three_octets_high_first() {
        let name = derive_name(&ADDR, "wifi101").unwrap();
        assert_eq!(name.as_str(), "wifi101-020100");
        assert_eq!(name.fqdn().as_str(), "wifi101-020100.local");
    }

    #[test]
    fn name_is_uppercase_hex() {
        let addr = HardwareAddress::new([0xAB, 0xCD, 0xEF, 0, 0, 0]);
        assert_eq!(derive_name(&addr, "wifi101").unwrap().as_str(), "wifi101-EFCDAB");
    }

    #[test]
    fn transmission_order_is_reversed() {
        let addr = HardwareAddress::from_transmission_order([0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]);
        assert_eq!(addr.to_string(), "DE:AD:BE:EF:CA:FE");
        assert_eq!(derive_name(&addr, "wifi101").unwrap().as_str(), "wifi101-EFCAFE");
    }

    #[test]
    fn access_point_uses_low_two_octets() {
        assert_eq!(access_point_name(&ADDR, "wifi101").unwrap().as_str(), "wifi101-0100");
    }

    #[test]
    fn rejects_bad_base() {
        assert_eq!(derive_name(&ADDR, ""), Err(IdentityError::InvalidBaseLabel));
        assert_eq!(derive_name(&ADDR, "a.b"), Err(IdentityError::InvalidBaseLabel));
        let long = "x".repeat(60);
        assert_eq!(derive_name(&ADDR, &long), Err(IdentityError::InvalidBaseLabel));
    }

    #[test]
    fn establish_requires_connected_link() {
        assert_eq!(
            NetworkIdentity::establish(false, ADDR, "wifi101"),
            Err(IdentityError::LinkNotConnected)
        );
        let id = NetworkIdentity::establish(true, ADDR, "wifi101").unwrap();
        assert_eq!(id.name().as_str(), "wifi101-020100");
        assert_eq!(id.address(), ADDR);
    }
}
