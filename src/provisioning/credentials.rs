//! Station credentials and their validation rules.

use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// SSID and passphrase of the network to join.
///
/// Construct through [`WifiCredentials::new`] so invalid values never
/// reach the radio or storage.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut out = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        out.ssid.push_str(ssid).map_err(|()| LinkError::InvalidSsid)?;
        out.password
            .push_str(password)
            .map_err(|()| LinkError::InvalidPassword)?;
        Ok(out)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Empty password means an open network.
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Re-check a value that came back from storage.
    pub fn revalidate(&self) -> Result<(), LinkError> {
        validate_ssid(&self.ssid)?;
        validate_password(&self.password)
    }
}

impl core::fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E` (space through tilde, inclusive).
fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}
