//! Wi-Fi station adapter.
//!
//! Implements [`NetworkLink`], the hexagonal boundary for the radio.
//! Credentials are read from and written to a [`StoragePort`], so the
//! link survives reboots without re-provisioning.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF Wi-Fi driver via
//!   `esp_idf_svc::wifi::BlockingWifi`. Provisioning switches the radio
//!   to mixed AP+STA mode and serves a one-page credential form on the
//!   access point with `EspHttpServer`.
//! - **all other targets**: an in-memory radio for host-side tests. A
//!   join succeeds whenever credentials are stored, unless the test has
//!   scripted failures with [`WifiLink::fail_next_joins`].
//!
//! ## Credential form
//!
//! The access point serves `GET /` (the form) and
//! `GET /save?ssid=..&pass=..`. Submissions are parsed with
//! [`parse_credential_form`] and parked in a mailbox; the next
//! [`poll`](NetworkLink::poll) hands them to
//! [`submit_credentials`](NetworkLink::submit_credentials), which
//! validates, persists and joins.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::adapters::nvs::{load_credentials, save_credentials};
use crate::app::ports::{NetworkLink, StoragePort};
use crate::error::LinkError;
use crate::identity::{HardwareAddress, access_point_name};
use crate::provisioning::WifiCredentials;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    http::server::EspHttpServer,
    nvs::EspDefaultNvsPartition,
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
        EspWifi,
    },
};

/// Credentials submitted through the form, waiting for the next poll.
type Mailbox = Arc<Mutex<Option<WifiCredentials>>>;

/// Channel of the provisioning access point.
#[cfg(target_os = "espidf")]
const AP_CHANNEL: u8 = 1;

/// Form served on the provisioning access point.
pub const FORM_PAGE: &str = "<!DOCTYPE HTML>\r\n<html>\r\n\
<form action=\"/save\" method=\"get\">\r\n\
SSID <input name=\"ssid\" maxlength=\"32\"><br>\r\n\
Password <input name=\"pass\" type=\"password\" maxlength=\"64\"><br>\r\n\
<input type=\"submit\" value=\"Join\">\r\n\
</form>\r\n</html>\r\n";

/// Sim: the address every simulated radio reports, wire order.
#[cfg(not(target_os = "espidf"))]
pub const SIM_MAC: [u8; 6] = [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE];

/// Sim: the lease handed out on a successful join.
#[cfg(not(target_os = "espidf"))]
pub const SIM_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 20);

pub struct WifiLink<S: StoragePort> {
    storage: S,
    address: HardwareAddress,
    ap_ssid: heapless::String<32>,
    joined_ssid: Option<heapless::String<32>>,
    provisioning: bool,
    mailbox: Mailbox,

    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    #[cfg(target_os = "espidf")]
    portal: Option<EspHttpServer<'static>>,

    /// Simulation: joins still to fail before one succeeds.
    #[cfg(not(target_os = "espidf"))]
    sim_fail_joins: u32,
    /// Simulation: counts platform_join() calls.
    #[cfg(not(target_os = "espidf"))]
    sim_join_counter: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_radio_present: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_connected: bool,
}

#[cfg(target_os = "espidf")]
impl<S: StoragePort> WifiLink<S> {
    /// Bring up the driver. The radio stays idle until
    /// [`join_stored`](NetworkLink::join_stored) or provisioning.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        storage: S,
        base_label: &str,
    ) -> Result<Self, LinkError> {
        let driver = EspWifi::new(modem, sysloop.clone(), Some(nvs)).map_err(|e| {
            warn!("WiFi: driver init failed: {}", e);
            LinkError::RadioAbsent
        })?;
        let wifi = BlockingWifi::wrap(driver, sysloop).map_err(|_| LinkError::RadioAbsent)?;
        let mac = wifi
            .wifi()
            .sta_netif()
            .get_mac()
            .map_err(|_| LinkError::RadioAbsent)?;
        let address = HardwareAddress::from_transmission_order(mac);
        let ap_ssid = access_point_name(&address, base_label).map_err(|_| LinkError::InvalidSsid)?;
        Ok(Self {
            storage,
            address,
            ap_ssid,
            joined_ssid: None,
            provisioning: false,
            mailbox: Arc::new(Mutex::new(None)),
            wifi,
            portal: None,
        })
    }
}

#[cfg(not(target_os = "espidf"))]
impl<S: StoragePort> WifiLink<S> {
    pub fn new(storage: S, base_label: &str) -> Result<Self, LinkError> {
        let address = HardwareAddress::from_transmission_order(SIM_MAC);
        let ap_ssid = access_point_name(&address, base_label).map_err(|_| LinkError::InvalidSsid)?;
        Ok(Self {
            storage,
            address,
            ap_ssid,
            joined_ssid: None,
            provisioning: false,
            mailbox: Arc::new(Mutex::new(None)),
            sim_fail_joins: 0,
            sim_join_counter: 0,
            sim_radio_present: true,
            sim_connected: false,
        })
    }

    /// Make the next `count` joins fail, as if the network were down.
    pub fn fail_next_joins(&mut self, count: u32) {
        self.sim_fail_joins = count;
    }

    /// Pretend the radio is missing; `probe()` will fail.
    pub fn remove_radio(&mut self) {
        self.sim_radio_present = false;
    }

    /// Join attempts made so far.
    pub fn join_attempts(&self) -> u32 {
        self.sim_join_counter
    }

    /// Drop the association, as if the access point went away.
    pub fn drop_link(&mut self) {
        self.sim_connected = false;
    }

    /// What the portal's `/save` handler does with a request query.
    pub fn submit_form(&self, query: &str) -> Result<(), LinkError> {
        if !self.provisioning {
            return Err(LinkError::AccessPointFailed);
        }
        post_to_mailbox(&self.mailbox, query)
    }
}

impl<S: StoragePort> WifiLink<S> {
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Give the storage back, e.g. to hand it to a fresh link.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// SSID of the provisioning access point.
    pub fn access_point_ssid(&self) -> &str {
        &self.ap_ssid
    }

    pub fn is_provisioning(&self) -> bool {
        self.provisioning
    }

    fn join(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        info!("WiFi: joining '{}'", credentials.ssid());
        self.platform_join(credentials)?;
        let mut ssid = heapless::String::new();
        ssid.push_str(credentials.ssid())
            .map_err(|_| LinkError::InvalidSsid)?;
        self.joined_ssid = Some(ssid);
        info!("WiFi: joined '{}'", credentials.ssid());
        Ok(())
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_probe(&mut self) -> Result<(), LinkError> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_mac()
            .map(|_| ())
            .map_err(|_| LinkError::RadioAbsent)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_probe(&mut self) -> Result<(), LinkError> {
        if self.sim_radio_present {
            Ok(())
        } else {
            Err(LinkError::RadioAbsent)
        }
    }

    #[cfg(target_os = "espidf")]
    fn client_configuration(credentials: &WifiCredentials) -> Result<ClientConfiguration, LinkError> {
        let auth_method = if credentials.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        Ok(ClientConfiguration {
            ssid: credentials
                .ssid()
                .try_into()
                .map_err(|_| LinkError::InvalidSsid)?,
            password: credentials
                .password()
                .try_into()
                .map_err(|_| LinkError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        })
    }

    #[cfg(target_os = "espidf")]
    fn access_point_configuration(&self) -> AccessPointConfiguration {
        AccessPointConfiguration {
            ssid: self.ap_ssid.clone(),
            auth_method: AuthMethod::None,
            channel: AP_CHANNEL,
            ..Default::default()
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_join(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        let client = Self::client_configuration(credentials)?;
        // Keep the access point up while a submitted network is tried.
        let config = if self.provisioning {
            Configuration::Mixed(client, self.access_point_configuration())
        } else {
            Configuration::Client(client)
        };
        let join = |wifi: &mut BlockingWifi<EspWifi<'static>>| -> Result<(), esp_idf_svc::sys::EspError> {
            wifi.set_configuration(&config)?;
            if !wifi.is_started()? {
                wifi.start()?;
            }
            wifi.connect()?;
            wifi.wait_netif_up()
        };
        join(&mut self.wifi).map_err(|e| {
            warn!("WiFi: join failed: {}", e);
            let _ = self.wifi.disconnect();
            LinkError::JoinFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_join(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        self.sim_join_counter = self.sim_join_counter.wrapping_add(1);
        if self.sim_fail_joins > 0 {
            self.sim_fail_joins -= 1;
            self.sim_connected = false;
            warn!(
                "WiFi(sim): join '{}' failed (attempt {})",
                credentials.ssid(),
                self.sim_join_counter
            );
            return Err(LinkError::JoinFailed);
        }
        self.sim_connected = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_start_ap(&mut self) -> Result<(), LinkError> {
        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::server::Configuration as HttpConfiguration;
        use esp_idf_svc::io::{EspIOError, Write};

        let config = Configuration::Mixed(
            ClientConfiguration::default(),
            self.access_point_configuration(),
        );
        let start = |wifi: &mut BlockingWifi<EspWifi<'static>>| -> Result<(), esp_idf_svc::sys::EspError> {
            wifi.set_configuration(&config)?;
            if !wifi.is_started()? {
                wifi.start()?;
            }
            Ok(())
        };
        start(&mut self.wifi).map_err(|e| {
            warn!("WiFi: access point failed: {}", e);
            LinkError::AccessPointFailed
        })?;

        let mut server = EspHttpServer::new(&HttpConfiguration::default())
            .map_err(|_| LinkError::AccessPointFailed)?;
        server
            .fn_handler("/", Method::Get, |req| -> Result<(), EspIOError> {
                req.into_ok_response()?.write_all(FORM_PAGE.as_bytes())?;
                Ok(())
            })
            .map_err(|_| LinkError::AccessPointFailed)?;
        let mailbox = Arc::clone(&self.mailbox);
        server
            .fn_handler("/save", Method::Get, move |req| -> Result<(), EspIOError> {
                let query = req.uri().split_once('?').map(|(_, q)| q).unwrap_or("");
                let reply: &[u8] = match post_to_mailbox(&mailbox, query) {
                    Ok(()) => b"Saved. Joining...",
                    Err(_) => b"Invalid SSID or password.",
                };
                req.into_ok_response()?.write_all(reply)?;
                Ok(())
            })
            .map_err(|_| LinkError::AccessPointFailed)?;
        self.portal = Some(server);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start_ap(&mut self) -> Result<(), LinkError> {
        if !self.sim_radio_present {
            return Err(LinkError::AccessPointFailed);
        }
        info!("WiFi(sim): access point '{}' up", self.ap_ssid);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop_ap(&mut self) {
        self.portal = None;
        if let Ok(Configuration::Mixed(client, _)) = self.wifi.get_configuration() {
            if let Err(e) = self.wifi.set_configuration(&Configuration::Client(client)) {
                warn!("WiFi: could not leave AP mode: {}", e);
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop_ap(&mut self) {
        info!("WiFi(sim): access point down");
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_connected
    }

    #[cfg(target_os = "espidf")]
    fn platform_local_ip(&self) -> Option<Ipv4Addr> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
            .filter(|ip| !ip.is_unspecified())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_local_ip(&self) -> Option<Ipv4Addr> {
        Some(SIM_IP)
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: the driver is started (we are associated) and `ap_info`
        // is a valid out-pointer for the duration of the call.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        // Vary a little with the attempt count, like a real environment.
        let oscillation = (self.sim_join_counter % 12) as i8 - 6;
        Some((-60_i8).saturating_add(oscillation))
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkLink
// ───────────────────────────────────────────────────────────────

impl<S: StoragePort> NetworkLink for WifiLink<S> {
    fn probe(&mut self) -> Result<(), LinkError> {
        self.platform_probe()
    }

    fn join_stored(&mut self) -> Result<(), LinkError> {
        let credentials = load_credentials(&self.storage)
            .map_err(|_| LinkError::Storage)?
            .ok_or(LinkError::NoCredentials)?;
        self.join(&credentials)
    }

    fn start_provisioning(&mut self) -> Result<(), LinkError> {
        if self.provisioning {
            return Ok(());
        }
        self.platform_start_ap()?;
        self.provisioning = true;
        info!("WiFi: provisioning on access point '{}'", self.ap_ssid);
        Ok(())
    }

    fn stop_provisioning(&mut self) {
        if !self.provisioning {
            return;
        }
        self.platform_stop_ap();
        self.provisioning = false;
        info!("WiFi: provisioning closed");
    }

    fn submit_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        credentials.revalidate()?;
        save_credentials(&mut self.storage, credentials).map_err(|_| LinkError::Storage)?;
        self.join(credentials)
    }

    fn poll(&mut self) {
        let submitted = self.mailbox.lock().ok().and_then(|mut slot| slot.take());
        if let Some(credentials) = submitted {
            if let Err(e) = self.submit_credentials(&credentials) {
                warn!("WiFi: submitted network rejected: {}", e);
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.joined_ssid.is_some() && self.platform_is_connected()
    }

    fn hardware_address(&self) -> HardwareAddress {
        self.address
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        if !self.is_connected() {
            return None;
        }
        self.platform_local_ip()
    }

    fn rssi(&self) -> Option<i8> {
        if !self.is_connected() {
            return None;
        }
        self.platform_rssi()
    }

    fn ssid(&self) -> Option<heapless::String<32>> {
        self.joined_ssid.clone()
    }
}

// ───────────────────────────────────────────────────────────────
// Credential form
// ───────────────────────────────────────────────────────────────

fn post_to_mailbox(mailbox: &Mailbox, query: &str) -> Result<(), LinkError> {
    let credentials = parse_credential_form(query)?;
    info!("WiFi: credentials submitted for '{}'", credentials.ssid());
    let mut slot = mailbox.lock().map_err(|_| LinkError::Storage)?;
    *slot = Some(credentials);
    Ok(())
}

/// Parse `ssid=..&pass=..` (URL-encoded, either order, unknown keys
/// ignored). A missing `pass` means an open network.
pub fn parse_credential_form(query: &str) -> Result<WifiCredentials, LinkError> {
    let mut ssid: Option<heapless::String<32>> = None;
    let mut pass: heapless::String<64> = heapless::String::new();
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "ssid" => ssid = Some(url_decode(value).ok_or(LinkError::InvalidSsid)?),
            "pass" => pass = url_decode(value).ok_or(LinkError::InvalidPassword)?,
            _ => {}
        }
    }
    let ssid = ssid.ok_or(LinkError::InvalidSsid)?;
    WifiCredentials::new(&ssid, &pass)
}

/// `+` → space and `%XX` → byte. `None` on bad escapes, non-UTF-8
/// output, or overflow of `N`.
fn url_decode<const N: usize>(input: &str) -> Option<heapless::String<N>> {
    let mut bytes: heapless::Vec<u8, N> = heapless::Vec::new();
    let mut iter = input.bytes();
    while let Some(b) = iter.next() {
        let decoded = match b {
            b'+' => b' ',
            b'%' => {
                let hi = hex_value(iter.next()?)?;
                let lo = hex_value(iter.next()?)?;
                (hi << 4) | lo
            }
            other => other,
        };
        bytes.push(decoded).ok()?;
    }
    heapless::String::from_utf8(bytes).ok()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
