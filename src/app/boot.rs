//! Boot sequence: link → identity → name service.
//!
//! Each step either succeeds or returns the [`FatalFault`] that ends the
//! boot; `main` hands that to [`halt`](crate::diagnostics::halt).

use core::fmt;
use core::net::Ipv4Addr;

use log::info;

use crate::config::DeviceConfig;
use crate::error::{FatalFault, IdentityError};
use crate::identity::{Fqdn, HardwareAddress, NetworkIdentity};
use crate::mdns::MdnsResponder;
use crate::provisioning::{RetryPolicy, WifiProvisioner};

use super::events::AppEvent;
use super::ports::{DatagramPort, EventSink, IndicatorPort, NetworkLink, TimePort};

/// Everything the steady-state components need, fixed at boot.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub config: DeviceConfig,
    pub identity: NetworkIdentity,
    pub ip: Ipv4Addr,
}

/// Bring the link up (bounded by the provisioner's retry policy) and
/// derive the identity.
pub fn bring_up_link<L, I, R>(
    provisioner: &mut WifiProvisioner<L, I, R>,
    config: &DeviceConfig,
    clock: &mut impl TimePort,
    sink: &mut impl EventSink,
) -> Result<DeviceContext, FatalFault>
where
    L: NetworkLink,
    I: IndicatorPort,
    R: RetryPolicy,
{
    provisioner.wait_connected(clock, sink)?;
    let identity = provisioner
        .identity(&config.base_label)
        .map_err(FatalFault::Identity)?;
    let ip = provisioner
        .link()
        .local_ip()
        .ok_or(FatalFault::Identity(IdentityError::LinkNotConnected))?;
    sink.emit(&AppEvent::IdentityEstablished {
        name: identity.name().clone(),
        ip,
    });
    Ok(DeviceContext {
        config: config.clone(),
        identity,
        ip,
    })
}

/// Register the service name. Must follow [`bring_up_link`].
pub fn start_name_service<S: DatagramPort>(
    responder: &mut MdnsResponder<S>,
    ctx: &DeviceContext,
    sink: &mut impl EventSink,
) -> Result<(), FatalFault> {
    responder
        .begin(ctx.identity.name(), ctx.ip)
        .map_err(FatalFault::NameServiceFailed)?;
    sink.emit(&AppEvent::NameServiceStarted);
    info!(
        "Server listening at http://{}/",
        ctx.identity.name().fqdn()
    );
    Ok(())
}

/// Snapshot printed once the device is reachable.
#[derive(Debug, Clone)]
pub struct LinkReport {
    pub ssid: Option<heapless::String<32>>,
    pub ip: Ipv4Addr,
    pub name: Fqdn,
    pub address: HardwareAddress,
    pub rssi: Option<i8>,
}

impl LinkReport {
    pub fn collect(link: &impl NetworkLink, ctx: &DeviceContext) -> Self {
        Self {
            ssid: link.ssid(),
            ip: ctx.ip,
            name: ctx.identity.name().fqdn(),
            address: ctx.identity.address(),
            rssi: link.rssi(),
        }
    }
}

impl fmt::Display for LinkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SSID: {} | IP Address: {} | MDNS Name: {} | Mac: {}",
            self.ssid.as_deref().unwrap_or("?"),
            self.ip,
            self.name,
            self.address
        )?;
        match self.rssi {
            Some(rssi) => write!(f, " | signal strength (RSSI): {} dBm", rssi),
            None => Ok(()),
        }
    }
}
