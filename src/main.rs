//! LedThing Firmware: Main Entry Point
//!
//! Boot runs strictly in order; any step that cannot succeed ends in
//! [`halt`], which rapid-flashes the status LED forever.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  WifiLink        NvsAdapter     TcpListenerAdapter           │
//! │  (NetworkLink)   (Config+NVS)   (Listener)                   │
//! │  UdpMulticastSocket   SystemClock   LogEventSink             │
//! │  (DatagramPort)       (TimePort)    (EventSink)              │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  WifiProvisioner ─▶ NetworkIdentity ─▶ MdnsResponder         │
//! │                                           │ serviced during  │
//! │                                           ▼ every read       │
//! │                     LedService ─▶ HttpLedServer ─▶ GPIO      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use ledthing::adapters::log_sink::LogEventSink;
use ledthing::adapters::mdns_socket::UdpMulticastSocket;
use ledthing::adapters::nvs::{NvsAdapter, load_credentials, save_credentials};
use ledthing::adapters::tcp::TcpListenerAdapter;
use ledthing::adapters::time::SystemClock;
use ledthing::adapters::wifi::WifiLink;
use ledthing::app::boot::{LinkReport, bring_up_link, start_name_service};
use ledthing::app::ports::{ConfigPort, StoragePort};
use ledthing::app::service::LedService;
use ledthing::config::DeviceConfig;
use ledthing::diagnostics::halt;
use ledthing::drivers::gpio_output::GpioOutput;
use ledthing::error::{Error, FatalFault};
use ledthing::http::HttpLedServer;
use ledthing::mdns::MdnsResponder;
use ledthing::pins;
use ledthing::provisioning::{BoundedRetry, WifiCredentials, WifiProvisioner};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("LedThing v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load().and_then(|cfg| cfg.validate().map(|()| cfg)) {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
    };
    seed_credentials(&mut nvs);

    // ── 3. Outputs ────────────────────────────────────────────
    // SAFETY: each pin number is used for exactly one driver, and
    // nothing else in the firmware touches these GPIOs.
    let status_pin = unsafe { AnyOutputPin::new(pins::STATUS_LED_GPIO) };
    let actuator_pin = unsafe { AnyOutputPin::new(pins::ACTUATOR_GPIO) };
    let indicator = GpioOutput::new(PinDriver::output(status_pin)?, "status").map_err(Error::from)?;
    let actuator = GpioOutput::new(PinDriver::output(actuator_pin)?, "actuator").map_err(Error::from)?;

    let mut clock = SystemClock::new();
    let mut sink = LogEventSink::new();

    // ── 4. Link ───────────────────────────────────────────────
    let link = WifiLink::new(
        peripherals.modem,
        sysloop,
        nvs_partition,
        nvs,
        &config.base_label,
    )
    .map_err(Error::from)?;
    let mut provisioner = WifiProvisioner::new(
        link,
        indicator,
        BoundedRetry::from_config(&config.retry),
        config.blink_interval_ms,
    );
    let ctx = match bring_up_link(&mut provisioner, &config, &mut clock, &mut sink) {
        Ok(ctx) => ctx,
        Err(fault) => halt(fault, provisioner.indicator_mut(), &mut clock, &mut sink),
    };
    let (link, mut indicator) = provisioner.into_parts();

    // ── 5. Listener + name service ────────────────────────────
    let listener = match TcpListenerAdapter::bind(config.http_port) {
        Ok(l) => l,
        Err(e) => halt(FatalFault::ListenerFailed(e), &mut indicator, &mut clock, &mut sink),
    };
    let socket = UdpMulticastSocket::new().on_interface(ctx.ip);
    let mut mdns = MdnsResponder::new(socket, config.mdns_ttl_secs);
    if let Err(fault) = start_name_service(&mut mdns, &ctx, &mut sink) {
        halt(fault, &mut indicator, &mut clock, &mut sink);
    }

    info!("{}", LinkReport::collect(&link, &ctx));

    // ── 6. Serve forever ──────────────────────────────────────
    // `link` and `indicator` stay alive: dropping either would stop the
    // radio or release the LED.
    let server = HttpLedServer::new(listener, actuator, &config);
    let mut service = LedService::new(server, mdns, &config);
    service.run(&mut clock, &mut sink)
}

/// Store build-time credentials when NVS holds none.
fn seed_credentials(nvs: &mut impl StoragePort) {
    let (Some(ssid), Some(pass)) = (
        option_env!("LEDTHING_WIFI_SSID"),
        option_env!("LEDTHING_WIFI_PASS"),
    ) else {
        return;
    };
    match load_credentials(nvs) {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => {
            warn!("NVS: credential read failed ({}), not seeding", e);
            return;
        }
    }
    match WifiCredentials::new(ssid, pass) {
        Ok(creds) => {
            if let Err(e) = save_credentials(nvs, &creds) {
                warn!("NVS: could not seed credentials ({})", e);
            }
        }
        Err(e) => warn!("Build-time credentials rejected: {}", e),
    }
}
