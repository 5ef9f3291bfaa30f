//! Boot sequence against the simulated radio: stored credentials,
//! provisioning through the access-point form, and terminal faults.

use ledthing::adapters::nvs::{NvsAdapter, save_credentials};
use ledthing::adapters::wifi::{SIM_IP, WifiLink};
use ledthing::app::boot::{LinkReport, bring_up_link, start_name_service};
use ledthing::app::events::AppEvent;
use ledthing::config::{DeviceConfig, RetryConfig};
use ledthing::error::{FatalFault, MdnsError};
use ledthing::mdns::MdnsResponder;
use ledthing::mdns::packet::{MDNS_GROUP, MDNS_PORT};
use ledthing::provisioning::{BoundedRetry, LinkState, RetryForever, WifiCredentials, WifiProvisioner};

use crate::mock_hw::{EventLog, ManualClock, MockDatagram, MockIndicator};

type SimProvisioner<R> = WifiProvisioner<WifiLink<NvsAdapter>, MockIndicator, R>;

fn link_with_credentials(ssid: &str, pass: &str) -> WifiLink<NvsAdapter> {
    let mut nvs = NvsAdapter::new().unwrap();
    save_credentials(&mut nvs, &WifiCredentials::new(ssid, pass).unwrap()).unwrap();
    WifiLink::new(nvs, "wifi101").unwrap()
}

fn empty_link() -> WifiLink<NvsAdapter> {
    WifiLink::new(NvsAdapter::new().unwrap(), "wifi101").unwrap()
}

fn provisioner<R: ledthing::provisioning::RetryPolicy>(
    link: WifiLink<NvsAdapter>,
    indicator: &MockIndicator,
    policy: R,
) -> SimProvisioner<R> {
    WifiProvisioner::new(link, indicator.clone(), policy, 500)
}

fn short_retry() -> BoundedRetry {
    BoundedRetry::from_config(&RetryConfig {
        max_attempts: 2,
        provisioning_window_ms: 1_000,
        initial_backoff_ms: 100,
        max_backoff_ms: 1_000,
    })
}

#[test]
fn stored_credentials_bring_device_online() {
    let config = DeviceConfig::default();
    let indicator = MockIndicator::default();
    let mut prov = provisioner(
        link_with_credentials("HomeWiFi", "mysecret8"),
        &indicator,
        short_retry(),
    );
    let mut clock = ManualClock::new();
    let mut sink = EventLog::default();

    let ctx = bring_up_link(&mut prov, &config, &mut clock, &mut sink).unwrap();

    assert_eq!(ctx.identity.name().as_str(), "wifi101-EFCAFE");
    assert_eq!(ctx.ip, SIM_IP);
    assert!(matches!(
        sink.events[0],
        AppEvent::LinkStateChanged {
            from: LinkState::Unconfigured,
            to: LinkState::Connected
        }
    ));
    assert!(matches!(sink.events[1], AppEvent::IdentityEstablished { .. }));
    // Solid once connected.
    assert_eq!(indicator.levels.borrow().last(), Some(&true));

    let socket = MockDatagram::new();
    let mut mdns = MdnsResponder::new(socket.clone(), config.mdns_ttl_secs);
    start_name_service(&mut mdns, &ctx, &mut sink).unwrap();
    assert!(mdns.is_started());
    assert!(matches!(sink.events[2], AppEvent::NameServiceStarted));
    let sent = socket.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.ip(), &MDNS_GROUP);
    assert_eq!(sent[0].1.port(), MDNS_PORT);

    let report = LinkReport::collect(prov.link(), &ctx).to_string();
    assert!(report.starts_with(
        "SSID: HomeWiFi | IP Address: 192.168.4.20 | MDNS Name: wifi101-EFCAFE.local | Mac: DE:AD:BE:EF:CA:FE"
    ));
    assert!(report.contains("signal strength (RSSI):"));
}

#[test]
fn credentials_from_form_complete_provisioning() {
    let indicator = MockIndicator::default();
    let mut prov = provisioner(empty_link(), &indicator, RetryForever);

    assert_eq!(prov.begin(0).unwrap(), LinkState::Provisioning);
    assert!(prov.link().is_provisioning());
    assert_eq!(prov.poll(600), LinkState::Provisioning);

    prov.link()
        .submit_form("ssid=HomeWiFi&pass=mysecret8")
        .unwrap();
    assert_eq!(prov.poll(700), LinkState::Connected);
    assert!(!prov.link().is_provisioning());

    // Blinked while provisioning, solid now.
    let levels = indicator.levels.borrow();
    assert!(levels.contains(&false));
    assert_eq!(levels.last(), Some(&true));
}

#[test]
fn submitted_credentials_survive_reboot() {
    let indicator = MockIndicator::default();
    let mut prov = provisioner(empty_link(), &indicator, RetryForever);
    prov.begin(0).unwrap();
    let creds = WifiCredentials::new("Cafe", "").unwrap();
    prov.submit_credentials(&creds).unwrap();
    prov.poll(10);

    let (link, _) = prov.into_parts();
    let nvs = link.into_storage();

    let rebooted = WifiLink::new(nvs, "wifi101").unwrap();
    let mut prov = provisioner(rebooted, &indicator, RetryForever);
    assert_eq!(prov.begin(0).unwrap(), LinkState::Connected);
}

#[test]
fn retry_recovers_from_transient_join_failures() {
    let config = DeviceConfig::default();
    let indicator = MockIndicator::default();
    let mut link = link_with_credentials("HomeWiFi", "mysecret8");
    // First join fails, the provisioning window then expires, and the
    // retry's join succeeds.
    link.fail_next_joins(1);
    let mut prov = provisioner(link, &indicator, short_retry());
    let mut clock = ManualClock::new();
    let mut sink = EventLog::default();

    bring_up_link(&mut prov, &config, &mut clock, &mut sink).unwrap();

    assert_eq!(prov.failures(), 1);
    assert_eq!(prov.link().join_attempts(), 2);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::LinkStateChanged {
            to: LinkState::Failed,
            ..
        }
    )));
}

#[test]
fn unprovisioned_device_gives_up_after_policy_limit() {
    let config = DeviceConfig::default();
    let indicator = MockIndicator::default();
    let mut prov = provisioner(empty_link(), &indicator, short_retry());
    let mut clock = ManualClock::new();
    let mut sink = EventLog::default();

    let fault = bring_up_link(&mut prov, &config, &mut clock, &mut sink).unwrap_err();

    assert_eq!(fault, FatalFault::ProvisioningExhausted { attempts: 2 });
    assert!(prov.identity("wifi101").is_err());
}

#[test]
fn missing_radio_is_fatal() {
    let config = DeviceConfig::default();
    let indicator = MockIndicator::default();
    let mut link = empty_link();
    link.remove_radio();
    let mut prov = provisioner(link, &indicator, short_retry());

    let fault = bring_up_link(
        &mut prov,
        &config,
        &mut ManualClock::new(),
        &mut EventLog::default(),
    )
    .unwrap_err();
    assert_eq!(fault, FatalFault::RadioAbsent);
}

#[test]
fn name_service_bind_failure_is_fatal() {
    let config = DeviceConfig::default();
    let indicator = MockIndicator::default();
    let mut prov = provisioner(
        link_with_credentials("HomeWiFi", "mysecret8"),
        &indicator,
        short_retry(),
    );
    let mut clock = ManualClock::new();
    let mut sink = EventLog::default();
    let ctx = bring_up_link(&mut prov, &config, &mut clock, &mut sink).unwrap();
    let events_before = sink.events.len();

    let socket = MockDatagram::failing(MdnsError::Bind);
    let mut mdns = MdnsResponder::new(socket.clone(), config.mdns_ttl_secs);
    let fault = start_name_service(&mut mdns, &ctx, &mut sink).unwrap_err();

    assert_eq!(fault, FatalFault::NameServiceFailed(MdnsError::Bind));
    assert!(!mdns.is_started());
    assert_eq!(sink.events.len(), events_before);
    assert!(
        !sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::NameServiceStarted))
    );
    assert!(socket.sent().is_empty());
}
