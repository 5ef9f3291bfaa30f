//! End-to-end request handling: scripted client bytes in, pin level and
//! response bytes out, with the name responder serviced in between.

use std::net::{Ipv4Addr, SocketAddrV4};

use embedded_hal::digital::PinState;
use ledthing::app::service::LedService;
use ledthing::config::{DeviceConfig, MatchScope};
use ledthing::drivers::gpio_output::GpioOutput;
use ledthing::http::{AbortReason, ConnectionOutcome, HttpLedServer};
use ledthing::identity::{HardwareAddress, derive_name};
use ledthing::mdns::MdnsResponder;
use ledthing::mdns::packet::{self, Header, MDNS_GROUP, MDNS_PORT, Packet, TYPE_A};

use crate::mock_hw::{
    EventLog, ManualClock, MockConnection, MockDatagram, MockListener, MockPin, Step,
};

const STATION_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 42);

fn server(connections: Vec<MockConnection>, pin: &MockPin) -> HttpLedServer<MockListener, MockPin> {
    server_with(connections, pin, &DeviceConfig::default())
}

fn server_with(
    connections: Vec<MockConnection>,
    pin: &MockPin,
    config: &DeviceConfig,
) -> HttpLedServer<MockListener, MockPin> {
    let output = GpioOutput::new(pin.clone(), "led").unwrap();
    HttpLedServer::new(MockListener::with(connections), output, config)
}

fn a_query(id: u16) -> Packet {
    let name = derive_name(&HardwareAddress::new([0, 1, 2, 3, 4, 5]), "wifi101").unwrap();
    let mut out = Packet::new();
    packet::build_query(id, &name.fqdn(), TYPE_A, false, &mut out).unwrap();
    out
}

// ── Request handling ──────────────────────────────────────────

#[test]
fn get_h_drives_pin_high_and_responds() {
    let pin = MockPin::new();
    let conn = MockConnection::request("GET /H HTTP/1.1\r\nHost: x\r\n\r\n");
    let log = conn.log();
    let mut srv = server(vec![conn], &pin);
    let mut clock = ManualClock::new();

    let report = srv.serve_next(&mut (), &mut clock).unwrap();

    assert_eq!(report.outcome, ConnectionOutcome::Responded);
    assert_eq!(report.pin_changed, Some(PinState::High));
    assert_eq!(srv.pin_state(), PinState::High);
    assert!(pin.is_high());
    let log = log.borrow();
    assert!(log.response().starts_with("HTTP/1.1 200 OK"));
    assert!(log.flushed);
    assert!(log.closed);
}

#[test]
fn get_l_drives_pin_low() {
    let pin = MockPin::new();
    let mut srv = server(
        vec![
            MockConnection::request("GET /H HTTP/1.1\r\n\r\n"),
            MockConnection::request("GET /L HTTP/1.1\r\n\r\n"),
        ],
        &pin,
    );
    let mut clock = ManualClock::new();

    srv.serve_next(&mut (), &mut clock).unwrap();
    let report = srv.serve_next(&mut (), &mut clock).unwrap();

    assert_eq!(report.pin_changed, Some(PinState::Low));
    assert_eq!(srv.pin_state(), PinState::Low);
    assert!(!pin.is_high());
}

#[test]
fn other_paths_leave_pin_alone_but_respond() {
    let pin = MockPin::new();
    let favicon = MockConnection::request("GET /favicon.ico HTTP/1.1\r\n\r\n");
    let log = favicon.log();
    let mut srv = server(
        vec![MockConnection::request("GET /H HTTP/1.1\r\n\r\n"), favicon],
        &pin,
    );
    let mut clock = ManualClock::new();

    srv.serve_next(&mut (), &mut clock).unwrap();
    let writes_before = pin.writes.borrow().len();
    let report = srv.serve_next(&mut (), &mut clock).unwrap();

    assert_eq!(report.outcome, ConnectionOutcome::Responded);
    assert_eq!(report.pin_changed, None);
    assert_eq!(srv.pin_state(), PinState::High);
    assert_eq!(pin.writes.borrow().len(), writes_before);
    assert!(log.borrow().response().starts_with("HTTP/1.1 200 OK"));
}

#[test]
fn overlong_line_aborts_without_response() {
    let pin = MockPin::new();
    let conn = MockConnection::request(&"A".repeat(600));
    let log = conn.log();
    let mut srv = server(vec![conn], &pin);
    let mut clock = ManualClock::new();

    let report = srv.serve_next(&mut (), &mut clock).unwrap();

    assert_eq!(
        report.outcome,
        ConnectionOutcome::Aborted(AbortReason::LineOverflow)
    );
    assert_eq!(report.pin_changed, None);
    assert_eq!(srv.pin_state(), PinState::Low);
    assert!(log.borrow().written.is_empty());
    assert!(log.borrow().closed);
}

#[test]
fn overlong_command_line_leaves_pin_unchanged() {
    let pin = MockPin::new();
    let conn = MockConnection::request(&format!("GET /H {}", "A".repeat(600)));
    let log = conn.log();
    let mut srv = server(vec![conn], &pin);
    let mut clock = ManualClock::new();

    let report = srv.serve_next(&mut (), &mut clock).unwrap();

    assert_eq!(
        report.outcome,
        ConnectionOutcome::Aborted(AbortReason::LineOverflow)
    );
    assert_eq!(report.pin_changed, None);
    assert_eq!(srv.pin_state(), PinState::Low);
    assert!(pin.writes.borrow().iter().all(|high| !high));
    assert!(log.borrow().written.is_empty());
}

#[test]
fn close_mid_command_line_leaves_pin_unchanged() {
    let pin = MockPin::new();
    let conn = MockConnection::new(vec![Step::Data(b"GET /H HTTP/1.1".to_vec()), Step::Close]);
    let mut srv = server(vec![conn], &pin);
    let mut clock = ManualClock::new();

    let report = srv.serve_next(&mut (), &mut clock).unwrap();

    assert_eq!(report.outcome, ConnectionOutcome::Aborted(AbortReason::PeerClosed));
    assert_eq!(srv.pin_state(), PinState::Low);
}

#[test]
fn request_split_across_segments() {
    let pin = MockPin::new();
    let conn = MockConnection::new(vec![
        Step::Data(b"GE".to_vec()),
        Step::Idle(2),
        Step::Data(b"T /".to_vec()),
        Step::Data(b"H HTTP/1.1\r".to_vec()),
        Step::Idle(1),
        Step::Data(b"\n\r\n".to_vec()),
    ]);
    let mut srv = server(vec![conn], &pin);
    let mut clock = ManualClock::new();

    let report = srv.serve_next(&mut (), &mut clock).unwrap();

    assert_eq!(report.outcome, ConnectionOutcome::Responded);
    assert_eq!(srv.pin_state(), PinState::High);
}

#[test]
fn silent_client_times_out() {
    let pin = MockPin::new();
    let conn = MockConnection::new(vec![Step::Data(b"GET /H".to_vec())]);
    let log = conn.log();
    let mut srv = server(vec![conn], &pin);
    let mut clock = ManualClock::new();

    let report = srv.serve_next(&mut (), &mut clock).unwrap();

    assert_eq!(report.outcome, ConnectionOutcome::Aborted(AbortReason::TimedOut));
    // The line never completed, so the command was never applied.
    assert_eq!(report.pin_changed, None);
    assert_eq!(srv.pin_state(), PinState::Low);
    assert!(pin.writes.borrow().iter().all(|high| !high));
    assert!(clock_reached(&clock, 5_000));
    assert!(log.borrow().written.is_empty());
}

#[test]
fn early_close_is_reported() {
    let pin = MockPin::new();
    let conn = MockConnection::new(vec![Step::Data(b"GET /L HTTP/1.1\r\n".to_vec()), Step::Close]);
    let mut srv = server(vec![conn], &pin);
    let mut clock = ManualClock::new();

    let report = srv.serve_next(&mut (), &mut clock).unwrap();

    assert_eq!(report.outcome, ConnectionOutcome::Aborted(AbortReason::PeerClosed));
}

#[test]
fn partial_writes_deliver_whole_page() {
    let pin = MockPin::new();
    let conn = MockConnection::request("GET / HTTP/1.1\r\n\r\n")
        .with_write_limit(7)
        .with_stalled_writes(3);
    let log = conn.log();
    let mut srv = server(vec![conn], &pin);
    let mut clock = ManualClock::new();

    let report = srv.serve_next(&mut (), &mut clock).unwrap();

    assert_eq!(report.outcome, ConnectionOutcome::Responded);
    let log = log.borrow();
    assert!(log.response().starts_with("HTTP/1.1 200 OK"));
    assert!(log.response().ends_with("</html>\r\n"));
}

#[test]
fn request_line_scope_ignores_header_commands() {
    let pin = MockPin::new();
    let config = DeviceConfig {
        match_scope: MatchScope::RequestLine,
        ..DeviceConfig::default()
    };
    let mut srv = server_with(
        vec![MockConnection::request("GET / HTTP/1.1\r\nX-Trick: GET /H\r\n\r\n")],
        &pin,
        &config,
    );
    let mut clock = ManualClock::new();

    srv.serve_next(&mut (), &mut clock).unwrap();
    assert_eq!(srv.pin_state(), PinState::Low);
}

#[test]
fn nobody_waiting_returns_none() {
    let pin = MockPin::new();
    let mut srv = server(Vec::new(), &pin);
    assert!(srv.serve_next(&mut (), &mut ManualClock::new()).is_none());
}

fn clock_reached(clock: &ManualClock, ms: u64) -> bool {
    use ledthing::app::ports::TimePort;
    clock.now_ms() >= ms
}

// ── Service loop with name responder ──────────────────────────

fn started_responder(socket: &MockDatagram) -> MdnsResponder<MockDatagram> {
    let name = derive_name(&HardwareAddress::new([0, 1, 2, 3, 4, 5]), "wifi101").unwrap();
    let mut mdns = MdnsResponder::new(socket.clone(), 120);
    mdns.begin(&name, STATION_IP).unwrap();
    mdns
}

#[test]
fn name_query_answered_while_slow_client_in_flight() {
    let socket = MockDatagram::new();
    let mdns = started_responder(&socket);
    let announcements = socket.sent().len();

    let querier = socket.clone();
    let conn = MockConnection::new(vec![
        Step::Data(b"GET /H HT".to_vec()),
        Step::Idle(3),
        Step::Call(Box::new(move || {
            querier.deliver(&a_query(0), SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 7), MDNS_PORT));
        })),
        Step::Idle(2),
        Step::Data(b"TP/1.1\r\n\r\n".to_vec()),
    ]);
    let pin = MockPin::new();
    let config = DeviceConfig::default();
    let mut service = LedService::new(server(vec![conn], &pin), mdns, &config);
    let mut clock = ManualClock::new();
    let mut sink = EventLog::default();

    assert!(service.tick(&mut clock, &mut sink));

    assert_eq!(service.responder().answered(), 1);
    let sent = socket.sent();
    assert_eq!(sent.len(), announcements + 1);
    let (reply, dest) = &sent[announcements];
    assert_eq!(*dest, SocketAddrV4::new(MDNS_GROUP, MDNS_PORT));
    let header = Header::parse(reply).unwrap();
    assert_eq!(header.answers, 1);
    assert!(reply.ends_with(&STATION_IP.octets()));

    assert_eq!(service.pin_state(), PinState::High);
    assert_eq!(service.stats().served, 1);
}

#[test]
fn legacy_query_gets_unicast_reply_with_echoed_id() {
    let socket = MockDatagram::new();
    let mdns = started_responder(&socket);
    let announcements = socket.sent().len();
    let querier = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 7), 40_000);
    socket.deliver(&a_query(0x1234), querier);

    let pin = MockPin::new();
    let config = DeviceConfig::default();
    let mut service = LedService::new(server(Vec::new(), &pin), mdns, &config);

    assert!(!service.tick(&mut ManualClock::new(), &mut EventLog::default()));

    let sent = socket.sent();
    let (reply, dest) = &sent[announcements];
    assert_eq!(*dest, querier);
    let header = Header::parse(reply).unwrap();
    assert_eq!(header.id, 0x1234);
    assert_eq!(header.questions, 1);
}

#[test]
fn service_counts_outcomes_and_emits_events() {
    use ledthing::app::events::AppEvent;

    let socket = MockDatagram::new();
    let mdns = started_responder(&socket);
    let pin = MockPin::new();
    let config = DeviceConfig::default();
    let mut service = LedService::new(
        server(
            vec![
                MockConnection::request("GET /H HTTP/1.1\r\n\r\n"),
                MockConnection::request(&"x".repeat(400)),
                MockConnection::new(vec![Step::Idle(1)]),
            ],
            &pin,
        ),
        mdns,
        &config,
    );
    let mut clock = ManualClock::new();
    let mut sink = EventLog::default();

    while service.tick(&mut clock, &mut sink) {}

    let stats = service.stats();
    assert_eq!(stats.served, 1);
    assert_eq!(stats.aborted, 2);
    assert_eq!(stats.timed_out, 1);
    assert!(matches!(sink.events[0], AppEvent::PinChanged(PinState::High)));
    assert!(matches!(sink.events[1], AppEvent::ConnectionServed));
    assert!(matches!(
        sink.events[2],
        AppEvent::ConnectionAborted(AbortReason::LineOverflow)
    ));
    assert!(matches!(
        sink.events[3],
        AppEvent::ConnectionAborted(AbortReason::TimedOut)
    ));
}
