//! Wi-Fi provisioning state machine.
//!
//! Brings the station link up before anything else runs:
//!
//! ```text
//!  Unconfigured ──begin──▶ Connected            (stored credentials worked)
//!       │
//!       └──────begin──▶ Provisioning ──▶ Connected
//!                          │    ▲
//!              window ends │    │ backoff elapsed
//!                          ▼    │
//!                          Failed ──policy gives up──▶ (fault)
//! ```
//!
//! States only move forward, except the Provisioning ↔ Failed retry
//! loop. While not connected the status indicator blinks; once connected
//! it holds solid.
//!
//! The provisioner never sleeps. Callers drive it with
//! [`poll`](WifiProvisioner::poll) or hand it a clock through
//! [`wait_connected`](WifiProvisioner::wait_connected).

mod credentials;
mod policy;

pub use credentials::WifiCredentials;
pub use policy::{BoundedRetry, RetryForever, RetryPolicy};

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, IndicatorPort, NetworkLink, TimePort};
use crate::drivers::indicator::{IndicatorEngine, Pattern};
use crate::error::{FatalFault, IdentityError, LinkError};
use crate::identity::NetworkIdentity;

/// Poll period of [`WifiProvisioner::wait_connected`].
const WAIT_POLL_MS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unconfigured,
    Provisioning,
    Connected,
    Failed,
}

pub struct WifiProvisioner<L: NetworkLink, I: IndicatorPort, R: RetryPolicy> {
    link: L,
    indicator: I,
    policy: R,
    state: LinkState,
    engine: IndicatorEngine,
    indicator_on: Option<bool>,
    last_tick_ms: u64,
    failures: u32,
    window_started_ms: u64,
    retry_at_ms: Option<u64>,
    exhausted: bool,
}

impl<L: NetworkLink, I: IndicatorPort, R: RetryPolicy> WifiProvisioner<L, I, R> {
    pub fn new(link: L, indicator: I, policy: R, blink_interval_ms: u32) -> Self {
        let mut engine = IndicatorEngine::new();
        engine.set_link_pattern(Pattern::Blink {
            interval_ms: blink_interval_ms,
        });
        Self {
            link,
            indicator,
            policy,
            state: LinkState::Unconfigured,
            engine,
            indicator_on: None,
            last_tick_ms: 0,
            failures: 0,
            window_started_ms: 0,
            retry_at_ms: None,
            exhausted: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Probe the radio and make the first join attempt.
    ///
    /// Only a missing radio is fatal here; a failed join opens the
    /// provisioning window instead. Calling again after the first
    /// successful call is a no-op.
    pub fn begin(&mut self, now_ms: u64) -> Result<LinkState, FatalFault> {
        if self.state != LinkState::Unconfigured {
            return Ok(self.state);
        }
        self.last_tick_ms = now_ms;
        if let Err(e) = self.link.probe() {
            error!("WiFi: {}", e);
            return Err(FatalFault::RadioAbsent);
        }
        self.attempt(now_ms);
        self.refresh_indicator(now_ms);
        Ok(self.state)
    }

    /// Advance timers and the link. Returns the (possibly new) state.
    pub fn poll(&mut self, now_ms: u64) -> LinkState {
        match self.state {
            LinkState::Unconfigured | LinkState::Connected => {}
            LinkState::Provisioning => {
                self.link.poll();
                if self.link.is_connected() {
                    self.enter_connected();
                } else if let Some(window) = self.policy.window_ms() {
                    if now_ms.saturating_sub(self.window_started_ms) >= u64::from(window) {
                        warn!("WiFi: provisioning window closed without a working network");
                        self.link.stop_provisioning();
                        self.fail(now_ms);
                    }
                }
            }
            LinkState::Failed => {
                if let Some(at) = self.retry_at_ms {
                    if now_ms >= at {
                        self.retry_at_ms = None;
                        info!("WiFi: retrying join (attempt {})", self.failures + 1);
                        self.attempt(now_ms);
                    }
                }
            }
        }
        self.refresh_indicator(now_ms);
        self.state
    }

    /// Run [`begin`](Self::begin) and [`poll`](Self::poll) until the link
    /// is up, emitting every state change. Returns the terminal fault if
    /// the radio is missing or the retry policy gives up.
    pub fn wait_connected(
        &mut self,
        clock: &mut impl TimePort,
        sink: &mut impl EventSink,
    ) -> Result<(), FatalFault> {
        let mut prev = self.state;
        let state = self.begin(clock.now_ms())?;
        emit_change(sink, &mut prev, state);
        loop {
            if self.state == LinkState::Connected {
                return Ok(());
            }
            if let Some(fault) = self.fault() {
                return Err(fault);
            }
            clock.delay_ms(WAIT_POLL_MS);
            let state = self.poll(clock.now_ms());
            emit_change(sink, &mut prev, state);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> LinkState {
        self.state
    }

    /// Failed join attempts so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// The terminal fault, once the retry policy has given up.
    pub fn fault(&self) -> Option<FatalFault> {
        self.exhausted.then_some(FatalFault::ProvisioningExhausted {
            attempts: self.failures,
        })
    }

    /// Derive the identity; only valid once the link is Connected.
    pub fn identity(&self, base_label: &str) -> Result<NetworkIdentity, IdentityError> {
        NetworkIdentity::establish(
            self.state == LinkState::Connected,
            self.link.hardware_address(),
            base_label,
        )
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Hand credentials from a configuration surface to the link. The
    /// next [`poll`](Self::poll) picks up the resulting connection.
    pub fn submit_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        self.link.submit_credentials(credentials)
    }

    pub fn indicator_mut(&mut self) -> &mut I {
        &mut self.indicator
    }

    pub fn into_parts(self) -> (L, I) {
        (self.link, self.indicator)
    }

    // ── Transitions ───────────────────────────────────────────

    fn attempt(&mut self, now_ms: u64) {
        match self.link.join_stored() {
            Ok(()) => self.enter_connected(),
            Err(e) => {
                info!("WiFi: stored join unavailable ({}), opening provisioning", e);
                match self.link.start_provisioning() {
                    Ok(()) => {
                        self.state = LinkState::Provisioning;
                        self.window_started_ms = now_ms;
                    }
                    Err(e) => {
                        error!("WiFi: {}", e);
                        self.fail(now_ms);
                    }
                }
            }
        }
    }

    fn fail(&mut self, now_ms: u64) {
        self.failures = self.failures.saturating_add(1);
        self.state = LinkState::Failed;
        match self.policy.next_delay_ms(self.failures) {
            Some(delay) => {
                info!("WiFi: attempt {} failed, retry in {} ms", self.failures, delay);
                self.retry_at_ms = Some(now_ms.saturating_add(u64::from(delay)));
            }
            None => {
                error!("WiFi: giving up after {} attempts", self.failures);
                self.exhausted = true;
            }
        }
    }

    fn enter_connected(&mut self) {
        if self.state == LinkState::Provisioning {
            self.link.stop_provisioning();
        }
        self.state = LinkState::Connected;
        self.engine.set_link_pattern(Pattern::Solid);
        info!("WiFi: connected");
    }

    fn refresh_indicator(&mut self, now_ms: u64) {
        let delta = now_ms.saturating_sub(self.last_tick_ms).min(u64::from(u32::MAX)) as u32;
        self.last_tick_ms = now_ms;
        let on = self.engine.tick(delta);
        if self.indicator_on != Some(on) {
            self.indicator.set_indicator(on);
            self.indicator_on = Some(on);
        }
    }
}

fn emit_change(sink: &mut impl EventSink, prev: &mut LinkState, now: LinkState) {
    if *prev != now {
        sink.emit(&AppEvent::LinkStateChanged {
            from: *prev,
            to: now,
        });
        *prev = now;
    }
}
