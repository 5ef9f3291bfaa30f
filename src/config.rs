//! Device configuration parameters
//!
//! All tunable parameters for the LedThing firmware. Values are validated
//! once at boot; out-of-range values are rejected, never clamped.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Which completed lines may trigger the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchScope {
    /// Any line of the request, headers included.
    AnyLine,
    /// Only the first non-empty line, i.e. the HTTP request line.
    RequestLine,
}

/// Network join retry parameters, consumed by [`BoundedRetry`](crate::provisioning::BoundedRetry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Give up after this many failed join attempts (0 = retry forever).
    pub max_attempts: u32,
    /// How long one provisioning window stays open before it counts as failed.
    pub provisioning_window_ms: u32,
    /// First backoff delay after a failed attempt.
    pub initial_backoff_ms: u32,
    /// Backoff ceiling; the delay doubles up to this value.
    pub max_backoff_ms: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            provisioning_window_ms: 300_000, // 5 min to enter credentials
            initial_backoff_ms: 2_000,
            max_backoff_ms: 60_000,
        }
    }
}

/// Core device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Identity ---
    /// Prefix of the mDNS name and provisioning access point.
    pub base_label: heapless::String<32>,

    // --- HTTP ---
    /// TCP port of the LED switch endpoint.
    pub http_port: u16,
    /// Longest wait for the next request byte before the client is dropped.
    pub read_timeout_ms: u32,
    /// Value of the `Refresh:` header in the fixed response.
    pub refresh_secs: u16,
    /// Which request lines may trigger the actuator.
    pub match_scope: MatchScope,

    // --- mDNS ---
    /// TTL advertised on A records.
    pub mdns_ttl_secs: u32,

    // --- Provisioning ---
    /// Status indicator toggle period while not connected.
    pub blink_interval_ms: u32,
    /// Join retry policy parameters.
    pub retry: RetryConfig,

    // --- Timing ---
    /// Idle delay of the service loop when nothing is pending.
    pub loop_idle_ms: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut base_label = heapless::String::new();
        let _ = base_label.push_str("wifi101");
        Self {
            base_label,

            // HTTP
            http_port: 80,
            read_timeout_ms: 5_000,
            refresh_secs: 5,
            match_scope: MatchScope::AnyLine,

            // mDNS
            mdns_ttl_secs: 120,

            // Provisioning
            blink_interval_ms: 500,
            retry: RetryConfig::default(),

            // Timing
            loop_idle_ms: 1,
        }
    }
}

impl DeviceConfig {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let label = self.base_label.as_str();
        if label.is_empty() || label.len() > 24 {
            return Err(ConfigError::ValidationFailed("base_label must be 1-24 bytes"));
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(ConfigError::ValidationFailed(
                "base_label must contain only ASCII letters, digits and '-'",
            ));
        }
        if self.http_port == 0 {
            return Err(ConfigError::ValidationFailed("http_port must be non-zero"));
        }
        if !(100..=60_000).contains(&self.read_timeout_ms) {
            return Err(ConfigError::ValidationFailed("read_timeout_ms must be 100-60000"));
        }
        if !(1..=3600).contains(&self.refresh_secs) {
            return Err(ConfigError::ValidationFailed("refresh_secs must be 1-3600"));
        }
        if !(1..=4500).contains(&self.mdns_ttl_secs) {
            return Err(ConfigError::ValidationFailed("mdns_ttl_secs must be 1-4500"));
        }
        if !(50..=10_000).contains(&self.blink_interval_ms) {
            return Err(ConfigError::ValidationFailed("blink_interval_ms must be 50-10000"));
        }
        if self.retry.initial_backoff_ms == 0
            || self.retry.initial_backoff_ms > self.retry.max_backoff_ms
        {
            return Err(ConfigError::ValidationFailed(
                "retry backoff must satisfy 0 < initial_backoff_ms <= max_backoff_ms",
            ));
        }
        if self.retry.provisioning_window_ms < 1_000 {
            return Err(ConfigError::ValidationFailed(
                "retry.provisioning_window_ms must be at least 1000",
            ));
        }
        if self.loop_idle_ms > 100 {
            return Err(ConfigError::ValidationFailed("loop_idle_ms must be 0-100"));
        }
        Ok(())
    }
}
