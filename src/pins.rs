//! GPIO pin assignments for the LedThing board.
//!
//! Single source of truth: `main` builds its output drivers from these
//! numbers rather than hard-coding them.

// ---------------------------------------------------------------------------
// Actuator
// ---------------------------------------------------------------------------

/// The switched output driven by `GET /H` and `GET /L`. Active HIGH.
pub const ACTUATOR_GPIO: i32 = 9;

// ---------------------------------------------------------------------------
// Status indicator
// ---------------------------------------------------------------------------

/// Blinks while joining, solid once connected, rapid flash on fault.
pub const STATUS_LED_GPIO: i32 = 2;
