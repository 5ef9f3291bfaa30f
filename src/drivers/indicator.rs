//! Status indicator pattern engine.
//!
//! Generates the on/off level of the single status LED. The provisioner
//! calls `tick()` on every poll with the elapsed time and writes the
//! result through [`IndicatorPort`](crate::app::ports::IndicatorPort).
//!
//! ## Priority hierarchy (highest first)
//!
//! 1. **Fault**: rapid flash (8 Hz), set once a boot fault is terminal
//! 2. **Link**: blink while joining or provisioning, solid once connected
//!
//! ## Pattern types
//!
//! | Pattern      | Description                           | Rate            |
//! |--------------|---------------------------------------|-----------------|
//! | Solid        | Constantly on                         | n/a             |
//! | Blink        | Toggles every `interval_ms`           | configurable    |
//! | RapidFlash   | Very fast on/off                      | 8 Hz            |
//! | Off          | Constantly off                        | n/a             |

/// Pattern identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Solid,
    /// Square wave with equal on and off phases of `interval_ms` each.
    Blink { interval_ms: u32 },
    RapidFlash,
    Off,
}

/// Period of [`Pattern::RapidFlash`].
const RAPID_FLASH_PERIOD_MS: u32 = 125;

/// Indicator pattern engine. Stack-allocated, no heap.
#[derive(Debug)]
pub struct IndicatorEngine {
    phase_ms: u32,
    active: Option<Pattern>,
    link: Option<Pattern>,
    fault: bool,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorEngine {
    pub const fn new() -> Self {
        Self {
            phase_ms: 0,
            active: None,
            link: None,
            fault: false,
        }
    }

    /// Set the link-layer pattern (lowest priority).
    pub fn set_link_pattern(&mut self, pattern: Pattern) {
        self.link = Some(pattern);
    }

    /// Set or clear the fault pattern (highest priority).
    pub fn set_fault(&mut self, active: bool) {
        self.fault = active;
    }

    /// The pattern currently driving the output.
    pub fn active(&self) -> Option<Pattern> {
        self.active
    }

    /// Advance the pattern phase by `delta_ms` and return the LED level.
    pub fn tick(&mut self, delta_ms: u32) -> bool {
        self.phase_ms = self.phase_ms.wrapping_add(delta_ms);

        let selected = if self.fault {
            Some(Pattern::RapidFlash)
        } else {
            self.link
        };
        if selected != self.active {
            // A new pattern always starts in its "on" phase.
            self.phase_ms = 0;
            self.active = selected;
        }

        match self.active {
            Some(pattern) => self.level(pattern),
            None => false,
        }
    }

    fn level(&self, pattern: Pattern) -> bool {
        match pattern {
            Pattern::Solid => true,
            Pattern::Off => false,
            Pattern::Blink { interval_ms } => {
                let interval = interval_ms.max(1);
                (self.phase_ms / interval) % 2 == 0
            }
            Pattern::RapidFlash => (self.phase_ms % RAPID_FLASH_PERIOD_MS) < RAPID_FLASH_PERIOD_MS / 2,
        }
    }
}
