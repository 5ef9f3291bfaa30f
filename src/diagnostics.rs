//! Terminal fault reporting.
//!
//! A boot step that cannot succeed ends here: the fault is logged and
//! emitted once, then the status indicator rapid-flashes forever. The
//! device serves nothing in this state; a power cycle is the only exit.

use log::error;

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, IndicatorPort, TimePort};
use crate::drivers::indicator::IndicatorEngine;
use crate::error::FatalFault;

/// Indicator update period while halted.
const HALT_TICK_MS: u32 = 20;

/// Report `fault` and park the device. Never returns.
pub fn halt(
    fault: FatalFault,
    indicator: &mut impl IndicatorPort,
    clock: &mut impl TimePort,
    sink: &mut impl EventSink,
) -> ! {
    error!("FATAL: {}", fault);
    sink.emit(&AppEvent::Fault(fault));

    let mut engine = fault_pattern();
    loop {
        indicator.set_indicator(engine.tick(HALT_TICK_MS));
        clock.delay_ms(HALT_TICK_MS);
    }
}

fn fault_pattern() -> IndicatorEngine {
    let mut engine = IndicatorEngine::new();
    engine.set_fault(true);
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::indicator::Pattern;

    #[test]
    fn fault_pattern_flashes() {
        let mut engine = fault_pattern();
        let levels: Vec<bool> = (0..8).map(|_| engine.tick(HALT_TICK_MS)).collect();
        assert_eq!(engine.active(), Some(Pattern::RapidFlash));
        assert!(levels.contains(&true));
        assert!(levels.contains(&false));
    }
}
