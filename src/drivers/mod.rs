//! Output drivers: the actuator pin and the status indicator.

pub mod gpio_output;
pub mod indicator;
