use serde::Deserialize;
use webgpio_common::hal::gpio::GpioDriver;

mod simulated;
mod sysfs;

pub use simulated::{DriverOp, SimulatedDriver};
pub use sysfs::SysfsDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Sysfs,
    Simulated,
}

pub fn open(kind: DriverKind) -> Box<dyn GpioDriver> {
    match kind {
        DriverKind::Sysfs => Box::new(SysfsDriver::new()),
        DriverKind::Simulated => Box::new(SimulatedDriver::new()),
    }
}
