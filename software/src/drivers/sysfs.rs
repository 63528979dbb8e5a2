use std::collections::BTreeMap;
use log::{debug, warn};
use sysfs_gpio::{Direction as SysfsDirection, Pin};
use webgpio_common::hal::gpio::GpioDriver;
use webgpio_common::hal::{HalError, HalErrorKind, HalResult};

fn hal_error(line: u32, e: sysfs_gpio::Error) -> HalError {
    let kind = match e {
        sysfs_gpio::Error::Io(_) => HalErrorKind::Io,
        sysfs_gpio::Error::Unsupported(_) => HalErrorKind::LineUnavailable,
        _ => HalErrorKind::Other,
    };
    HalError::new(kind, format!("gpio{}: {}", line, e))
}

/// Lines driven through `/sys/class/gpio`, addressed by global GPIO number.
///
/// Lines are exported the first time they are used and unexported by
/// `release_all`.
#[derive(Debug, Default)]
pub struct SysfsDriver {
    exported: BTreeMap<u32, Pin>,
}

impl SysfsDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn pin(&mut self, line: u32) -> HalResult<Pin> {
        if let Some(pin) = self.exported.get(&line) {
            return Ok(*pin);
        }
        let pin = Pin::new(u64::from(line));
        if !pin.is_exported() {
            pin.export().map_err(|e| hal_error(line, e))?;
            debug!("sysfs: exported gpio{}", line);
        }
        self.exported.insert(line, pin);
        Ok(pin)
    }
}

impl GpioDriver for SysfsDriver {
    fn configure_output(&mut self, line: u32) -> HalResult<()> {
        // "low" sets the direction and the initial value in one write
        self.pin(line)?.set_direction(SysfsDirection::Low).map_err(|e| hal_error(line, e))
    }

    fn configure_input(&mut self, line: u32) -> HalResult<()> {
        self.pin(line)?.set_direction(SysfsDirection::In).map_err(|e| hal_error(line, e))
    }

    fn read_level(&mut self, line: u32) -> HalResult<bool> {
        let value = self.pin(line)?.get_value().map_err(|e| hal_error(line, e))?;
        Ok(value != 0)
    }

    fn write_level(&mut self, line: u32, value: bool) -> HalResult<()> {
        self.pin(line)?.set_value(u8::from(value)).map_err(|e| hal_error(line, e))
    }

    fn release_all(&mut self) -> HalResult<()> {
        let mut first_error = None;
        for (line, pin) in std::mem::take(&mut self.exported) {
            match pin.unexport() {
                Ok(()) => debug!("sysfs: unexported gpio{}", line),
                Err(e) => {
                    warn!("sysfs: failed to unexport gpio{}: {}", line, e);
                    first_error.get_or_insert(hal_error(line, e));
                },
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
