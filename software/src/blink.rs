use std::thread;
use std::time::Duration;
use embedded_hal::digital::v2::{toggleable, InputPin, OutputPin, StatefulOutputPin, ToggleableOutputPin};
use log::info;
use webgpio_common::hal::gpio::Direction;
use crate::controller::{ControlError, PinController};

/// A controllable header pin seen through the `embedded-hal` digital traits.
pub struct PinHandle<'a> {
    controller: &'a PinController,
    position: u8,
}

impl<'a> PinHandle<'a> {
    pub fn into_output(controller: &'a PinController, position: u8) -> Result<Self, ControlError> {
        controller.setup(position, Direction::Output)?;
        Ok(Self { controller, position })
    }

    pub fn into_input(controller: &'a PinController, position: u8) -> Result<Self, ControlError> {
        controller.setup(position, Direction::Input)?;
        Ok(Self { controller, position })
    }

    pub fn position(&self) -> u8 {
        self.position
    }
}

impl OutputPin for PinHandle<'_> {
    type Error = ControlError;

    fn set_low(&mut self) -> Result<(), ControlError> {
        self.controller.write(self.position, false).map(|_| ())
    }

    fn set_high(&mut self) -> Result<(), ControlError> {
        self.controller.write(self.position, true).map(|_| ())
    }
}

impl StatefulOutputPin for PinHandle<'_> {
    fn is_set_high(&self) -> Result<bool, ControlError> {
        self.controller.read(self.position).map(|outcome| outcome.state.level)
    }

    fn is_set_low(&self) -> Result<bool, ControlError> {
        self.is_set_high().map(|high| !high)
    }
}

impl toggleable::Default for PinHandle<'_> {}

impl InputPin for PinHandle<'_> {
    type Error = ControlError;

    fn is_high(&self) -> Result<bool, ControlError> {
        self.controller.read(self.position).map(|outcome| outcome.state.level)
    }

    fn is_low(&self) -> Result<bool, ControlError> {
        self.is_high().map(|high| !high)
    }
}

/// Toggles `position` `count` times, one edge every `period`, and leaves it low.
pub fn blink(controller: &PinController, position: u8, period: Duration, count: u32) -> Result<(), ControlError> {
    let mut pin = PinHandle::into_output(controller, position)?;
    info!("blinking pin {} {} times every {:?}", pin.position(), count, period);

    for _ in 0..count {
        pin.toggle()?;
        thread::sleep(period);
    }
    pin.set_low()
}
