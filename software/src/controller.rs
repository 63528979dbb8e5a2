//! Runtime state of the controllable header pins.
//!
//! Every controllable pin starts as INPUT with a low cached level. Only
//! `setup` changes the direction, `write` is refused unless the pin is an
//! OUTPUT, and `read` samples the line for inputs but reports the cached
//! level for outputs. All operations take one lock for their whole duration,
//! driver calls included.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use log::{error, info, warn};
use thiserror::Error;
use webgpio_common::hal::gpio::{Direction, GpioDriver};
use webgpio_common::hal::{HalError, HalErrorKind};
use webgpio_common::header::PinRegistry;
use webgpio_common::protocol::{GpioInfo, PinInfo, PinTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinRuntimeState {
    pub direction: Direction,
    pub level: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// Not a controllable header position. Holds whatever number was asked
    /// for, which need not fit a header position at all.
    #[error("Invalid pin {0}")]
    InvalidPin(i64),

    #[error("Invalid direction '{0}'. Use INPUT or OUTPUT")]
    InvalidDirection(String),

    #[error("Pin {position} is not configured as OUTPUT (current: {current})")]
    NotConfiguredAsOutput { position: u8, current: Direction },

    #[error("{0}")]
    HardwareFailure(#[from] HalError),
}

pub type ControlResult<T> = Result<T, ControlError>;

/// Successful operation on a pin, with the pin's state afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub message: String,
    pub state: PinRuntimeState,
}

fn level_name(level: bool) -> &'static str {
    if level { "HIGH" } else { "LOW" }
}

struct Inner {
    driver: Box<dyn GpioDriver>,
    pins: BTreeMap<u8, PinRuntimeState>,
    released: bool,
}

impl Inner {
    fn check_alive(&self) -> ControlResult<()> {
        if self.released {
            Err(HalError::new(HalErrorKind::Other, "controller has been shut down").into())
        } else {
            Ok(())
        }
    }
}

pub struct PinController {
    registry: PinRegistry,
    inner: Mutex<Inner>,
}

impl PinController {
    /// Builds the runtime state for every controllable pin. No hardware is
    /// touched until a pin is set up.
    pub fn init(registry: PinRegistry, driver: Box<dyn GpioDriver>) -> Self {
        let pins: BTreeMap<_, _> = registry.controllable_positions().into_iter()
            .map(|position| (position, PinRuntimeState::default()))
            .collect();
        info!("controllable GPIO pins: {:?}", pins.keys().collect::<Vec<_>>());

        Self {
            registry,
            inner: Mutex::new(Inner {
                driver,
                pins,
                released: false,
            }),
        }
    }

    pub fn registry(&self) -> &PinRegistry {
        &self.registry
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // State is only written after the driver call it depends on succeeded
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn line(&self, position: u8) -> ControlResult<u32> {
        match self.registry.line(position) {
            Some(line) => Ok(line),
            None => {
                error!("invalid pin {}, valid pins: {:?}", position, self.registry.controllable_positions());
                Err(ControlError::InvalidPin(position.into()))
            },
        }
    }

    /// `setup` with the direction given as a request token.
    ///
    /// The pin is validated before the token so an unknown pin always
    /// reports `InvalidPin`.
    pub fn setup_token(&self, position: u8, token: &str) -> ControlResult<Outcome> {
        self.line(position)?;
        let direction = token.parse::<Direction>().map_err(|e| {
            error!("setup: pin {}: {}", position, e);
            ControlError::InvalidDirection(e.0)
        })?;
        self.setup(position, direction)
    }

    pub fn setup(&self, position: u8, direction: Direction) -> ControlResult<Outcome> {
        info!("setup: pin {} -> {}", position, direction);
        let line = self.line(position)?;
        let mut inner = self.lock();
        inner.check_alive()?;

        let state = match direction {
            Direction::Output => {
                inner.driver.configure_output(line).map_err(|e| {
                    error!("setup: pin {} (GPIO {}) as OUTPUT failed: {}", position, line, e);
                    e
                })?;
                PinRuntimeState { direction, level: false }
            },
            Direction::Input => {
                let level = inner.driver.configure_input(line)
                    .and_then(|()| inner.driver.read_level(line))
                    .map_err(|e| {
                        error!("setup: pin {} (GPIO {}) as INPUT failed: {}", position, line, e);
                        e
                    })?;
                PinRuntimeState { direction, level }
            },
        };
        inner.pins.insert(position, state);
        info!("setup: pin {} (GPIO {}) is {}, level {}", position, line, direction, level_name(state.level));

        Ok(Outcome {
            message: format!("Pin {} configured as {}", position, direction),
            state,
        })
    }

    pub fn write(&self, position: u8, level: bool) -> ControlResult<Outcome> {
        info!("write: pin {} -> {}", position, level_name(level));
        let line = self.line(position)?;
        let mut inner = self.lock();
        inner.check_alive()?;

        let current = inner.pins.get(&position).copied().unwrap_or_default();
        if current.direction != Direction::Output {
            error!("write: pin {} is {}, must be OUTPUT", position, current.direction);
            return Err(ControlError::NotConfiguredAsOutput { position, current: current.direction });
        }

        inner.driver.write_level(line, level).map_err(|e| {
            error!("write: pin {} (GPIO {}) failed: {}", position, line, e);
            e
        })?;
        let state = PinRuntimeState { direction: Direction::Output, level };
        inner.pins.insert(position, state);

        // Best effort: the cache keeps the requested level whatever the line reads back
        match inner.driver.read_level(line) {
            Ok(actual) if actual != level => {
                warn!("write: pin {} mismatch, requested {} but reads {}", position, level_name(level), level_name(actual));
            },
            Ok(_) => {},
            Err(e) => warn!("write: could not verify pin {}: {}", position, e),
        }

        Ok(Outcome {
            message: format!("Pin {} set to {}", position, level_name(level)),
            state,
        })
    }

    pub fn read(&self, position: u8) -> ControlResult<Outcome> {
        info!("read: pin {}", position);
        let line = self.line(position)?;
        let mut inner = self.lock();
        inner.check_alive()?;

        let current = inner.pins.get(&position).copied().unwrap_or_default();
        match current.direction {
            Direction::Input => {
                let level = inner.driver.read_level(line).map_err(|e| {
                    error!("read: pin {} (GPIO {}) failed: {}", position, line, e);
                    e
                })?;
                let state = PinRuntimeState { level, ..current };
                inner.pins.insert(position, state);
                info!("read: pin {} is {}", position, level_name(level));
                Ok(Outcome {
                    message: format!("Pin {} state read", position),
                    state,
                })
            },
            Direction::Output => {
                info!("read: pin {} is an output, cached {}", position, level_name(current.level));
                Ok(Outcome {
                    message: format!("Pin {} current state", position),
                    state: current,
                })
            },
        }
    }

    pub fn state(&self, position: u8) -> Option<PinRuntimeState> {
        self.lock().pins.get(&position).copied()
    }

    /// Status entry of one header position, `None` off the header.
    pub fn pin_info(&self, position: u8) -> Option<PinInfo> {
        let pin = self.registry.get(position)?;
        let runtime = self.state(position).map(|s| (s.direction, s.level));
        Some(PinInfo::new(pin, runtime))
    }

    /// Every header position with the runtime state of controllable pins.
    /// Never touches the hardware.
    pub fn snapshot(&self) -> PinTable {
        let inner = self.lock();
        self.registry.iter().map(|pin| {
            let runtime = inner.pins.get(&pin.position).map(|s| (s.direction, s.level));
            (pin.position, PinInfo::new(pin, runtime))
        }).collect()
    }

    pub fn gpio_info(&self) -> GpioInfo {
        GpioInfo::new(self.registry.iter().filter(|pin| pin.is_controllable()))
    }

    /// Releases every line. Later pin operations fail; calling it again does
    /// nothing. A failed release leaves the controller running so it can be
    /// retried.
    pub fn shutdown(&self) -> ControlResult<()> {
        let mut inner = self.lock();
        if inner.released {
            info!("GPIO already released");
            return Ok(());
        }
        inner.driver.release_all()?;
        inner.released = true;
        info!("GPIO cleanup completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{DriverOp, SimulatedDriver};
    use rand::Rng;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    const PIN: u8 = 7;
    const LINE: u32 = 492;

    fn controller() -> (PinController, SimulatedDriver) {
        let probe = SimulatedDriver::new();
        let controller = PinController::init(PinRegistry::jetson_orin_nano(), Box::new(probe.clone()));
        (controller, probe)
    }

    #[test]
    fn starts_as_low_inputs_without_touching_hardware() {
        let (controller, probe) = controller();
        for position in [7, 15, 29, 31, 32, 33] {
            assert_eq!(controller.state(position), Some(PinRuntimeState { direction: Direction::Input, level: false }));
        }
        assert_eq!(controller.state(19), None);
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn invalid_pins_never_reach_the_driver() {
        let (controller, probe) = controller();
        let controllable = controller.registry().controllable_positions();
        let positions = (0..=255u8).filter(|p| !controllable.contains(p));
        for position in positions {
            let invalid = Err(ControlError::InvalidPin(position.into()));
            assert_eq!(controller.setup(position, Direction::Output), invalid);
            assert_eq!(controller.setup_token(position, "bogus"), invalid);
            assert_eq!(controller.write(position, true), invalid);
            assert_eq!(controller.read(position), invalid);
        }
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn gpio_pin_outside_the_overlay_is_invalid() {
        let (controller, _) = controller();
        assert!(controller.registry().describe(3).line.is_none());
        assert_eq!(controller.setup(3, Direction::Output), Err(ControlError::InvalidPin(3)));
        // has a line, but not enabled
        assert_eq!(controller.setup(12, Direction::Output), Err(ControlError::InvalidPin(12)));
    }

    #[test]
    fn unknown_direction_token() {
        let (controller, probe) = controller();
        let err = controller.setup_token(PIN, "PWM").unwrap_err();
        assert_eq!(err, ControlError::InvalidDirection("PWM".to_string()));
        assert_eq!(err.to_string(), "Invalid direction 'PWM'. Use INPUT or OUTPUT");
        assert!(probe.calls().is_empty());

        let outcome = controller.setup_token(PIN, "output").unwrap();
        assert_eq!(outcome.message, "Pin 7 configured as OUTPUT");
    }

    #[test]
    fn fresh_output_write_then_read() {
        let (controller, probe) = controller();

        let outcome = controller.setup(PIN, Direction::Output).unwrap();
        assert_eq!(outcome.state, PinRuntimeState { direction: Direction::Output, level: false });
        assert_eq!(probe.direction(LINE), Some(Direction::Output));

        let outcome = controller.write(PIN, true).unwrap();
        assert_eq!(outcome.message, "Pin 7 set to HIGH");
        assert!(outcome.state.level);
        assert!(probe.level(LINE));

        probe.clear_calls();
        let outcome = controller.read(PIN).unwrap();
        assert!(outcome.state.level);
        assert_eq!(outcome.message, "Pin 7 current state");
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn write_is_blocked_on_inputs() {
        let (controller, probe) = controller();
        controller.setup(PIN, Direction::Input).unwrap();
        probe.clear_calls();

        let err = controller.write(PIN, true).unwrap_err();
        assert_eq!(err, ControlError::NotConfiguredAsOutput { position: PIN, current: Direction::Input });
        assert!(err.to_string().contains("INPUT"));
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn write_is_blocked_before_any_setup() {
        let (controller, _) = controller();
        let err = controller.write(31, false).unwrap_err();
        assert_eq!(err.to_string(), "Pin 31 is not configured as OUTPUT (current: INPUT)");
    }

    #[test]
    fn setup_output_always_resets_to_low() {
        let (controller, _) = controller();
        controller.setup(PIN, Direction::Output).unwrap();
        controller.write(PIN, true).unwrap();

        controller.setup(PIN, Direction::Output).unwrap();
        assert_eq!(controller.state(PIN), Some(PinRuntimeState { direction: Direction::Output, level: false }));

        // twice in a row is the same as once
        let again = controller.setup(PIN, Direction::Output).unwrap();
        assert_eq!(again.state, PinRuntimeState { direction: Direction::Output, level: false });
    }

    #[test]
    fn setup_input_caches_the_sampled_level() {
        let (controller, probe) = controller();
        probe.drive_input(LINE, true);

        let outcome = controller.setup(PIN, Direction::Input).unwrap();
        assert_eq!(outcome.state, PinRuntimeState { direction: Direction::Input, level: true });
        assert_eq!(probe.call_count(DriverOp::ConfigureInput), 1);
        assert_eq!(probe.call_count(DriverOp::ReadLevel), 1);
    }

    #[test]
    fn reading_an_input_samples_exactly_once() {
        let (controller, probe) = controller();
        controller.setup(PIN, Direction::Input).unwrap();
        probe.drive_input(LINE, true);
        probe.clear_calls();

        let outcome = controller.read(PIN).unwrap();
        assert!(outcome.state.level);
        assert_eq!(outcome.message, "Pin 7 state read");
        assert_eq!(probe.calls(), vec![(DriverOp::ReadLevel, Some(LINE))]);
        assert_eq!(controller.state(PIN).map(|s| s.level), Some(true));
    }

    #[test]
    fn reading_a_never_configured_pin_samples_it() {
        let (controller, probe) = controller();
        probe.drive_input(454, true);
        assert!(controller.read(31).unwrap().state.level);
    }

    // The read-back after a write is a sanity check only. A line that does
    // not follow the request is logged, and the cache still reports what was
    // requested rather than what was observed.
    #[test]
    fn readback_mismatch_keeps_the_requested_level() {
        let (controller, probe) = controller();
        controller.setup(PIN, Direction::Output).unwrap();
        probe.stick(LINE, Some(false));

        let outcome = controller.write(PIN, true).unwrap();
        assert!(outcome.state.level);
        assert_eq!(controller.state(PIN).map(|s| s.level), Some(true));
        assert!(controller.read(PIN).unwrap().state.level);
    }

    #[test]
    fn readback_failure_is_swallowed() {
        let (controller, probe) = controller();
        controller.setup(PIN, Direction::Output).unwrap();
        probe.fail_next(DriverOp::ReadLevel, "EIO");

        let outcome = controller.write(PIN, true).unwrap();
        assert!(outcome.state.level);
    }

    #[test]
    fn hardware_failures_are_reported_and_leave_state_alone() {
        let (controller, probe) = controller();

        probe.fail_next(DriverOp::ConfigureOutput, "gpio492: Permission denied");
        let err = controller.setup(PIN, Direction::Output).unwrap_err();
        assert_eq!(err.to_string(), "gpio492: Permission denied");
        assert!(matches!(err, ControlError::HardwareFailure(_)));
        assert_eq!(controller.state(PIN).map(|s| s.direction), Some(Direction::Input));

        controller.setup(PIN, Direction::Output).unwrap();
        probe.fail_next(DriverOp::WriteLevel, "EIO");
        assert!(matches!(controller.write(PIN, true), Err(ControlError::HardwareFailure(_))));
        assert_eq!(controller.state(PIN).map(|s| s.level), Some(false));
    }

    #[test]
    fn input_sample_failure_surfaces_from_setup_and_read() {
        let (controller, probe) = controller();
        probe.fail_next(DriverOp::ReadLevel, "EIO");
        assert!(matches!(controller.setup(PIN, Direction::Input), Err(ControlError::HardwareFailure(_))));

        probe.fail_next(DriverOp::ReadLevel, "EIO");
        assert!(matches!(controller.read(PIN), Err(ControlError::HardwareFailure(_))));
    }

    #[test]
    fn random_writes_are_cached_as_requested() {
        let (controller, probe) = controller();
        let mut rng = rand::thread_rng();
        controller.setup(PIN, Direction::Output).unwrap();

        for _ in 0..200 {
            let level: bool = rng.gen();
            if rng.gen_bool(0.3) {
                probe.stick(LINE, Some(!level));
            } else {
                probe.stick(LINE, None);
            }
            controller.write(PIN, level).unwrap();
            probe.clear_calls();
            assert_eq!(controller.read(PIN).unwrap().state.level, level);
            assert!(probe.calls().is_empty());
        }
    }

    #[test]
    fn snapshot_covers_the_whole_header() {
        let (controller, probe) = controller();
        controller.setup(15, Direction::Output).unwrap();
        controller.write(15, true).unwrap();
        probe.clear_calls();

        let table = controller.snapshot();
        assert_eq!(table.len(), 40);
        assert_eq!(table[&15].direction, Some(Direction::Output));
        assert_eq!(table[&15].state, Some(true));
        assert_eq!(table[&7].direction, Some(Direction::Input));
        assert_eq!(table[&1].direction, None);
        assert!(!table[&19].controllable);
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn shutdown_releases_once() {
        let (controller, probe) = controller();
        controller.setup(PIN, Direction::Output).unwrap();

        controller.shutdown().unwrap();
        controller.shutdown().unwrap();
        assert_eq!(probe.call_count(DriverOp::ReleaseAll), 1);
        assert_eq!(probe.direction(LINE), None);

        let err = controller.write(PIN, true).unwrap_err();
        assert_eq!(err.to_string(), "controller has been shut down");
        assert_eq!(controller.read(4), Err(ControlError::InvalidPin(4)));
    }

    #[test]
    fn failed_release_can_be_retried() {
        let (controller, probe) = controller();
        controller.setup(PIN, Direction::Output).unwrap();

        probe.fail_next(DriverOp::ReleaseAll, "gpio492: Device or resource busy");
        assert!(matches!(controller.shutdown(), Err(ControlError::HardwareFailure(_))));
        assert!(controller.write(PIN, true).is_ok());

        controller.shutdown().unwrap();
        assert_eq!(probe.call_count(DriverOp::ReleaseAll), 2);
        assert_eq!(probe.direction(LINE), None);
    }

    #[test]
    fn setup_waits_for_a_write_in_progress() {
        let (controller, probe) = controller();
        let controller = Arc::new(controller);
        controller.setup(PIN, Direction::Output).unwrap();
        probe.clear_calls();

        let (entered, resume) = probe.pause_next(DriverOp::WriteLevel);
        let writer = {
            let controller = controller.clone();
            thread::spawn(move || controller.write(PIN, true))
        };
        entered.recv().unwrap();

        let configurer = {
            let controller = controller.clone();
            thread::spawn(move || controller.setup(PIN, Direction::Input))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!configurer.is_finished());
        assert_eq!(probe.call_count(DriverOp::ConfigureInput), 0);

        resume.send(()).unwrap();
        assert!(writer.join().unwrap().is_ok());
        assert!(configurer.join().unwrap().is_ok());

        // write and its read-back, then the whole setup
        assert_eq!(probe.calls(), vec![
            (DriverOp::WriteLevel, Some(LINE)),
            (DriverOp::ReadLevel, Some(LINE)),
            (DriverOp::ConfigureInput, Some(LINE)),
            (DriverOp::ReadLevel, Some(LINE)),
        ]);
        assert_eq!(controller.state(PIN).map(|s| s.direction), Some(Direction::Input));
    }
}
