use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use log::debug;
use webgpio_common::hal::gpio::{Direction, GpioDriver};
use webgpio_common::hal::{HalError, HalErrorKind, HalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    ConfigureOutput,
    ConfigureInput,
    ReadLevel,
    WriteLevel,
    ReleaseAll,
}

#[derive(Debug, Default, Clone, Copy)]
struct SimLine {
    direction: Option<Direction>,
    level: bool,
    /// Value returned by reads regardless of what is driven
    stuck: Option<bool>,
}

#[derive(Debug)]
struct Pause {
    entered: Sender<()>,
    resume: Receiver<()>,
}

#[derive(Debug, Default)]
struct Bench {
    lines: HashMap<u32, SimLine>,
    calls: Vec<(DriverOp, Option<u32>)>,
    failures: HashMap<DriverOp, String>,
    pauses: HashMap<DriverOp, Pause>,
}

impl Bench {
    fn call(&mut self, op: DriverOp, line: Option<u32>) -> HalResult<()> {
        self.calls.push((op, line));
        match self.failures.remove(&op) {
            Some(message) => Err(HalError::new(HalErrorKind::Io, message)),
            None => Ok(()),
        }
    }
}

/// In-memory GPIO lines.
///
/// Clones share the same bench, so a handle kept aside can stimulate inputs
/// and inspect the calls made by the controller that owns the driver.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDriver {
    bench: Arc<Mutex<Bench>>,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn bench(&self) -> MutexGuard<'_, Bench> {
        self.bench.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Electrical level applied to a line from outside the board
    pub fn drive_input(&self, line: u32, level: bool) {
        self.bench().lines.entry(line).or_default().level = level;
    }

    /// Make reads of `line` return `level` no matter what is written
    pub fn stick(&self, line: u32, level: Option<bool>) {
        self.bench().lines.entry(line).or_default().stuck = level;
    }

    /// Fail the next call of `op` with `message`
    pub fn fail_next(&self, op: DriverOp, message: &str) {
        self.bench().failures.insert(op, message.to_string());
    }

    /// Block the next call of `op` before it does anything.
    ///
    /// The first receiver gets a message once the call is blocked; the call
    /// goes on when the returned sender is used or dropped.
    pub fn pause_next(&self, op: DriverOp) -> (Receiver<()>, Sender<()>) {
        let (entered, entered_rx) = mpsc::channel();
        let (resume_tx, resume) = mpsc::channel();
        self.bench().pauses.insert(op, Pause { entered, resume });
        (entered_rx, resume_tx)
    }

    // Waits outside the bench lock so the paused call can still be inspected
    fn wait_if_paused(&self, op: DriverOp) {
        let pause = self.bench().pauses.remove(&op);
        if let Some(pause) = pause {
            let _ = pause.entered.send(());
            let _ = pause.resume.recv();
        }
    }

    pub fn calls(&self) -> Vec<(DriverOp, Option<u32>)> {
        self.bench().calls.clone()
    }

    pub fn call_count(&self, op: DriverOp) -> usize {
        self.bench().calls.iter().filter(|(o, _)| *o == op).count()
    }

    pub fn clear_calls(&self) {
        self.bench().calls.clear();
    }

    pub fn direction(&self, line: u32) -> Option<Direction> {
        self.bench().lines.get(&line).and_then(|l| l.direction)
    }

    pub fn level(&self, line: u32) -> bool {
        self.bench().lines.get(&line).map_or(false, |l| l.level)
    }
}

impl GpioDriver for SimulatedDriver {
    fn configure_output(&mut self, line: u32) -> HalResult<()> {
        self.wait_if_paused(DriverOp::ConfigureOutput);
        let mut bench = self.bench();
        bench.call(DriverOp::ConfigureOutput, Some(line))?;
        let sim = bench.lines.entry(line).or_default();
        sim.direction = Some(Direction::Output);
        sim.level = false;
        debug!("sim: line {} -> OUTPUT low", line);
        Ok(())
    }

    fn configure_input(&mut self, line: u32) -> HalResult<()> {
        self.wait_if_paused(DriverOp::ConfigureInput);
        let mut bench = self.bench();
        bench.call(DriverOp::ConfigureInput, Some(line))?;
        bench.lines.entry(line).or_default().direction = Some(Direction::Input);
        debug!("sim: line {} -> INPUT", line);
        Ok(())
    }

    fn read_level(&mut self, line: u32) -> HalResult<bool> {
        self.wait_if_paused(DriverOp::ReadLevel);
        let mut bench = self.bench();
        bench.call(DriverOp::ReadLevel, Some(line))?;
        let sim = bench.lines.get(&line).copied().unwrap_or_default();
        Ok(sim.stuck.unwrap_or(sim.level))
    }

    fn write_level(&mut self, line: u32, value: bool) -> HalResult<()> {
        self.wait_if_paused(DriverOp::WriteLevel);
        let mut bench = self.bench();
        bench.call(DriverOp::WriteLevel, Some(line))?;
        let sim = bench.lines.entry(line).or_default();
        if sim.direction != Some(Direction::Output) {
            return Err(HalError::new(HalErrorKind::InvalidGpioMode, format!("line {} is not an output", line)));
        }
        sim.level = value;
        debug!("sim: line {} <- {}", line, value as u8);
        Ok(())
    }

    fn release_all(&mut self) -> HalResult<()> {
        self.wait_if_paused(DriverOp::ReleaseAll);
        let mut bench = self.bench();
        bench.call(DriverOp::ReleaseAll, None)?;
        for sim in bench.lines.values_mut() {
            sim.direction = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_output_drives_low() {
        let mut driver = SimulatedDriver::new();
        driver.drive_input(7, true);
        driver.configure_output(7).unwrap();
        assert_eq!(driver.direction(7), Some(Direction::Output));
        assert!(!driver.read_level(7).unwrap());
    }

    #[test]
    fn writing_an_input_line_is_rejected() {
        let mut driver = SimulatedDriver::new();
        driver.configure_input(3).unwrap();
        let err = driver.write_level(3, true).unwrap_err();
        assert_eq!(err.kind(), HalErrorKind::InvalidGpioMode);
    }

    #[test]
    fn injected_failures_are_one_shot() {
        let mut driver = SimulatedDriver::new();
        driver.fail_next(DriverOp::ReadLevel, "EIO");
        assert_eq!(driver.read_level(1).unwrap_err().message(), "EIO");
        assert!(driver.read_level(1).is_ok());
        assert_eq!(driver.call_count(DriverOp::ReadLevel), 2);
    }

    #[test]
    fn stuck_lines_ignore_writes() {
        let mut driver = SimulatedDriver::new();
        driver.configure_output(5).unwrap();
        driver.stick(5, Some(false));
        driver.write_level(5, true).unwrap();
        assert!(driver.level(5));
        assert!(!driver.read_level(5).unwrap());
    }

    #[test]
    fn paused_calls_wait_for_resume() {
        let probe = SimulatedDriver::new();
        let mut driver = probe.clone();
        driver.configure_output(4).unwrap();
        let (entered, resume) = probe.pause_next(DriverOp::WriteLevel);

        let writer = std::thread::spawn(move || driver.write_level(4, true));
        entered.recv().unwrap();
        assert!(!probe.level(4));
        resume.send(()).unwrap();

        writer.join().unwrap().unwrap();
        assert!(probe.level(4));
    }

    #[test]
    fn clones_share_the_bench() {
        let probe = SimulatedDriver::new();
        let mut driver = probe.clone();
        driver.configure_input(9).unwrap();
        probe.drive_input(9, true);
        assert!(driver.read_level(9).unwrap());
        driver.release_all().unwrap();
        assert_eq!(probe.direction(9), None);
        assert_eq!(probe.calls().last(), Some(&(DriverOp::ReleaseAll, None)));
    }
}
