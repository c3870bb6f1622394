//! Simulated GPIO backend.
//!
//! [SimGpioDriver] drives no hardware at all. It records every call made through the
//! [GpioDriver] and [Delay] traits as a [SimEvent], keeps track of the level of every line, and can
//! sample a set of lines at each falling edge of a strobe line. This is how the device drivers are
//! tested, and how the demo binary runs without a display attached.
use crate::{Delay, GpioBias, GpioDriver, GpioError, GpioLine, GpioResult};
use log::trace;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

/// A single recorded call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SimEvent {
    EnableClock(GpioLine),
    ConfigureOutput(GpioLine),
    ConfigureInput(GpioLine, GpioBias),
    Set(GpioLine),
    Clear(GpioLine),
    Delay(u32),
}

#[derive(Debug, Default)]
pub struct SimGpioDriver {
    ports: Option<BTreeSet<u32>>,
    events: RefCell<Vec<SimEvent>>,
    baseline: RefCell<HashMap<GpioLine, bool>>,
    levels: RefCell<HashMap<GpioLine, bool>>,
    inputs: RefCell<HashMap<GpioLine, bool>>,
    biases: RefCell<HashMap<GpioLine, GpioBias>>,
}

impl SimGpioDriver {
    /// Creates a simulator that accepts lines on any port.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a simulator that only knows the given ports. Enabling the clock of a line on any
    /// other port fails with [GpioError::UnknownPort].
    pub fn with_ports(ports: impl IntoIterator<Item = u32>) -> Self {
        SimGpioDriver {
            ports: Some(ports.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Returns a copy of the recorded events.
    pub fn events(&self) -> Vec<SimEvent> {
        self.events.borrow().clone()
    }

    /// Forgets the recorded events. Line levels are kept, so [Self::strobes] keeps working on the
    /// events recorded afterwards.
    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
        *self.baseline.borrow_mut() = self.levels.borrow().clone();
    }

    /// Gets the level the line is currently driven to. Lines never driven read as low.
    pub fn level(&self, line: GpioLine) -> bool {
        self.levels.borrow().get(&line).copied().unwrap_or(false)
    }

    /// Injects the level an input line reads as, overriding its bias and driven level.
    pub fn set_input(&self, line: GpioLine, level: bool) {
        self.inputs.borrow_mut().insert(line, level);
    }

    /// Sum of all recorded delays, in milliseconds.
    pub fn total_delay_ms(&self) -> u64 {
        self.events
            .borrow()
            .iter()
            .map(|event| match event {
                SimEvent::Delay(ms) => *ms as u64,
                _ => 0,
            })
            .sum()
    }

    /// Replays the recorded events and samples `lines` every time `strobe` goes from high to low.
    ///
    /// Each returned entry holds the levels of `lines`, in the given order.
    pub fn strobes(&self, strobe: GpioLine, lines: &[GpioLine]) -> Vec<Vec<bool>> {
        let mut levels = self.baseline.borrow().clone();
        let mut samples = Vec::new();

        for event in self.events.borrow().iter() {
            match *event {
                SimEvent::Set(line) => {
                    levels.insert(line, true);
                }
                SimEvent::Clear(line) => {
                    let was_high = levels.insert(line, false).unwrap_or(false);
                    if line == strobe && was_high {
                        samples.push(
                            lines
                                .iter()
                                .map(|l| levels.get(l).copied().unwrap_or(false))
                                .collect(),
                        );
                    }
                }
                _ => {}
            }
        }

        samples
    }

    fn record(&self, event: SimEvent) {
        trace!("{:?}", event);
        self.events.borrow_mut().push(event);
    }
}

impl GpioDriver for SimGpioDriver {
    fn enable_clock(&self, line: GpioLine) -> GpioResult<()> {
        if let Some(ports) = &self.ports {
            if !ports.contains(&line.port) {
                return Err(GpioError::UnknownPort(line.port));
            }
        }
        self.record(SimEvent::EnableClock(line));
        Ok(())
    }

    fn configure_output(&self, line: GpioLine) -> GpioResult<()> {
        self.biases.borrow_mut().remove(&line);
        self.record(SimEvent::ConfigureOutput(line));
        Ok(())
    }

    fn configure_input(&self, line: GpioLine, bias: GpioBias) -> GpioResult<()> {
        self.biases.borrow_mut().insert(line, bias);
        self.record(SimEvent::ConfigureInput(line, bias));
        Ok(())
    }

    fn set(&self, line: GpioLine) -> GpioResult<()> {
        self.levels.borrow_mut().insert(line, true);
        self.record(SimEvent::Set(line));
        Ok(())
    }

    fn clear(&self, line: GpioLine) -> GpioResult<()> {
        self.levels.borrow_mut().insert(line, false);
        self.record(SimEvent::Clear(line));
        Ok(())
    }

    fn get(&self, line: GpioLine) -> GpioResult<bool> {
        if let Some(&level) = self.inputs.borrow().get(&line) {
            return Ok(level);
        }
        match self.biases.borrow().get(&line) {
            Some(GpioBias::PullUp) => Ok(true),
            Some(GpioBias::PullDown) => Ok(false),
            _ => Ok(self.level(line)),
        }
    }
}

impl Delay for SimGpioDriver {
    fn sleep_ms(&self, ms: u32) {
        self.record(SimEvent::Delay(ms));
    }
}
