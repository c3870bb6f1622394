use crate::keys::Keys;
use crate::{GpioBias, GpioDriver, GpioError, GpioLine, GpioResult};
use log::debug;
use std::fmt::{Debug, Formatter};

/// Describes how a single key is wired.
///
/// Keys are expected to pull their line low when closed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyDescriptor {
    pub line: GpioLine,
    /// Enable the pull-up resistor of the line.
    pub pull_up: bool,
    /// The key is normally closed, so it opens when pressed.
    pub normally_closed: bool,
    /// Key code assigned to the key.
    pub code: Option<u8>,
    pub name: Option<&'static str>,
}

impl KeyDescriptor {
    pub const fn new(line: GpioLine) -> Self {
        KeyDescriptor {
            line,
            pull_up: false,
            normally_closed: false,
            code: None,
            name: None,
        }
    }

    pub const fn with_pull_up(mut self) -> Self {
        self.pull_up = true;
        self
    }

    pub const fn with_normally_closed(mut self) -> Self {
        self.normally_closed = true;
        self
    }

    pub const fn with_code(mut self, code: u8) -> Self {
        self.code = Some(code);
        self
    }

    pub const fn with_name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }
}

/// The `GpioKeys` struct reads a set of keys, each wired to its own GPIO line.
///
/// There is no debouncing: every read samples the line once.
pub struct GpioKeys<'a> {
    gpio: &'a dyn GpioDriver,
    keys: &'a [KeyDescriptor],
}

impl Debug for GpioKeys<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpioKeys({:?}, {} keys)", self.gpio, self.keys.len())
    }
}

impl<'a> GpioKeys<'a> {
    pub fn new(gpio: &'a dyn GpioDriver, keys: &'a [KeyDescriptor]) -> Self {
        GpioKeys { gpio, keys }
    }

    /// Configures every key line as an input.
    ///
    /// Each line gets its clock enabled and is switched to input, with a pull-up if the key asks
    /// for one. The line is then driven high, which enables the pull-up on ports that take it from
    /// the output register.
    pub fn setup(&self) -> GpioResult<()> {
        for key in self.keys {
            self.gpio.enable_clock(key.line)?;
            let bias = if key.pull_up {
                GpioBias::PullUp
            } else {
                GpioBias::None
            };
            self.gpio.configure_input(key.line, bias)?;
            self.gpio.set(key.line)?;
        }
        debug!("{} keys configured", self.keys.len());
        Ok(())
    }

    pub fn descriptors(&self) -> &[KeyDescriptor] {
        self.keys
    }

    /// Finds the index of the key with the given name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.keys.iter().position(|key| key.name == Some(name))
    }

    /// Gets the code assigned to the key at `id`.
    pub fn code(&self, id: usize) -> Option<u8> {
        self.keys.get(id).and_then(|key| key.code)
    }
}

impl Keys for GpioKeys<'_> {
    fn count(&self) -> usize {
        self.keys.len()
    }

    /// A key reads as pressed when its line is low, inverted for normally closed keys.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if there is no key at `id`.
    fn is_pressed(&self, id: usize) -> GpioResult<bool> {
        let key = self.keys.get(id).ok_or(GpioError::InvalidArgument)?;
        let closed = !self.gpio.get(key.line)?;
        Ok(closed ^ key.normally_closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEvent, SimGpioDriver};

    const KEYS: [KeyDescriptor; 3] = [
        KeyDescriptor::new(GpioLine::new(2, 0))
            .with_pull_up()
            .with_name("ok")
            .with_code(b'\n'),
        KeyDescriptor::new(GpioLine::new(2, 1))
            .with_pull_up()
            .with_normally_closed()
            .with_name("stop"),
        KeyDescriptor::new(GpioLine::new(2, 2)),
    ];

    #[test]
    fn setup_configures_inputs() {
        let sim = SimGpioDriver::new();
        let keys = GpioKeys::new(&sim, &KEYS);

        keys.setup().unwrap();

        let events = sim.events();
        assert_eq!(
            &events[..3],
            &[
                SimEvent::EnableClock(KEYS[0].line),
                SimEvent::ConfigureInput(KEYS[0].line, GpioBias::PullUp),
                SimEvent::Set(KEYS[0].line),
            ]
        );
        assert_eq!(events[7], SimEvent::ConfigureInput(KEYS[2].line, GpioBias::None));
        assert_eq!(events.len(), 9);
    }

    #[test]
    fn polarity_follows_contact_type() {
        let sim = SimGpioDriver::new();
        let keys = GpioKeys::new(&sim, &KEYS);
        keys.setup().unwrap();

        // pulled up and nothing pressed, but the normally closed contact is open
        sim.set_input(KEYS[1].line, true);
        assert_eq!(keys.is_pressed(0), Ok(false));
        assert_eq!(keys.is_pressed(1), Ok(true));

        sim.set_input(KEYS[0].line, false);
        sim.set_input(KEYS[1].line, false);
        sim.set_input(KEYS[2].line, true);
        assert_eq!(keys.is_pressed(0), Ok(true));
        assert_eq!(keys.is_pressed(1), Ok(false));
        assert_eq!(keys.pressed(), Ok(vec![0]));
    }

    #[test]
    fn unknown_key_is_invalid() {
        let sim = SimGpioDriver::new();
        let keys = GpioKeys::new(&sim, &KEYS);
        assert_eq!(keys.is_pressed(3), Err(GpioError::InvalidArgument));
    }

    #[test]
    fn lookup_by_name_and_code() {
        let sim = SimGpioDriver::new();
        let keys = GpioKeys::new(&sim, &KEYS);
        assert_eq!(keys.find("stop"), Some(1));
        assert_eq!(keys.find("menu"), None);
        assert_eq!(keys.code(0), Some(b'\n'));
        assert_eq!(keys.code(2), None);
    }

    #[test]
    fn unknown_port_fails_setup() {
        let sim = SimGpioDriver::with_ports([0, 1]);
        let keys = GpioKeys::new(&sim, &KEYS);
        assert_eq!(keys.setup(), Err(GpioError::UnknownPort(2)));
    }
}
