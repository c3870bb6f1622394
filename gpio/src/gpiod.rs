//! GPIO backend using the Linux GPIO character device through the gpiod library.
//!
//! Port `N` is the chip at `/dev/gpiochipN`. Chips are opened by [GpioDriver::enable_clock] and
//! lines are requested from the kernel the first time they are configured.
use crate::{GpioBias, GpioDriver, GpioError, GpioLine, GpioResult};
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

enum Request {
    Input(gpiod::Lines<gpiod::Input>),
    Output(gpiod::Lines<gpiod::Output>),
}

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO lines.
#[derive(Default)]
pub struct GpiodDriver {
    chips: RefCell<HashMap<u32, gpiod::Chip>>,
    requests: RefCell<HashMap<GpioLine, Request>>,
    /// Last level written to each line, applied when the line becomes an output.
    levels: RefCell<HashMap<GpioLine, bool>>,
}

impl GpiodDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn chip_path(port: u32) -> String {
        format!("/dev/gpiochip{}", port)
    }

    fn request(&self, line: GpioLine, direction: Option<GpioBias>) -> GpioResult<()> {
        let chips = self.chips.borrow();
        let chip = chips
            .get(&line.port)
            .ok_or(GpioError::UnknownPort(line.port))?;
        if line.pin as u32 >= chip.num_lines() {
            return Err(GpioError::InvalidArgument);
        }

        // The kernel refuses a second request for a line we already hold.
        self.requests.borrow_mut().remove(&line);

        let offsets = [line.pin as u32];
        let request = match direction {
            Some(bias) => Request::Input(
                chip.request_lines(
                    gpiod::Options::input(offsets)
                        .consumer(env!("CARGO_PKG_NAME"))
                        .bias(bias.into()),
                )?,
            ),
            None => {
                let lines = chip.request_lines(
                    gpiod::Options::output(offsets).consumer(env!("CARGO_PKG_NAME")),
                )?;
                let level = self.levels.borrow().get(&line).copied().unwrap_or(false);
                lines.set_values([level])?;
                Request::Output(lines)
            }
        };

        debug!("Requested {} from {}", line, chip.name());
        self.requests.borrow_mut().insert(line, request);
        Ok(())
    }

    fn drive(&self, line: GpioLine, level: bool) -> GpioResult<()> {
        if !self.chips.borrow().contains_key(&line.port) {
            return Err(GpioError::UnknownPort(line.port));
        }
        self.levels.borrow_mut().insert(line, level);
        if let Some(Request::Output(lines)) = self.requests.borrow().get(&line) {
            lines.set_values([level])?;
        }
        Ok(())
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut ports: Vec<u32> = self.chips.borrow().keys().copied().collect();
        ports.sort_unstable();
        write!(f, "GpiodDriver({:?})", ports)
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

impl GpioDriver for GpiodDriver {
    /// Opens the chip behind the port, if it isn't open yet.
    ///
    /// # Errors
    /// - `GpioError::UnknownPort` if there is no `/dev/gpiochipN` for the port.
    fn enable_clock(&self, line: GpioLine) -> GpioResult<()> {
        if self.chips.borrow().contains_key(&line.port) {
            return Ok(());
        }

        let chip = gpiod::Chip::new(Self::chip_path(line.port))
            .map_err(|_| GpioError::UnknownPort(line.port))?;
        debug!("Opened {} with {} lines", chip.name(), chip.num_lines());
        self.chips.borrow_mut().insert(line.port, chip);
        Ok(())
    }

    fn configure_output(&self, line: GpioLine) -> GpioResult<()> {
        self.request(line, None)
    }

    fn configure_input(&self, line: GpioLine, bias: GpioBias) -> GpioResult<()> {
        self.request(line, Some(bias))
    }

    /// Lines that aren't outputs only remember the level until they become one.
    fn set(&self, line: GpioLine) -> GpioResult<()> {
        self.drive(line, true)
    }

    fn clear(&self, line: GpioLine) -> GpioResult<()> {
        self.drive(line, false)
    }

    fn get(&self, line: GpioLine) -> GpioResult<bool> {
        match self.requests.borrow().get(&line) {
            Some(Request::Input(lines)) => {
                let values = lines.get_values([false])?;
                Ok(values[0])
            }
            Some(Request::Output(_)) => {
                Ok(self.levels.borrow().get(&line).copied().unwrap_or(false))
            }
            None if self.chips.borrow().contains_key(&line.port) => {
                Err(GpioError::InvalidArgument)
            }
            None => Err(GpioError::UnknownPort(line.port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_paths() {
        assert_eq!(GpiodDriver::chip_path(0), "/dev/gpiochip0");
        assert_eq!(GpiodDriver::chip_path(4), "/dev/gpiochip4");
    }

    #[test]
    fn unopened_port_is_unknown() {
        let driver = GpiodDriver::new();
        let line = GpioLine::new(7, 3);
        assert_eq!(driver.set(line), Err(GpioError::UnknownPort(7)));
        assert_eq!(driver.get(line), Err(GpioError::UnknownPort(7)));
        assert_eq!(
            driver.configure_output(line),
            Err(GpioError::UnknownPort(7))
        );
    }

    #[test]
    fn missing_chip_is_unknown_port() {
        let driver = GpiodDriver::new();
        assert_eq!(
            driver.enable_clock(GpioLine::new(9999, 0)),
            Err(GpioError::UnknownPort(9999))
        );
    }
}
