pub mod gpiod;
pub mod keys;
pub mod lcd;
pub mod raw;
pub mod sim;

use std::fmt::{Debug, Display, Formatter};
use std::thread::sleep;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("unknown GPIO port {0}")]
    UnknownPort(u32),
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// A single electrical pin, identified by the port (bank, chip) it belongs to and its pin number
/// within that port.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct GpioLine {
    pub port: u32,
    pub pin: u16,
}

impl GpioLine {
    pub const fn new(port: u32, pin: u16) -> Self {
        GpioLine { port, pin }
    }
}

impl Display for GpioLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}.{}", self.port, self.pin)
    }
}

/// Specifies the bias of the GPIO pin.
///
/// You can use this to enable pull-up or pull-down resistors on inputs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

/// The GPIO capability the device drivers are built on.
///
/// Every method takes `&self`, so a single driver can be shared by several device drivers at once
/// (an LCD and a set of keys, for example). Backends are expected to use interior mutability for
/// any bookkeeping they need.
pub trait GpioDriver: Debug {
    /// Enables the clock domain of the port the line belongs to.
    ///
    /// # Errors
    /// - `GpioError::UnknownPort` if the backend has no such port.
    fn enable_clock(&self, line: GpioLine) -> GpioResult<()>;

    /// Configures the line as a push-pull output.
    fn configure_output(&self, line: GpioLine) -> GpioResult<()>;

    /// Configures the line as an input with the given bias.
    fn configure_input(&self, line: GpioLine, bias: GpioBias) -> GpioResult<()>;

    /// Drives the line high.
    fn set(&self, line: GpioLine) -> GpioResult<()>;

    /// Drives the line low.
    fn clear(&self, line: GpioLine) -> GpioResult<()>;

    /// Reads the level of the line.
    fn get(&self, line: GpioLine) -> GpioResult<bool>;

    /// Drives the line to the given level.
    fn write(&self, line: GpioLine, level: bool) -> GpioResult<()> {
        if level {
            self.set(line)
        } else {
            self.clear(line)
        }
    }
}

/// Blocking millisecond delay.
pub trait Delay: Debug {
    fn sleep_ms(&self, ms: u32);
}

/// [Delay] implementation that parks the current thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn sleep_ms(&self, ms: u32) {
        sleep(Duration::from_millis(ms as u64));
    }
}
