//! HD44780 LCD module.
//!
//! The [driver] module holds the controller's instruction set ([driver::HD44780Driver]) and the
//! bit-banged GPIO transport ([driver::GpioHD44780Driver]). Cursor tracking and text output are
//! layered on top by the [HD44780Display] trait, and [charset] translates characters the
//! controller's ROM doesn't place at their Unicode code point.

pub mod charset;
pub mod driver;
mod display;

pub use display::*;
