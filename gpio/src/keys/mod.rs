//! Binary key and button input.

mod gpio;

use crate::GpioResult;
use std::fmt::Debug;
pub use gpio::*;

/// The `Keys` trait defines the interface for a set of independent keys, addressed by index.
pub trait Keys: Debug {
    /// Gets the number of keys.
    fn count(&self) -> usize;

    /// Checks whether the key at `id` is pressed.
    fn is_pressed(&self, id: usize) -> GpioResult<bool>;

    /// Gets the indices of all the keys currently pressed.
    fn pressed(&self) -> GpioResult<Vec<usize>> {
        let mut pressed = Vec::new();
        for id in 0..self.count() {
            if self.is_pressed(id)? {
                pressed.push(id);
            }
        }
        Ok(pressed)
    }
}
