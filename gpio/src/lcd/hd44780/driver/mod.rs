//! HD44780 driver module.
//!
//! See [HD44780Driver] for the controller's instruction set, and [GpioHD44780Driver] for the
//! implementation talking to the controller over bit-banged GPIO lines.
//!
//! # Sources
//!
//! - Hitachi, “HD44780U (LCD-II) Dot Matrix Liquid Crystal Display Controller/Driver,”
//!   ADE-207-272(Z), '99.9, Rev. 0.0.

mod gpio;

use crate::GpioResult;
use crate::lcd::hd44780::charset::Charset;
use std::fmt::Debug;
pub use gpio::*;

pub(crate) const CLEAR_DISPLAY: u8 = 0b00000001;
pub(crate) const RETURN_HOME: u8 = 0b00000010;
pub(crate) const ENTRY_MODE_SET: u8 = 0b00000100;
pub(crate) const DISPLAY_CONTROL: u8 = 0b00001000;
pub(crate) const CURSOR_SHIFT: u8 = 0b00010000;
pub(crate) const FUNCTION_SET: u8 = 0b00100000;
pub(crate) const FUNCTION_SET_8BIT: u8 = 0b00010000;
pub(crate) const SET_CGRAM_ADDRESS: u8 = 0b01000000;
pub(crate) const SET_DDRAM_ADDRESS: u8 = 0b10000000;

const CGRAM_ADDRESS_MASK: u8 = 0b00111111;
const DDRAM_ADDRESS_MASK: u8 = 0b01111111;

/// The `HD44780Driver` trait is the instruction set of the HD44780 controller.
///
/// Every command is built here from its fixed opcode and the flags passed in, and handed to
/// [HD44780Driver::send_command]. Implementors only provide the transport ([Self::send_command],
/// [Self::send_data]) and may override a command to keep their own state in sync, like
/// [GpioHD44780Driver] does for [Self::clear_display] and [Self::return_home].
pub trait HD44780Driver: Debug {
    /// Clears the display and sets the cursor to the home position.
    ///
    /// Command: `00000001`.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(CLEAR_DISPLAY)
    }

    /// Sets the cursor to the home position and undoes any display shift.
    ///
    /// Command: `0000001?`.
    fn return_home(&mut self) -> GpioResult<()> {
        self.send_command(RETURN_HOME)
    }

    /// Sets how the address counter moves after a character is written, and whether the display
    /// shifts along with it.
    ///
    /// Command: `000001IS`.
    /// `I` is `1` when the address is incremented (cursor moves right), `0` when decremented.
    /// `S` is `1` for display shift.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> GpioResult<()> {
        let mut command = ENTRY_MODE_SET;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Turns the display on or off, and controls the cursor and its blinking.
    ///
    /// Command: `00001DCB`.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> GpioResult<()> {
        let mut command = DISPLAY_CONTROL;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Moves the cursor or shifts the whole display by one position, without touching DDRAM.
    ///
    /// Command: `0001SR??`.
    /// `S` is `1` for display shift, `0` for cursor move.
    /// `R` is `1` for right, `0` for left.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> GpioResult<()> {
        let mut command = CURSOR_SHIFT;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the interface data length, number of display lines and font.
    ///
    /// Command: `001DNF??`.
    /// `D` is `1` for 8-bit data length, `0` for 4-bit.
    /// `N` is `1` for two lines, which is set whenever `lines` is more than one.
    /// `F` is `1` for the 5x10 dots font, `0` for 5x8.
    fn function_set(&mut self, data_length: bool, lines: u8, big_font: bool) -> GpioResult<()> {
        let mut command = FUNCTION_SET;
        if data_length {
            command |= FUNCTION_SET_8BIT;
        }
        if lines > 1 {
            command |= 0b00001000;
        }
        if big_font {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the CGRAM (custom character memory) address. Only the low 6 bits are used.
    ///
    /// Command: `01AAAAAA`.
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        self.send_command(SET_CGRAM_ADDRESS + (address & CGRAM_ADDRESS_MASK))
    }

    /// Sets the DDRAM (display memory) address. Only the low 7 bits are used.
    ///
    /// Command: `1AAAAAAA`.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        self.send_command(SET_DDRAM_ADDRESS + (address & DDRAM_ADDRESS_MASK))
    }

    /// Writes a user-defined glyph to CGRAM, starting at `address`. Each byte of `pattern` is one
    /// row of the glyph bitmap, low 5 bits used.
    ///
    /// The controller keeps addressing CGRAM afterwards, so set a DDRAM address (or move the
    /// cursor) before writing characters again.
    fn define_char(&mut self, address: u8, pattern: &[u8]) -> GpioResult<()> {
        self.set_cgram_address(address)?;
        for &row in pattern {
            self.send_data(row)?;
        }
        Ok(())
    }

    /// Writes the glyph for character code `slot` (`0..8`) as 8 rows of a 5x8 font.
    fn define_glyph(&mut self, slot: u8, rows: [u8; 8]) -> GpioResult<()> {
        self.define_char((slot & 0b111) << 3, &rows)
    }

    /// Reports whether the controller is busy.
    ///
    /// **⚠️ The busy flag is never read back.** Implementations wait for a fixed time instead and
    /// report busy regardless.
    fn is_busy(&mut self) -> GpioResult<bool>;

    /// Sends a command to the HD44780 controller.
    /// Sets the RS pin to 0 (command).
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends data to the HD44780 controller.
    /// Sets the RS pin to 1 (data).
    fn send_data(&mut self, data: u8) -> GpioResult<()>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing/reading data.
    Left,
    /// Moves the cursor to the right after writing/reading data.
    Right,
}

/// Width of the data bus between the MCU and the controller.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum BusMode {
    /// DB7..DB4 only, every byte sent as two nibbles, high nibble first.
    #[default]
    Bus4Bit,
    /// DB7..DB0, one transfer per byte.
    Bus8Bit,
}

impl BusMode {
    pub fn is_8bit(&self) -> bool {
        matches!(self, BusMode::Bus8Bit)
    }

    pub fn is_4bit(&self) -> bool {
        matches!(self, BusMode::Bus4Bit)
    }
}

/// Display geometry and driver options, fixed at initialization.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Hd44780Config {
    /// Characters per row.
    pub width: u8,
    pub bus_mode: BusMode,
    /// Number of display lines, passed to the function set command.
    pub lines: u8,
    /// 5x10 dots font.
    pub big_font: bool,
    /// Character set the text output is translated with.
    pub charset: Charset,
}

impl Default for Hd44780Config {
    fn default() -> Self {
        Hd44780Config {
            width: 16,
            bus_mode: BusMode::Bus4Bit,
            lines: 2,
            big_font: false,
            charset: Charset::Native,
        }
    }
}

impl Hd44780Config {
    pub fn with_width(mut self, width: u8) -> Self {
        self.width = width;
        self
    }

    pub fn with_bus_mode(mut self, bus_mode: BusMode) -> Self {
        self.bus_mode = bus_mode;
        self
    }

    pub fn with_lines(mut self, lines: u8) -> Self {
        self.lines = lines;
        self
    }

    pub fn with_big_font(mut self, big_font: bool) -> Self {
        self.big_font = big_font;
        self
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }
}
