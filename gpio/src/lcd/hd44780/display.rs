use crate::GpioResult;
use crate::lcd::hd44780::charset::Charset;
use crate::lcd::hd44780::driver::HD44780Driver;
use log::{debug, warn};
use std::fmt;

/// Capacity of the formatted output buffer, in characters. This is the whole DDRAM of the
/// controller: two rows of 40 characters.
pub const FORMAT_BUFFER_SIZE: usize = 80;

/// DDRAM address of the first character of the second row.
const SECOND_ROW_ADDRESS: u8 = 0x40;

/// A character position on the display. `(0, 0)` is the top left corner.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Position {
    pub column: u8,
    pub row: u8,
}

impl Position {
    pub const fn new(column: u8, row: u8) -> Self {
        Position { column, row }
    }
}

/// Cursor tracking and text output on top of an [HD44780Driver].
///
/// The cursor is the driver's own mirror of the controller's address counter. It is updated by
/// every method here and is never read back from the controller. Only two rows are addressable:
/// row 0 starts at DDRAM address `0x00` and row 1 at `0x40`.
///
/// Implementors provide the display width, the character set and storage for the cursor; all the
/// positioning and text logic is in the default methods.
pub trait HD44780Display: HD44780Driver {
    /// Characters per row.
    fn width(&self) -> u8;

    /// Character set used by [Self::put_char].
    fn charset(&self) -> Charset;

    /// Gets the current cursor position.
    fn cursor(&self) -> Position;

    /// Records the cursor position without sending anything to the controller.
    fn store_cursor(&mut self, position: Position);

    /// Moves the cursor to the given column and row.
    ///
    /// A column past the end of the row wraps to the start of the next row. Rows other than 0 and
    /// 1 can't be addressed and move the cursor home instead. The wrap is applied first, so
    /// wrapping off the end of row 1 lands home too.
    fn move_to(&mut self, column: u8, row: u8) -> GpioResult<()> {
        let (mut column, mut row) = (column, row);

        if column >= self.width() {
            row = row.wrapping_add(1);
            column = 0;
        }

        let base = match row {
            0 => 0x00,
            1 => SECOND_ROW_ADDRESS,
            _ => {
                debug!("Row {} is not addressable, moving home", row);
                row = 0;
                column = 0;
                0x00
            }
        };

        self.set_ddram_address(column.wrapping_add(base))?;
        self.store_cursor(Position::new(column, row));
        Ok(())
    }

    /// Moves the cursor to the start of the next row.
    fn newline(&mut self) -> GpioResult<()> {
        let row = self.cursor().row.wrapping_add(1);
        self.move_to(0, row)
    }

    /// Writes a raw controller code at the cursor and advances the cursor, wrapping at the end of
    /// the row. Codes `0..8` show the user-defined glyphs.
    fn put_code(&mut self, code: u8) -> GpioResult<()> {
        self.send_data(code)?;
        let cursor = self.cursor();
        self.move_to(cursor.column.wrapping_add(1), cursor.row)
    }

    /// Writes a character at the cursor and advances the cursor.
    ///
    /// Characters the [Self::charset] can't encode are written as `?`.
    fn put_char(&mut self, ch: char) -> GpioResult<()> {
        let code = match self.charset().encode(ch) {
            Some(code) => code,
            None => {
                warn!("Character {:?} can't be shown, writing '?'", ch);
                b'?'
            }
        };
        self.put_code(code)
    }

    /// Moves the cursor and writes a character there.
    fn put_char_at(&mut self, column: u8, row: u8, ch: char) -> GpioResult<()> {
        self.move_to(column, row)?;
        self.put_char(ch)
    }

    /// Renders `args` and writes the result at the cursor.
    ///
    /// Output past [FORMAT_BUFFER_SIZE] characters is dropped. A `'\n'` moves to the next row
    /// instead of being written. Returns the number of characters rendered.
    ///
    /// See [lcd_print!](crate::lcd_print) for a `format!`-like wrapper.
    fn formatted(&mut self, args: fmt::Arguments<'_>) -> GpioResult<usize> {
        let mut buffer = FormatBuffer::new();
        if fmt::write(&mut buffer, args).is_err() {
            warn!("Formatting failed, writing partial output");
        }

        for &ch in buffer.as_chars() {
            if ch == '\n' {
                self.newline()?;
            } else {
                self.put_char(ch)?;
            }
        }

        Ok(buffer.as_chars().len())
    }

    /// Moves the cursor, then works like [Self::formatted].
    fn formatted_at(&mut self, column: u8, row: u8, args: fmt::Arguments<'_>) -> GpioResult<usize> {
        self.move_to(column, row)?;
        self.formatted(args)
    }

    /// Writes a string at the cursor, like [Self::formatted].
    fn print(&mut self, text: &str) -> GpioResult<usize> {
        self.formatted(format_args!("{}", text))
    }
}

/// Fixed-size render target that drops everything past its capacity.
struct FormatBuffer {
    chars: [char; FORMAT_BUFFER_SIZE],
    len: usize,
}

impl FormatBuffer {
    fn new() -> Self {
        FormatBuffer {
            chars: ['\0'; FORMAT_BUFFER_SIZE],
            len: 0,
        }
    }

    fn as_chars(&self) -> &[char] {
        &self.chars[..self.len]
    }
}

impl fmt::Write for FormatBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if self.len == FORMAT_BUFFER_SIZE {
                break;
            }
            self.chars[self.len] = ch;
            self.len += 1;
        }
        Ok(())
    }
}

/// Writes formatted text at the cursor of an [HD44780Display].
///
/// ```ignore
/// lcd_print!(lcd, "{} C", temperature)?;
/// ```
#[macro_export]
macro_rules! lcd_print {
    ($lcd:expr, $($arg:tt)*) => {{
        use $crate::lcd::hd44780::HD44780Display as _;
        $lcd.formatted(format_args!($($arg)*))
    }};
}

/// Writes formatted text starting at the given column and row of an [HD44780Display].
///
/// ```ignore
/// lcd_print_at!(lcd, 0, 1, "{:02}:{:02}", hour, minute)?;
/// ```
#[macro_export]
macro_rules! lcd_print_at {
    ($lcd:expr, $column:expr, $row:expr, $($arg:tt)*) => {{
        use $crate::lcd::hd44780::HD44780Display as _;
        $lcd.formatted_at($column, $row, format_args!($($arg)*))
    }};
}
