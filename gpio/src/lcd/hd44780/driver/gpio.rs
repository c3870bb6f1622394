use crate::lcd::hd44780::charset::Charset;
use crate::lcd::hd44780::driver::{
    BusMode, CLEAR_DISPLAY, CursorDirection, FUNCTION_SET, FUNCTION_SET_8BIT, HD44780Driver,
    Hd44780Config, RETURN_HOME,
};
use crate::lcd::hd44780::{HD44780Display, Position};
use crate::{Delay, GpioDriver, GpioError, GpioLine, GpioResult};
use log::{debug, trace};

/// Settle time after power-up, before the first command.
const POWER_ON_DELAY_MS: u32 = 40;
/// Wait after each of the 4-bit synchronization nibbles.
const SYNC_DELAY_MS: u32 = 15;
/// Time E is held high, and then low, for every transfer.
const PULSE_DELAY_MS: u32 = 1;
/// Extra wait after return home, the slowest instruction.
const RETURN_HOME_DELAY_MS: u32 = 2;
/// Wait standing in for a busy flag read.
const BUSY_DELAY_MS: u32 = 1;

/// The GPIO lines wired to the controller.
///
/// The data lines are listed from DB7 down. With a 4-bit bus only DB7..DB4 are wired and
/// [Self::low] is `None`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Hd44780Bus {
    /// Register select.
    pub rs: GpioLine,
    /// Enable.
    pub e: GpioLine,
    /// Read/write select, held low.
    pub rnw: GpioLine,
    /// DB7, DB6, DB5, DB4.
    pub high: [GpioLine; 4],
    /// DB3, DB2, DB1, DB0.
    pub low: Option<[GpioLine; 4]>,
}

impl Hd44780Bus {
    /// Creates a descriptor for a 4-bit bus. `data` is DB7..DB4.
    pub fn new_4bit(rs: GpioLine, e: GpioLine, rnw: GpioLine, data: [GpioLine; 4]) -> Self {
        Hd44780Bus {
            rs,
            e,
            rnw,
            high: data,
            low: None,
        }
    }

    /// Creates a descriptor for an 8-bit bus. `data` is DB7..DB0.
    pub fn new_8bit(rs: GpioLine, e: GpioLine, rnw: GpioLine, data: [GpioLine; 8]) -> Self {
        Hd44780Bus {
            rs,
            e,
            rnw,
            high: [data[0], data[1], data[2], data[3]],
            low: Some([data[4], data[5], data[6], data[7]]),
        }
    }

    /// Gets the lines used in the given bus mode: RS, E, RNW, then the data lines from DB7 down.
    pub fn lines(&self, bus_mode: BusMode) -> Vec<GpioLine> {
        let mut lines = vec![self.rs, self.e, self.rnw];
        lines.extend_from_slice(&self.high);
        if bus_mode.is_8bit() {
            if let Some(low) = &self.low {
                lines.extend_from_slice(low);
            }
        }
        lines
    }
}

/// GpioHD44780Driver drives an HD44780 controller by bit-banging its bus over a [GpioDriver].
///
/// Only writes are ever performed: RNW is held low and the busy flag is never read. Instead, every
/// transfer holds E high for 1 ms and then gives the controller 1 ms to latch it, which covers
/// every instruction apart from return home, which gets 2 ms more.
///
/// The driver mirrors the controller's address counter in its own cursor ([HD44780Display]). The
/// mirror is never resynchronized, so commands sent around this driver make it drift.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a> {
    gpio: &'a dyn GpioDriver,
    delay: &'a dyn Delay,
    bus: &'a Hd44780Bus,
    config: Hd44780Config,
    cursor: Position,
}

impl<'a> GpioHD44780Driver<'a> {
    /// Creates a new driver. Nothing is sent to the controller until [Self::init] is called.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the width is zero, or an 8-bit bus is configured on a
    ///   descriptor without DB3..DB0.
    pub fn new(
        gpio: &'a dyn GpioDriver,
        delay: &'a dyn Delay,
        bus: &'a Hd44780Bus,
        config: Hd44780Config,
    ) -> GpioResult<Self> {
        if config.width == 0 {
            return Err(GpioError::InvalidArgument);
        }
        if config.bus_mode.is_8bit() && bus.low.is_none() {
            return Err(GpioError::InvalidArgument);
        }

        Ok(GpioHD44780Driver {
            gpio,
            delay,
            bus,
            config,
            cursor: Position::default(),
        })
    }

    pub fn config(&self) -> &Hd44780Config {
        &self.config
    }

    pub fn bus(&self) -> &Hd44780Bus {
        self.bus
    }

    /// Configures the bus lines and runs the power-on sequence of the controller.
    ///
    /// Every line is clocked, driven low, and only then switched to output. After the power-on
    /// settle time, a 4-bit bus is synchronized by sending the `0011` nibble three times, so the
    /// controller ends up in 8-bit mode whatever state it was in, followed by `0010` to switch it
    /// to 4-bit mode.
    ///
    /// Then the default configuration is applied:
    /// - function set with the configured number of lines,
    /// - display on, cursor off, blinking off,
    /// - entry mode incrementing without shift,
    /// - cursor shift reset,
    /// - clear display and return home.
    pub fn init(&mut self) -> GpioResult<()> {
        self.cursor = Position::default();

        let lines = self.bus.lines(self.config.bus_mode);
        debug!("Configuring {} LCD bus lines", lines.len());
        for line in lines {
            self.gpio.enable_clock(line)?;
            self.gpio.clear(line)?;
            self.gpio.configure_output(line)?;
        }

        self.delay.sleep_ms(POWER_ON_DELAY_MS);

        // Synchronize
        if self.config.bus_mode.is_4bit() {
            debug!("Switching LCD to 4-bit mode");
            for _ in 0..3 {
                self.write_nibble(false, (FUNCTION_SET | FUNCTION_SET_8BIT) >> 4)?;
                self.delay.sleep_ms(SYNC_DELAY_MS);
            }
            self.write_nibble(false, FUNCTION_SET >> 4)?;
        }

        self.function_set(false, self.config.lines, false)?;
        self.set_display_control(true, false, false)?;
        self.set_entry_mode(CursorDirection::Right, false)?;
        self.cursor_shift(false, CursorDirection::Left)?;
        self.clear_display()?;
        self.return_home()?;

        debug!("LCD initialized: {:?}", self.config);
        Ok(())
    }

    fn pulse_e(&self) -> GpioResult<()> {
        // Set E pin to high
        self.gpio.set(self.bus.e)?;
        self.delay.sleep_ms(PULSE_DELAY_MS);
        // Set E pin to low
        self.gpio.clear(self.bus.e)?;
        self.delay.sleep_ms(PULSE_DELAY_MS);
        Ok(())
    }

    /// Drives RNW, RS and `lines` (MSb first) from `value`, then pulses E.
    fn transfer(&self, rs: bool, lines: &[GpioLine], value: u8) -> GpioResult<()> {
        // Set RW pin to write
        self.gpio.clear(self.bus.rnw)?;

        // Set RS pin
        self.gpio.write(self.bus.rs, rs)?;

        let top = lines.len() - 1;
        for (i, &line) in lines.iter().enumerate() {
            self.gpio.write(line, value & (1 << (top - i)) != 0)?;
        }

        self.pulse_e()
    }

    fn write_nibble(&self, rs: bool, nibble: u8) -> GpioResult<()> {
        trace!("Writing nibble: {:04b}, RS: {}", nibble & 0x0F, rs);
        self.transfer(rs, &self.bus.high, nibble & 0x0F)
    }

    fn write_byte(&self, rs: bool, data: u8) -> GpioResult<()> {
        let low = self.bus.low.ok_or(GpioError::InvalidArgument)?;
        let [db7, db6, db5, db4] = self.bus.high;
        let [db3, db2, db1, db0] = low;
        self.transfer(rs, &[db7, db6, db5, db4, db3, db2, db1, db0], data)
    }

    fn send(&self, data: u8, rs: bool) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {}", data, rs);

        match self.config.bus_mode {
            BusMode::Bus8Bit => self.write_byte(rs, data),
            BusMode::Bus4Bit => {
                self.write_nibble(rs, data >> 4)?;
                self.write_nibble(rs, data)
            }
        }
    }
}

impl HD44780Driver for GpioHD44780Driver<'_> {
    /// Clears the display. The cursor is reset to the home position right away, before the
    /// controller has even latched the command.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.cursor = Position::default();
        self.send_command(CLEAR_DISPLAY)
    }

    fn return_home(&mut self) -> GpioResult<()> {
        self.cursor = Position::default();
        self.send_command(RETURN_HOME)?;
        self.delay.sleep_ms(RETURN_HOME_DELAY_MS);
        Ok(())
    }

    fn is_busy(&mut self) -> GpioResult<bool> {
        self.delay.sleep_ms(BUSY_DELAY_MS);
        Ok(true)
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, false)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, true)
    }
}

impl HD44780Display for GpioHD44780Driver<'_> {
    fn width(&self) -> u8 {
        self.config.width
    }

    fn charset(&self) -> Charset {
        self.config.charset
    }

    fn cursor(&self) -> Position {
        self.cursor
    }

    fn store_cursor(&mut self, position: Position) {
        self.cursor = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEvent, SimGpioDriver};

    const RS: GpioLine = GpioLine::new(0, 0);
    const E: GpioLine = GpioLine::new(0, 1);
    const RNW: GpioLine = GpioLine::new(0, 2);

    fn bus_4bit() -> Hd44780Bus {
        Hd44780Bus::new_4bit(
            RS,
            E,
            RNW,
            [GpioLine::new(1, 7), GpioLine::new(1, 6), GpioLine::new(1, 5), GpioLine::new(1, 4)],
        )
    }

    fn bus_8bit() -> Hd44780Bus {
        Hd44780Bus::new_8bit(RS, E, RNW, [7, 6, 5, 4, 3, 2, 1, 0].map(|pin| GpioLine::new(1, pin)))
    }

    /// Decodes every latched transfer as (RS, value of the data lines).
    fn transfers(sim: &SimGpioDriver, bus: &Hd44780Bus, bus_mode: BusMode) -> Vec<(bool, u8)> {
        let mut lines = vec![bus.rs, bus.rnw];
        lines.extend(bus.lines(bus_mode).into_iter().skip(3));

        sim.strobes(bus.e, &lines)
            .into_iter()
            .map(|levels| {
                assert!(!levels[1], "RNW must stay low");
                let value = levels[2..]
                    .iter()
                    .fold(0u8, |acc, &bit| (acc << 1) | bit as u8);
                (levels[0], value)
            })
            .collect()
    }

    #[test]
    fn four_bit_write_sends_high_nibble_first() {
        let sim = SimGpioDriver::new();
        let bus = bus_4bit();
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, Hd44780Config::default()).unwrap();

        lcd.send_data(0xA5).unwrap();

        assert_eq!(transfers(&sim, &bus, BusMode::Bus4Bit), vec![(true, 0xA), (true, 0x5)]);
    }

    #[test]
    fn eight_bit_write_uses_single_pulse() {
        let sim = SimGpioDriver::new();
        let bus = bus_8bit();
        let config = Hd44780Config::default().with_bus_mode(BusMode::Bus8Bit);
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, config).unwrap();

        lcd.send_data(0xA5).unwrap();
        lcd.send_command(0x3C).unwrap();

        assert_eq!(
            transfers(&sim, &bus, BusMode::Bus8Bit),
            vec![(true, 0xA5), (false, 0x3C)]
        );
    }

    #[test]
    fn enable_pulse_is_held_and_released() {
        let sim = SimGpioDriver::new();
        let bus = bus_4bit();
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, Hd44780Config::default()).unwrap();

        lcd.send_command(0x00).unwrap();

        let events = sim.events();
        assert_eq!(events[0], SimEvent::Clear(RNW));
        assert_eq!(events[1], SimEvent::Clear(RS));
        assert_eq!(
            &events[6..10],
            &[SimEvent::Set(E), SimEvent::Delay(1), SimEvent::Clear(E), SimEvent::Delay(1)]
        );
        assert_eq!(events.len(), 20);
        assert_eq!(sim.total_delay_ms(), 4);
    }

    #[test]
    fn init_4bit_runs_sync_and_default_configuration() {
        let sim = SimGpioDriver::new();
        let bus = bus_4bit();
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, Hd44780Config::default()).unwrap();

        lcd.init().unwrap();

        let nibbles: Vec<u8> = transfers(&sim, &bus, BusMode::Bus4Bit)
            .into_iter()
            .map(|(rs, nibble)| {
                assert!(!rs);
                nibble
            })
            .collect();
        assert_eq!(
            nibbles,
            vec![
                0x3, 0x3, 0x3, 0x2, // synchronization
                0x2, 0x8, // function set, 4-bit, 2 lines
                0x0, 0xC, // display on
                0x0, 0x6, // entry mode, increment
                0x1, 0x0, // cursor shift
                0x0, 0x1, // clear
                0x0, 0x2, // home
            ]
        );
        assert_eq!(lcd.cursor(), Position::new(0, 0));
    }

    #[test]
    fn init_configures_lines_low_before_output() {
        let sim = SimGpioDriver::new();
        let bus = bus_4bit();
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, Hd44780Config::default()).unwrap();

        lcd.init().unwrap();

        let events = sim.events();
        let lines = bus.lines(BusMode::Bus4Bit);
        assert_eq!(lines.len(), 7);
        for (i, line) in lines.into_iter().enumerate() {
            assert_eq!(
                &events[i * 3..i * 3 + 3],
                &[
                    SimEvent::EnableClock(line),
                    SimEvent::Clear(line),
                    SimEvent::ConfigureOutput(line),
                ]
            );
        }
        assert_eq!(events[21], SimEvent::Delay(40));
    }

    #[test]
    fn init_4bit_waits_after_each_sync_nibble() {
        let sim = SimGpioDriver::new();
        let bus = bus_4bit();
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, Hd44780Config::default()).unwrap();

        lcd.init().unwrap();

        let delays: Vec<u32> = sim
            .events()
            .into_iter()
            .filter_map(|event| match event {
                SimEvent::Delay(ms) => Some(ms),
                _ => None,
            })
            .collect();
        // power-on, then (pulse, pulse, sync wait) three times, then the fourth nibble
        assert_eq!(&delays[..11], &[40, 1, 1, 15, 1, 1, 15, 1, 1, 15, 1]);
        assert_eq!(delays.last(), Some(&2));
        // 16 transfers at 2 ms each, plus the fixed waits
        assert_eq!(sim.total_delay_ms(), 40 + 3 * 15 + 16 * 2 + 2);
    }

    #[test]
    fn init_8bit_skips_sync() {
        let sim = SimGpioDriver::new();
        let bus = bus_8bit();
        let config = Hd44780Config::default().with_bus_mode(BusMode::Bus8Bit).with_lines(1);
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, config).unwrap();

        lcd.init().unwrap();

        assert_eq!(
            transfers(&sim, &bus, BusMode::Bus8Bit),
            vec![
                (false, 0x20),
                (false, 0x0C),
                (false, 0x06),
                (false, 0x10),
                (false, 0x01),
                (false, 0x02),
            ]
        );
        let configured = sim
            .events()
            .iter()
            .filter(|event| matches!(event, SimEvent::ConfigureOutput(_)))
            .count();
        assert_eq!(configured, 11);
    }

    #[test]
    fn init_propagates_unknown_port() {
        let sim = SimGpioDriver::with_ports([0]);
        let bus = bus_4bit();
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, Hd44780Config::default()).unwrap();

        assert_eq!(lcd.init(), Err(GpioError::UnknownPort(1)));
    }

    #[test]
    fn new_rejects_invalid_configuration() {
        let sim = SimGpioDriver::new();
        let bus = bus_4bit();

        let zero_width = Hd44780Config::default().with_width(0);
        assert_eq!(
            GpioHD44780Driver::new(&sim, &sim, &bus, zero_width).unwrap_err(),
            GpioError::InvalidArgument
        );

        let eight_bit = Hd44780Config::default().with_bus_mode(BusMode::Bus8Bit);
        assert_eq!(
            GpioHD44780Driver::new(&sim, &sim, &bus, eight_bit).unwrap_err(),
            GpioError::InvalidArgument
        );
    }

    #[test]
    fn clear_resets_cursor_immediately() {
        let sim = SimGpioDriver::new();
        let bus = bus_4bit();
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, Hd44780Config::default()).unwrap();

        lcd.move_to(5, 1).unwrap();
        assert_eq!(lcd.cursor(), Position::new(5, 1));
        sim.clear_events();

        lcd.clear_display().unwrap();

        assert_eq!(lcd.cursor(), Position::new(0, 0));
        assert_eq!(transfers(&sim, &bus, BusMode::Bus4Bit), vec![(false, 0x0), (false, 0x1)]);
        assert_eq!(sim.total_delay_ms(), 4);
    }

    #[test]
    fn return_home_settles() {
        let sim = SimGpioDriver::new();
        let bus = bus_4bit();
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, Hd44780Config::default()).unwrap();

        lcd.move_to(3, 0).unwrap();
        sim.clear_events();
        lcd.return_home().unwrap();

        assert_eq!(lcd.cursor(), Position::new(0, 0));
        assert_eq!(sim.events().last(), Some(&SimEvent::Delay(2)));
    }

    #[test]
    fn busy_stub_waits_and_reports_busy() {
        let sim = SimGpioDriver::new();
        let bus = bus_4bit();
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, Hd44780Config::default()).unwrap();

        assert_eq!(lcd.is_busy(), Ok(true));
        assert_eq!(sim.events(), vec![SimEvent::Delay(1)]);
    }

    #[test]
    fn command_opcodes() {
        let sim = SimGpioDriver::new();
        let bus = bus_8bit();
        let config = Hd44780Config::default().with_bus_mode(BusMode::Bus8Bit);
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, config).unwrap();

        lcd.set_entry_mode(CursorDirection::Left, true).unwrap();
        lcd.set_display_control(true, true, true).unwrap();
        lcd.cursor_shift(true, CursorDirection::Right).unwrap();
        lcd.function_set(true, 2, true).unwrap();
        lcd.set_cgram_address(0xFF).unwrap();
        lcd.set_ddram_address(0xC5).unwrap();

        let commands: Vec<u8> = transfers(&sim, &bus, BusMode::Bus8Bit)
            .into_iter()
            .map(|(_, value)| value)
            .collect();
        assert_eq!(commands, vec![0x05, 0x0F, 0x1C, 0x3C, 0x7F, 0xC5]);
    }

    #[test]
    fn define_char_streams_pattern_as_data() {
        let sim = SimGpioDriver::new();
        let bus = bus_8bit();
        let config = Hd44780Config::default().with_bus_mode(BusMode::Bus8Bit);
        let mut lcd = GpioHD44780Driver::new(&sim, &sim, &bus, config).unwrap();

        lcd.define_char(0x08, &[0b00100, 0b01110, 0b11111]).unwrap();
        lcd.define_glyph(2, [0x1F; 8]).unwrap();

        let sent = transfers(&sim, &bus, BusMode::Bus8Bit);
        assert_eq!(
            &sent[..4],
            &[(false, 0x48), (true, 0b00100), (true, 0b01110), (true, 0b11111)]
        );
        assert_eq!(sent[4], (false, 0x50));
        assert_eq!(sent.len(), 4 + 9);
    }
}
