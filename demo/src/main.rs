mod config;

use crate::config::Config;
use charlcd_gpio::gpiod::GpiodDriver;
use charlcd_gpio::keys::{GpioKeys, KeyDescriptor, Keys};
use charlcd_gpio::lcd::hd44780::HD44780Display;
use charlcd_gpio::lcd::hd44780::driver::{BusMode, GpioHD44780Driver, HD44780Driver, Hd44780Bus};
use charlcd_gpio::raw::RawGpioDriver;
use charlcd_gpio::sim::SimGpioDriver;
use charlcd_gpio::{Delay, GpioDriver, GpioLine, ThreadDelay, lcd_print, lcd_print_at};
use dotenv::{dotenv, var};
use log::{debug, info, warn};
use std::str::FromStr;
use sysinfo::System;
use thiserror::Error;
use time::OffsetDateTime;

const UNKNOWN_STR: &str = "???";

/// Polling period of the keys.
const TICK_MS: u32 = 50;
/// Ticks between two redraws of the clock.
const TICKS_PER_FRAME: u32 = 1000 / TICK_MS;

/// Frames drawn by the simulator if `CHARLCD_FRAMES` is not set.
const SIM_FRAMES: u64 = 3;

const CLOCK_GLYPH: [u8; 8] = [
    0b00000, 0b01110, 0b10101, 0b10111, 0b10001, 0b01110, 0b00000, 0b00000,
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Backend {
    Raw,
    Gpiod,
    Sim,
}

#[derive(Debug, Error)]
#[error("unknown GPIO backend {0:?}, expected raw, gpiod or sim")]
struct UnknownBackend(String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Backend::Raw),
            "gpiod" => Ok(Backend::Gpiod),
            "sim" => Ok(Backend::Sim),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

fn parse_pin_list(pin_str: &str) -> eyre::Result<Vec<u16>> {
    Ok(pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?)
}

fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|_| default.to_string())
}

/// Builds the LCD bus from the environment. The bus width follows the number of data pins.
fn lcd_bus_from_env(port: u32) -> eyre::Result<(Hd44780Bus, BusMode)> {
    let line = |pin: u16| GpioLine::new(port, pin);

    let rs = line(var_or("CHARLCD_LCD_PIN_RS", "22").parse()?);
    let e = line(var_or("CHARLCD_LCD_PIN_E", "17").parse()?);
    let rnw = line(var_or("CHARLCD_LCD_PIN_RW", "27").parse()?);
    // DB7 first
    let data: Vec<GpioLine> = parse_pin_list(&var_or("CHARLCD_LCD_PINS_DATA", "21,20,16,26"))?
        .into_iter()
        .map(line)
        .collect();

    info!(
        "LCD @ RS: {}, E: {}, RW: {}, Data: {:?}",
        rs, e, rnw, data
    );

    match data.len() {
        4 => {
            let data: [GpioLine; 4] = [data[0], data[1], data[2], data[3]];
            Ok((Hd44780Bus::new_4bit(rs, e, rnw, data), BusMode::Bus4Bit))
        }
        8 => {
            let data: [GpioLine; 8] = [
                data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
            ];
            Ok((Hd44780Bus::new_8bit(rs, e, rnw, data), BusMode::Bus8Bit))
        }
        n => Err(eyre::eyre!("Invalid number of data pins: {}, expected 4 or 8", n)),
    }
}

fn keys_from_env(port: u32) -> eyre::Result<Vec<KeyDescriptor>> {
    const NAMES: [&str; 2] = ["clear", "cursor"];

    let pins = parse_pin_list(&var_or("CHARLCD_KEY_PINS", "25,24"))?;
    info!("Keys @ {:?}", pins);

    Ok(pins
        .into_iter()
        .enumerate()
        .map(|(i, pin)| {
            let key = KeyDescriptor::new(GpioLine::new(port, pin)).with_pull_up();
            match NAMES.get(i) {
                Some(&name) => key.with_name(name),
                None => key,
            }
        })
        .collect())
}

fn load_config() -> eyre::Result<Config> {
    debug!("Trying to load config...");
    if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        Ok(config)
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        Ok(config)
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|err| {
        warn!("Can't get the local time offset, using UTC: {}", err);
        OffsetDateTime::now_utc()
    })
}

fn draw(lcd: &mut GpioHD44780Driver<'_>, host_name: &str) -> eyre::Result<()> {
    let width = lcd.config().width as usize;
    lcd_print_at!(lcd, 0, 0, "{:<w$.w$}", host_name, w = width)?;

    let time = now();
    lcd.move_to(0, 1)?;
    lcd.put_code(0)?;
    lcd_print!(
        lcd,
        " {:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    )?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    info!("charlcd demo starting...");

    let host_name = System::host_name().unwrap_or_else(|| UNKNOWN_STR.to_string());
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!("Hostname {}", host_name);
    info!("Architecture {}", System::cpu_arch());

    let backend: Backend = var_or("CHARLCD_BACKEND", "sim").parse()?;
    let port: u32 = var_or("CHARLCD_PORT", "0").parse()?;
    let frames: Option<u64> = match var("CHARLCD_FRAMES") {
        Ok(frames) => Some(frames.parse()?),
        Err(_) if backend == Backend::Sim => Some(SIM_FRAMES),
        Err(_) => None,
    };

    let (bus, bus_mode) = lcd_bus_from_env(port)?;
    let key_descriptors = keys_from_env(port)?;
    let config = load_config()?;

    debug!("Initializing {:?} GPIO driver...", backend);
    let raw;
    let gpiod;
    let sim = SimGpioDriver::new();
    let thread_delay = ThreadDelay;
    let (gpio, delay): (&dyn GpioDriver, &dyn Delay) = match backend {
        Backend::Raw => {
            raw = RawGpioDriver::new_gpiomem()?;
            (&raw, &thread_delay)
        }
        Backend::Gpiod => {
            gpiod = GpiodDriver::new();
            (&gpiod, &thread_delay)
        }
        Backend::Sim => (&sim, &sim),
    };
    debug!("{:?} initialized.", gpio);

    debug!("Initializing LCD driver...");
    let mut lcd = GpioHD44780Driver::new(gpio, delay, &bus, config.hd44780(bus_mode))?;
    lcd.init()?;
    lcd.define_glyph(0, CLOCK_GLYPH)?;
    debug!("{:?} initialized.", lcd);

    debug!("Initializing keys...");
    let keys = GpioKeys::new(gpio, &key_descriptors);
    keys.setup()?;
    let clear_key = keys.find("clear");
    let cursor_key = keys.find("cursor");
    debug!("{:?} initialized.", keys);

    info!("Starting main loop...");

    let mut cursor = false;
    let mut was_pressed = vec![false; keys.count()];
    let mut frame: u64 = 0;
    let mut tick: u32 = 0;

    loop {
        for (id, was_pressed) in was_pressed.iter_mut().enumerate() {
            let pressed = keys.is_pressed(id)?;
            if pressed && !*was_pressed {
                debug!("Key {} pressed", id);
                if Some(id) == clear_key {
                    lcd.clear_display()?;
                    tick = 0;
                } else if Some(id) == cursor_key {
                    cursor = !cursor;
                    lcd.set_display_control(true, cursor, cursor)?;
                }
            }
            *was_pressed = pressed;
        }

        if tick == 0 {
            draw(&mut lcd, &host_name)?;
            frame += 1;
            if frames.is_some_and(|frames| frame >= frames) {
                break;
            }
        }

        delay.sleep_ms(TICK_MS);
        tick = (tick + 1) % TICKS_PER_FRAME;
    }

    if backend == Backend::Sim {
        info!(
            "Simulated {} GPIO events over {} ms",
            sim.events().len(),
            sim.total_delay_ms()
        );
    }

    info!("Done after {} frames.", frame);
    Ok(())
}
