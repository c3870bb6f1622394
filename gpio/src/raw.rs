//! Memory-mapped GPIO backend for the BCM283x/BCM2711 (Raspberry Pi).
//!
//! The whole GPIO block is a single port, `0`. Pins configured through this driver are returned
//! to inputs without bias when it is dropped.
use crate::{GpioBias, GpioDriver, GpioError, GpioLine, GpioResult};
use bitvec::vec::BitVec;
use log::debug;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;

pub struct RawGpioDriver {
    mmap: MmapRaw,
    configured_pins: BitVec<AtomicU8>,
}

impl RawGpioDriver {
    // 0x7e200000
    // #[cfg(target_pointer_width = "64")]
    // const GPIO_BASE: u32 = 0xFE200000;
    // #[cfg(target_pointer_width = "32")]
    const GPIO_BASE: u32 = 0x3F200000;

    const PIN_COUNT: usize = 58;

    /// The only port of this backend.
    pub const PORT: u32 = 0;

    const FUNCTION_INPUT: u32 = 0b000;
    const FUNCTION_OUTPUT: u32 = 0b001;

    fn create(path: &str, offset: u64) -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
            .offset(offset)
            .len(4096)
            .map_raw(&file)?;

        debug!("Mapped GPIO registers from {}", path);

        Ok(RawGpioDriver {
            mmap,
            configured_pins: BitVec::repeat(false, Self::PIN_COUNT),
        })
    }

    /// Maps the GPIO block through `/dev/gpiomem`, which needs no root privileges.
    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0)
    }

    /// Maps the GPIO block through `/dev/mem`.
    pub fn new_mem() -> GpioResult<Self> {
        Self::create("/dev/mem", Self::GPIO_BASE as u64)
    }

    fn pin_index(&self, line: GpioLine) -> GpioResult<usize> {
        if line.port != Self::PORT {
            return Err(GpioError::UnknownPort(line.port));
        }
        let index = line.pin as usize;
        if index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }
        Ok(index)
    }

    fn register(&self, offset: usize) -> *mut u32 {
        let base = self.mmap.as_mut_ptr() as *mut u32;
        unsafe { base.add(offset / 4) }
    }

    fn raw_set_pin_function(&self, pin_index: usize, function: u32) {
        // GPFSELn register
        let register_ptr = self.register((pin_index / 10) * 4);
        let shift = (pin_index % 10) * 3;

        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !(0b111 << shift); // Clear the bits for this pin
        register_value |= function << shift;
        unsafe { register_ptr.write_volatile(register_value) };
    }

    fn raw_set_pin_output(&self, pin_index: usize, high: bool) {
        // GPSETn/GPCLRn register
        let offset = if high { 0x1C } else { 0x28 };
        let register_ptr = self.register(offset + (pin_index / 32) * 4);
        unsafe { register_ptr.write_volatile(1 << (pin_index % 32)) };
    }

    fn raw_get_pin_level(&self, pin_index: usize) -> bool {
        // GPLEVn register
        let register_ptr = self.register(0x34 + (pin_index / 32) * 4);
        let register_value = unsafe { register_ptr.read_volatile() };
        (register_value >> (pin_index % 32)) & 1 != 0
    }

    fn raw_set_bias(&self, pin_index: usize, bias: GpioBias) {
        let bias_value = match bias {
            GpioBias::None => 0b00,
            GpioBias::PullUp => 0b01,
            GpioBias::PullDown => 0b10,
        };

        // GPIO_PUP_PDN_CNTRL_REGn register (yes that is a long name)
        let register_ptr = self.register(0xE4 + (pin_index / 16) * 4);
        let shift = (pin_index % 16) * 2;
        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !(0b11 << shift); // Clear the bits for this pin
        register_value |= bias_value << shift; // Set the bias
        unsafe { register_ptr.write_volatile(register_value) };
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for RawGpioDriver {
    /// The GPIO block is always clocked, so this only checks the port.
    fn enable_clock(&self, line: GpioLine) -> GpioResult<()> {
        self.pin_index(line)?;
        Ok(())
    }

    fn configure_output(&self, line: GpioLine) -> GpioResult<()> {
        let index = self.pin_index(line)?;
        self.raw_set_pin_function(index, Self::FUNCTION_OUTPUT);
        self.configured_pins.set_aliased(index, true);
        Ok(())
    }

    fn configure_input(&self, line: GpioLine, bias: GpioBias) -> GpioResult<()> {
        let index = self.pin_index(line)?;
        self.raw_set_pin_function(index, Self::FUNCTION_INPUT);
        self.raw_set_bias(index, bias);
        self.configured_pins.set_aliased(index, true);
        Ok(())
    }

    fn set(&self, line: GpioLine) -> GpioResult<()> {
        let index = self.pin_index(line)?;
        self.raw_set_pin_output(index, true);
        Ok(())
    }

    fn clear(&self, line: GpioLine) -> GpioResult<()> {
        let index = self.pin_index(line)?;
        self.raw_set_pin_output(index, false);
        Ok(())
    }

    fn get(&self, line: GpioLine) -> GpioResult<bool> {
        let index = self.pin_index(line)?;
        Ok(self.raw_get_pin_level(index))
    }
}

impl Drop for RawGpioDriver {
    fn drop(&mut self) {
        for index in self.configured_pins.iter_ones() {
            self.raw_set_pin_function(index, Self::FUNCTION_INPUT);
            self.raw_set_bias(index, GpioBias::None);
        }
    }
}
