use crate::{Fault, Interpreter, Io};
use strum::{Display, FromRepr};
use util::{WORD_MASK, boxed_array};

pub const XRAM_LEN: usize = 3072;
pub const YRAM_LEN: usize = 2048;
pub const PRAM_LEN: usize = 4096;
pub const MIXBUFFER_LEN: usize = 1024;
pub const PERIPH_LEN: usize = 128;

/// First X address of the peripheral space.
pub const PERIPH_BASE: u32 = 0xFF_FF80;
/// X addresses at which the mixbuffer is visible: right after X RAM, then again as the read
/// buffer.
pub const MIXBUFFER_BASES: [u32; 2] = [XRAM_LEN as u32, 0x1400];

/// Idle register. Writing bit 0 signals the host that the guest is idle.
pub const IDLE: u32 = 0xFF_FFC4;
/// Interrupt status register. Bit 7 reflects the DMA end-of-list flag.
pub const ISR: u32 = 0xFF_FFC5;
pub const DMA_NEXT_BLOCK: u32 = 0xFF_FFD4;
pub const DMA_START_BLOCK: u32 = 0xFF_FFD5;
pub const DMA_CONTROL: u32 = 0xFF_FFD6;
pub const DMA_CONFIGURATION: u32 = 0xFF_FFD7;
/// Interrupt priority register.
pub const IPR: u32 = 0xFF_FFFF;

/// A memory space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum Space {
    X = 0,
    Y = 1,
    P = 2,
}

/// Backing storage of the three spaces.
#[derive(Clone)]
pub struct Memory {
    pub xram: Box<[u32; XRAM_LEN]>,
    pub yram: Box<[u32; YRAM_LEN]>,
    pub pram: Box<[u32; PRAM_LEN]>,
    pub mixbuffer: Box<[u32; MIXBUFFER_LEN]>,
    /// Shadow of peripheral registers without a dedicated implementation.
    pub periph: Box<[u32; PERIPH_LEN]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            xram: boxed_array(0),
            yram: boxed_array(0),
            pram: boxed_array(0),
            mixbuffer: boxed_array(0),
            periph: boxed_array(0),
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory").finish_non_exhaustive()
    }
}

/// Whether an X address is in the peripheral space.
#[inline(always)]
pub fn is_peripheral(space: Space, addr: u32) -> bool {
    space == Space::X && addr >= PERIPH_BASE
}

impl Memory {
    /// The RAM word backing `addr` in `space`. Peripheral addresses map to the shadow.
    pub fn word(&self, space: Space, addr: u32) -> Option<&u32> {
        let addr = addr & WORD_MASK;
        let index = addr as usize;
        match space {
            Space::X => {
                if addr >= PERIPH_BASE {
                    return self.periph.get((addr - PERIPH_BASE) as usize);
                }

                for base in MIXBUFFER_BASES {
                    if (base..base + MIXBUFFER_LEN as u32).contains(&addr) {
                        return self.mixbuffer.get((addr - base) as usize);
                    }
                }

                self.xram.get(index)
            }
            Space::Y => self.yram.get(index),
            Space::P => self.pram.get(index),
        }
    }

    /// The RAM word backing `addr` in `space`. Peripheral addresses map to the shadow.
    pub fn word_mut(&mut self, space: Space, addr: u32) -> Option<&mut u32> {
        let addr = addr & WORD_MASK;
        let index = addr as usize;
        match space {
            Space::X => {
                if addr >= PERIPH_BASE {
                    return self.periph.get_mut((addr - PERIPH_BASE) as usize);
                }

                for base in MIXBUFFER_BASES {
                    if (base..base + MIXBUFFER_LEN as u32).contains(&addr) {
                        return self.mixbuffer.get_mut((addr - base) as usize);
                    }
                }

                self.xram.get_mut(index)
            }
            Space::Y => self.yram.get_mut(index),
            Space::P => self.pram.get_mut(index),
        }
    }
}

impl Interpreter {
    /// Reads a word from `space`, going through the peripheral path for peripheral addresses.
    pub fn read(&self, io: &mut Io, space: Space, addr: u32) -> Result<u32, Fault> {
        let addr = addr & WORD_MASK;
        if is_peripheral(space, addr) {
            return Ok(self.read_peripheral(io, addr) & WORD_MASK);
        }

        self.mem
            .word(space, addr)
            .copied()
            .ok_or(Fault::AddressOutOfRange { space, addr })
    }

    /// Writes a word to `space`, going through the peripheral path for peripheral addresses.
    pub fn write(&mut self, io: &mut Io, space: Space, addr: u32, value: u32) -> Result<(), Fault> {
        let addr = addr & WORD_MASK;
        let value = value & WORD_MASK;
        if is_peripheral(space, addr) {
            return self.write_peripheral(io, addr, value);
        }

        let word = self
            .mem
            .word_mut(space, addr)
            .ok_or(Fault::AddressOutOfRange { space, addr })?;

        *word = value;
        Ok(())
    }

    #[inline(always)]
    fn shadow(&self, addr: u32) -> u32 {
        self.mem.periph[(addr - PERIPH_BASE) as usize]
    }

    #[inline(always)]
    fn shadow_mut(&mut self, addr: u32) -> &mut u32 {
        &mut self.mem.periph[(addr - PERIPH_BASE) as usize]
    }

    fn read_peripheral(&self, io: &mut Io, addr: u32) -> u32 {
        match addr {
            ISR => self.shadow(ISR) | ((self.dma.eol as u32) << 7),
            DMA_NEXT_BLOCK => self.dma.next_block,
            DMA_START_BLOCK => self.dma.start_block,
            DMA_CONTROL => self.dma.control.to_bits(),
            DMA_CONFIGURATION => self.dma.configuration,
            IDLE | IPR => self.shadow(addr),
            _ => match io.peripherals.as_deref_mut() {
                Some(peripherals) if !io.detached => peripherals.read(addr),
                _ => self.shadow(addr),
            },
        }
    }

    fn write_peripheral(&mut self, io: &mut Io, addr: u32, value: u32) -> Result<(), Fault> {
        match addr {
            ISR => {
                *self.shadow_mut(ISR) &= !value;
                if value & 0x80 != 0 {
                    self.dma.eol = false;
                }
            }
            IDLE => {
                *self.shadow_mut(IDLE) = value;
                if value & 1 != 0 {
                    self.idle = true;
                }
            }
            DMA_NEXT_BLOCK => self.dma.next_block = value,
            DMA_START_BLOCK => self.dma.start_block = value,
            DMA_CONTROL => self.write_dma_control(io, value)?,
            DMA_CONFIGURATION => self.dma.configuration = value,
            IPR => {
                *self.shadow_mut(IPR) = value;
                self.interrupts.set_priorities(value);
            }
            _ => match io.peripherals.as_deref_mut() {
                Some(peripherals) if !io.detached => peripherals.write(addr, value),
                _ => *self.shadow_mut(addr) = value,
            },
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Discard, Peripherals};

    #[test]
    fn mixbuffer_alias() {
        let mut mem = Memory::default();
        *mem.word_mut(Space::X, 0xC05).unwrap() = 0x12_3456;
        assert_eq!(mem.word(Space::X, 0x1405), Some(&0x12_3456));
        assert_eq!(mem.mixbuffer[5], 0x12_3456);
    }

    #[test]
    fn ranges() {
        let mem = Memory::default();
        assert!(mem.word(Space::X, XRAM_LEN as u32 - 1).is_some());
        assert!(mem.word(Space::X, 0x1000).is_some());
        assert!(mem.word(Space::X, 0x17FF).is_some());
        assert!(mem.word(Space::X, 0x1800).is_none());
        assert!(mem.word(Space::Y, YRAM_LEN as u32).is_none());
        assert!(mem.word(Space::P, PRAM_LEN as u32 - 1).is_some());
        assert!(mem.word(Space::X, 0x1C00).is_none());
        assert!(mem.word(Space::X, 0xFF_FFFF).is_some());
        assert!(mem.word(Space::Y, 0xFF_FFFF).is_none());
    }

    #[test]
    fn peripheral_space() {
        assert!(is_peripheral(Space::X, 0xFF_FFC5));
        assert!(!is_peripheral(Space::Y, 0xFF_FFC5));
        assert!(!is_peripheral(Space::X, 0xFF_FF7F));
    }

    #[test]
    fn out_of_range_faults() {
        let core = Interpreter::default();
        let mut discard = Discard;
        let mut io = Io::new(&mut discard);

        assert!(matches!(
            core.read(&mut io, Space::Y, 0x800),
            Err(Fault::AddressOutOfRange {
                space: Space::Y,
                addr: 0x800
            })
        ));
    }

    #[test]
    fn interrupt_status_register() {
        let mut core = Interpreter::default();
        let mut discard = Discard;
        let mut io = Io::new(&mut discard);

        core.write(&mut io, Space::X, ISR, 0).unwrap();
        core.dma.eol = true;
        assert_eq!(core.read(&mut io, Space::X, ISR).unwrap(), 0x80);

        core.write(&mut io, Space::X, ISR, 0x80).unwrap();
        assert!(!core.dma.eol);
        assert_eq!(core.read(&mut io, Space::X, ISR).unwrap(), 0);
    }

    struct Recorder(Vec<(u32, u32)>);

    impl Peripherals for Recorder {
        fn read(&mut self, addr: u32) -> u32 {
            addr & 0xFF
        }

        fn write(&mut self, addr: u32, value: u32) {
            self.0.push((addr, value));
        }
    }

    #[test]
    fn host_peripherals() {
        let mut core = Interpreter::default();
        let mut discard = Discard;
        let mut recorder = Recorder(Vec::new());

        let mut io = Io {
            scratch: &mut discard,
            peripherals: Some(&mut recorder),
            detached: false,
        };

        core.write(&mut io, Space::X, 0xFF_FF90, 0x1FF_FFFF).unwrap();
        assert_eq!(core.read(&mut io, Space::X, 0xFF_FF90).unwrap(), 0x90);

        // detached execution only sees the shadow
        io.detached = true;
        core.write(&mut io, Space::X, 0xFF_FF90, 0x42).unwrap();
        assert_eq!(core.read(&mut io, Space::X, 0xFF_FF90).unwrap(), 0x42);

        drop(io);
        assert_eq!(recorder.0, vec![(0xFF_FF90, 0xFF_FFFF)]);
    }
}
