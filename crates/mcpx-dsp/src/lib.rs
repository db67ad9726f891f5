//! A Motorola DSP56300 core, as found in the MCPX audio processor.
//!
//! The core state lives in [`Interpreter`]. Hosts usually drive it through [`Dsp`], which owns
//! the state together with the host capabilities it needs: a [`Scratch`] memory for DMA and,
//! optionally, a [`Peripherals`] handler for the peripheral registers the core does not model.

pub mod alu;
pub mod dma;
pub mod exec;
pub mod ins;
pub mod interrupt;
pub mod mem;
pub mod regs;

use crate::{
    alu::Acc56,
    dma::Dma,
    ins::Acc,
    interrupt::Interrupts,
    mem::{Memory, PRAM_LEN},
    regs::{Reg, SP_ERROR, SP_UNDERFLOW},
};
use easyerr::Error;
use util::WORD_MASK;
use zerocopy::{FromBytes, little_endian::U32};

pub use ins::{Decoded, Ins, Opcode};
pub use interrupt::Interrupt;
pub use mem::Space;
pub use regs::{Registers, Status};

/// An implementation fault. These are not architectural: the emulated machine has no way of
/// observing them, so execution cannot meaningfully continue.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("address {space}:{addr:06X} is out of range")]
    AddressOutOfRange { space: Space, addr: u32 },
    #[error("unsupported DMA format {format}")]
    UnsupportedDmaFormat { format: u32 },
    #[error("unsupported DMA buffer {buffer:X}")]
    UnsupportedDmaBuffer { buffer: u32 },
    #[error("unsupported DMA DSP offset {offset:06X}")]
    UnsupportedDmaOffset { offset: u32 },
    #[error("unsupported DMA node control bits {bits:06X}")]
    UnsupportedDmaControl { bits: u32 },
    #[error("unsupported DMA action {action}")]
    UnsupportedDmaAction { action: u32 },
    #[error("interrupt vector {vector:02X} is not implemented")]
    UnimplementedVector { vector: u32 },
}

/// Direction of a scratch memory transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToScratch,
    FromScratch,
}

/// The external scratch memory targeted by DMA.
pub trait Scratch {
    /// With [`Direction::ToScratch`], writes `buf` at `addr`. Otherwise fills `buf` with the
    /// contents at `addr`.
    fn transfer(&mut self, buf: &mut [u8], addr: u32, direction: Direction);
}

/// A flat scratch memory. Writes past the end grow it, reads past the end are zero.
impl Scratch for Vec<u8> {
    fn transfer(&mut self, buf: &mut [u8], addr: u32, direction: Direction) {
        let start = addr as usize;
        match direction {
            Direction::ToScratch => {
                let end = start + buf.len();
                if self.len() < end {
                    self.resize(end, 0);
                }

                self[start..end].copy_from_slice(buf);
            }
            Direction::FromScratch => {
                buf.fill(0);
                if let Some(src) = self.get(start..) {
                    let len = src.len().min(buf.len());
                    buf[..len].copy_from_slice(&src[..len]);
                }
            }
        }
    }
}

/// Scratch memory that drops writes and reads zeros.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl Scratch for Discard {
    fn transfer(&mut self, buf: &mut [u8], _: u32, direction: Direction) {
        if direction == Direction::FromScratch {
            buf.fill(0);
        }
    }
}

/// Handler for X peripheral addresses the core does not implement itself.
pub trait Peripherals {
    fn read(&mut self, addr: u32) -> u32;
    fn write(&mut self, addr: u32, value: u32);
}

/// Host capabilities borrowed for the duration of an execution call.
pub struct Io<'a> {
    pub scratch: &'a mut dyn Scratch,
    pub peripherals: Option<&'a mut dyn Peripherals>,
    /// Detached execution never reaches the host: peripherals go to the shadow.
    pub detached: bool,
}

impl<'a> Io<'a> {
    pub fn new(scratch: &'a mut dyn Scratch) -> Self {
        Self {
            scratch,
            peripherals: None,
            detached: false,
        }
    }
}

/// The whole architectural state of the core.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    pub pc: u32,
    pub regs: Registers,
    pub mem: Memory,
    pub interrupts: Interrupts,
    pub dma: Dma,
    /// Set by the guest through the idle register.
    pub idle: bool,
    /// A REP is repeating the current instruction.
    pub loop_rep: bool,
    /// The REP was just armed and LC has not been primed yet.
    pub pc_on_rep: bool,
    /// Cycles charged by the last instruction.
    pub instr_cycle: u32,
    pub instr_count: u64,
    cur_len: u32,
    redirected: bool,
}

impl Interpreter {
    /// Resets everything but the memories.
    pub fn reset(&mut self) {
        tracing::debug!("resetting DSP core");

        self.pc = 0;
        self.regs = Registers::default();
        self.interrupts = Interrupts::default();
        self.dma = Dma::default();
        self.idle = false;
        self.loop_rep = false;
        self.pc_on_rep = false;
        self.instr_cycle = 0;
        self.instr_count = 0;
        self.cur_len = 0;
        self.redirected = false;
    }

    /// Reads a P-space word without side effects.
    #[inline(always)]
    pub fn fetch(&self, addr: u32) -> Result<u32, Fault> {
        self.mem
            .word(Space::P, addr)
            .copied()
            .ok_or(Fault::AddressOutOfRange {
                space: Space::P,
                addr,
            })
    }

    /// Reads an accumulator through the data shifter and limiter, setting L if it saturates.
    pub fn limited(&mut self, acc: Acc) -> u32 {
        let (value, limited) = self.regs.acc[acc.index()].limit(self.regs.sr.scaling());
        if limited {
            self.regs.sr.set_limit(true);
        }

        value
    }

    /// Reads a register as an instruction operand.
    ///
    /// A and B go through the limiter and reading SSH pops the stack.
    pub fn read_reg(&mut self, code: u32) -> u32 {
        let Some(reg) = Reg::new(code as u8) else {
            return 0;
        };

        match reg {
            Reg::A => self.limited(Acc::A),
            Reg::B => self.limited(Acc::B),
            Reg::Ssh => self.pop().0,
            _ => self.regs.get(reg),
        }
    }

    /// Writes a register as an instruction operand.
    ///
    /// Writing SSH pushes, and writing SP runs the stack error detection.
    pub fn write_reg(&mut self, code: u32, value: u32) {
        let Some(reg) = Reg::new(code as u8) else {
            return;
        };

        match reg {
            Reg::Sp => {
                let value = value as u8 & 0x3F;
                let sticky = value & (SP_ERROR | SP_UNDERFLOW);
                if self.regs.sp & SP_ERROR == 0 && sticky != 0 {
                    self.interrupts.post(Interrupt::StackError);
                    self.regs.sp = sticky;
                } else {
                    self.regs.sp = value;
                }
            }
            Reg::Ssh => self.push(value, None),
            _ => self.regs.set(reg, value),
        }
    }

    /// Pushes a stack frame, posting a stack error on overflow.
    pub fn push(&mut self, ssh: u32, ssl: Option<u32>) {
        if self.regs.push(ssh, ssl) {
            tracing::debug!("DSP stack overflow at {:06X}", self.pc);
            self.interrupts.post(Interrupt::StackError);
        }
    }

    /// Pops a stack frame, posting a stack error on underflow.
    pub fn pop(&mut self) -> (u32, u32) {
        let (frame, error) = self.regs.pop();
        if error {
            tracing::debug!("DSP stack underflow at {:06X}", self.pc);
            self.interrupts.post(Interrupt::StackError);
        }

        frame
    }

    #[inline(always)]
    fn acc(&self, acc: Acc) -> i64 {
        self.regs.acc[acc.index()].get()
    }

    #[inline(always)]
    fn set_acc(&mut self, acc: Acc, value: i64) -> i64 {
        self.regs.acc[acc.index()].set(value)
    }

    #[inline(always)]
    fn acc_limbs(&self, acc: Acc) -> Acc56 {
        self.regs.acc[acc.index()]
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Bytes read from scratch by [`Dsp::bootstrap`].
    pub bootstrap_len: u32,
    /// Whether [`Dsp::run`] returns as soon as the guest signals it is idle.
    pub stop_on_idle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootstrap_len: 0x2000,
            stop_on_idle: true,
        }
    }
}

/// Result of executing one instruction on a detached copy of the core.
#[derive(Debug, Clone, Copy)]
pub struct Detached {
    pub word: u32,
    pub decoded: Decoded,
    /// Address following the instruction and its extension words.
    pub next: u32,
    pub cycles: u32,
}

/// A DSP together with the host capabilities it runs against.
pub struct Dsp {
    core: Interpreter,
    config: Config,
    scratch: Box<dyn Scratch>,
    peripherals: Option<Box<dyn Peripherals>>,
    /// Cycles left over (or owed) from the previous run.
    budget: i64,
    cycles: u64,
}

impl Dsp {
    pub fn new(config: Config, scratch: Box<dyn Scratch>) -> Self {
        let mut core = Interpreter::default();
        core.reset();

        Self {
            core,
            config,
            scratch,
            peripherals: None,
            budget: 0,
            cycles: 0,
        }
    }

    pub fn with_peripherals(mut self, peripherals: Box<dyn Peripherals>) -> Self {
        self.peripherals = Some(peripherals);
        self
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.budget = 0;
    }

    #[inline(always)]
    pub fn core(&self) -> &Interpreter {
        &self.core
    }

    #[inline(always)]
    pub fn core_mut(&mut self) -> &mut Interpreter {
        &mut self.core
    }

    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Total cycles executed since construction.
    #[inline(always)]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[inline(always)]
    pub fn idle(&self) -> bool {
        self.core.idle
    }

    /// Runs for (about) `cycles` cycles. Overshoot is paid back by the next run.
    pub fn run(&mut self, cycles: u32) -> Result<(), Fault> {
        let mut io = Io {
            scratch: self.scratch.as_mut(),
            peripherals: self
                .peripherals
                .as_mut()
                .map(|p| p.as_mut() as &mut dyn Peripherals),
            detached: false,
        };

        self.core.idle = false;
        self.budget += cycles as i64;

        while self.budget > 0 {
            self.core.step(&mut io)?;
            self.budget -= self.core.instr_cycle as i64;
            self.cycles += self.core.instr_cycle as u64;

            if self.config.stop_on_idle && self.core.idle {
                self.budget = 0;
                break;
            }
        }

        Ok(())
    }

    /// Loads the boot image from the start of scratch memory into P memory.
    pub fn bootstrap(&mut self) -> Result<(), Fault> {
        let len = self.config.bootstrap_len as usize & !3;
        let words = len / 4;
        if words > PRAM_LEN {
            return Err(Fault::AddressOutOfRange {
                space: Space::P,
                addr: words as u32 - 1,
            });
        }

        tracing::info!("bootstrapping {len:#X} bytes from scratch");

        let mut buf = vec![0; len];
        self.scratch.transfer(&mut buf, 0, Direction::FromScratch);

        let Ok(image) = <[U32]>::ref_from_bytes(&buf) else {
            unreachable!("buffer length is a multiple of 4")
        };

        for (word, data) in self.core.mem.pram.iter_mut().zip(image) {
            *word = data.get() & WORD_MASK;
        }

        Ok(())
    }

    /// Posts an interrupt source.
    pub fn raise_interrupt(&mut self, interrupt: Interrupt) {
        self.core.interrupts.post(interrupt);
    }

    /// Reads memory without side effects. Peripheral addresses read their shadow.
    pub fn read_memory(&self, space: Space, addr: u32) -> Result<u32, Fault> {
        self.core
            .mem
            .word(space, addr)
            .copied()
            .ok_or(Fault::AddressOutOfRange { space, addr })
    }

    /// Writes memory without side effects. Peripheral addresses write their shadow.
    pub fn write_memory(&mut self, space: Space, addr: u32, value: u32) -> Result<(), Fault> {
        let word = self
            .core
            .mem
            .word_mut(space, addr)
            .ok_or(Fault::AddressOutOfRange { space, addr })?;

        *word = value & WORD_MASK;
        Ok(())
    }

    /// Executes the instruction at `addr` on a copy of the core, leaving this one untouched.
    pub fn step_detached(&self, addr: u32) -> Result<Detached, Fault> {
        let mut core = self.core.clone();
        core.pc = addr & WORD_MASK;

        let mut discard = Discard;
        let mut io = Io {
            scratch: &mut discard,
            peripherals: None,
            detached: true,
        };

        let pc = core.pc;
        let word = core.fetch(pc)?;
        core.execute_instruction(&mut io)?;

        Ok(Detached {
            word,
            decoded: Ins::new(word).decoded(),
            next: (pc + core.cur_len) & WORD_MASK,
            cycles: core.instr_cycle,
        })
    }
}
