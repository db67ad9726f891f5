//! Interrupt sources, priorities and the dispatch pipeline.
//!
//! Once a source wins arbitration, its vector is fetched over the next few instructions while
//! further dispatch is held off. A vector holding a `JSR` turns it into a long interrupt, which
//! saves the interrupted context on the stack. Anything else is a fast interrupt: the two
//! vector words run and execution resumes where it left off.

use crate::{Fault, Interpreter};
use bitos::{BitUtils, integer::u2};
use strum::{Display, FromRepr, VariantArray};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr, VariantArray)]
#[repr(u8)]
pub enum Interrupt {
    Reset,
    Illegal,
    StackError,
    Trace,
    Swi,
    HostCommand,
    HostRcv,
    HostTrx,
    SsiRcvE,
    SsiRcv,
    SsiTrxE,
    SsiTrx,
}

impl Interrupt {
    pub const COUNT: usize = Self::VARIANTS.len();

    pub fn vector(self) -> u32 {
        match self {
            Self::Reset => 0x00,
            Self::Illegal => 0x3E,
            Self::StackError => 0x02,
            Self::Trace => 0x04,
            Self::Swi => 0x06,
            Self::HostCommand => 0xFF,
            Self::HostRcv => 0x20,
            Self::HostTrx => 0x22,
            Self::SsiRcvE => 0x0E,
            Self::SsiRcv => 0x0C,
            Self::SsiTrxE => 0x12,
            Self::SsiTrx => 0x10,
        }
    }

    /// Sources whose dispatch needs peripheral side effects this core does not model.
    pub fn is_implemented(self) -> bool {
        !matches!(self, Self::HostCommand | Self::SsiRcvE | Self::SsiTrxE)
    }
}

/// Whether a vector word starts a long interrupt: `JSR xxx` or `JSR ea`.
#[inline(always)]
pub fn is_long(word: u32) -> bool {
    (word & 0xFF_F000) == 0x0D_0000 || (word & 0xFF_C0FF) == 0x0B_C080
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pipeline {
    #[default]
    None,
    /// An interrupt is being dispatched and no other can start.
    Disabled,
    /// The vector is a long interrupt and its frame was already pushed.
    Long,
}

#[derive(Debug, Clone)]
pub struct Interrupts {
    pub pending: [bool; Interrupt::COUNT],
    /// Priority level of each source. `None` means disabled.
    pub ipl: [Option<u8>; Interrupt::COUNT],
    /// Number of pending sources.
    pub counter: u8,
    pub state: Pipeline,
    /// Instructions left in the dispatch pipeline.
    pub count: u8,
    /// Latched vector address.
    pub vector: u32,
    /// PC of the interrupted instruction stream.
    pub saved_pc: u32,
    /// Interrupt mask installed by a long interrupt.
    pub raise: u8,
}

impl Default for Interrupts {
    fn default() -> Self {
        let mut ipl = [None; Interrupt::COUNT];
        ipl[..=Interrupt::Swi as usize].fill(Some(3));

        Self {
            pending: Default::default(),
            ipl,
            counter: 0,
            state: Pipeline::None,
            count: 0,
            vector: 0,
            saved_pc: 0,
            raise: 0,
        }
    }
}

impl Interrupts {
    /// Marks a source as pending. Disabled sources are ignored.
    pub fn post(&mut self, interrupt: Interrupt) {
        let index = interrupt as usize;
        if self.ipl[index].is_none() || self.pending[index] {
            return;
        }

        self.pending[index] = true;
        self.counter = self.counter.saturating_add(1);
    }

    #[inline(always)]
    pub fn is_pending(&self, interrupt: Interrupt) -> bool {
        self.pending[interrupt as usize]
    }

    /// Programs the peripheral source levels from an IPR value.
    pub fn set_priorities(&mut self, ipr: u32) {
        let level = |field: u32| field.checked_sub(1).map(|l| l as u8);

        let host = level(ipr.bits(10, 12));
        let ssi = level(ipr.bits(12, 14));

        self.ipl[Interrupt::HostCommand as usize..=Interrupt::HostTrx as usize].fill(host);
        self.ipl[Interrupt::SsiRcvE as usize..=Interrupt::SsiTrx as usize].fill(ssi);
    }

    /// Picks the pending source to dispatch under the given mask.
    ///
    /// A level 3 source always wins. Otherwise the first source at the highest level not below
    /// the mask wins.
    pub fn arbitrate(&self, mask: u8) -> Option<Interrupt> {
        let mut best: Option<(usize, u8)> = None;
        for (index, (&pending, &ipl)) in self.pending.iter().zip(&self.ipl).enumerate() {
            let Some(ipl) = ipl.filter(|_| pending) else {
                continue;
            };

            if ipl == 3 {
                best = Some((index, ipl));
                break;
            }

            if ipl < mask || best.is_some_and(|(_, level)| ipl <= level) {
                continue;
            }

            best = Some((index, ipl));
        }

        best.and_then(|(index, _)| Interrupt::from_repr(index as u8))
    }
}

impl Interpreter {
    fn enter_long_interrupt(&mut self) {
        self.interrupts.state = Pipeline::Long;
        self.push(self.interrupts.saved_pc, Some(self.regs.sr.to_bits() as u32));

        let sr = &mut self.regs.sr;
        sr.set_loop_flag(false);
        sr.set_trace(false);
        sr.set_scaling(Default::default());
        sr.set_interrupt_mask(u2::new(self.interrupts.raise));
    }

    /// Advances the interrupt pipeline and dispatches pending sources. Runs after every
    /// instruction.
    pub fn process_interrupts(&mut self) -> Result<(), Fault> {
        if self.loop_rep {
            return Ok(());
        }

        if self.interrupts.state == Pipeline::Disabled {
            let vector = self.interrupts.vector;
            match self.interrupts.count {
                5 => (),
                4 => {
                    self.interrupts.saved_pc = self.pc;
                    self.pc = vector;
                    if is_long(self.fetch(vector)?) {
                        self.enter_long_interrupt();
                    }
                }
                3 => {
                    if self.pc == vector + 1 && is_long(self.fetch(self.pc)?) {
                        self.enter_long_interrupt();
                    }
                }
                2 => {
                    // fast interrupt: both vector words ran
                    if self.pc == vector + 2 {
                        self.pc = self.interrupts.saved_pc;
                    }
                }
                1 => (),
                _ => {
                    self.interrupts.saved_pc = 0;
                    self.interrupts.vector = 0;
                    self.interrupts.state = Pipeline::None;
                }
            }

            if self.interrupts.count > 0 {
                self.interrupts.count -= 1;
                return Ok(());
            }
        }

        if self.regs.sr.trace() {
            self.interrupts.post(Interrupt::Trace);
        }

        if self.interrupts.counter == 0 {
            return Ok(());
        }

        let mask = self.regs.sr.interrupt_mask().value();
        let Some(interrupt) = self.interrupts.arbitrate(mask) else {
            return Ok(());
        };

        if !interrupt.is_implemented() {
            return Err(Fault::UnimplementedVector {
                vector: interrupt.vector(),
            });
        }

        let index = interrupt as usize;
        let level = self.interrupts.ipl[index].unwrap_or(0);

        self.interrupts.pending[index] = false;
        self.interrupts.counter = self.interrupts.counter.saturating_sub(1);
        self.interrupts.raise = (level + 1).min(3);
        self.interrupts.vector = interrupt.vector();
        self.interrupts.count = 5;
        self.interrupts.state = Pipeline::Disabled;

        tracing::debug!(
            "dispatching {interrupt} interrupt (vector {:02X}) at {:06X}",
            interrupt.vector(),
            self.pc
        );

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reset_levels() {
        let interrupts = Interrupts::default();
        assert_eq!(interrupts.ipl[Interrupt::Swi as usize], Some(3));
        assert_eq!(interrupts.ipl[Interrupt::HostRcv as usize], None);
    }

    #[test]
    fn disabled_sources_are_ignored() {
        let mut interrupts = Interrupts::default();
        interrupts.post(Interrupt::HostRcv);
        assert!(!interrupts.is_pending(Interrupt::HostRcv));
        assert_eq!(interrupts.counter, 0);

        interrupts.post(Interrupt::Swi);
        interrupts.post(Interrupt::Swi);
        assert_eq!(interrupts.counter, 1);
    }

    #[test]
    fn priority_register() {
        let mut interrupts = Interrupts::default();
        interrupts.set_priorities((2 << 10) | (3 << 12));
        assert_eq!(interrupts.ipl[Interrupt::HostTrx as usize], Some(1));
        assert_eq!(interrupts.ipl[Interrupt::SsiTrx as usize], Some(2));

        interrupts.set_priorities(0);
        assert_eq!(interrupts.ipl[Interrupt::HostRcv as usize], None);
        assert_eq!(interrupts.ipl[Interrupt::SsiRcv as usize], None);
    }

    #[test]
    fn arbitration() {
        let mut interrupts = Interrupts::default();
        interrupts.ipl[Interrupt::HostRcv as usize] = Some(1);
        interrupts.ipl[Interrupt::SsiRcv as usize] = Some(2);
        interrupts.post(Interrupt::HostRcv);
        interrupts.post(Interrupt::SsiRcv);

        assert_eq!(interrupts.arbitrate(0), Some(Interrupt::SsiRcv));
        assert_eq!(interrupts.arbitrate(2), Some(Interrupt::SsiRcv));
        assert_eq!(interrupts.arbitrate(3), None);

        interrupts.post(Interrupt::Trace);
        assert_eq!(interrupts.arbitrate(3), Some(Interrupt::Trace));
    }

    #[test]
    fn same_level_picks_first() {
        let mut interrupts = Interrupts::default();
        interrupts.ipl[Interrupt::HostTrx as usize] = Some(1);
        interrupts.ipl[Interrupt::SsiTrx as usize] = Some(1);
        interrupts.post(Interrupt::SsiTrx);
        interrupts.post(Interrupt::HostTrx);

        assert_eq!(interrupts.arbitrate(0), Some(Interrupt::HostTrx));
    }

    #[test]
    fn long_vector_words() {
        assert!(is_long(0x0D_0040));
        assert!(is_long(0x0B_F080));
        assert!(!is_long(0x0C_0040));
        assert!(!is_long(0x00_0000));
    }

    fn core() -> Interpreter {
        let mut core = Interpreter::default();
        core.reset();
        core.regs.sr.set_interrupt_mask(u2::new(0));
        core
    }

    #[test]
    fn fast_interrupt() {
        let mut core = core();
        core.pc = 0x100;
        core.interrupts.post(Interrupt::Swi);

        core.process_interrupts().unwrap();
        assert_eq!(core.interrupts.state, Pipeline::Disabled);
        assert!(!core.interrupts.is_pending(Interrupt::Swi));

        // count 5
        core.pc += 1;
        core.process_interrupts().unwrap();
        assert_eq!(core.pc, 0x101);

        // count 4: jump to the vector
        core.pc += 1;
        core.process_interrupts().unwrap();
        assert_eq!(core.pc, 0x06);

        // count 3 and 2: both vector words ran, back to the saved pc
        core.pc += 1;
        core.process_interrupts().unwrap();
        core.pc += 1;
        core.process_interrupts().unwrap();
        assert_eq!(core.pc, 0x102);
        assert_eq!(core.regs.sp, 0);

        core.process_interrupts().unwrap();
        core.process_interrupts().unwrap();
        assert_eq!(core.interrupts.state, Pipeline::None);
    }

    #[test]
    fn long_interrupt() {
        let mut core = core();
        core.mem.pram[0x06] = 0x0D_0040;
        core.pc = 0x100;
        core.interrupts.post(Interrupt::Swi);

        core.process_interrupts().unwrap();
        core.process_interrupts().unwrap();
        core.process_interrupts().unwrap();

        assert_eq!(core.pc, 0x06);
        assert_eq!(core.interrupts.state, Pipeline::Long);
        assert_eq!(core.regs.sp, 1);
        assert_eq!(core.regs.ssh(), 0x100);
        assert_eq!(core.regs.ssl(), 0x0000);
        assert_eq!(core.regs.sr.interrupt_mask().value(), 3);
    }

    #[test]
    fn unimplemented_vector() {
        let mut core = core();
        core.interrupts.set_priorities(1 << 10);
        core.interrupts.post(Interrupt::HostCommand);

        assert!(matches!(
            core.process_interrupts(),
            Err(Fault::UnimplementedVector { vector: 0xFF })
        ));
    }

    #[test]
    fn rep_holds_interrupts() {
        let mut core = core();
        core.loop_rep = true;
        core.interrupts.post(Interrupt::Swi);
        core.process_interrupts().unwrap();
        assert_eq!(core.interrupts.state, Pipeline::None);
    }
}
