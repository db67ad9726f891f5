use crate::alu::{self, Acc56, Arith, Scaling};
use bitos::{BitUtils, bitos, integer::u2};
use strum::FromRepr;
use util::WORD_MASK;

#[bitos(16)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Status {
    #[bits(0)]
    pub carry: bool,
    #[bits(1)]
    pub overflow: bool,
    #[bits(2)]
    pub zero: bool,
    #[bits(3)]
    pub negative: bool,
    #[bits(4)]
    pub unnormalized: bool,
    #[bits(5)]
    pub extension: bool,
    #[bits(6)]
    pub limit: bool,
    #[bits(7)]
    pub scaled: bool,
    #[bits(8..10)]
    pub interrupt_mask: u2,
    #[bits(10..12)]
    pub scaling: Scaling,
    #[bits(13)]
    pub trace: bool,
    #[bits(15)]
    pub loop_flag: bool,
}

impl Status {
    pub const WRITE_MASK: u16 = 0xAF7F;

    /// Replaces C and V with the given ones. Overflow also sets the sticky L.
    pub fn apply(&mut self, arith: Arith) {
        self.set_carry(arith.carry);
        self.apply_overflow(arith.overflow);
    }

    /// Replaces V, leaving C alone. Overflow also sets the sticky L.
    pub fn apply_overflow(&mut self, overflow: bool) {
        self.set_overflow(overflow);
        if overflow {
            self.set_limit(true);
        }
    }

    /// Updates E, U, N and Z from a 56-bit result.
    pub fn update_e_u_n_z(&mut self, value: i64) {
        self.set_extension(false);
        self.set_unnormalized(false);
        self.set_negative(false);
        self.set_zero(false);

        let scaling = self.scaling();
        if scaling == Scaling::Reserved {
            return;
        }

        self.set_extension(alu::extension(value, scaling));
        self.set_unnormalized(alu::unnormalized(value, scaling));
        self.set_zero(value == 0);
        self.set_negative(value < 0);
    }

    /// Updates N, Z and V from a 24-bit logical result.
    pub fn update_logic(&mut self, value: u32) {
        self.set_negative(value.bit(23));
        self.set_zero(value & WORD_MASK == 0);
        self.set_overflow(false);
    }
}

/// A register, by its 6-bit encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Reg {
    X0 = 0x04,
    X1,
    Y0,
    Y1,
    A0,
    B0,
    A2,
    B2,
    A1,
    B1,
    A,
    B,
    R0 = 0x10,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    N0,
    N1,
    N2,
    N3,
    N4,
    N5,
    N6,
    N7,
    M0,
    M1,
    M2,
    M3,
    M4,
    M5,
    M6,
    M7,
    Ep = 0x2A,
    Vba = 0x30,
    Sc,
    Sz = 0x38,
    Sr,
    Omr,
    Sp,
    Ssh,
    Ssl,
    La,
    Lc,
}

impl Reg {
    /// Returns the register with the given encoding, if there is one.
    pub fn new(code: u8) -> Option<Self> {
        Self::from_repr(code)
    }

    /// Mask of the register's width.
    pub fn mask(self) -> u32 {
        match self {
            Self::A2 | Self::B2 | Self::Omr => 0xFF,
            Self::Sc => 0x1F,
            Self::Sp => 0x3F,
            Self::Sr | Self::Ssh | Self::Ssl | Self::La | Self::Lc => 0xFFFF,
            _ => WORD_MASK,
        }
    }
}

/// Sticky stack error bit of SP.
pub const SP_ERROR: u8 = 1 << 4;
/// Sticky stack underflow bit of SP.
pub const SP_UNDERFLOW: u8 = 1 << 5;

#[derive(Debug, Clone)]
pub struct Registers {
    pub x: [u32; 2],
    pub y: [u32; 2],
    pub acc: [Acc56; 2],
    pub r: [u32; 8],
    pub n: [u32; 8],
    pub m: [u32; 8],
    pub ep: u32,
    pub vba: u32,
    pub sc: u8,
    pub sz: u32,
    pub sr: Status,
    pub omr: u8,
    pub sp: u8,
    pub la: u32,
    pub lc: u32,
    /// LC as it was before the active REP.
    pub lc_save: u32,
    /// Row 0 holds SSH, row 1 holds SSL.
    pub stack: [[u32; 16]; 2],
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            x: Default::default(),
            y: Default::default(),
            acc: Default::default(),
            r: Default::default(),
            n: Default::default(),
            m: [WORD_MASK; 8],
            ep: Default::default(),
            vba: Default::default(),
            sc: Default::default(),
            sz: Default::default(),
            sr: Status::from_bits(0x0300),
            omr: 0x02,
            sp: Default::default(),
            la: Default::default(),
            lc: Default::default(),
            lc_save: Default::default(),
            stack: Default::default(),
        }
    }
}

impl Registers {
    #[inline(always)]
    fn slot(&self) -> usize {
        (self.sp & 0xF) as usize
    }

    pub fn ssh(&self) -> u32 {
        self.stack[0][self.slot()]
    }

    pub fn ssl(&self) -> u32 {
        self.stack[1][self.slot()]
    }

    /// Reads a register without side effects. A and B read their middle limb.
    pub fn get(&self, reg: Reg) -> u32 {
        match reg {
            Reg::X0 => self.x[0],
            Reg::X1 => self.x[1],
            Reg::Y0 => self.y[0],
            Reg::Y1 => self.y[1],
            Reg::A0 => self.acc[0].low,
            Reg::B0 => self.acc[1].low,
            Reg::A2 => self.acc[0].high as u32,
            Reg::B2 => self.acc[1].high as u32,
            Reg::A1 | Reg::A => self.acc[0].mid,
            Reg::B1 | Reg::B => self.acc[1].mid,
            Reg::R0 | Reg::R1 | Reg::R2 | Reg::R3 | Reg::R4 | Reg::R5 | Reg::R6 | Reg::R7 => {
                self.r[reg as usize - Reg::R0 as usize]
            }
            Reg::N0 | Reg::N1 | Reg::N2 | Reg::N3 | Reg::N4 | Reg::N5 | Reg::N6 | Reg::N7 => {
                self.n[reg as usize - Reg::N0 as usize]
            }
            Reg::M0 | Reg::M1 | Reg::M2 | Reg::M3 | Reg::M4 | Reg::M5 | Reg::M6 | Reg::M7 => {
                self.m[reg as usize - Reg::M0 as usize]
            }
            Reg::Ep => self.ep,
            Reg::Vba => self.vba,
            Reg::Sc => self.sc as u32,
            Reg::Sz => self.sz,
            Reg::Sr => self.sr.to_bits() as u32,
            Reg::Omr => self.omr as u32,
            Reg::Sp => self.sp as u32,
            Reg::Ssh => self.ssh(),
            Reg::Ssl => self.ssl(),
            Reg::La => self.la,
            Reg::Lc => self.lc,
        }
    }

    /// Writes a register, masking the value to its width.
    ///
    /// A and B are loaded as a sign-extended word with a cleared low limb. SP, SSH and SSL
    /// access the stack without any overflow detection.
    pub fn set(&mut self, reg: Reg, value: u32) {
        let value = value & reg.mask();
        match reg {
            Reg::X0 => self.x[0] = value,
            Reg::X1 => self.x[1] = value,
            Reg::Y0 => self.y[0] = value,
            Reg::Y1 => self.y[1] = value,
            Reg::A0 => self.acc[0].low = value,
            Reg::B0 => self.acc[1].low = value,
            Reg::A2 => self.acc[0].high = value as u8,
            Reg::B2 => self.acc[1].high = value as u8,
            Reg::A1 => self.acc[0].mid = value,
            Reg::B1 => self.acc[1].mid = value,
            Reg::A => self.acc[0] = Acc56::from_word(value),
            Reg::B => self.acc[1] = Acc56::from_word(value),
            Reg::R0 | Reg::R1 | Reg::R2 | Reg::R3 | Reg::R4 | Reg::R5 | Reg::R6 | Reg::R7 => {
                self.r[reg as usize - Reg::R0 as usize] = value;
            }
            Reg::N0 | Reg::N1 | Reg::N2 | Reg::N3 | Reg::N4 | Reg::N5 | Reg::N6 | Reg::N7 => {
                self.n[reg as usize - Reg::N0 as usize] = value;
            }
            Reg::M0 | Reg::M1 | Reg::M2 | Reg::M3 | Reg::M4 | Reg::M5 | Reg::M6 | Reg::M7 => {
                self.m[reg as usize - Reg::M0 as usize] = value;
            }
            Reg::Ep => self.ep = value,
            Reg::Vba => self.vba = value,
            Reg::Sc => self.sc = value as u8,
            Reg::Sz => self.sz = value,
            Reg::Sr => self.sr = Status::from_bits(value as u16 & Status::WRITE_MASK),
            Reg::Omr => self.omr = value as u8 & 0xC7,
            Reg::Sp => self.sp = value as u8,
            Reg::Ssh => {
                let slot = self.slot();
                if slot != 0 {
                    self.stack[0][slot] = value;
                }
            }
            Reg::Ssl => {
                let slot = self.slot();
                if slot != 0 {
                    self.stack[1][slot] = value;
                }
            }
            Reg::La => self.la = value,
            Reg::Lc => self.lc = value,
        }
    }

    /// Pushes a frame. `ssl` is left alone when `None`.
    ///
    /// Returns whether this push entered the stack error state.
    pub fn push(&mut self, ssh: u32, ssl: Option<u32>) -> bool {
        let sticky = self.sp & (SP_ERROR | SP_UNDERFLOW);
        let next = (self.sp & 0xF) + 1;
        let entered = sticky & SP_ERROR == 0 && next & SP_ERROR != 0;

        self.sp = (sticky | next) & 0x3F;

        let slot = (next & 0xF) as usize;
        if slot != 0 {
            self.stack[0][slot] = ssh & 0xFFFF;
            if let Some(ssl) = ssl {
                self.stack[1][slot] = ssl & 0xFFFF;
            }
        }

        entered
    }

    /// Pops a frame, returning `(SSH, SSL)` as they were before popping.
    ///
    /// Also returns whether this pop entered the stack error state.
    pub fn pop(&mut self) -> ((u32, u32), bool) {
        let frame = (self.ssh(), self.ssl());

        let sticky = self.sp & (SP_ERROR | SP_UNDERFLOW);
        let next = (self.sp & 0xF).wrapping_sub(1);
        let entered = sticky & SP_ERROR == 0 && next & SP_ERROR != 0;

        self.sp = (sticky | next) & 0x3F;
        (frame, entered)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reset_values() {
        let regs = Registers::default();
        assert_eq!(regs.get(Reg::Sr), 0x0300);
        assert_eq!(regs.get(Reg::Omr), 0x02);
        assert_eq!(regs.get(Reg::M3), 0xFF_FFFF);
        assert_eq!(regs.sr.interrupt_mask().value(), 3);
    }

    #[test]
    fn masking() {
        let mut regs = Registers::default();
        regs.set(Reg::Sr, 0xFFFF);
        assert_eq!(regs.get(Reg::Sr), 0xAF7F);

        regs.set(Reg::Omr, 0xFF);
        assert_eq!(regs.get(Reg::Omr), 0xC7);

        regs.set(Reg::Sc, 0xFF);
        assert_eq!(regs.get(Reg::Sc), 0x1F);

        regs.set(Reg::A2, 0x1FF);
        assert_eq!(regs.get(Reg::A2), 0xFF);
    }

    #[test]
    fn accumulator_write() {
        let mut regs = Registers::default();
        regs.acc[0] = Acc56::from(0x12_3456_7890_ABCD);
        regs.set(Reg::A, 0x80_0001);
        assert_eq!(regs.acc[0].high, 0xFF);
        assert_eq!(regs.acc[0].mid, 0x80_0001);
        assert_eq!(regs.acc[0].low, 0);
    }

    #[test]
    fn push_then_pop() {
        let mut regs = Registers::default();
        assert!(!regs.push(0x1234, Some(0x0300)));
        assert_eq!(regs.sp, 1);
        assert_eq!((regs.ssh(), regs.ssl()), (0x1234, 0x0300));

        let (frame, error) = regs.pop();
        assert_eq!(frame, (0x1234, 0x0300));
        assert!(!error);
        assert_eq!(regs.sp, 0);
    }

    #[test]
    fn stack_overflow() {
        let mut regs = Registers::default();
        for i in 0..15 {
            assert!(!regs.push(i, Some(i)));
        }

        assert!(regs.push(15, Some(15)));
        assert_ne!(regs.sp & SP_ERROR, 0);

        // sticky: no second report
        assert!(!regs.push(16, Some(16)));

        // slot 0 is never written
        assert_eq!(regs.stack[0][0], 0);
    }

    #[test]
    fn stack_underflow() {
        let mut regs = Registers::default();
        let (_, error) = regs.pop();
        assert!(error);
        assert_eq!(regs.sp & (SP_ERROR | SP_UNDERFLOW), SP_ERROR | SP_UNDERFLOW);
    }
}
