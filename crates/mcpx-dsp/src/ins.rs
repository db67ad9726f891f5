mod opcodes;

pub use opcodes::Opcode;

use crate::regs::{Reg, Status};
use bitos::BitUtils;
use strum::VariantArray;

static DECODING_LUT: &[u8; 1 << 20] = include_bytes!(concat!(env!("OUT_DIR"), "/decoding_lut.bin"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, VariantArray)]
pub enum CondCode {
    CarryClear,
    GreaterOrEqual,
    NotEqual,
    Plus,
    NotNormalized,
    ExtensionClear,
    LimitClear,
    Greater,
    CarrySet,
    Less,
    Equal,
    Minus,
    Normalized,
    ExtensionSet,
    LimitSet,
    LessOrEqual,
}

impl CondCode {
    /// Decodes the low 4 bits of `value`.
    pub fn new(value: u32) -> Self {
        Self::VARIANTS[(value & 0xF) as usize]
    }

    pub fn eval(self, sr: Status) -> bool {
        let less = sr.negative() != sr.overflow();
        let normalized = sr.zero() || (!sr.unnormalized() && !sr.extension());

        match self {
            Self::CarryClear => !sr.carry(),
            Self::GreaterOrEqual => !less,
            Self::NotEqual => !sr.zero(),
            Self::Plus => !sr.negative(),
            Self::NotNormalized => !normalized,
            Self::ExtensionClear => !sr.extension(),
            Self::LimitClear => !sr.limit(),
            Self::Greater => !(sr.zero() || less),
            Self::CarrySet => sr.carry(),
            Self::Less => less,
            Self::Equal => sr.zero(),
            Self::Minus => sr.negative(),
            Self::Normalized => normalized,
            Self::ExtensionSet => sr.extension(),
            Self::LimitSet => sr.limit(),
            Self::LessOrEqual => sr.zero() || less,
        }
    }
}

/// How far the core goes with an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Implemented,
    /// Recognized, but executed as a no-op with a warning.
    Unimplemented,
    Undefined,
}

impl Opcode {
    pub const fn support(self) -> Support {
        match self {
            Self::Debug | Self::DoForever | Self::Brkcc | Self::Wait | Self::Stop => {
                Support::Unimplemented
            }
            Self::Undefined => Support::Undefined,
            _ => Support::Implemented,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acc {
    A = 0,
    B = 1,
}

impl Acc {
    #[inline(always)]
    pub fn new(b: bool) -> Self {
        if b { Self::B } else { Self::A }
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn reg(self) -> Reg {
        match self {
            Self::A => Reg::A,
            Self::B => Reg::B,
        }
    }
}

/// One of the 24-bit input registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Data {
    X0,
    Y0,
    X1,
    Y1,
}

impl Data {
    pub fn reg(self) -> Reg {
        match self {
            Self::X0 => Reg::X0,
            Self::Y0 => Reg::Y0,
            Self::X1 => Reg::X1,
            Self::Y1 => Reg::Y1,
        }
    }
}

/// One of the 48-bit input register pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pair {
    X,
    Y,
}

/// Source operand of a two-operand ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Acc(Acc),
    Pair(Pair),
    Data(Data),
}

/// The ALU operation encoded in the low byte of a parallel instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Move,
    Tfr { src: Source, dst: Acc },
    Addr(Acc),
    Tst(Acc),
    Cmp { src: Source, dst: Acc },
    Subr(Acc),
    Cmpm { src: Source, dst: Acc },
    Add { src: Source, dst: Acc },
    Rnd(Acc),
    Addl(Acc),
    Clr(Acc),
    Sub { src: Source, dst: Acc },
    Max,
    Subl(Acc),
    Not(Acc),
    Adc { src: Pair, dst: Acc },
    Sbc { src: Pair, dst: Acc },
    Asl(Acc),
    Asr(Acc),
    Lsl(Acc),
    Lsr(Acc),
    Rol(Acc),
    Ror(Acc),
    Abs(Acc),
    Neg(Acc),
    And { src: Data, dst: Acc },
    Or { src: Data, dst: Acc },
    Eor { src: Data, dst: Acc },
    Mul {
        lhs: Data,
        rhs: Data,
        dst: Acc,
        negate: bool,
        accumulate: bool,
        round: bool,
    },
}

const MUL_OPERANDS: [(Data, Data); 8] = [
    (Data::X0, Data::X0),
    (Data::Y0, Data::Y0),
    (Data::X1, Data::X0),
    (Data::Y1, Data::Y0),
    (Data::X0, Data::Y1),
    (Data::Y0, Data::X0),
    (Data::X1, Data::Y0),
    (Data::Y1, Data::X1),
];

impl AluOp {
    /// Decodes an ALU byte. Returns `None` for undefined encodings.
    pub fn decode(byte: u8) -> Option<Self> {
        let dst = Acc::new(byte.bit(3));
        let kkk = byte & 0b111;

        if byte.bit(7) {
            let (lhs, rhs) = MUL_OPERANDS[byte.bits(4, 7) as usize];
            return Some(Self::Mul {
                lhs,
                rhs,
                dst,
                negate: kkk.bit(2),
                accumulate: kkk.bit(1),
                round: kkk.bit(0),
            });
        }

        let other = Source::Acc(dst.other());
        let op = match (byte.bits(4, 7), kkk) {
            (0, 0) if dst == Acc::A => Self::Move,
            (0, 1) => Self::Tfr { src: other, dst },
            (0, 2) => Self::Addr(dst),
            (0, 3) => Self::Tst(dst),
            (0, 5) => Self::Cmp { src: other, dst },
            (0, 6) => Self::Subr(dst),
            (0, 7) => Self::Cmpm { src: other, dst },
            (0, _) => return None,

            (1, 0) => Self::Add { src: other, dst },
            (1, 1) => Self::Rnd(dst),
            (1, 2) => Self::Addl(dst),
            (1, 3) => Self::Clr(dst),
            (1, 4) => Self::Sub { src: other, dst },
            (1, 5) if dst == Acc::B => Self::Max,
            (1, 6) => Self::Subl(dst),
            (1, 7) => Self::Not(dst),
            (1, _) => return None,

            (jjj @ (2 | 3), k) => {
                let x = jjj == 2;
                let src = if x { Pair::X } else { Pair::Y };
                match k {
                    0 => Self::Add {
                        src: Source::Pair(src),
                        dst,
                    },
                    1 => Self::Adc { src, dst },
                    2 if x => Self::Asr(dst),
                    2 => Self::Asl(dst),
                    3 if x => Self::Lsr(dst),
                    3 => Self::Lsl(dst),
                    4 => Self::Sub {
                        src: Source::Pair(src),
                        dst,
                    },
                    5 => Self::Sbc { src, dst },
                    6 if x => Self::Abs(dst),
                    6 => Self::Neg(dst),
                    7 if x => Self::Ror(dst),
                    _ => Self::Rol(dst),
                }
            }

            (jjj, k) => {
                let data = [Data::X0, Data::Y0, Data::X1, Data::Y1][(jjj - 4) as usize];
                let src = Source::Data(data);
                match k {
                    0 => Self::Add { src, dst },
                    1 => Self::Tfr { src, dst },
                    2 => Self::Or { src: data, dst },
                    3 => Self::Eor { src: data, dst },
                    4 => Self::Sub { src, dst },
                    5 => Self::Cmp { src, dst },
                    6 => Self::And { src: data, dst },
                    _ => Self::Cmpm { src, dst },
                }
            }
        };

        Some(op)
    }
}

/// Register-transfer class of a parallel instruction, keyed by its top bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelMove {
    /// `X:ea,D1 S2,D2` and its Y form.
    MemoryAndAcc,
    /// ALU operation only.
    None,
    /// ALU operation plus an address register update.
    UpdateR,
    /// `S,D` between registers.
    Register,
    /// `#xx,D`
    Immediate,
    /// `L:ea` and `L:aa`.
    Long,
    /// `X:ea` or `Y:ea` with any register.
    Memory,
    /// `X:ea Y:ea`
    Dual,
}

impl ParallelMove {
    /// Classifies a word at or above 0x100000.
    pub fn new(word: u32) -> Self {
        match word.bits(20, 24) {
            0x1 => Self::MemoryAndAcc,
            0x2 if word & 0xFF_FF00 == 0x20_0000 => Self::None,
            0x2 if word & 0xFF_E000 == 0x20_4000 => Self::UpdateR,
            0x2 if word & 0xFC_0000 == 0x20_0000 => Self::Register,
            0x2 | 0x3 => Self::Immediate,
            0x4..=0x7 if word & 0xF4_0000 == 0x40_0000 => Self::Long,
            0x4..=0x7 => Self::Memory,
            _ => Self::Dual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Single(Opcode),
    Parallel(ParallelMove, AluOp),
}

impl Decoded {
    pub fn is_undefined(self) -> bool {
        self == Self::Single(Opcode::Undefined)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ins {
    pub word: u32,
}

impl std::fmt::Debug for Ins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.decoded() {
            Decoded::Single(opcode) => write!(f, "{opcode:?} ({:06X})", self.word),
            Decoded::Parallel(class, alu) => {
                write!(f, "{alu:?} || {class:?} ({:06X})", self.word)
            }
        }
    }
}

impl Ins {
    #[inline(always)]
    pub fn new(word: u32) -> Self {
        Self {
            word: word & util::WORD_MASK,
        }
    }

    #[inline(always)]
    pub fn is_parallel(self) -> bool {
        self.word >= 0x10_0000
    }

    /// Opcode of a non-parallel word. Parallel words have no opcode.
    #[inline(always)]
    pub fn opcode(self) -> Opcode {
        DECODING_LUT
            .get(self.word as usize)
            .and_then(|&index| Opcode::from_repr(index))
            .unwrap_or(Opcode::Undefined)
    }

    pub fn decoded(self) -> Decoded {
        if !self.is_parallel() {
            return Decoded::Single(self.opcode());
        }

        match AluOp::decode(self.word as u8) {
            Some(alu) => Decoded::Parallel(ParallelMove::new(self.word), alu),
            None => Decoded::Single(Opcode::Undefined),
        }
    }

    /// The `MMMRRR` effective address field.
    #[inline(always)]
    pub fn ea(self) -> u32 {
        self.word.bits(8, 14)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unique_opcodes() {
        for value in 0..(1u32 << 20) {
            let mut hit = None;
            for opcode in Opcode::VARIANTS {
                if opcode.matches(value) {
                    if let Some(hit) = hit {
                        panic!("opcodes {hit:?} and {opcode:?} are valid for {value:024b}");
                    }

                    hit = Some(*opcode);
                }
            }
        }
    }

    #[test]
    fn lut_agrees_with_scan() {
        for value in (0..(1u32 << 20)).step_by(97) {
            assert_eq!(Ins::new(value).opcode(), Opcode::find_match(value));
        }
    }

    #[test]
    fn decode_examples() {
        assert_eq!(Ins::new(0x00_0000).opcode(), Opcode::Nop);
        assert_eq!(Ins::new(0x00_000C).opcode(), Opcode::Rts);
        assert_eq!(Ins::new(0x0C_0123).opcode(), Opcode::JmpImm);
        assert_eq!(Ins::new(0x0D_0010).opcode(), Opcode::JsrImm);
        assert_eq!(Ins::new(0x06_0380).opcode(), Opcode::DoImm);
        assert_eq!(Ins::new(0x06_03A0).opcode(), Opcode::RepImm);
        assert_eq!(Ins::new(0x0A_F080).opcode(), Opcode::JmpEa);
        assert_eq!(Ins::new(0x00_0005).opcode(), Opcode::Illegal);

        // JMP with an immediate effective address does not exist
        assert_eq!(Ins::new(0x0A_F480).opcode(), Opcode::Undefined);
    }

    #[test]
    fn alu_bytes() {
        assert_eq!(AluOp::decode(0x00), Some(AluOp::Move));
        assert_eq!(AluOp::decode(0x08), None);
        assert_eq!(AluOp::decode(0x04), None);
        assert_eq!(AluOp::decode(0x15), None);
        assert_eq!(AluOp::decode(0x1D), Some(AluOp::Max));
        assert_eq!(AluOp::decode(0x13), Some(AluOp::Clr(Acc::A)));
        assert_eq!(
            AluOp::decode(0x01),
            Some(AluOp::Tfr {
                src: Source::Acc(Acc::B),
                dst: Acc::A
            })
        );
        assert_eq!(
            AluOp::decode(0x66),
            Some(AluOp::And {
                src: Data::X1,
                dst: Acc::A
            })
        );
        assert_eq!(
            AluOp::decode(0xC3),
            Some(AluOp::Mul {
                lhs: Data::X0,
                rhs: Data::Y1,
                dst: Acc::A,
                negate: false,
                accumulate: true,
                round: true,
            })
        );
    }

    #[test]
    fn parallel_classes() {
        assert_eq!(ParallelMove::new(0x20_0013), ParallelMove::None);
        assert_eq!(ParallelMove::new(0x20_5813), ParallelMove::UpdateR);
        assert_eq!(ParallelMove::new(0x21_C400), ParallelMove::Register);
        assert_eq!(ParallelMove::new(0x24_1000), ParallelMove::Immediate);
        assert_eq!(ParallelMove::new(0x44_F400), ParallelMove::Memory);
        assert_eq!(ParallelMove::new(0x40_8000), ParallelMove::Long);
        assert_eq!(ParallelMove::new(0xF0_9800), ParallelMove::Dual);
    }

    #[test]
    fn conditions() {
        let sr = Status::default().with_zero(true);
        assert!(CondCode::new(10).eval(sr));
        assert!(!CondCode::new(2).eval(sr));
        assert!(CondCode::new(15).eval(sr));

        let sr = Status::default().with_negative(true);
        assert!(CondCode::new(9).eval(sr));
        assert!(!CondCode::new(1).eval(sr));
        assert!(CondCode::new(1).eval(sr.with_overflow(true)));
    }
}
