//! Opcode templates of the non-parallel instruction space.
//!
//! This file is also compiled by the build script, so it must not depend on the rest of
//! the crate.

use strum::{FromRepr, VariantArray};

#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    pub mask: u32,
    pub target: u32,
}

impl OpcodeInfo {
    #[inline(always)]
    pub fn matches(self, value: u32) -> bool {
        (value & self.mask) == self.target
    }

    /// Parses a 24 character template. Digits are fixed bits, letters are operand
    /// fields and `_` is a separator.
    pub const fn parse(s: &'static str) -> Self {
        assert!(s.is_ascii());

        let bytes = s.as_bytes();

        let mut mask = 0;
        let mut target = 0;
        let mut bits = 0;

        let mut char_index = 0;
        while char_index < bytes.len() {
            let char = bytes[char_index];
            char_index += 1;

            if char == b'_' {
                continue;
            }

            assert!(bits < 24, "template is longer than 24 bits");
            let bit = 23 - bits;
            bits += 1;

            match char {
                b'0' => {
                    mask |= 1 << bit;
                }
                b'1' => {
                    mask |= 1 << bit;
                    target |= 1 << bit;
                }
                b'a'..=b'z' | b'A'..=b'Z' => (),
                _ => panic!("unknown character"),
            }
        }

        assert!(bits == 24, "template is shorter than 24 bits");
        Self { mask, target }
    }
}

#[inline(always)]
const fn ea_mode(value: u32) -> (u32, u32) {
    ((value >> 11) & 7, (value >> 8) & 7)
}

/// Effective address is a register mode.
#[inline(always)]
pub const fn ea_reg(value: u32) -> bool {
    let (mode, _) = ea_mode(value);
    mode != 6
}

/// Effective address is a register mode or an absolute address.
#[inline(always)]
pub const fn ea_abs(value: u32) -> bool {
    let (mode, reg) = ea_mode(value);
    mode != 6 || reg == 0
}

/// Effective address is a register mode, an absolute address or an immediate.
#[inline(always)]
pub const fn ea_any(value: u32) -> bool {
    let (mode, reg) = ea_mode(value);
    mode != 6 || reg == 0 || reg == 4
}

macro_rules! opcode {
    (
        $e:ident;
        $($name:ident = $opcode:literal $(if $pred:ident)?),*
        $(,)?
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, VariantArray)]
        #[repr(u8)]
        pub enum $e {
            $(
                $name,
            )*
            Undefined,
        }

        impl $e {
            /// Whether `value` is an encoding of this opcode.
            pub fn matches(self, value: u32) -> bool {
                match self {
                    $(
                        Self::$name => {
                            let info = const { OpcodeInfo::parse($opcode) };
                            info.matches(value) $(&& $pred(value))?
                        }
                    )*
                    Self::Undefined => false,
                }
            }

            /// Finds the opcode of `value` by a linear scan of the table.
            pub fn find_match(value: u32) -> Self {
                $(
                    if Self::$name.matches(value) {
                        return Self::$name;
                    }
                )*

                Self::Undefined
            }
        }
    };
}

opcode! {
    Opcode;
    Nop       = "0000_0000_0000_0000_0000_0000",
    Pflushun  = "0000_0000_0000_0000_0000_0001",
    Pfree     = "0000_0000_0000_0000_0000_0010",
    Pflush    = "0000_0000_0000_0000_0000_0011",
    Rti       = "0000_0000_0000_0000_0000_0100",
    Illegal   = "0000_0000_0000_0000_0000_0101",
    Trap      = "0000_0000_0000_0000_0000_0110",
    Rts       = "0000_0000_0000_0000_0000_1100",
    Reset     = "0000_0000_0000_0000_1000_0100",
    Wait      = "0000_0000_0000_0000_1000_0110",
    Stop      = "0000_0000_0000_0000_1000_0111",
    Enddo     = "0000_0000_0000_0000_1000_1100",
    Debug     = "0000_0000_0000_0010_0000_0000",
    DoForever = "0000_0000_0000_0010_0000_0011",
    Brkcc     = "0000_0000_0000_0010_0001_CCCC",
    Andi      = "0000_0000_iiii_iiii_1011_10EE",
    Ori       = "0000_0000_iiii_iiii_1111_10EE",
    AddImm    = "0000_0001_01ii_iiii_1000_d000",
    SubImm    = "0000_0001_01ii_iiii_1000_d100",
    CmpImm    = "0000_0001_01ii_iiii_1000_d101",
    AndImm    = "0000_0001_01ii_iiii_1000_d110",
    OrImm     = "0000_0001_01ii_iiii_1000_d010",
    EorImm    = "0000_0001_01ii_iiii_1000_d011",
    AddLong   = "0000_0001_0100_0000_1100_d000",
    SubLong   = "0000_0001_0100_0000_1100_d100",
    CmpLong   = "0000_0001_0100_0000_1100_d101",
    AndLong   = "0000_0001_0100_0000_1100_d110",
    OrLong    = "0000_0001_0100_0000_1100_d010",
    EorLong   = "0000_0001_0100_0000_1100_d011",
    Div       = "0000_0001_1000_0000_01JJ_d000",
    Norm      = "0000_0001_1101_1RRR_0001_d101",
    Tcc       = "0000_0010_CCCC_0000_0JJJ_d000",
    TccR      = "0000_0011_CCCC_0ttt_0JJJ_dTTT",
    Lua       = "0000_0100_010M_MRRR_0001_dddd",
    LuaRel    = "0000_0100_00aa_aRRR_aaaa_dddd",
    MovecReg  = "0000_0100_W1ee_eeee_101d_dddd",
    MovecAa   = "0000_0101_W0aa_aaaa_0s1d_dddd",
    MovecEa   = "0000_0101_W1MM_MRRR_0s1d_dddd" if ea_any,
    MovecImm  = "0000_0101_iiii_iiii_101d_dddd",
    BccImm    = "0000_0101_CCCC_01aa_aa0a_aaaa",
    BraImm    = "0000_0101_0000_11aa_aa0a_aaaa",
    BsrImm    = "0000_0101_0000_10aa_aa0a_aaaa",
    MovemAa   = "0000_0111_W0aa_aaaa_00dd_dddd",
    MovemEa   = "0000_0111_W1MM_MRRR_10dd_dddd" if ea_abs,
    DoAa      = "0000_0110_00aa_aaaa_0S00_0000",
    DoEa      = "0000_0110_01MM_MRRR_0S00_0000" if ea_reg,
    DoImm     = "0000_0110_iiii_iiii_1000_hhhh",
    DoReg     = "0000_0110_11DD_DDDD_0000_0000",
    DorImm    = "0000_0110_iiii_iiii_1001_hhhh",
    DorReg    = "0000_0110_11DD_DDDD_0001_0000",
    RepAa     = "0000_0110_00aa_aaaa_0S10_0000",
    RepEa     = "0000_0110_01MM_MRRR_0S10_0000" if ea_reg,
    RepImm    = "0000_0110_iiii_iiii_1010_hhhh",
    RepReg    = "0000_0110_11dd_dddd_0010_0000",
    JmpImm    = "0000_1100_0000_aaaa_aaaa_aaaa",
    JsrImm    = "0000_1101_0000_aaaa_aaaa_aaaa",
    JccImm    = "0000_1110_CCCC_aaaa_aaaa_aaaa",
    JsccImm   = "0000_1111_CCCC_aaaa_aaaa_aaaa",
    BraLong   = "0000_1101_0001_0000_1100_0000",
    BsrLong   = "0000_1101_0001_0000_1000_0000",
    BccLong   = "0000_1101_0001_0000_0100_CCCC",
    AslImm    = "0000_1100_0001_1101_Siii_iiiD",
    AsrImm    = "0000_1100_0001_1100_Siii_iiiD",
    LslImm    = "0000_1100_0001_1110_10ii_iiiD",
    LsrImm    = "0000_1100_0001_1110_11ii_iiiD",
    Cmpu      = "0000_1100_0001_1111_1111_gggd",
    JmpEa     = "0000_1010_11MM_MRRR_1000_0000" if ea_abs,
    JccEa     = "0000_1010_11MM_MRRR_1010_CCCC" if ea_abs,
    JsrEa     = "0000_1011_11MM_MRRR_1000_0000" if ea_abs,
    JsccEa    = "0000_1011_11MM_MRRR_1010_CCCC" if ea_abs,
    JclrAa    = "0000_1010_00aa_aaaa_1S0b_bbbb",
    JclrEa    = "0000_1010_01MM_MRRR_1S0b_bbbb" if ea_reg,
    JclrPp    = "0000_1010_10pp_pppp_1S0b_bbbb",
    JclrReg   = "0000_1010_11DD_DDDD_000b_bbbb",
    JsetAa    = "0000_1010_00aa_aaaa_1S1b_bbbb",
    JsetEa    = "0000_1010_01MM_MRRR_1S1b_bbbb" if ea_reg,
    JsetPp    = "0000_1010_10pp_pppp_1S1b_bbbb",
    JsetReg   = "0000_1010_11DD_DDDD_001b_bbbb",
    JsclrAa   = "0000_1011_00aa_aaaa_1S0b_bbbb",
    JsclrEa   = "0000_1011_01MM_MRRR_1S0b_bbbb" if ea_reg,
    JsclrPp   = "0000_1011_10pp_pppp_1S0b_bbbb",
    JsclrReg  = "0000_1011_11DD_DDDD_000b_bbbb",
    JssetAa   = "0000_1011_00aa_aaaa_1S1b_bbbb",
    JssetEa   = "0000_1011_01MM_MRRR_1S1b_bbbb" if ea_reg,
    JssetPp   = "0000_1011_10pp_pppp_1S1b_bbbb",
    JssetReg  = "0000_1011_11DD_DDDD_001b_bbbb",
    BclrAa    = "0000_1010_00aa_aaaa_0S0b_bbbb",
    BclrEa    = "0000_1010_01MM_MRRR_0S0b_bbbb" if ea_abs,
    BclrPp    = "0000_1010_10pp_pppp_0S0b_bbbb",
    BclrReg   = "0000_1010_11DD_DDDD_010b_bbbb",
    BsetAa    = "0000_1010_00aa_aaaa_0S1b_bbbb",
    BsetEa    = "0000_1010_01MM_MRRR_0S1b_bbbb" if ea_abs,
    BsetPp    = "0000_1010_10pp_pppp_0S1b_bbbb",
    BsetReg   = "0000_1010_11DD_DDDD_011b_bbbb",
    BchgAa    = "0000_1011_00aa_aaaa_0S0b_bbbb",
    BchgEa    = "0000_1011_01MM_MRRR_0S0b_bbbb" if ea_abs,
    BchgPp    = "0000_1011_10pp_pppp_0S0b_bbbb",
    BchgReg   = "0000_1011_11DD_DDDD_010b_bbbb",
    BtstAa    = "0000_1011_00aa_aaaa_0S1b_bbbb",
    BtstEa    = "0000_1011_01MM_MRRR_0S1b_bbbb" if ea_abs,
    BtstPp    = "0000_1011_10pp_pppp_0S1b_bbbb",
    BtstReg   = "0000_1011_11DD_DDDD_011b_bbbb",
    MovepReg  = "0000_100s_W1dd_dddd_00pp_pppp",
    MovepP    = "0000_100s_W1MM_MRRR_01pp_pppp" if ea_abs,
    MovepMem  = "0000_100s_W1MM_MRRR_1Spp_pppp" if ea_any,
    MoveXy0   = "0000_100d_S0MM_MRRR_aaaa_aaaa" if ea_abs,
    BrclrPp   = "0000_1100_11pp_pppp_100b_bbbb",
    BrsetPp   = "0000_1100_11pp_pppp_101b_bbbb",
    BrclrReg  = "0000_1101_11DD_DDDD_100b_bbbb",
    BrsetReg  = "0000_1101_11DD_DDDD_101b_bbbb",
    MoveXLong = "0000_1010_0111_0RRR_1WDD_DDDD",
    MoveXImm  = "0000_001a_aaaa_aRRR_1a0W_DDDD",
    MoveYImm  = "0000_001a_aaaa_aRRR_1a1W_DDDD",
    Mpyi      = "0000_0001_0100_0001_11qq_dk00",
    MovepQq   = "0000_0111_W1MM_MRRR_0Sqq_qqqq" if ea_any,
}
