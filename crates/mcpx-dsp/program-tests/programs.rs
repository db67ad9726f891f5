use mcpx_dsp::regs::Reg;

/// A program run from P:0 after a reset.
pub struct Program {
    pub name: &'static str,
    pub code: &'static [u32],
    /// Registers written before the first instruction.
    pub initial: &'static [(Reg, u32)],
    /// Instructions to execute.
    pub steps: usize,
    pub pc: u32,
    pub expected: &'static [(Reg, u32)],
}

const ADD_X0_A: u32 = 0x20_0040;
const ADD_Y0_B: u32 = 0x20_0058;
const NOP: u32 = 0x00_0000;

pub const PROGRAMS: &[Program] = &[
    Program {
        name: "rep_accumulate",
        // rep #5; add x0,a
        code: &[0x06_05A0, ADD_X0_A, NOP],
        initial: &[(Reg::X0, 2), (Reg::Lc, 0x77)],
        steps: 6,
        pc: 2,
        expected: &[(Reg::A1, 10), (Reg::Lc, 0x77), (Reg::Sp, 0)],
    },
    Program {
        name: "nested_do",
        // do #2,$5; do #3,$4; add x0,a; add y0,b
        code: &[0x06_0280, 0x00_0005, 0x06_0380, 0x00_0004, ADD_X0_A, ADD_Y0_B, NOP],
        initial: &[(Reg::X0, 1), (Reg::Y0, 1)],
        steps: 11,
        pc: 6,
        expected: &[(Reg::A1, 6), (Reg::B1, 2), (Reg::Sp, 0), (Reg::La, 0)],
    },
    Program {
        name: "nested_subroutines",
        // jsr $10; nop ... $10: jsr $20; rts ... $20: add x0,a; rts
        code: &[
            0x0D_0010, NOP, NOP, NOP, NOP, NOP, NOP, NOP, NOP, NOP, NOP, NOP, NOP, NOP, NOP,
            NOP, 0x0D_0020, 0x00_000C, NOP, NOP, NOP, NOP, NOP, NOP, NOP, NOP, NOP, NOP, NOP,
            NOP, NOP, NOP, ADD_X0_A, 0x00_000C,
        ],
        initial: &[(Reg::X0, 3)],
        steps: 5,
        pc: 1,
        expected: &[(Reg::A1, 3), (Reg::Sp, 0)],
    },
    Program {
        name: "multiply_accumulate",
        // mac y0,x0,a twice
        code: &[0x20_00D2, 0x20_00D2],
        initial: &[(Reg::X0, 0x40_0000), (Reg::Y0, 0x40_0000)],
        steps: 2,
        pc: 2,
        expected: &[(Reg::A2, 0), (Reg::A1, 0x40_0000), (Reg::A0, 0)],
    },
    Program {
        name: "immediate_moves",
        // move #$12,x0; move #$12,r3
        code: &[0x24_1200, 0x33_1200],
        initial: &[],
        steps: 2,
        pc: 2,
        expected: &[(Reg::X0, 0x12_0000), (Reg::R3, 0x12)],
    },
    Program {
        name: "count_until_equal",
        // add x0,a; cmp y0,a; jne $0
        code: &[ADD_X0_A, 0x20_0055, 0x0E_2000, NOP],
        initial: &[(Reg::X0, 1), (Reg::Y0, 5)],
        steps: 15,
        pc: 3,
        expected: &[(Reg::A1, 5)],
    },
    Program {
        name: "modulo_buffer",
        // movec #3,m0; lua (r0)+,r0 four times
        code: &[0x05_03A0, 0x04_5810, 0x04_5810, 0x04_5810, 0x04_5810],
        initial: &[(Reg::R0, 0x40)],
        steps: 5,
        pc: 5,
        expected: &[(Reg::M0, 3), (Reg::R0, 0x40)],
    },
];
