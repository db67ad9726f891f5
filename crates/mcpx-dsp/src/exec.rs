//! Instruction execution.

mod parallel;

use crate::{
    Fault, Interpreter, Io,
    alu::{self, Acc56, Arith},
    ins::{Acc, AluOp, CondCode, Data, Decoded, Ins, Opcode, Support},
    interrupt::{Interrupt, Pipeline},
    mem::{PERIPH_BASE, Space},
    regs::Reg,
};
use bitos::BitUtils;
use parallel::word_operand;
use strum::VariantArray;
use util::{WORD_MASK, sext24, sign_extend};

/// First X address reachable through a 6-bit `pp` field.
const PP_BASE: u32 = 0xFF_FFC0;
/// First X address reachable through a 6-bit `qq` field.
const QQ_BASE: u32 = PERIPH_BASE;

/// X or Y, as selected by a single opcode bit.
#[inline(always)]
fn xy(y: bool) -> Space {
    if y { Space::Y } else { Space::X }
}

/// Reverses the low `bits` bits of `value`.
#[inline(always)]
fn reverse(value: u32, bits: u32) -> u32 {
    value.reverse_bits() >> (32 - bits)
}

/// Bit-reverse update: the low bits are reversed, incremented and reversed back.
fn bit_reverse(r: u32, n: u32) -> u32 {
    let bits = (n & 0xFFFF).trailing_zeros().min(15) + 1;
    let low_mask = (1 << bits) - 1;
    let low = reverse((reverse(r & low_mask, bits) + 1) & low_mask, bits);

    (r & 0xFFFF & !low_mask) | low
}

/// Modulo update of `r` by `modifier`, with `m` holding the modulus minus one.
fn modulo(r: u32, modifier: i32, m: u32) -> u32 {
    let modulus = m as i64 + 1;
    let size = (modulus as u64).next_power_of_two() as i64;
    let lo = r as i64 & !(size - 1);
    let hi = lo + modulus - 1;

    let original = modifier as i64;
    let mut modifier = original;
    let mut value = r as i64;
    if original.abs() > modulus {
        while modifier > size {
            value += size;
            modifier -= size;
        }

        while modifier < -size {
            value -= size;
            modifier += size;
        }
    }

    value += modifier;
    if original.abs() != modulus {
        if value > hi {
            value -= modulus;
        } else if value < lo {
            value += modulus;
        }
    }

    value as u32 & WORD_MASK
}

/// Operand of a bit manipulation instruction.
#[derive(Debug, Clone, Copy)]
enum BitOperand {
    Memory(Space, u32),
    Register(u32),
}

impl Interpreter {
    /// Executes one instruction and advances the program counter, then runs the interrupt
    /// pipeline.
    pub fn step(&mut self, io: &mut Io) -> Result<(), Fault> {
        self.execute_instruction(io)?;
        self.update_pc();
        self.process_interrupts()?;
        self.instr_count += 1;

        Ok(())
    }

    /// Executes the instruction at PC without advancing it.
    pub fn execute_instruction(&mut self, io: &mut Io) -> Result<(), Fault> {
        let ins = Ins::new(self.fetch(self.pc)?);
        self.cur_len = 1;
        self.instr_cycle = 2;
        self.redirected = false;

        tracing::trace!("{:06X}: {ins:?}", self.pc);

        match ins.decoded() {
            Decoded::Parallel(class, op) => self.parallel(io, ins, class, op),
            Decoded::Single(opcode) => EXEC_LUT[opcode as usize](self, io, ins),
        }
    }

    fn update_pc(&mut self) {
        let mut advance = !self.redirected;
        if self.loop_rep {
            if self.pc_on_rep {
                if self.regs.lc == 0 {
                    self.regs.lc = 0x1_0000;
                }

                self.pc_on_rep = false;
            } else {
                self.regs.lc = self.regs.lc.wrapping_sub(1) & 0xFFFF;
                if self.regs.lc > 0 {
                    advance = false;
                } else {
                    self.loop_rep = false;
                    self.regs.lc = self.regs.lc_save;
                }
            }
        }

        if advance {
            self.pc = (self.pc + self.cur_len) & WORD_MASK;
        }

        // PC now points past the last instruction of the loop body
        if self.regs.sr.loop_flag() && self.pc == (self.regs.la + 1) & WORD_MASK {
            self.regs.lc = self.regs.lc.wrapping_sub(1) & 0xFFFF;
            if self.regs.lc == 0 {
                self.end_loop();
            } else {
                self.pc = self.regs.ssh();
            }
        }
    }

    /// Unwinds the innermost DO loop frame.
    fn end_loop(&mut self) {
        let (_, saved) = self.pop();
        let sr = (self.regs.get(Reg::Sr) & 0x7F) | (saved & 0x8000);
        self.regs.set(Reg::Sr, sr);

        let (la, lc) = self.pop();
        self.regs.la = la;
        self.regs.lc = lc;
    }

    /// Consumes the next extension word.
    fn ext(&mut self) -> Result<u32, Fault> {
        let word = self.fetch((self.pc + self.cur_len) & WORD_MASK)?;
        self.cur_len += 1;
        Ok(word)
    }

    #[inline(always)]
    fn jump(&mut self, target: u32) {
        self.pc = target & WORD_MASK;
        self.redirected = true;
    }

    /// Jumps to a subroutine. A long interrupt has already pushed the return frame.
    fn call(&mut self, target: u32) {
        if self.interrupts.state == Pipeline::Long {
            self.interrupts.state = Pipeline::Disabled;
        } else {
            let ret = (self.pc + self.cur_len) & WORD_MASK;
            self.push(ret, Some(self.regs.get(Reg::Sr)));
        }

        self.jump(target);
    }

    /// Applies a modifier to Rn according to Mn.
    fn update_rn(&mut self, n: usize, modifier: i32) {
        let r = self.regs.r[n];
        let m = self.regs.m[n] & 0xFFFF;

        self.regs.r[n] = match m {
            0xFFFF => r.wrapping_add_signed(modifier) & WORD_MASK,
            0 => bit_reverse(r, self.regs.n[n]),
            1..=0x7FFF => modulo(r, modifier, m),
            _ => r,
        };
    }

    /// Resolves an `MMMRRR` effective address, returning it and whether it is an immediate.
    fn effective_address(&mut self, field: u32) -> Result<(u32, bool), Fault> {
        let n = (field & 7) as usize;
        let r = self.regs.r[n];
        let offset = sext24(self.regs.n[n]);

        let addr = match (field >> 3) & 7 {
            0 => {
                self.update_rn(n, -offset);
                r
            }
            1 => {
                self.update_rn(n, offset);
                r
            }
            2 => {
                self.update_rn(n, -1);
                r
            }
            3 => {
                self.update_rn(n, 1);
                r
            }
            4 => r,
            5 => {
                self.instr_cycle += 2;
                self.update_rn(n, offset);
                let addr = self.regs.r[n];
                self.regs.r[n] = r;
                addr
            }
            6 => {
                self.instr_cycle += 2;
                return Ok((self.ext()?, n != 0));
            }
            _ => {
                self.instr_cycle += 2;
                self.update_rn(n, -1);
                self.regs.r[n]
            }
        };

        Ok((addr, false))
    }

    /// Address of a memory operand: absolute when `aa` is set, an effective address otherwise.
    fn memory_operand(&mut self, ins: Ins, aa: bool) -> Result<(u32, bool), Fault> {
        if aa {
            Ok((ins.ea(), false))
        } else {
            self.effective_address(ins.ea())
        }
    }

    /// Operand of the bit instruction families, keyed by bits 14 and 15.
    fn bit_operand(&mut self, ins: Ins) -> Result<BitOperand, Fault> {
        let word = ins.word;
        let field = ins.ea();
        let space = xy(word.bit(6));

        Ok(match word.bits(14, 16) {
            0 => BitOperand::Memory(space, field),
            1 => BitOperand::Memory(space, self.effective_address(field)?.0),
            2 => BitOperand::Memory(space, PP_BASE + field),
            _ => BitOperand::Register(field),
        })
    }

    fn load_bit_operand(&mut self, io: &mut Io, operand: BitOperand) -> Result<u32, Fault> {
        match operand {
            BitOperand::Memory(space, addr) => self.read(io, space, addr),
            BitOperand::Register(code) => Ok(self.move_source(code)),
        }
    }

    fn store_bit_operand(
        &mut self,
        io: &mut Io,
        operand: BitOperand,
        value: u32,
    ) -> Result<(), Fault> {
        match operand {
            BitOperand::Memory(space, addr) => self.write(io, space, addr, value),
            BitOperand::Register(code) => {
                self.write_reg(code, value);
                Ok(())
            }
        }
    }

    /// Reads a loop count source: A and B through the limiter, anything else as is.
    fn count_source(&mut self, code: u32) -> u32 {
        self.move_source(code) & 0xFFFF
    }
}

#[inline(always)]
fn data_operand(field: u32) -> Data {
    [Data::X0, Data::Y0, Data::X1, Data::Y1][(field & 3) as usize]
}

// Control
impl Interpreter {
    pub fn nop(&mut self, _: &mut Io, _: Ins) -> Result<(), Fault> {
        Ok(())
    }

    pub fn rti(&mut self, _: &mut Io, _: Ins) -> Result<(), Fault> {
        let (pc, sr) = self.pop();
        self.regs.set(Reg::Sr, sr);
        self.jump(pc);
        self.instr_cycle += 2;
        Ok(())
    }

    pub fn rts(&mut self, _: &mut Io, _: Ins) -> Result<(), Fault> {
        let (pc, _) = self.pop();
        self.jump(pc);
        self.instr_cycle += 2;
        Ok(())
    }

    pub fn illegal(&mut self, _: &mut Io, _: Ins) -> Result<(), Fault> {
        self.interrupts.post(Interrupt::Illegal);
        Ok(())
    }

    pub fn trap(&mut self, _: &mut Io, _: Ins) -> Result<(), Fault> {
        self.interrupts.post(Interrupt::Swi);
        Ok(())
    }

    pub fn reset_peripherals(&mut self, _: &mut Io, _: Ins) -> Result<(), Fault> {
        tracing::debug!("RESET instruction at {:06X}", self.pc);
        self.instr_cycle += 2;
        Ok(())
    }

    pub fn enddo(&mut self, _: &mut Io, _: Ins) -> Result<(), Fault> {
        self.end_loop();
        Ok(())
    }

    pub fn unimplemented(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        tracing::warn!("unimplemented instruction {ins:?} at {:06X}", self.pc);
        Ok(())
    }

    pub fn undefined(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        if io.detached {
            self.instr_cycle = 0;
        } else {
            tracing::warn!("undefined instruction {:06X} at {:06X}", ins.word, self.pc);
        }

        Ok(())
    }

    pub fn andi_ori(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let imm = ins.word.bits(8, 16);
        let or = ins.opcode() == Opcode::Ori;

        match ins.word & 3 {
            0 => {
                let sr = self.regs.get(Reg::Sr);
                let sr = if or { sr | (imm << 8) } else { sr & ((imm << 8) | 0xFF) };
                self.regs.set(Reg::Sr, sr);
            }
            1 => {
                let sr = self.regs.get(Reg::Sr);
                let sr = if or { sr | imm } else { sr & (0xFF00 | imm) };
                self.regs.set(Reg::Sr, sr);
            }
            2 => {
                let omr = self.regs.get(Reg::Omr);
                let omr = if or { omr | imm } else { omr & imm };
                self.regs.set(Reg::Omr, omr);
            }
            _ => (),
        }

        Ok(())
    }
}

// Arithmetic
impl Interpreter {
    pub fn alu_imm(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let opcode = ins.opcode();
        let dst = Acc::new(ins.word.bit(3));
        let imm = match opcode {
            Opcode::AddImm
            | Opcode::SubImm
            | Opcode::CmpImm
            | Opcode::AndImm
            | Opcode::OrImm
            | Opcode::EorImm => ins.word.bits(8, 14),
            _ => {
                self.instr_cycle += 2;
                self.ext()?
            }
        };

        match opcode {
            Opcode::AddImm | Opcode::AddLong => {
                let (value, arith) = alu::add(self.acc(dst), word_operand(imm));
                self.store_arith(dst, value, arith);
            }
            Opcode::SubImm | Opcode::SubLong => {
                let (value, arith) = alu::sub(self.acc(dst), word_operand(imm));
                self.store_arith(dst, value, arith);
            }
            Opcode::CmpImm | Opcode::CmpLong => {
                let (value, arith) = alu::sub(self.acc(dst), word_operand(imm));
                self.regs.sr.update_e_u_n_z(value);
                self.regs.sr.apply(arith);
            }
            Opcode::AndImm | Opcode::AndLong => self.logic(dst, |mid| mid & imm),
            Opcode::OrImm | Opcode::OrLong => self.logic(dst, |mid| mid | imm),
            _ => self.logic(dst, |mid| mid ^ imm),
        }

        Ok(())
    }

    /// One step of a non-restoring division. The quotient bit lands in C and bit 0.
    pub fn div(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let src = word_operand(self.regs.get(data_operand(ins.word >> 4).reg()));
        let dst = Acc::new(ins.word.bit(3));

        let value = self.acc(dst);
        let carry = self.regs.sr.carry();

        let (shifted, arith) = alu::asl(value, 1);
        let (result, _) = if (value < 0) != (src < 0) {
            alu::add(shifted, src)
        } else {
            alu::sub(shifted, src)
        };

        let result = self.set_acc(dst, result | carry as i64);
        self.regs.sr.set_carry(result >= 0);
        self.regs.sr.apply_overflow(arith.overflow);

        Ok(())
    }

    pub fn norm(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let n = ins.word.bits(8, 11) as usize;
        let dst = Acc::new(ins.word.bit(3));
        let sr = self.regs.sr;
        let value = self.acc(dst);

        let (value, arith) = if !sr.extension() && sr.unnormalized() && !sr.zero() {
            self.regs.r[n] = self.regs.r[n].wrapping_sub(1) & WORD_MASK;
            alu::asl(value, 1)
        } else if sr.extension() {
            self.regs.r[n] = (self.regs.r[n] + 1) & WORD_MASK;
            alu::asr(value, 1)
        } else {
            (value, Arith::default())
        };

        self.store_arith(dst, value, arith);
        Ok(())
    }

    /// Unsigned compare. Only C, Z and N are meaningful afterwards.
    pub fn cmpu(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let dst = Acc::new(ins.word.bit(0));
        let value = match ins.word.bits(1, 4) {
            0 => self.limited(dst.other()),
            4 => self.regs.x[0],
            5 => self.regs.y[0],
            6 => self.regs.x[1],
            7 => self.regs.y[1],
            _ => 0,
        };

        let (result, arith) = alu::sub(self.acc(dst), word_operand(value));

        let sr = &mut self.regs.sr;
        sr.set_overflow(false);
        sr.set_carry(arith.carry);
        sr.set_zero(result == 0);
        sr.set_negative(result < 0);

        Ok(())
    }

    pub fn mpyi(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let imm = self.ext()?;
        let src = self.regs.get(data_operand(ins.word >> 4).reg());
        let dst = Acc::new(ins.word.bit(3));

        let value = self.set_acc(dst, alu::mul(imm, src, ins.word.bit(2)));
        self.regs.sr.update_e_u_n_z(value);
        self.regs.sr.set_overflow(false);

        self.instr_cycle += 2;
        Ok(())
    }

    pub fn shift_imm(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let word = ins.word;
        let opcode = ins.opcode();
        let dst = Acc::new(word.bit(0));

        match opcode {
            Opcode::AslImm | Opcode::AsrImm => {
                let src = Acc::new(word.bit(7));
                let amount = word.bits(1, 7);
                let (value, arith) = if opcode == Opcode::AslImm {
                    alu::asl(self.acc(src), amount)
                } else {
                    alu::asr(self.acc(src), amount)
                };

                self.store_arith(dst, value, arith);
            }
            _ => {
                let amount = word.bits(1, 6);
                let left = opcode == Opcode::LslImm;

                // C is the last bit shifted out of the 24-bit limb
                let mid = self.regs.acc[dst.index()].mid;
                let carry = match amount {
                    1..=24 if left => (mid >> (24 - amount)) & 1 != 0,
                    1..=24 => (mid >> (amount - 1)) & 1 != 0,
                    _ => false,
                };

                self.regs.sr.set_carry(carry);

                self.logic(dst, |mid| {
                    if left {
                        mid.checked_shl(amount).unwrap_or(0)
                    } else {
                        mid.checked_shr(amount).unwrap_or(0)
                    }
                });
            }
        }

        Ok(())
    }
}

// Transfers
impl Interpreter {
    /// `Tcc S1,D1` and `Tcc S1,D1 S2,D2`.
    pub fn tcc(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let word = ins.word;
        if !CondCode::new(word >> 12).eval(self.regs.sr) {
            return Ok(());
        }

        let index = word.bits(3, 7);
        match index {
            0 => self.regs.acc[0] = self.acc_limbs(Acc::B),
            1 => self.regs.acc[1] = self.acc_limbs(Acc::A),
            8..=15 => {
                let src = [Reg::X0, Reg::Y0, Reg::X1, Reg::Y1][((index - 8) >> 1) as usize];
                let dst = Acc::new(index.bit(0));
                self.regs.acc[dst.index()] = Acc56::from_word(self.regs.get(src));
            }
            _ => (),
        }

        if word.bit(16) {
            self.regs.r[(word & 7) as usize] = self.regs.r[word.bits(8, 11) as usize];
        }

        Ok(())
    }

    /// Writes a LUA result to Rn or Nn.
    fn store_address(&mut self, ins: Ins, value: u32) {
        let dst = (ins.word & 7) as usize;
        if ins.word.bit(3) {
            self.regs.n[dst] = value;
        } else {
            self.regs.r[dst] = value;
        }
    }

    pub fn lua(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let n = ins.word.bits(8, 11) as usize;
        let saved = self.regs.r[n];

        self.effective_address(ins.ea())?;
        let value = self.regs.r[n];
        self.regs.r[n] = saved;

        self.store_address(ins, value);
        self.instr_cycle += 2;
        Ok(())
    }

    pub fn lua_rel(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let word = ins.word;
        let offset = sign_extend(7, (word.bits(4, 8) | (word.bits(11, 14) << 4)) as u64);
        let base = self.regs.r[word.bits(8, 11) as usize];

        self.store_address(ins, base.wrapping_add(offset as u32) & WORD_MASK);
        self.instr_cycle += 2;
        Ok(())
    }

    pub fn movec_reg(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let ctrl = ins.word.bits(0, 6);
        let other = ins.word.bits(8, 14);

        if ins.word.bit(15) {
            let value = self.move_source(other);
            self.write_reg(ctrl, value);
        } else {
            let value = self.read_reg(ctrl);
            self.move_dest(other, value);
        }

        Ok(())
    }

    pub fn movec_mem(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let ctrl = ins.word.bits(0, 6);
        let space = xy(ins.word.bit(6));
        let (addr, immediate) = self.memory_operand(ins, ins.opcode() == Opcode::MovecAa)?;

        if ins.word.bit(15) {
            let value = if immediate {
                addr
            } else {
                self.read(io, space, addr)?
            };

            self.write_reg(ctrl, value);
        } else {
            let value = self.read_reg(ctrl);
            self.write(io, space, addr, value)?;
        }

        Ok(())
    }

    pub fn movec_imm(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        self.write_reg(ins.word.bits(0, 6), ins.word.bits(8, 16));
        Ok(())
    }

    pub fn movem(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let reg = ins.word.bits(0, 6);
        let (addr, _) = self.memory_operand(ins, ins.opcode() == Opcode::MovemAa)?;

        if ins.word.bit(15) {
            let value = self.read(io, Space::P, addr)?;
            self.write_reg(reg, value);
        } else {
            let value = self.read_reg(reg);
            self.write(io, Space::P, addr, value)?;
        }

        self.instr_cycle += 4;
        Ok(())
    }

    /// `X:pp <-> R` and `Y:pp <-> R`.
    pub fn movep_reg(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let pp = PP_BASE + ins.word.bits(0, 6);
        let space = xy(ins.word.bit(16));
        let reg = ins.word.bits(8, 14);

        if ins.word.bit(15) {
            let value = self.read_reg(reg);
            self.write(io, space, pp, value)?;
        } else {
            let value = self.read(io, space, pp)?;
            self.write_reg(reg, value);
        }

        self.instr_cycle += 2;
        Ok(())
    }

    /// `P:ea <-> X:pp` and `P:ea <-> Y:pp`.
    pub fn movep_p(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let pp = PP_BASE + ins.word.bits(0, 6);
        let space = xy(ins.word.bit(16));
        let (addr, _) = self.effective_address(ins.ea())?;

        if ins.word.bit(15) {
            let value = self.read(io, Space::P, addr)?;
            self.write(io, space, pp, value)?;
        } else {
            let value = self.read(io, space, pp)?;
            self.write(io, Space::P, addr, value)?;
        }

        self.instr_cycle += 4;
        Ok(())
    }

    /// Moves between a memory operand and a peripheral address.
    fn movep_memory(
        &mut self,
        io: &mut Io,
        ins: Ins,
        (periph_space, periph): (Space, u32),
    ) -> Result<(), Fault> {
        let space = xy(ins.word.bit(6));
        let (addr, immediate) = self.effective_address(ins.ea())?;

        if ins.word.bit(15) {
            let value = if immediate {
                addr
            } else {
                self.read(io, space, addr)?
            };

            self.write(io, periph_space, periph, value)?;
        } else {
            let value = self.read(io, periph_space, periph)?;
            self.write(io, space, addr, value)?;
        }

        self.instr_cycle += 2;
        Ok(())
    }

    /// `X:ea <-> X:pp`, `Y:ea <-> Y:pp` and their crossed forms.
    pub fn movep_mem(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let periph = PP_BASE + ins.word.bits(0, 6);
        self.movep_memory(io, ins, (xy(ins.word.bit(16)), periph))
    }

    /// `X:ea <-> X:qq` and `Y:ea <-> X:qq`.
    pub fn movep_qq(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let periph = QQ_BASE + ins.word.bits(0, 6);
        self.movep_memory(io, ins, (Space::X, periph))
    }

    /// `X:(Rn+xxxx) <-> R`.
    pub fn move_x_long(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let offset = self.ext()?;
        let base = self.regs.r[ins.word.bits(8, 11) as usize];
        let addr = (base + offset) & WORD_MASK;

        self.move_indexed(io, Space::X, addr, ins.word.bits(0, 6), ins.word.bit(6))?;
        self.instr_cycle += 2;
        Ok(())
    }

    /// `X:(Rn+xxx) <-> R` and `Y:(Rn+xxx) <-> R`.
    pub fn move_short_offset(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let word = ins.word;
        let offset = sign_extend(7, ((word.bits(11, 17) << 1) | word.bits(6, 7)) as u64);
        let base = self.regs.r[word.bits(8, 11) as usize];
        let addr = base.wrapping_add(offset as u32) & WORD_MASK;
        let space = if ins.opcode() == Opcode::MoveYImm {
            Space::Y
        } else {
            Space::X
        };

        self.move_indexed(io, space, addr, word.bits(0, 4), word.bit(4))
    }

    fn move_indexed(
        &mut self,
        io: &mut Io,
        space: Space,
        addr: u32,
        reg: u32,
        load: bool,
    ) -> Result<(), Fault> {
        if load {
            let value = self.read(io, space, addr)?;
            self.write_reg(reg, value);
        } else {
            let value = self.move_source(reg);
            self.write(io, space, addr, value)?;
        }

        Ok(())
    }

    /// `0000100d S0MMMRRR aluop`.
    pub fn move_xy0(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        match AluOp::decode(ins.word as u8) {
            Some(op) => self.exchange_xy0(io, ins, op),
            None => self.undefined(io, ins),
        }
    }
}

// Program control
impl Interpreter {
    pub fn jump_op(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let word = ins.word;
        let opcode = ins.opcode();

        let (target, taken) = match opcode {
            Opcode::JmpImm | Opcode::JsrImm => (word.bits(0, 12), true),
            Opcode::JccImm | Opcode::JsccImm => (
                word.bits(0, 12),
                CondCode::new(word >> 12).eval(self.regs.sr),
            ),
            Opcode::JmpEa | Opcode::JsrEa => (self.effective_address(ins.ea())?.0, true),
            _ => (
                self.effective_address(ins.ea())?.0,
                CondCode::new(word).eval(self.regs.sr),
            ),
        };

        if taken {
            match opcode {
                Opcode::JsrImm | Opcode::JsccImm | Opcode::JsrEa | Opcode::JsccEa => {
                    self.call(target);
                }
                _ => self.jump(target),
            }
        }

        self.instr_cycle += 2;
        Ok(())
    }

    pub fn branch(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let word = ins.word;
        let opcode = ins.opcode();

        let (offset, taken) = match opcode {
            Opcode::BccImm | Opcode::BraImm | Opcode::BsrImm => {
                let offset = sign_extend(9, (word.bits(0, 5) | (word.bits(6, 10) << 5)) as u64);
                let taken =
                    opcode != Opcode::BccImm || CondCode::new(word >> 12).eval(self.regs.sr);

                (offset as u32, taken)
            }
            _ => {
                let offset = self.ext()?;
                let taken = opcode != Opcode::BccLong || CondCode::new(word).eval(self.regs.sr);

                (offset, taken)
            }
        };

        let target = self.pc.wrapping_add(offset);
        if taken {
            match opcode {
                Opcode::BsrImm | Opcode::BsrLong => self.call(target),
                _ => self.jump(target),
            }
        }

        self.instr_cycle += if opcode == Opcode::BsrLong { 4 } else { 2 };
        Ok(())
    }

    /// `JCLR`, `JSET`, `JSCLR` and `JSSET`. Bit 5 selects the polarity and bit 16 a subroutine
    /// call.
    pub fn bit_jump(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let operand = self.bit_operand(ins)?;
        let value = self.load_bit_operand(io, operand)?;
        let target = self.ext()?;

        let set = (value >> ins.word.bits(0, 5)) & 1 != 0;
        if set == ins.word.bit(5) {
            if ins.word.bit(16) {
                self.call(target);
            } else {
                self.jump(target);
            }
        }

        self.instr_cycle += 4;
        Ok(())
    }

    /// `BRCLR` and `BRSET`.
    pub fn bit_branch(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let offset = self.ext()?;
        let value = if ins.word.bit(16) {
            self.move_source(ins.ea())
        } else {
            self.read(io, Space::X, PP_BASE + ins.ea())?
        };

        let set = (value >> ins.word.bits(0, 5)) & 1 != 0;
        if set == ins.word.bit(5) {
            self.jump(self.pc.wrapping_add(offset));
        }

        self.instr_cycle += 4;
        Ok(())
    }

    /// `BCLR`, `BSET`, `BCHG` and `BTST`. C receives the bit before the operation.
    pub fn bit_op(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let operand = self.bit_operand(ins)?;
        let value = self.load_bit_operand(io, operand)?;

        let mask = 1 << ins.word.bits(0, 5);
        self.regs.sr.set_carry(value & mask != 0);

        let result = match (ins.word.bit(16), ins.word.bit(5)) {
            (false, false) => Some(value & !mask),
            (false, true) => Some(value | mask),
            (true, false) => Some(value ^ mask),
            (true, true) => None,
        };

        if let Some(result) = result {
            self.store_bit_operand(io, operand, result)?;
        }

        self.instr_cycle += 2;
        Ok(())
    }
}

// Loops
impl Interpreter {
    /// Pushes the loop frames and arms a DO loop ending at `la`.
    fn enter_loop(&mut self, la: u32) {
        self.push(self.regs.la, Some(self.regs.lc));
        self.regs.la = la & 0xFFFF;

        let start = (self.pc + self.cur_len) & WORD_MASK;
        self.push(start, Some(self.regs.get(Reg::Sr)));
        self.regs.sr.set_loop_flag(true);
    }

    pub fn do_loop(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let word = ins.word;
        let opcode = ins.opcode();

        let count = match opcode {
            Opcode::DoImm => word.bits(8, 16) | (word.bits(0, 4) << 8),
            Opcode::DoReg => self.count_source(word.bits(8, 14)),
            _ => {
                let space = xy(word.bit(6));
                let (addr, _) = self.memory_operand(ins, opcode == Opcode::DoAa)?;
                self.read(io, space, addr)?
            }
        };

        let la = self.ext()?;
        self.enter_loop(la);

        self.regs.lc = count & 0xFFFF;
        self.instr_cycle += 4;
        Ok(())
    }

    pub fn dor(&mut self, _: &mut Io, ins: Ins) -> Result<(), Fault> {
        let offset = self.ext()?;
        self.enter_loop(self.pc.wrapping_add(offset));

        self.regs.lc = match ins.opcode() {
            Opcode::DorImm => ins.word.bits(8, 16) | (ins.word.bits(0, 4) << 8),
            _ => self.count_source(ins.word.bits(8, 14)),
        } & 0xFFFF;

        self.instr_cycle += 4;
        Ok(())
    }

    pub fn rep(&mut self, io: &mut Io, ins: Ins) -> Result<(), Fault> {
        let word = ins.word;
        let opcode = ins.opcode();

        let count = match opcode {
            Opcode::RepImm => word.bits(8, 16) | (word.bits(0, 4) << 8),
            Opcode::RepReg => self.move_source(word.bits(8, 14)),
            _ => {
                let space = xy(word.bit(6));
                let (addr, _) = self.memory_operand(ins, opcode == Opcode::RepAa)?;
                self.read(io, space, addr)?
            }
        };

        self.regs.lc_save = self.regs.lc;
        self.regs.lc = count & 0xFFFF;
        self.pc_on_rep = true;
        self.loop_rep = true;

        self.instr_cycle += 2;
        Ok(())
    }
}

pub type ExecFn =
    for<'a, 'b, 'c> fn(&'a mut Interpreter, &'b mut Io<'c>, Ins) -> Result<(), Fault>;

const fn handler(opcode: Opcode) -> ExecFn {
    match opcode.support() {
        Support::Implemented => implemented(opcode),
        Support::Unimplemented => Interpreter::unimplemented,
        Support::Undefined => Interpreter::undefined,
    }
}

const fn implemented(opcode: Opcode) -> ExecFn {
    match opcode {
        Opcode::Nop | Opcode::Pflushun | Opcode::Pfree | Opcode::Pflush => Interpreter::nop,
        Opcode::Rti => Interpreter::rti,
        Opcode::Illegal => Interpreter::illegal,
        Opcode::Trap => Interpreter::trap,
        Opcode::Rts => Interpreter::rts,
        Opcode::Reset => Interpreter::reset_peripherals,
        Opcode::Enddo => Interpreter::enddo,
        Opcode::Andi | Opcode::Ori => Interpreter::andi_ori,
        Opcode::AddImm
        | Opcode::SubImm
        | Opcode::CmpImm
        | Opcode::AndImm
        | Opcode::OrImm
        | Opcode::EorImm
        | Opcode::AddLong
        | Opcode::SubLong
        | Opcode::CmpLong
        | Opcode::AndLong
        | Opcode::OrLong
        | Opcode::EorLong => Interpreter::alu_imm,
        Opcode::Div => Interpreter::div,
        Opcode::Norm => Interpreter::norm,
        Opcode::Tcc | Opcode::TccR => Interpreter::tcc,
        Opcode::Lua => Interpreter::lua,
        Opcode::LuaRel => Interpreter::lua_rel,
        Opcode::MovecReg => Interpreter::movec_reg,
        Opcode::MovecAa | Opcode::MovecEa => Interpreter::movec_mem,
        Opcode::MovecImm => Interpreter::movec_imm,
        Opcode::BccImm
        | Opcode::BraImm
        | Opcode::BsrImm
        | Opcode::BraLong
        | Opcode::BsrLong
        | Opcode::BccLong => Interpreter::branch,
        Opcode::MovemAa | Opcode::MovemEa => Interpreter::movem,
        Opcode::DoAa | Opcode::DoEa | Opcode::DoImm | Opcode::DoReg => Interpreter::do_loop,
        Opcode::DorImm | Opcode::DorReg => Interpreter::dor,
        Opcode::RepAa | Opcode::RepEa | Opcode::RepImm | Opcode::RepReg => Interpreter::rep,
        Opcode::JmpImm
        | Opcode::JsrImm
        | Opcode::JccImm
        | Opcode::JsccImm
        | Opcode::JmpEa
        | Opcode::JccEa
        | Opcode::JsrEa
        | Opcode::JsccEa => Interpreter::jump_op,
        Opcode::AslImm | Opcode::AsrImm | Opcode::LslImm | Opcode::LsrImm => {
            Interpreter::shift_imm
        }
        Opcode::Cmpu => Interpreter::cmpu,
        Opcode::JclrAa
        | Opcode::JclrEa
        | Opcode::JclrPp
        | Opcode::JclrReg
        | Opcode::JsetAa
        | Opcode::JsetEa
        | Opcode::JsetPp
        | Opcode::JsetReg
        | Opcode::JsclrAa
        | Opcode::JsclrEa
        | Opcode::JsclrPp
        | Opcode::JsclrReg
        | Opcode::JssetAa
        | Opcode::JssetEa
        | Opcode::JssetPp
        | Opcode::JssetReg => Interpreter::bit_jump,
        Opcode::BclrAa
        | Opcode::BclrEa
        | Opcode::BclrPp
        | Opcode::BclrReg
        | Opcode::BsetAa
        | Opcode::BsetEa
        | Opcode::BsetPp
        | Opcode::BsetReg
        | Opcode::BchgAa
        | Opcode::BchgEa
        | Opcode::BchgPp
        | Opcode::BchgReg
        | Opcode::BtstAa
        | Opcode::BtstEa
        | Opcode::BtstPp
        | Opcode::BtstReg => Interpreter::bit_op,
        Opcode::MovepReg => Interpreter::movep_reg,
        Opcode::MovepP => Interpreter::movep_p,
        Opcode::MovepMem => Interpreter::movep_mem,
        Opcode::MovepQq => Interpreter::movep_qq,
        Opcode::MoveXy0 => Interpreter::move_xy0,
        Opcode::BrclrPp | Opcode::BrsetPp | Opcode::BrclrReg | Opcode::BrsetReg => {
            Interpreter::bit_branch
        }
        Opcode::MoveXLong => Interpreter::move_x_long,
        Opcode::MoveXImm | Opcode::MoveYImm => Interpreter::move_short_offset,
        Opcode::Mpyi => Interpreter::mpyi,
        Opcode::Wait
        | Opcode::Stop
        | Opcode::Debug
        | Opcode::DoForever
        | Opcode::Brkcc
        | Opcode::Undefined => unreachable!("opcode has no handler"),
    }
}

static EXEC_LUT: [ExecFn; Opcode::VARIANTS.len()] = {
    let mut lut = [Interpreter::undefined as ExecFn; Opcode::VARIANTS.len()];

    let mut i = 0;
    while i < lut.len() {
        lut[i] = handler(Opcode::VARIANTS[i]);
        i += 1;
    }

    lut
};

#[cfg(test)]
mod test {
    use super::*;
    use crate::Discard;

    fn core_with(program: &[u32]) -> Interpreter {
        let mut core = Interpreter::default();
        core.reset();
        core.mem.pram[..program.len()].copy_from_slice(program);
        core
    }

    fn steps(core: &mut Interpreter, count: usize) {
        let mut discard = Discard;
        let mut io = Io::new(&mut discard);
        for _ in 0..count {
            core.step(&mut io).unwrap();
        }
    }

    #[test]
    fn lut_matches_discriminants() {
        for (i, opcode) in Opcode::VARIANTS.iter().enumerate() {
            assert_eq!(*opcode as usize, i);
        }
    }

    #[test]
    fn rep_repeats_next_instruction() {
        // rep #3; add x0,a; nop
        let mut core = core_with(&[0x06_03A0, 0x20_0040, 0x00_0000]);
        core.regs.x[0] = 1;
        core.regs.lc = 0x42;

        steps(&mut core, 1);
        assert!(core.loop_rep);
        assert_eq!(core.pc, 1);

        steps(&mut core, 3);
        assert_eq!(core.regs.acc[0].mid, 3);
        assert_eq!(core.pc, 2);
        assert!(!core.loop_rep);
        assert_eq!(core.regs.lc, 0x42);
    }

    #[test]
    fn rep_zero_runs_65536_times() {
        // rep #0; add x0,a
        let mut core = core_with(&[0x06_00A0, 0x20_0040, 0x00_0000]);
        core.regs.x[0] = 1;

        steps(&mut core, 1 + 0x1_0000);
        assert_eq!(core.regs.acc[0].get(), 0x1_0000 << 24);
        assert_eq!(core.pc, 2);
    }

    #[test]
    fn do_loop_runs_body() {
        // do #3,$2; add x0,a; nop
        let mut core = core_with(&[0x06_0380, 0x00_0002, 0x20_0040, 0x00_0000]);
        core.regs.x[0] = 1;

        steps(&mut core, 1);
        assert_eq!(core.pc, 2);
        assert_eq!(core.regs.sp, 2);
        assert!(core.regs.sr.loop_flag());
        assert_eq!(core.regs.la, 2);
        assert_eq!(core.regs.lc, 3);

        steps(&mut core, 3);
        assert_eq!(core.regs.acc[0].mid, 3);
        assert_eq!(core.pc, 3);
        assert_eq!(core.regs.sp, 0);
        assert!(!core.regs.sr.loop_flag());
    }

    #[test]
    fn enddo_unwinds_frame() {
        // do #5,$3; enddo; nop
        let mut core = core_with(&[0x06_0580, 0x00_0003, 0x00_008C, 0x00_0000]);
        core.regs.la = 0x77;
        core.regs.lc = 0x88;

        steps(&mut core, 2);
        assert_eq!(core.regs.sp, 0);
        assert!(!core.regs.sr.loop_flag());
        assert_eq!(core.regs.la, 0x77);
        assert_eq!(core.regs.lc, 0x88);
    }

    #[test]
    fn jsr_and_rts() {
        // jsr $10 ... rts
        let mut core = core_with(&[0x0D_0010]);
        core.mem.pram[0x10] = 0x00_000C;

        steps(&mut core, 1);
        assert_eq!(core.pc, 0x10);
        assert_eq!(core.instr_cycle, 4);
        assert_eq!(core.regs.sp, 1);
        assert_eq!(core.regs.ssh(), 1);

        steps(&mut core, 1);
        assert_eq!(core.pc, 1);
        assert_eq!(core.regs.sp, 0);
    }

    #[test]
    fn conditional_jump() {
        // jeq $20
        let mut core = core_with(&[0x0E_A020, 0x0E_A020]);
        core.regs.sr.set_zero(false);
        steps(&mut core, 1);
        assert_eq!(core.pc, 1);

        core.regs.sr.set_zero(true);
        steps(&mut core, 1);
        assert_eq!(core.pc, 0x20);
    }

    #[test]
    fn short_branch_backwards() {
        // bra *-1 at $10
        let mut core = core_with(&[]);
        core.mem.pram[0x10] = 0x05_0FDF;
        core.pc = 0x10;

        steps(&mut core, 1);
        assert_eq!(core.pc, 0x0F);
    }

    #[test]
    fn modulo_addressing() {
        let mut core = core_with(&[]);
        core.regs.m[0] = 3;
        core.regs.r[0] = 0x21;

        // (r0)+
        let addrs: Vec<u32> = (0..4)
            .map(|_| core.effective_address(0b011_000).unwrap().0)
            .collect();

        assert_eq!(addrs, [0x21, 0x22, 0x23, 0x20]);
        assert_eq!(core.regs.r[0], 0x21);

        // (r0)- wraps the other way
        core.regs.r[0] = 0x20;
        core.effective_address(0b010_000).unwrap();
        assert_eq!(core.regs.r[0], 0x23);
    }

    #[test]
    fn bit_reverse_addressing() {
        let mut core = core_with(&[]);
        core.regs.m[1] = 0;
        core.regs.n[1] = 8;
        core.regs.r[1] = 0;

        let mut seen = Vec::new();
        for _ in 0..4 {
            core.effective_address(0b001_001).unwrap();
            seen.push(core.regs.r[1]);
        }

        assert_eq!(seen, [8, 4, 12, 2]);
    }

    #[test]
    fn linear_addressing_wraps() {
        let mut core = core_with(&[]);
        core.regs.n[2] = 1;

        // (r2)-n2
        core.effective_address(0b000_010).unwrap();
        assert_eq!(core.regs.r[2], 0xFF_FFFF);

        // (r2+n2) leaves r2 alone
        let (addr, _) = core.effective_address(0b101_010).unwrap();
        assert_eq!(addr, 0);
        assert_eq!(core.regs.r[2], 0xFF_FFFF);
    }

    #[test]
    fn division_produces_quotient() {
        // rep #24; div x0,a
        let mut core = core_with(&[0x06_18A0, 0x01_8040, 0x00_0000]);
        core.regs.acc[0] = Acc56::from_word(0x20_0000);
        core.regs.x[0] = 0x40_0000;
        core.regs.sr.set_carry(false);

        steps(&mut core, 25);
        assert_eq!(core.regs.acc[0].low, 0x40_0000);
    }

    #[test]
    fn bit_manipulation() {
        // bset #3,x:$10; btst #3,x:$10; bclr #3,x:$10; bchg #0,x0
        let mut core = core_with(&[0x0A_1023, 0x0B_1023, 0x0A_1003, 0x0B_C440]);

        steps(&mut core, 1);
        assert_eq!(core.mem.xram[0x10], 0x08);
        assert!(!core.regs.sr.carry());

        steps(&mut core, 1);
        assert!(core.regs.sr.carry());
        assert_eq!(core.mem.xram[0x10], 0x08);

        steps(&mut core, 1);
        assert_eq!(core.mem.xram[0x10], 0);
        assert!(core.regs.sr.carry());

        steps(&mut core, 1);
        assert_eq!(core.regs.x[0], 1);
        assert!(!core.regs.sr.carry());
        assert_eq!(core.instr_cycle, 4);
    }

    #[test]
    fn jclr_takes_and_skips() {
        // jclr #0,x:$10,$20
        let mut core = core_with(&[0x0A_1080, 0x00_0020]);
        steps(&mut core, 1);
        assert_eq!(core.pc, 0x20);
        assert_eq!(core.instr_cycle, 6);

        let mut core = core_with(&[0x0A_1080, 0x00_0020]);
        core.mem.xram[0x10] = 1;
        steps(&mut core, 1);
        assert_eq!(core.pc, 2);
    }

    #[test]
    fn jsset_calls() {
        // jsset #1,x:$10,$30
        let mut core = core_with(&[0x0B_10A1, 0x00_0030]);
        core.mem.xram[0x10] = 2;

        steps(&mut core, 1);
        assert_eq!(core.pc, 0x30);
        assert_eq!(core.regs.ssh(), 2);
    }

    #[test]
    fn transfer_on_condition() {
        // teq x0,a
        let mut core = core_with(&[0x02_A040, 0x02_A040]);
        core.regs.x[0] = 0x80_0000;

        core.regs.sr.set_zero(false);
        steps(&mut core, 1);
        assert_eq!(core.regs.acc[0].get(), 0);

        core.regs.sr.set_zero(true);
        steps(&mut core, 1);
        assert_eq!(core.regs.acc[0].high, 0xFF);
        assert_eq!(core.regs.acc[0].mid, 0x80_0000);
    }

    #[test]
    fn movec_reads_ssh_with_pop() {
        // movec ssh,x0
        let mut core = core_with(&[0x04_44BC]);
        core.push(0x123, Some(0x456));

        steps(&mut core, 1);
        assert_eq!(core.regs.x[0], 0x123);
        assert_eq!(core.regs.sp, 0);
    }

    #[test]
    fn lua_leaves_source() {
        // lua (r0)+n0,r1
        let mut core = core_with(&[0x04_4811]);
        core.regs.r[0] = 0x10;
        core.regs.n[0] = 4;

        steps(&mut core, 1);
        assert_eq!(core.regs.r[1], 0x14);
        assert_eq!(core.regs.r[0], 0x10);
    }

    #[test]
    fn andi_clears_interrupt_mask() {
        // andi #$fc,mr
        let mut core = core_with(&[0x00_FCB8]);
        steps(&mut core, 1);
        assert_eq!(core.regs.sr.interrupt_mask().value(), 0);
    }

    #[test]
    fn immediate_shifts() {
        // asl #4,a,b; lsl #4,a
        let mut core = core_with(&[0x0C_1D09, 0x0C_1E88]);
        core.regs.acc[0] = Acc56::from_word(0x0F_0001);

        steps(&mut core, 1);
        assert_eq!(core.regs.acc[1].mid, 0xF0_0010);
        assert!(!core.regs.sr.carry());

        steps(&mut core, 1);
        assert_eq!(core.regs.acc[0].mid, 0xF0_0010);
        assert!(core.regs.sr.negative());
        assert!(!core.regs.sr.carry());
    }

    #[test]
    fn logical_shift_limits() {
        const LSL: u32 = 0x0C_1E80;
        const LSR: u32 = 0x0C_1EC0;

        // (opcode, amount, result, carry) with 0x800003 in A1 and C set
        let cases = [
            (LSL, 0, 0x80_0003, false),
            (LSL, 1, 0x00_0006, true),
            (LSL, 23, 0x80_0000, true),
            (LSL, 24, 0, true),
            (LSL, 25, 0, false),
            (LSL, 31, 0, false),
            (LSR, 0, 0x80_0003, false),
            (LSR, 1, 0x40_0001, true),
            (LSR, 23, 0x00_0001, false),
            (LSR, 24, 0, true),
            (LSR, 25, 0, false),
            (LSR, 31, 0, false),
        ];

        for (opcode, amount, result, carry) in cases {
            let mut core = core_with(&[opcode | (amount << 1)]);
            core.regs.acc[0] = Acc56::from_word(0x80_0003);
            core.regs.sr.set_carry(true);

            steps(&mut core, 1);
            assert_eq!(core.pc, 1);
            assert_eq!(core.regs.acc[0].mid, result, "{opcode:06X} #{amount}");
            assert_eq!(core.regs.sr.carry(), carry, "{opcode:06X} #{amount}");
        }
    }

    #[test]
    fn unimplemented_instructions_advance() {
        // wait; stop
        let mut core = core_with(&[0x00_0086, 0x00_0087]);
        assert_eq!(Ins::new(0x00_0086).opcode().support(), Support::Unimplemented);
        assert_eq!(Ins::new(0x00_0087).opcode().support(), Support::Unimplemented);

        steps(&mut core, 2);
        assert_eq!(core.pc, 2);
        assert_eq!(core.instr_cycle, 2);
    }

    #[test]
    fn undefined_words_advance() {
        let mut core = core_with(&[0x0A_F480, 0x20_0004]);

        steps(&mut core, 1);
        assert_eq!(core.pc, 1);
        assert_eq!(core.instr_cycle, 2);

        // undefined ALU byte in a parallel word
        steps(&mut core, 1);
        assert_eq!(core.pc, 2);
    }

    #[test]
    fn long_interrupt_returns_with_rti() {
        let mut core = core_with(&[]);
        core.mem.pram[0x06] = 0x0D_0040;
        core.mem.pram[0x40] = 0x00_0004;
        core.interrupts.post(Interrupt::Swi);

        // three instructions to reach the vector, then the jsr
        steps(&mut core, 4);
        assert_eq!(core.pc, 0x40);
        assert_eq!(core.regs.sp, 1);
        assert_eq!(core.regs.ssh(), 3);
        assert_eq!(core.interrupts.state, Pipeline::Disabled);

        steps(&mut core, 1);
        assert_eq!(core.pc, 3);
        assert_eq!(core.regs.sp, 0);
        assert_eq!(core.regs.get(Reg::Sr), 0x0300);
    }

    #[test]
    fn trap_dispatches_swi() {
        let mut core = core_with(&[0x00_0006, 0x00_0000, 0x00_0000, 0x00_0000]);

        // the vector is reached two instructions after the trap
        steps(&mut core, 3);
        assert_eq!(core.pc, Interrupt::Swi.vector());
    }
}
