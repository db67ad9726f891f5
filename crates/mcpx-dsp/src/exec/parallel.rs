//! Parallel instructions: an ALU operation plus a register transfer.
//!
//! Every transfer captures its sources before the ALU operation runs and writes its
//! destinations after it, so an instruction like `add x0,a x:(r0)+,x0` sees the old X0.

use super::xy;
use crate::{
    Fault, Interpreter, Io,
    alu::{self, Acc56, Arith},
    ins::{Acc, AluOp, Data, Ins, Pair, ParallelMove, Source},
    mem::Space,
    regs::Reg,
};
use bitos::BitUtils;
use util::{WORD_MASK, sign_extend};

/// A 24-bit word as a 56-bit operand: sign extended, low limb clear.
#[inline(always)]
pub(super) fn word_operand(word: u32) -> i64 {
    Acc56::from_word(word).get()
}

impl Interpreter {
    fn pair(&self, pair: Pair) -> i64 {
        let (high, low) = match pair {
            Pair::X => (self.regs.x[1], self.regs.x[0]),
            Pair::Y => (self.regs.y[1], self.regs.y[0]),
        };

        sign_extend(48, ((high as u64) << 24) | low as u64)
    }

    fn source(&self, src: Source) -> i64 {
        match src {
            Source::Acc(acc) => self.acc(acc),
            Source::Pair(pair) => self.pair(pair),
            Source::Data(data) => word_operand(self.regs.get(data.reg())),
        }
    }

    /// Stores an arithmetic result and updates the flags.
    pub(super) fn store_arith(&mut self, dst: Acc, value: i64, arith: Arith) {
        let value = self.set_acc(dst, value);
        self.regs.sr.update_e_u_n_z(value);
        self.regs.sr.apply(arith);
    }

    /// Runs a logical operation on the middle limb of `dst`.
    pub(super) fn logic(&mut self, dst: Acc, f: impl FnOnce(u32) -> u32) {
        let acc = &mut self.regs.acc[dst.index()];
        acc.mid = f(acc.mid) & WORD_MASK;

        let mid = acc.mid;
        self.regs.sr.update_logic(mid);
    }

    /// Shifts or rotates the middle limb of `dst`. `f` returns the new limb and carry.
    fn logic_shift(&mut self, dst: Acc, f: impl FnOnce(u32, bool) -> (u32, bool)) {
        let carry_in = self.regs.sr.carry();
        let mut carry = false;
        self.logic(dst, |mid| {
            let (value, out) = f(mid, carry_in);
            carry = out;
            value
        });

        self.regs.sr.set_carry(carry);
    }

    /// Executes the ALU half of a parallel instruction.
    pub(super) fn alu(&mut self, op: AluOp) {
        match op {
            AluOp::Move => (),
            AluOp::Tfr { src, dst } => match src {
                Source::Acc(acc) => self.regs.acc[dst.index()] = self.acc_limbs(acc),
                _ => {
                    self.set_acc(dst, self.source(src));
                }
            },
            AluOp::Add { src, dst } => {
                let (value, arith) = alu::add(self.acc(dst), self.source(src));
                self.store_arith(dst, value, arith);
            }
            AluOp::Sub { src, dst } => {
                let (value, arith) = alu::sub(self.acc(dst), self.source(src));
                self.store_arith(dst, value, arith);
            }
            AluOp::Cmp { src, dst } => {
                let (value, arith) = alu::sub(self.acc(dst), self.source(src));
                self.regs.sr.update_e_u_n_z(value);
                self.regs.sr.apply(arith);
            }
            AluOp::Cmpm { src, dst } => {
                let (lhs, _) = alu::abs(self.acc(dst));
                let (rhs, _) = alu::abs(self.source(src));
                let (value, arith) = alu::sub(lhs, rhs);
                self.regs.sr.update_e_u_n_z(value);
                self.regs.sr.apply(arith);
            }
            AluOp::Addr(dst) => {
                let (half, shifted) = alu::asr(self.acc(dst), 1);
                let (value, arith) = alu::add(half, self.acc(dst.other()));
                self.store_arith(dst, value, shifted | arith);
            }
            AluOp::Subr(dst) => {
                let (half, shifted) = alu::asr(self.acc(dst), 1);
                let (value, arith) = alu::sub(half, self.acc(dst.other()));
                self.store_arith(dst, value, shifted | arith);
            }
            AluOp::Addl(dst) => {
                let (double, shifted) = alu::asl(self.acc(dst), 1);
                let (value, arith) = alu::add(double, self.acc(dst.other()));
                self.store_arith(dst, value, shifted | arith);
            }
            AluOp::Subl(dst) => {
                let (double, shifted) = alu::asl(self.acc(dst), 1);
                let (value, arith) = alu::sub(double, self.acc(dst.other()));
                self.store_arith(dst, value, shifted | arith);
            }
            AluOp::Adc { src, dst } => {
                let carry = self.regs.sr.carry();
                let (mut value, mut arith) = alu::add(self.acc(dst), self.pair(src));
                if carry {
                    let (plus_one, extra) = alu::add(value, 1);
                    value = plus_one;
                    arith = arith | extra;
                }

                self.store_arith(dst, value, arith);
            }
            AluOp::Sbc { src, dst } => {
                let carry = self.regs.sr.carry();
                let (mut value, mut arith) = alu::sub(self.acc(dst), self.pair(src));
                if carry {
                    let (minus_one, extra) = alu::sub(value, 1);
                    value = minus_one;
                    arith = arith | extra;
                }

                self.store_arith(dst, value, arith);
            }
            AluOp::Tst(dst) => {
                self.regs.sr.update_e_u_n_z(self.acc(dst));
                self.regs.sr.set_overflow(false);
            }
            AluOp::Rnd(dst) => {
                let value = alu::round(self.acc(dst), self.regs.sr.scaling());
                let value = self.set_acc(dst, value);
                self.regs.sr.update_e_u_n_z(value);
            }
            AluOp::Clr(dst) => {
                self.set_acc(dst, 0);

                let sr = &mut self.regs.sr;
                sr.set_extension(false);
                sr.set_negative(false);
                sr.set_overflow(false);
                sr.set_unnormalized(true);
                sr.set_zero(true);
            }
            AluOp::Max => {
                let (diff, _) = alu::sub(self.acc(Acc::B), self.acc(Acc::A));
                let transfer = diff <= 0;
                if transfer {
                    self.regs.acc[Acc::B.index()] = self.acc_limbs(Acc::A);
                }

                self.regs.sr.set_carry(transfer);
            }
            AluOp::Asl(dst) => {
                let (value, arith) = alu::asl(self.acc(dst), 1);
                self.store_arith(dst, value, arith);
            }
            AluOp::Asr(dst) => {
                let (value, arith) = alu::asr(self.acc(dst), 1);
                self.store_arith(dst, value, arith);
            }
            AluOp::Abs(dst) => {
                let (value, overflowed) = alu::abs(self.acc(dst));
                let value = self.set_acc(dst, value);
                self.regs.sr.apply_overflow(overflowed);
                self.regs.sr.update_e_u_n_z(value);
            }
            AluOp::Neg(dst) => {
                let (value, overflowed) = alu::neg(self.acc(dst));
                let value = self.set_acc(dst, value);
                self.regs.sr.apply_overflow(overflowed);
                self.regs.sr.update_e_u_n_z(value);
            }
            AluOp::Not(dst) => self.logic(dst, |mid| !mid),
            AluOp::And { src, dst } => {
                let value = self.regs.get(src.reg());
                self.logic(dst, |mid| mid & value);
            }
            AluOp::Or { src, dst } => {
                let value = self.regs.get(src.reg());
                self.logic(dst, |mid| mid | value);
            }
            AluOp::Eor { src, dst } => {
                let value = self.regs.get(src.reg());
                self.logic(dst, |mid| mid ^ value);
            }
            AluOp::Lsl(dst) => self.logic_shift(dst, |mid, _| (mid << 1, mid.bit(23))),
            AluOp::Lsr(dst) => self.logic_shift(dst, |mid, _| (mid >> 1, mid.bit(0))),
            AluOp::Rol(dst) => {
                self.logic_shift(dst, |mid, carry| ((mid << 1) | carry as u32, mid.bit(23)));
            }
            AluOp::Ror(dst) => {
                self.logic_shift(dst, |mid, carry| {
                    ((mid >> 1) | ((carry as u32) << 23), mid.bit(0))
                });
            }
            AluOp::Mul {
                lhs,
                rhs,
                dst,
                negate,
                accumulate,
                round,
            } => self.multiply(lhs, rhs, dst, negate, accumulate, round),
        }
    }

    fn multiply(
        &mut self,
        lhs: Data,
        rhs: Data,
        dst: Acc,
        negate: bool,
        accumulate: bool,
        round: bool,
    ) {
        let product = alu::mul(self.regs.get(lhs.reg()), self.regs.get(rhs.reg()), negate);

        let (mut value, overflow) = if accumulate {
            let (sum, arith) = alu::add(self.acc(dst), product);
            (sum, arith.overflow)
        } else {
            (product, false)
        };

        if round {
            value = alu::round(value, self.regs.sr.scaling());
        }

        let value = self.set_acc(dst, value);
        self.regs.sr.update_e_u_n_z(value);

        // carry is left alone, even when accumulating
        self.regs.sr.apply_overflow(overflow);
    }

    /// Reads an accumulator through the limiter, also reporting whether it saturated.
    fn limit(&mut self, acc: Acc) -> (u32, bool) {
        let (value, limited) = self.regs.acc[acc.index()].limit(self.regs.sr.scaling());
        if limited {
            self.regs.sr.set_limit(true);
        }

        (value, limited)
    }

    /// Reads a parallel move source. A and B go through the limiter, nothing else has side
    /// effects.
    pub(super) fn move_source(&mut self, code: u32) -> u32 {
        match Reg::new(code as u8) {
            Some(Reg::A) => self.limited(Acc::A),
            Some(Reg::B) => self.limited(Acc::B),
            Some(reg) => self.regs.get(reg),
            None => 0,
        }
    }

    /// Writes a parallel move destination. A and B are loaded as a word.
    pub(super) fn move_dest(&mut self, code: u32, value: u32) {
        if let Some(reg) = Reg::new(code as u8) {
            self.regs.set(reg, value);
        }
    }

    /// Executes a parallel instruction.
    pub(super) fn parallel(
        &mut self,
        io: &mut Io,
        ins: Ins,
        class: ParallelMove,
        op: AluOp,
    ) -> Result<(), Fault> {
        match class {
            ParallelMove::MemoryAndAcc => self.move_memory_and_acc(io, ins, op),
            ParallelMove::None => {
                self.alu(op);
                Ok(())
            }
            ParallelMove::UpdateR => {
                self.effective_address(ins.word.bits(8, 13))?;
                self.alu(op);
                Ok(())
            }
            ParallelMove::Register => {
                let value = self.move_source(ins.word.bits(13, 18));
                self.alu(op);
                self.move_dest(ins.word.bits(8, 13), value);
                Ok(())
            }
            ParallelMove::Immediate => {
                self.alu(op);

                let dst = ins.word.bits(16, 21);
                let imm = ins.word.bits(8, 16);
                let value = match Reg::new(dst as u8) {
                    Some(Reg::X0 | Reg::X1 | Reg::Y0 | Reg::Y1 | Reg::A | Reg::B) => imm << 16,
                    _ => imm,
                };

                self.move_dest(dst, value);
                Ok(())
            }
            ParallelMove::Long => self.move_long(io, ins, op),
            ParallelMove::Memory => self.move_memory(io, ins, op),
            ParallelMove::Dual => self.move_dual(io, ins, op),
        }
    }

    /// `X:ea,D1 S2,D2` and `S1,X:ea S2,D2`, plus their Y forms.
    fn move_memory_and_acc(&mut self, io: &mut Io, ins: Ins, op: AluOp) -> Result<(), Fault> {
        let word = ins.word;
        let (addr, immediate) = self.effective_address(ins.ea())?;

        let space = xy(word.bit(14));
        let (reg, src2, dst2) = match space {
            Space::Y => (
                [Reg::Y0, Reg::Y1, Reg::A, Reg::B][word.bits(16, 18) as usize],
                Acc::new(word.bit(19)),
                if word.bit(18) { Reg::X1 } else { Reg::X0 },
            ),
            _ => (
                [Reg::X0, Reg::X1, Reg::A, Reg::B][word.bits(18, 20) as usize],
                Acc::new(word.bit(17)),
                if word.bit(16) { Reg::Y1 } else { Reg::Y0 },
            ),
        };

        let load = word.bit(15);
        let value = if !load {
            self.move_source(reg as u32)
        } else if immediate {
            addr
        } else {
            self.read(io, space, addr)?
        };
        let value2 = self.limited(src2);

        self.alu(op);

        if load {
            self.regs.set(reg, value);
        } else {
            self.write(io, space, addr, value)?;
        }

        self.regs.set(dst2, value2);
        Ok(())
    }

    /// `L:ea` and `L:aa` moves of a register pair against X and Y at the same address.
    fn move_long(&mut self, io: &mut Io, ins: Ins, op: AluOp) -> Result<(), Fault> {
        let word = ins.word;
        let field = ins.ea();
        let addr = if word.bit(14) {
            self.effective_address(field)?.0
        } else {
            field
        };

        let pair = word.bits(16, 18) | ((word.bit(19) as u32) << 2);
        let load = word.bit(15);

        let (high, low) = if load {
            (
                self.read(io, Space::X, addr)?,
                self.read(io, Space::Y, addr)?,
            )
        } else {
            match pair {
                0 => (self.regs.acc[0].mid, self.regs.acc[0].low),
                1 => (self.regs.acc[1].mid, self.regs.acc[1].low),
                2 => (self.regs.x[1], self.regs.x[0]),
                3 => (self.regs.y[1], self.regs.y[0]),
                4 | 5 => {
                    let acc = Acc::new(pair == 5);
                    match self.limit(acc) {
                        (high, true) => (high, if high.bit(23) { 0 } else { WORD_MASK }),
                        (high, false) => (high, self.regs.acc[acc.index()].low),
                    }
                }
                6 => (self.limited(Acc::A), self.limited(Acc::B)),
                _ => (self.limited(Acc::B), self.limited(Acc::A)),
            }
        };

        self.alu(op);

        if !load {
            self.write(io, Space::X, addr, high)?;
            self.write(io, Space::Y, addr, low)?;
            return Ok(());
        }

        match pair {
            0 | 1 => {
                let acc = &mut self.regs.acc[pair as usize];
                acc.mid = high;
                acc.low = low;
            }
            2 => self.regs.x = [low, high],
            3 => self.regs.y = [low, high],
            4 | 5 => {
                let mut acc = Acc56::from_word(high);
                acc.low = low;
                self.regs.acc[pair as usize - 4] = acc;
            }
            6 => {
                self.regs.acc[0] = Acc56::from_word(high);
                self.regs.acc[1] = Acc56::from_word(low);
            }
            _ => {
                self.regs.acc[1] = Acc56::from_word(high);
                self.regs.acc[0] = Acc56::from_word(low);
            }
        }

        Ok(())
    }

    /// `X:ea`, `X:aa`, `#xxxxxx` and their Y forms, against any register.
    fn move_memory(&mut self, io: &mut Io, ins: Ins, op: AluOp) -> Result<(), Fault> {
        let word = ins.word;
        let field = ins.ea();
        let (addr, immediate) = if word.bit(14) {
            self.effective_address(field)?
        } else {
            (field, false)
        };

        let space = xy(word.bit(19));
        let reg = word.bits(16, 19) | (word.bits(20, 22) << 3);
        let load = word.bit(15);

        let value = if !load {
            self.move_source(reg)
        } else if immediate {
            addr
        } else {
            self.read(io, space, addr)?
        };

        self.alu(op);

        if load {
            self.move_dest(reg, value);
        } else {
            self.write(io, space, addr, value)?;
        }

        Ok(())
    }

    /// `X:ea Y:ea` with one address register from each bank.
    fn move_dual(&mut self, io: &mut Io, ins: Ins, op: AluOp) -> Result<(), Fault> {
        let word = ins.word;

        // MM = 0 encodes (Rn)
        let with_mode = |ea: u32| if ea >> 3 == 0 { ea | (1 << 5) } else { ea };

        let ea_x = word.bits(8, 13);
        let mut ea_y = word.bits(13, 15) | (word.bits(20, 22) << 3);
        if !ea_x.bit(2) {
            ea_y |= 1 << 2;
        }

        let (addr_x, _) = self.effective_address(with_mode(ea_x))?;
        let (addr_y, _) = self.effective_address(with_mode(ea_y))?;

        let reg_x = [Reg::X0, Reg::X1, Reg::A, Reg::B][word.bits(18, 20) as usize];
        let reg_y = [Reg::Y0, Reg::Y1, Reg::A, Reg::B][word.bits(16, 18) as usize];
        let load_x = word.bit(15);
        let load_y = word.bit(22);

        let value_x = if load_x {
            self.read(io, Space::X, addr_x)?
        } else {
            self.move_source(reg_x as u32)
        };

        let value_y = if load_y {
            self.read(io, Space::Y, addr_y)?
        } else {
            self.move_source(reg_y as u32)
        };

        self.alu(op);

        if load_x {
            self.regs.set(reg_x, value_x);
        } else {
            self.write(io, Space::X, addr_x, value_x)?;
        }

        if load_y {
            self.regs.set(reg_y, value_y);
        } else {
            self.write(io, Space::Y, addr_y, value_y)?;
        }

        Ok(())
    }

    /// `0000100d S0MMMRRR aluop`: stores an accumulator and loads X0 or Y0 into it.
    pub(super) fn exchange_xy0(&mut self, io: &mut Io, ins: Ins, op: AluOp) -> Result<(), Fault> {
        let word = ins.word;
        let (addr, _) = self.effective_address(ins.ea())?;

        let space = xy(word.bit(15));
        let acc = Acc::new(word.bit(16));

        let stored = self.limited(acc);
        let loaded = match space {
            Space::Y => self.regs.y[0],
            _ => self.regs.x[0],
        };

        self.alu(op);

        self.write(io, space, addr, stored)?;
        self.regs.acc[acc.index()] = Acc56::from_word(loaded);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Discard;

    fn core() -> Interpreter {
        let mut core = Interpreter::default();
        core.reset();
        core
    }

    fn run(core: &mut Interpreter, word: u32) {
        let mut discard = Discard;
        let mut io = Io::new(&mut discard);
        core.mem.pram[0] = word;
        core.pc = 0;
        core.execute_instruction(&mut io).unwrap();
    }

    #[test]
    fn add_sets_flags() {
        let mut core = core();
        core.regs.acc[0] = Acc56::from_word(0x40_0000);
        core.regs.acc[1] = Acc56::from_word(0x40_0000);

        // add b,a
        core.alu(AluOp::decode(0x10).unwrap());
        assert_eq!(core.regs.acc[0].get(), 0x80_0000 << 24);
        assert!(core.regs.sr.extension());
        assert!(!core.regs.sr.overflow());
        assert!(!core.regs.sr.negative());
    }

    #[test]
    fn clr_flags() {
        let mut core = core();
        core.regs.acc[1] = Acc56::from(-5);
        core.regs.sr.set_negative(true);

        core.alu(AluOp::Clr(Acc::B));
        assert_eq!(core.regs.acc[1].get(), 0);
        assert!(core.regs.sr.zero());
        assert!(core.regs.sr.unnormalized());
        assert!(!core.regs.sr.negative());
    }

    #[test]
    fn cmp_keeps_destination() {
        let mut core = core();
        core.regs.acc[0] = Acc56::from_word(0x10);
        core.regs.x[0] = 0x10;

        core.alu(AluOp::Cmp {
            src: Source::Data(Data::X0),
            dst: Acc::A,
        });
        assert!(core.regs.sr.zero());
        assert_eq!(core.regs.acc[0].mid, 0x10);
    }

    #[test]
    fn abs_of_minimum_overflows() {
        let mut core = core();
        core.regs.acc[0] = Acc56::from(Acc56::MIN);

        core.alu(AluOp::Abs(Acc::A));
        assert!(core.regs.sr.overflow());
        assert!(core.regs.sr.limit());
    }

    #[test]
    fn rotate_through_carry() {
        let mut core = core();
        core.regs.acc[0].mid = 0x80_0001;
        core.regs.sr.set_carry(false);

        core.alu(AluOp::Rol(Acc::A));
        assert_eq!(core.regs.acc[0].mid, 0x00_0002);
        assert!(core.regs.sr.carry());

        core.alu(AluOp::Ror(Acc::A));
        assert_eq!(core.regs.acc[0].mid, 0x80_0001);
        assert!(!core.regs.sr.carry());
        assert!(core.regs.sr.negative());
    }

    #[test]
    fn max_transfers_larger() {
        let mut core = core();
        core.regs.acc[0] = Acc56::from_word(0x30_0000);
        core.regs.acc[1] = Acc56::from_word(0x10_0000);

        core.alu(AluOp::Max);
        assert_eq!(core.regs.acc[1].mid, 0x30_0000);
        assert!(core.regs.sr.carry());

        core.regs.acc[0] = Acc56::from_word(0x00_0001);
        core.alu(AluOp::Max);
        assert_eq!(core.regs.acc[1].mid, 0x30_0000);
        assert!(!core.regs.sr.carry());
    }

    #[test]
    fn mac_leaves_carry() {
        let mut core = core();
        core.regs.x[0] = 0x40_0000;
        core.regs.y[0] = 0x40_0000;
        core.regs.sr.set_carry(true);

        // mac x0,y0,a
        core.alu(AluOp::decode(0xD2).unwrap());
        assert_eq!(core.regs.acc[0].get(), 0x20_0000 << 24);
        assert!(core.regs.sr.carry());
    }

    #[test]
    fn immediate_to_data_register() {
        let mut core = core();

        // move #$12,x0
        run(&mut core, 0x24_1200);
        assert_eq!(core.regs.x[0], 0x12_0000);

        // move #$12,r3
        run(&mut core, 0x33_1200);
        assert_eq!(core.regs.r[3], 0x12);
    }

    #[test]
    fn register_move_sees_old_value() {
        let mut core = core();
        core.regs.acc[0] = Acc56::from_word(0x10_0000);
        core.regs.acc[1] = Acc56::from_word(0x05_0000);

        // add b,a  a,x0
        run(&mut core, 0x21_C410);
        assert_eq!(core.regs.x[0], 0x10_0000);
        assert_eq!(core.regs.acc[0].mid, 0x15_0000);
    }

    #[test]
    fn memory_load_with_post_increment() {
        let mut core = core();
        core.mem.xram[0x20] = 0x12_3456;
        core.regs.r[0] = 0x20;

        // move x:(r0)+,x0
        run(&mut core, 0x44_D800);
        assert_eq!(core.regs.x[0], 0x12_3456);
        assert_eq!(core.regs.r[0], 0x21);
    }

    #[test]
    fn dual_move_uses_both_banks() {
        let mut core = core();
        core.mem.xram[0x10] = 0x11_1111;
        core.mem.yram[0x20] = 0x22_2222;
        core.regs.r[0] = 0x10;
        core.regs.r[4] = 0x20;

        // move x:(r0)+,x0 y:(r4)+,y0
        run(&mut core, 0xF0_9800);
        assert_eq!(core.regs.x[0], 0x11_1111);
        assert_eq!(core.regs.y[0], 0x22_2222);
        assert_eq!(core.regs.r[0], 0x11);
        assert_eq!(core.regs.r[4], 0x21);
    }

    #[test]
    fn long_store_of_limited_accumulator() {
        let mut core = core();
        core.regs.acc[0] = Acc56::from(0x01_0000_0000_0000);

        // move a,l:$5
        run(&mut core, 0x48_0500);
        assert_eq!(core.mem.xram[5], 0x7F_FFFF);
        assert_eq!(core.mem.yram[5], 0xFF_FFFF);
        assert!(core.regs.sr.limit());
    }
}
