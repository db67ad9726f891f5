mod programs;

use libtest_mimic::{Arguments, Failed, Trial};
use mcpx_dsp::{
    Config, Discard, Dsp, Interpreter, Io, Space,
    mem::ISR,
    regs::Reg,
};
use programs::{PROGRAMS, Program};
use std::fmt::Write;

fn run_program(program: &Program) -> Result<(), Failed> {
    let mut core = Interpreter::default();
    core.reset();
    core.mem.pram[..program.code.len()].copy_from_slice(program.code);
    for &(reg, value) in program.initial {
        core.regs.set(reg, value);
    }

    let mut discard = Discard;
    let mut io = Io::new(&mut discard);
    for _ in 0..program.steps {
        core.step(&mut io)
            .map_err(|e| format!("fault at {:06X}: {e}", core.pc))?;
    }

    let mut divergences = String::new();
    if core.pc != program.pc {
        write!(&mut divergences, "PC(v={:06X}, e={:06X}), ", core.pc, program.pc).unwrap();
    }

    for &(reg, expected) in program.expected {
        let value = core.regs.get(reg);
        if value != expected {
            write!(&mut divergences, "{reg:?}(v={value:06X}, e={expected:06X}), ").unwrap();
        }
    }

    if divergences.is_empty() {
        Ok(())
    } else {
        Err(Failed::from(divergences.trim_end_matches(", ")))
    }
}

/// A DMA list written by the guest through the peripheral registers.
fn dma_to_scratch() -> Result<(), Failed> {
    let mut core = Interpreter::default();
    core.reset();

    // one node, DSP X:$100 to scratch $40, two 32-bit items
    let node = [0x00_4000, 0x00_09E2, 2, 0x100, 0x40, 0, 0];
    core.mem.xram[0x10..0x17].copy_from_slice(&node);
    core.mem.xram[0x100] = 0x12_3456;
    core.mem.xram[0x101] = 0xAB_CDEF;

    // movep #$10,x:$ffffd4; movep #1,x:$ffffd6
    let program = [0x08_F494, 0x00_0010, 0x08_F496, 0x00_0001];
    core.mem.pram[..program.len()].copy_from_slice(&program);

    let mut scratch: Vec<u8> = Vec::new();
    let mut io = Io::new(&mut scratch);
    for _ in 0..2 {
        core.step(&mut io).map_err(|e| e.to_string())?;
    }

    let isr = core.read(&mut io, Space::X, ISR).map_err(|e| e.to_string())?;
    drop(io);

    if scratch.get(0x40..0x48) != Some(&[0x56, 0x34, 0x12, 0, 0xEF, 0xCD, 0xAB, 0][..]) {
        return Err(Failed::from(format!(
            "scratch holds {:02X?}",
            scratch.get(0x40..)
        )));
    }

    if isr & 0x80 == 0 {
        return Err(Failed::from("end of list not flagged"));
    }

    if core.dma.next_block != 0x00_4000 || !core.dma.control.running() {
        return Err(Failed::from(format!("DMA state {:X?}", core.dma)));
    }

    Ok(())
}

/// A boot image loaded from scratch, run until the guest goes idle.
fn bootstrap_until_idle() -> Result<(), Failed> {
    // move #$1,x0; add x0,a; movep #1,x:$ffffc4
    let image: [u32; 4] = [0x24_0100, 0x20_0040, 0x08_F484, 0x00_0001];
    let mut scratch = vec![0u8; 0x2000];
    for (i, word) in image.iter().enumerate() {
        scratch[i * 4..][..4].copy_from_slice(&word.to_le_bytes());
    }

    let mut dsp = Dsp::new(Config::default(), Box::new(scratch));
    dsp.bootstrap().map_err(|e| e.to_string())?;
    dsp.run(1000).map_err(|e| e.to_string())?;

    let core = dsp.core();
    if !dsp.idle() || core.pc != 4 {
        return Err(Failed::from(format!(
            "idle={} pc={:06X}",
            dsp.idle(),
            core.pc
        )));
    }

    if core.regs.get(Reg::A1) != 0x01_0000 {
        return Err(Failed::from(format!("A1={:06X}", core.regs.get(Reg::A1))));
    }

    // 2 + 2 + 6
    if dsp.cycles() != 10 {
        return Err(Failed::from(format!("{} cycles", dsp.cycles())));
    }

    Ok(())
}

fn guarded(f: impl FnOnce() -> Result<(), Failed> + std::panic::UnwindSafe) -> Result<(), Failed> {
    match std::panic::catch_unwind(f) {
        Ok(r) => r,
        Err(e) => {
            let mut msg = "<unknown panic>".to_owned();
            if let Some(s) = e.downcast_ref::<String>() {
                msg = s.clone();
            } else if let Some(s) = e.downcast_ref::<&'static str>() {
                msg = (*s).to_owned();
            }

            Err(Failed::from(msg))
        }
    }
}

fn main() {
    let args = Arguments::from_args();

    let mut tests: Vec<Trial> = PROGRAMS
        .iter()
        .map(|program| Trial::test(program.name, move || guarded(|| run_program(program))))
        .collect();

    tests.push(Trial::test("dma_to_scratch", || guarded(dma_to_scratch)));
    tests.push(Trial::test("bootstrap_until_idle", || {
        guarded(bootstrap_until_idle)
    }));

    std::panic::set_hook(Box::new(move |_| ()));
    libtest_mimic::run(&args, tests).exit();
}
