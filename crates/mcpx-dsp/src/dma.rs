//! The block-transfer engine moving data between DSP memory and scratch memory.
//!
//! Transfers are described by a linked list of descriptors in X memory. The list is walked
//! synchronously whenever the control register is written while the engine is running.

use crate::{Direction, Fault, Interpreter, Io, Space, mem::Memory};
use bitos::{
    bitos,
    integer::{u3, u4},
};
use util::WORD_MASK;
use zerocopy::{
    IntoBytes,
    little_endian::{U16, U32},
};

#[bitos(3)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    Nop = 0x0,
    Start = 0x1,
    Stop = 0x2,
    Freeze = 0x3,
    Unfreeze = 0x4,
    Abort = 0x5,
    Reserved0 = 0x6,
    Reserved1 = 0x7,
}

#[bitos(32)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Control {
    /// Only meaningful on writes.
    #[bits(0..3)]
    pub action: Action,
    #[bits(3)]
    pub frozen: bool,
    #[bits(4)]
    pub running: bool,
    #[bits(5)]
    pub stopped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Dma {
    pub configuration: u32,
    pub control: Control,
    pub start_block: u32,
    pub next_block: u32,
    /// Sticky end-of-list flag, visible in the interrupt status register.
    pub eol: bool,
}

/// End-of-list bit of a node pointer.
pub const NODE_EOL: u32 = 1 << 14;
/// Mask of the X address in a node pointer.
pub const NODE_POINTER: u32 = 0x3FFF;
/// Node control bits with no transfer support: interleave, writeback and the ones around
/// them.
pub const NODE_UNSUPPORTED: u32 = 0x221D;

#[bitos(32)]
#[derive(Debug, Clone, Copy)]
pub struct NodeControl {
    /// Set for DSP to scratch.
    #[bits(1)]
    pub to_scratch: bool,
    #[bits(5..9)]
    pub buffer: u4,
    #[bits(10..13)]
    pub format: u3,
}

/// A transfer descriptor, seven consecutive X words.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub next: u32,
    pub control: NodeControl,
    pub count: u32,
    pub dsp_offset: u32,
    pub scratch_offset: u32,
    pub scratch_base: u32,
    pub scratch_size: u32,
}

impl Descriptor {
    pub fn read(mem: &Memory, addr: u32) -> Result<Self, Fault> {
        let mut words = [0; 7];
        for (i, word) in words.iter_mut().enumerate() {
            let addr = addr + i as u32;
            *word = mem
                .word(Space::X, addr)
                .copied()
                .ok_or(Fault::AddressOutOfRange {
                    space: Space::X,
                    addr,
                })?;
        }

        let [next, control, count, dsp_offset, scratch_offset, scratch_base, scratch_size] =
            words;

        Ok(Self {
            next,
            control: NodeControl::from_bits(control),
            count,
            dsp_offset,
            scratch_offset,
            scratch_base,
            scratch_size: scratch_size + 1,
        })
    }

    /// Size in bytes of an item in scratch memory.
    pub fn item_size(&self) -> Result<u32, Fault> {
        match self.control.format().value() as u32 {
            1 => Ok(2),
            2 | 6 => Ok(4),
            format => Err(Fault::UnsupportedDmaFormat { format }),
        }
    }

    /// Where the DSP side of the transfer starts.
    pub fn dsp_address(&self) -> Result<(Space, u32), Fault> {
        let offset = self.dsp_offset;
        match offset {
            0x0000..0x1800 => Ok((Space::X, offset)),
            0x1800..0x2000 => Ok((Space::Y, offset - 0x1800)),
            0x2800..0x3800 => Ok((Space::P, offset - 0x2800)),
            _ => Err(Fault::UnsupportedDmaOffset { offset }),
        }
    }
}

impl Interpreter {
    /// Applies a write of the DMA control register, then runs any pending transfers.
    pub fn write_dma_control(&mut self, io: &mut Io, value: u32) -> Result<(), Fault> {
        let control = &mut self.dma.control;
        match Control::from_bits(value).action() {
            Action::Nop => (),
            Action::Start => {
                control.set_running(true);
                control.set_stopped(false);
            }
            Action::Stop => {
                control.set_stopped(true);
                control.set_running(false);
            }
            Action::Freeze => control.set_frozen(true),
            Action::Unfreeze => control.set_frozen(false),
            Action::Abort => {
                tracing::warn!("DMA abort requested, stopping");
                control.set_stopped(true);
                control.set_running(false);
            }
            Action::Reserved0 | Action::Reserved1 => {
                return Err(Fault::UnsupportedDmaAction { action: value & 7 });
            }
        }

        self.run_dma(io)
    }

    fn run_dma(&mut self, io: &mut Io) -> Result<(), Fault> {
        let control = self.dma.control;
        if !control.running() || control.frozen() {
            return Ok(());
        }

        while self.dma.next_block & NODE_EOL == 0 {
            let node = Descriptor::read(&self.mem, self.dma.next_block & NODE_POINTER)?;

            self.dma.next_block = node.next & WORD_MASK;
            if node.next & NODE_EOL != 0 {
                self.dma.eol = true;
            }

            tracing::debug!(
                "DMA node: {} {} items ({}) DSP {:06X} scratch {:X}+{:X}",
                if node.control.to_scratch() { "to scratch" } else { "from scratch" },
                node.count,
                node.control.format().value(),
                node.dsp_offset,
                node.scratch_base,
                node.scratch_offset,
            );

            let unsupported = node.control.to_bits() & NODE_UNSUPPORTED;
            if unsupported != 0 {
                return Err(Fault::UnsupportedDmaControl { bits: unsupported });
            }

            let item_size = node.item_size()?;
            let scratch_addr = match node.control.buffer().value() as u32 {
                0xE => {
                    let end = node.scratch_offset + node.count * item_size;
                    if end >= node.scratch_size {
                        tracing::debug!(
                            "skipping DMA node: {end:X} bytes overrun a {:X} byte buffer",
                            node.scratch_size
                        );
                        continue;
                    }

                    node.scratch_base + node.scratch_offset
                }
                0xF => node.scratch_offset,
                buffer => return Err(Fault::UnsupportedDmaBuffer { buffer }),
            };

            let (space, base) = node.dsp_address()?;
            self.transfer(io, &node, item_size, space, base, scratch_addr)?;
        }

        Ok(())
    }

    fn dsp_word(&mut self, space: Space, addr: u32) -> Result<&mut u32, Fault> {
        self.mem
            .word_mut(space, addr)
            .ok_or(Fault::AddressOutOfRange { space, addr })
    }

    /// Copies one node. Two byte items hold the top 16 bits of a word.
    fn transfer(
        &mut self,
        io: &mut Io,
        node: &Descriptor,
        item_size: u32,
        space: Space,
        base: u32,
        scratch_addr: u32,
    ) -> Result<(), Fault> {
        let count = node.count as usize;
        let addrs = (0..node.count).map(|i| base + i);

        match (node.control.to_scratch(), item_size) {
            (true, 2) => {
                let mut items = Vec::with_capacity(count);
                for addr in addrs {
                    items.push(U16::new((*self.dsp_word(space, addr)? >> 8) as u16));
                }

                io.scratch
                    .transfer(items.as_mut_bytes(), scratch_addr, Direction::ToScratch);
            }
            (true, _) => {
                let mut items = Vec::with_capacity(count);
                for addr in addrs {
                    items.push(U32::new(*self.dsp_word(space, addr)?));
                }

                io.scratch
                    .transfer(items.as_mut_bytes(), scratch_addr, Direction::ToScratch);
            }
            (false, 2) => {
                let mut items = vec![U16::ZERO; count];
                io.scratch
                    .transfer(items.as_mut_bytes(), scratch_addr, Direction::FromScratch);

                for (addr, item) in addrs.zip(items) {
                    *self.dsp_word(space, addr)? = (item.get() as u32) << 8;
                }
            }
            (false, _) => {
                let mut items = vec![U32::ZERO; count];
                io.scratch
                    .transfer(items.as_mut_bytes(), scratch_addr, Direction::FromScratch);

                for (addr, item) in addrs.zip(items) {
                    *self.dsp_word(space, addr)? = item.get() & WORD_MASK;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mem::{DMA_CONTROL, DMA_NEXT_BLOCK};

    const START: u32 = 1;
    const STOP: u32 = 2;

    fn node(core: &mut Interpreter, addr: u32, words: [u32; 7]) {
        core.mem.xram[addr as usize..][..7].copy_from_slice(&words);
    }

    /// Control word of a node: direction, buffer id and format.
    fn node_control(to_scratch: bool, buffer: u32, format: u32) -> u32 {
        ((to_scratch as u32) << 1) | (buffer << 5) | (format << 10)
    }

    #[test]
    fn two_node_list() {
        let mut core = Interpreter::default();
        let mut scratch = vec![0u8; 0x100];

        core.mem.xram[0x100..0x104].copy_from_slice(&[0x11_2233, 0x44_5566, 0x77_8899, 0xAA_BBCC]);
        core.mem.yram[0x20..0x22].copy_from_slice(&[0x12_3400, 0xAB_CD00]);

        node(&mut core, 0x10, [0x20, node_control(true, 0xF, 2), 4, 0x100, 0x40, 0, 0]);
        node(
            &mut core,
            0x20,
            [NODE_EOL, node_control(true, 0xE, 1), 2, 0x1820, 0x08, 0x80, 0x3F],
        );

        let mut io = Io::new(&mut scratch);
        core.write(&mut io, Space::X, DMA_NEXT_BLOCK, 0x10).unwrap();
        core.write(&mut io, Space::X, DMA_CONTROL, START).unwrap();

        assert!(core.dma.eol);
        assert!(core.dma.control.running());
        assert_eq!(core.dma.next_block, NODE_EOL);

        assert_eq!(&scratch[0x40..0x44], &[0x33, 0x22, 0x11, 0x00]);
        assert_eq!(&scratch[0x4C..0x50], &[0xCC, 0xBB, 0xAA, 0x00]);
        assert_eq!(&scratch[0x88..0x8C], &[0x34, 0x12, 0xCD, 0xAB]);
    }

    #[test]
    fn from_scratch() {
        let mut core = Interpreter::default();
        let mut scratch = vec![0u8; 0x10];
        scratch[0..8].copy_from_slice(&[0x01, 0x02, 0x03, 0xFF, 0x04, 0x05, 0x06, 0x07]);

        node(
            &mut core,
            0,
            [NODE_EOL, node_control(false, 0xF, 2), 2, 0x2810, 0, 0, 0],
        );

        let mut io = Io::new(&mut scratch);
        core.write_dma_control(&mut io, START).unwrap();

        assert_eq!(core.mem.pram[0x10], 0x03_0201);
        assert_eq!(core.mem.pram[0x11], 0x06_0504);
    }

    #[test]
    fn mixbuffer_round_trip() {
        let mut core = Interpreter::default();
        let mut scratch = vec![0u8; 0x20];
        scratch[0..8].copy_from_slice(&[0x01, 0x02, 0x03, 0x00, 0x04, 0x05, 0x06, 0x00]);

        // in through the read buffer window, out through the one after X RAM
        node(&mut core, 0x10, [0x20, node_control(false, 0xF, 2), 2, 0x1402, 0, 0, 0]);
        node(
            &mut core,
            0x20,
            [NODE_EOL, node_control(true, 0xF, 2), 2, 0xC02, 0x10, 0, 0],
        );

        let mut io = Io::new(&mut scratch);
        core.write(&mut io, Space::X, DMA_NEXT_BLOCK, 0x10).unwrap();
        core.write(&mut io, Space::X, DMA_CONTROL, START).unwrap();

        assert!(core.dma.eol);
        assert_eq!(&core.mem.mixbuffer[2..4], &[0x03_0201, 0x06_0504]);
        assert_eq!(&scratch[0x10..0x18], &[0x01, 0x02, 0x03, 0x00, 0x04, 0x05, 0x06, 0x00]);
    }

    #[test]
    fn stop_skips_transfer() {
        let mut core = Interpreter::default();
        let mut scratch = Vec::new();
        let mut io = Io::new(&mut scratch);

        core.dma.control.set_running(true);
        core.write_dma_control(&mut io, STOP).unwrap();

        assert!(!core.dma.control.running());
        assert!(core.dma.control.stopped());
        assert!(!core.dma.eol);
        assert!(scratch.is_empty());
    }

    #[test]
    fn frozen_engine_waits() {
        let mut core = Interpreter::default();
        let mut scratch = Vec::new();
        node(
            &mut core,
            0,
            [NODE_EOL, node_control(true, 0xF, 2), 1, 0, 0, 0, 0],
        );

        let mut io = Io::new(&mut scratch);
        core.write_dma_control(&mut io, 3).unwrap();
        core.write_dma_control(&mut io, START).unwrap();
        assert!(!core.dma.eol);

        core.write_dma_control(&mut io, 4).unwrap();
        assert!(core.dma.eol);
    }

    #[test]
    fn oversized_node_is_skipped() {
        let mut core = Interpreter::default();
        let mut scratch = Vec::new();
        node(
            &mut core,
            0,
            [NODE_EOL, node_control(true, 0xE, 2), 4, 0, 0, 0, 0x0F],
        );

        let mut io = Io::new(&mut scratch);
        core.write_dma_control(&mut io, START).unwrap();
        assert!(core.dma.eol);
        assert!(scratch.is_empty());
    }

    #[test]
    fn unsupported_nodes() {
        let mut scratch = Vec::new();

        let mut core = Interpreter::default();
        node(&mut core, 0, [NODE_EOL, node_control(true, 0xF, 3), 1, 0, 0, 0, 0]);
        let mut io = Io::new(&mut scratch);
        assert!(matches!(
            core.write_dma_control(&mut io, START),
            Err(Fault::UnsupportedDmaFormat { format: 3 })
        ));

        let mut core = Interpreter::default();
        node(&mut core, 0, [NODE_EOL, node_control(true, 0x3, 2), 1, 0, 0, 0, 0]);
        assert!(matches!(
            core.write_dma_control(&mut io, START),
            Err(Fault::UnsupportedDmaBuffer { buffer: 3 })
        ));

        let mut core = Interpreter::default();
        node(&mut core, 0, [NODE_EOL, node_control(true, 0xF, 2), 1, 0x2000, 0, 0, 0]);
        assert!(matches!(
            core.write_dma_control(&mut io, START),
            Err(Fault::UnsupportedDmaOffset { offset: 0x2000 })
        ));

        // interleaved
        let mut core = Interpreter::default();
        node(&mut core, 0, [NODE_EOL, node_control(true, 0xF, 2) | 1, 1, 0, 0, 0, 0]);
        assert!(matches!(
            core.write_dma_control(&mut io, START),
            Err(Fault::UnsupportedDmaControl { bits: 1 })
        ));

        // writeback
        let mut core = Interpreter::default();
        node(&mut core, 0, [NODE_EOL, node_control(false, 0xF, 2) | 0x10, 1, 0, 0, 0, 0]);
        assert!(matches!(
            core.write_dma_control(&mut io, START),
            Err(Fault::UnsupportedDmaControl { bits: 0x10 })
        ));

        let mut core = Interpreter::default();
        assert!(matches!(
            core.write_dma_control(&mut io, 6),
            Err(Fault::UnsupportedDmaAction { action: 6 })
        ));
    }
}
