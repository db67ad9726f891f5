#[allow(dead_code)]
#[path = "src/ins/opcodes.rs"]
mod opcodes;

use opcodes::Opcode;
use std::io::Write;
use std::path::PathBuf;
use strum::VariantArray;

fn main() {
    println!("cargo::rerun-if-changed=src/ins/opcodes.rs");

    let lut: Vec<u8> = Vec::from_iter((0..(1u32 << 20)).map(|value| {
        let mut hit = None;
        for opcode in Opcode::VARIANTS {
            if opcode.matches(value) {
                if let Some(hit) = hit {
                    panic!("opcodes {hit:?} and {opcode:?} are valid for {value:024b}");
                }

                hit = Some(*opcode);
            }
        }

        hit.unwrap_or(Opcode::Undefined) as u8
    }));

    let path = PathBuf::from(std::env::var("OUT_DIR").unwrap()).join("decoding_lut.bin");
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(&lut).unwrap();
}
