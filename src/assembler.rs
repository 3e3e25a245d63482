//! The static assembler drivers.
//!
//! A driver walks the instruction buffer in order, rewrites name operands
//! to placeholder immediates, hands each instruction to the encoder and
//! records the relocation the placeholder stands for. The caller's
//! instruction buffer is never mutated; rewriting happens on per-iteration
//! copies so assembling the same buffer twice is deterministic.

use crate::abi::Abi;
use crate::bytecode::ByteCode;
use crate::data::{Data, RelWidth, RelocKind};
use crate::error::Error;
use crate::instruction::Instructions;
use crate::operand::Operand;
use crate::x86_64;

/// An assembler entry point producing linker-ready bytecode.
pub type Assembler =
    for<'a> fn(&Instructions<'a>, &mut ByteCode, &mut Data<'a>) -> Result<(), Error>;

/// Looks up the static assembler for an ABI.
///
/// Returns `None` for ABIs without a backend; callers surface
/// [`Error::UnsupportedAbi`].
pub fn get_assembler(abi: Abi) -> Option<Assembler> {
    match abi {
        Abi::WindowsX64 | Abi::LinuxX64 | Abi::MacOSX64 => Some(assemble_x86_64),
        Abi::MacOSAarch64 => None,
    }
}

/// The x86-64 static assembler, shared by all x64 ABIs.
fn assemble_x86_64<'a>(
    instructions: &Instructions<'a>,
    bytecode: &mut ByteCode,
    data: &mut Data<'a>,
) -> Result<(), Error> {
    for instruction in instructions.iter() {
        let mut resolved = *instruction;
        let mut pending: Option<(&'a str, RelocKind)> = None;

        for (slot, operand) in instruction.operands().iter().enumerate() {
            match *operand {
                // Symbols are encoded as a zero imm32 the linker patches.
                Operand::Symbol(name) => {
                    resolved = resolved.with_operand(slot, Operand::Imm32(0));
                    pending = Some((name, RelocKind::Rel32));
                    break;
                }
                // Data blobs become an absolute 32-bit site against a
                // linker symbol of the same name.
                Operand::Data(name) => {
                    resolved = resolved.with_operand(slot, Operand::Imm32(0));
                    pending = Some((name, RelocKind::Abs32));
                    break;
                }
                _ => {}
            }
        }

        x86_64::encode_instruction(&resolved, bytecode)?;

        if let Some((name, kind)) = pending {
            // The placeholder imm32 is the trailing four bytes.
            data.add_extern(name, bytecode.len() - 4, kind);
        }
    }

    if data.num_exports() == 0 {
        tracing::warn!(
            target: "spasm",
            "could not find any exported symbol, adding symbol `main` starting at offset 0x0"
        );
        data.add_export("main", 0)?;
    }

    resolve_intern_refs(data, bytecode)
}

/// Patches every intern label reference with its final displacement.
///
/// For a reference of width `n` at `offset` targeting a label at `start`,
/// the patched value is `start - (offset + n)`, signed, little-endian.
pub(crate) fn resolve_intern_refs(data: &Data<'_>, bytecode: &mut ByteCode) -> Result<(), Error> {
    for (name, label) in data.interns() {
        let start = label.start_offset() as i64;
        for reference in label.refs() {
            let disp = start - (reference.offset as i64 + reference.width.bytes() as i64);
            match reference.width {
                RelWidth::Rel8 => {
                    let disp = i8::try_from(disp).map_err(|_| {
                        Error::InvalidOperand(format!(
                            "displacement {disp} to label `{name}` does not fit in one byte"
                        ))
                    })?;
                    bytecode.patch(reference.offset, &disp.to_le_bytes())?;
                }
                RelWidth::Rel32 => {
                    let disp = i32::try_from(disp).map_err(|_| {
                        Error::InvalidOperand(format!(
                            "displacement {disp} to label `{name}` does not fit in four bytes"
                        ))
                    })?;
                    bytecode.patch(reference.offset, &disp.to_le_bytes())?;
                }
            }
        }
    }
    Ok(())
}
