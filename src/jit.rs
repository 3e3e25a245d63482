//! The JIT assembler drivers.
//!
//! The JIT path shares the per-instruction loop with the static assembler
//! but resolves addresses in place instead of emitting relocations: data
//! operands become the host address of the registered blob, and symbol
//! operands are looked up through a caller-supplied resolver callback.
//! Symbols the resolver cannot answer fall back to the static behavior (a
//! zero placeholder plus an extern ref) so a later loading pass can still
//! patch them.

use crate::abi::Abi;
use crate::bytecode::ByteCode;
use crate::data::{Data, RelocKind};
use crate::error::Error;
use crate::instruction::Instructions;
use crate::operand::Operand;
use crate::{assembler, x86_64};

/// Resolves an external symbol name to a host address at JIT time.
pub type SymbolResolver = dyn Fn(&str) -> Option<u64>;

/// A JIT assembler entry point producing directly executable bytes
/// (executable-memory allocation is the caller's concern).
pub type JitAssembler = for<'a> fn(
    &Instructions<'a>,
    &mut ByteCode,
    &mut Data<'a>,
    Option<&SymbolResolver>,
) -> Result<(), Error>;

/// Looks up the JIT assembler for an ABI.
///
/// Returns `None` for ABIs without a backend; callers surface
/// [`Error::UnsupportedAbi`].
pub fn get_jit_assembler(abi: Abi) -> Option<JitAssembler> {
    match abi {
        Abi::WindowsX64 | Abi::LinuxX64 | Abi::MacOSX64 => Some(jit_x86_64),
        Abi::MacOSAarch64 => None,
    }
}

/// The x86-64 JIT assembler, shared by all x64 ABIs.
fn jit_x86_64<'a>(
    instructions: &Instructions<'a>,
    bytecode: &mut ByteCode,
    data: &mut Data<'a>,
    resolver: Option<&SymbolResolver>,
) -> Result<(), Error> {
    for instruction in instructions.iter() {
        let mut resolved = *instruction;
        let mut pending: Option<(&'a str, RelocKind)> = None;

        for (slot, operand) in instruction.operands().iter().enumerate() {
            match *operand {
                Operand::Data(name) => {
                    let address = data.jit_address(name).ok_or_else(|| {
                        Error::InvalidOperand(format!("unknown data blob `{name}`"))
                    })?;
                    resolved = resolved.with_operand(slot, Operand::Imm64(address as i64));
                }
                Operand::Symbol(name) => match resolver.and_then(|resolve| resolve(name)) {
                    Some(address) => {
                        data.resolve_extern(name, address);
                        resolved = resolved.with_operand(slot, Operand::Imm64(address as i64));
                    }
                    None => {
                        resolved = resolved.with_operand(slot, Operand::Imm32(0));
                        pending = Some((name, RelocKind::Rel32));
                    }
                },
                _ => {}
            }
        }

        x86_64::encode_instruction(&resolved, bytecode)?;

        if let Some((name, kind)) = pending {
            data.add_extern(name, bytecode.len() - 4, kind);
        }
    }

    assembler::resolve_intern_refs(data, bytecode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataKind;
    use crate::register::Register as Reg;

    #[test]
    fn x64_abis_share_a_driver() {
        assert!(get_jit_assembler(Abi::LinuxX64).is_some());
        assert!(get_jit_assembler(Abi::MacOSAarch64).is_none());
    }

    #[test]
    fn data_operands_resolve_to_host_addresses() {
        let jit = get_jit_assembler(Abi::LinuxX64).unwrap();

        let mut data = Data::new();
        data.add_bytes("message", b"Hello, World!\n", DataKind::Data);
        let address = data.jit_address("message").unwrap();

        let mut instructions = Instructions::new();
        instructions.push_back(
            "mov",
            &[Operand::Register(Reg::Rsi), Operand::Data("message")],
        );

        let mut bytecode = ByteCode::new();
        jit(&instructions, &mut bytecode, &mut data, None).unwrap();

        // mov rsi, imm64 with the blob's address inlined.
        assert_eq!(bytecode.len(), 10);
        assert_eq!(bytecode.get(0), Some(0x48));
        assert_eq!(bytecode.get(1), Some(0xB8 | Reg::Rsi.code3()));
        let mut tail = [0u8; 8];
        for (i, byte) in tail.iter_mut().enumerate() {
            *byte = bytecode.get(2 + i).unwrap();
        }
        assert_eq!(u64::from_le_bytes(tail), address);
    }

    #[test]
    fn unknown_data_blob_fails() {
        let jit = get_jit_assembler(Abi::LinuxX64).unwrap();

        let mut instructions = Instructions::new();
        instructions.push_back(
            "mov",
            &[Operand::Register(Reg::Rsi), Operand::Data("missing")],
        );

        let mut bytecode = ByteCode::new();
        let mut data = Data::new();
        let err = jit(&instructions, &mut bytecode, &mut data, None).unwrap_err();
        assert!(matches!(err, Error::InvalidOperand(_)));
    }

    #[test]
    fn resolver_inlines_symbol_addresses() {
        let jit = get_jit_assembler(Abi::LinuxX64).unwrap();

        let mut instructions = Instructions::new();
        instructions.push_back(
            "mov",
            &[Operand::Register(Reg::Rax), Operand::Symbol("puts")],
        );

        let mut bytecode = ByteCode::new();
        let mut data = Data::new();
        let resolver: &SymbolResolver = &|name| (name == "puts").then_some(0x7FFF_0000_1234u64);
        jit(&instructions, &mut bytecode, &mut data, Some(resolver)).unwrap();

        assert_eq!(bytecode.len(), 10);
        let (_, symbol) = data.externs().next().unwrap();
        assert_eq!(symbol.runtime_address(), Some(0x7FFF_0000_1234));
        assert!(symbol.refs().is_empty());
    }

    #[test]
    fn unresolved_symbols_fall_back_to_relocations() {
        let jit = get_jit_assembler(Abi::LinuxX64).unwrap();

        let mut instructions = Instructions::new();
        instructions.push_back("call", &[Operand::Symbol("puts")]);

        let mut bytecode = ByteCode::new();
        let mut data = Data::new();
        jit(&instructions, &mut bytecode, &mut data, None).unwrap();

        assert_eq!(bytecode.as_slice(), &[0xE8, 0, 0, 0, 0]);
        let (_, symbol) = data.externs().next().unwrap();
        assert_eq!(symbol.refs()[0].offset, 1);
        assert_eq!(symbol.runtime_address(), None);
    }
}
