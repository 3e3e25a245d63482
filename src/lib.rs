//! spasm: a small in-process assembler for x86-64.
//!
//! A caller builds a sequence of textual-mnemonic instructions
//! programmatically, registers named data blobs, and asks one of the
//! drivers to encode everything into a flat byte stream. Along the way the
//! drivers track symbol references and relocations, which either feed the
//! COFF object writer or are resolved in place on the JIT path.
//!
//! ```
//! use spasm::{Abi, ByteCode, Data, Instructions, Operand, Register};
//!
//! let mut instructions = Instructions::new();
//! instructions.push_back(
//!     "mov",
//!     &[Operand::Register(Register::Rax), Operand::Imm32(60)],
//! );
//! instructions.push_back("syscall", &[]);
//!
//! let assemble = spasm::get_assembler(Abi::LinuxX64).unwrap();
//! let mut bytecode = ByteCode::new();
//! let mut data = Data::new();
//! assemble(&instructions, &mut bytecode, &mut data).unwrap();
//!
//! assert_eq!(
//!     bytecode.as_slice(),
//!     &[0x48, 0xC7, 0xC0, 0x3C, 0x00, 0x00, 0x00, 0x0F, 0x05]
//! );
//! ```
//!
//! Diagnostics are emitted through [`tracing`] with target `"spasm"`;
//! programmatic callers should rely on the returned [`Error`] values.

#![warn(missing_docs)]

pub mod aarch64;
pub mod abi;
pub mod assembler;
pub mod bytecode;
pub mod data;
pub mod error;
pub mod instruction;
pub mod jit;
pub mod obj;
pub mod operand;
pub mod platform;
pub mod register;
pub mod x86_64;

pub use abi::Abi;
pub use assembler::{get_assembler, Assembler};
pub use bytecode::ByteCode;
pub use data::{Data, DataEntry, DataKind, RelWidth, RelocKind};
pub use error::Error;
pub use instruction::{Instruction, Instructions};
pub use jit::{get_jit_assembler, JitAssembler, SymbolResolver};
pub use obj::{write_file as obj_write_file, ObjFormat};
pub use operand::{Operand, OperandKind};
pub use platform::{current_isa, current_platform, Isa, Platform};
pub use register::{Register, RegisterClass};
