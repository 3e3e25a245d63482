//! Assembler error variants.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::abi::Abi;
use crate::operand::OperandKind;

/// Errors surfaced by the assembler, the symbol tables and the object
/// writers.
///
/// Fatal errors stop assembly at the first occurrence. The non-fatal
/// conditions (duplicate export, missing export) are logged through
/// [`tracing`] by the drivers and assembly continues.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested ABI has no assembler or object writer.
    #[error("unsupported ABI: {0}")]
    UnsupportedAbi(Abi),

    /// No instruction-table entry matches the mnemonic and operand shape.
    #[error("no encoding for `{mnemonic}` with operand shape {operands:?}")]
    EncodingUnknown {
        /// The instruction mnemonic.
        mnemonic: String,
        /// The operand shape that failed to match, one tag per slot.
        operands: [OperandKind; 4],
    },

    /// An operand is malformed (bad scale, mixed-width memory registers,
    /// unresolved name operand reaching the encoder, out-of-range fixup).
    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    /// A symbol was exported twice.
    #[error("symbol `{0}` is already exported")]
    DuplicateExport(String),

    /// A reference was added against an export that does not exist.
    #[error("unknown export symbol `{0}`")]
    UnknownExport(String),

    /// A reference was added against an intern label that does not exist.
    #[error("unknown intern symbol `{0}`")]
    UnknownIntern(String),

    /// Writing the object file failed; bytecode and data are left intact.
    #[error("cannot write object file {}", .path.display())]
    Io {
        /// Path of the object file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The COFF image could not be assembled.
    #[error("COFF generation failed: {0}")]
    CoffGeneration(String),
}
