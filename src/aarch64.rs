//! AArch64 backend stub.
//!
//! The instruction set is recognized at the ABI level
//! ([`Abi::MacOSAarch64`](crate::abi::Abi)) but no encoder exists yet, so
//! every instruction is rejected and the driver dispatch tables hand out no
//! assembler for AArch64 targets.

use crate::bytecode::ByteCode;
use crate::error::Error;
use crate::instruction::Instruction;

/// Always fails: AArch64 encoding is not implemented.
pub fn encode_instruction(instruction: &Instruction<'_>, _out: &mut ByteCode) -> Result<(), Error> {
    tracing::error!(target: "spasm", "aarch64 encoding is not implemented: {instruction}");
    Err(Error::EncodingUnknown {
        mnemonic: instruction.mnemonic().to_owned(),
        operands: instruction.operand_kinds(),
    })
}
