//! Instruction records and the instruction buffer.

use core::fmt;

use itertools::Itertools;

use crate::operand::{Operand, OperandKind};

/// Maximum number of operands an instruction can carry.
pub const MAX_OPERANDS: usize = 4;

/// Maximum mnemonic length in bytes.
pub const MAX_MNEMONIC_LEN: usize = 255;

/// A single textual-mnemonic instruction.
///
/// The mnemonic is borrowed and must outlive the buffer holding the
/// instruction; the operand array is stored inline so records are `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<'a> {
    mnemonic: &'a str,
    operands: [Operand<'a>; MAX_OPERANDS],
    num_operands: u8,
}

impl<'a> Instruction<'a> {
    /// Builds an instruction from a mnemonic and up to four operands.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_OPERANDS`] operands are passed or the
    /// mnemonic exceeds [`MAX_MNEMONIC_LEN`] bytes.
    pub fn new(mnemonic: &'a str, operands: &[Operand<'a>]) -> Self {
        assert!(operands.len() <= MAX_OPERANDS, "too many operands");
        assert!(mnemonic.len() <= MAX_MNEMONIC_LEN, "mnemonic too long");

        let mut slots = [Operand::None; MAX_OPERANDS];
        slots[..operands.len()].copy_from_slice(operands);

        Self {
            mnemonic,
            operands: slots,
            num_operands: operands.len() as u8,
        }
    }

    /// The instruction mnemonic.
    pub const fn mnemonic(&self) -> &'a str {
        self.mnemonic
    }

    /// The populated operand slots, in order.
    pub fn operands(&self) -> &[Operand<'a>] {
        &self.operands[..self.num_operands as usize]
    }

    /// The operand shape: one kind tag per slot, `None` for empty slots.
    pub fn operand_kinds(&self) -> [OperandKind; 4] {
        let mut kinds = [OperandKind::None; MAX_OPERANDS];
        for (slot, operand) in self.operands().iter().enumerate() {
            kinds[slot] = operand.kind();
        }
        kinds
    }

    /// Returns a copy of this instruction with operand slot `i` replaced.
    ///
    /// Used by the assembler drivers to substitute placeholder immediates
    /// for symbol and data operands without mutating the caller's buffer.
    pub(crate) fn with_operand(mut self, i: usize, operand: Operand<'a>) -> Self {
        self.operands[i] = operand;
        self
    }
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.num_operands == 0 {
            write!(f, "{}", self.mnemonic)
        } else {
            write!(
                f,
                "{} {}",
                self.mnemonic,
                self.operands().iter().map(|op| op.to_string()).join(", ")
            )
        }
    }
}

/// An ordered buffer of instructions.
///
/// Iteration order equals insertion order, and insertion order defines the
/// order of the encoded bytes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Instructions<'a> {
    instructions: Vec<Instruction<'a>>,
}

impl<'a> Instructions<'a> {
    /// An empty instruction buffer.
    pub fn new() -> Self {
        Self {
            instructions: Vec::with_capacity(32),
        }
    }

    /// Appends an instruction.
    pub fn push_back(&mut self, mnemonic: &'a str, operands: &[Operand<'a>]) {
        self.instructions.push(Instruction::new(mnemonic, operands));
    }

    /// Iterates the instructions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction<'a>> {
        self.instructions.iter()
    }

    /// Number of instructions in the buffer.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for Instructions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::Register;

    #[test]
    fn push_back_preserves_order() {
        let mut instructions = Instructions::new();
        instructions.push_back("syscall", &[]);
        instructions.push_back(
            "mov",
            &[Operand::Register(Register::Rax), Operand::Imm32(60)],
        );

        let mnemonics: Vec<_> = instructions.iter().map(|i| i.mnemonic()).collect();
        assert_eq!(mnemonics, ["syscall", "mov"]);
        assert_eq!(instructions.len(), 2);
    }

    #[test]
    fn display_formats_like_assembly() {
        let instr = Instruction::new(
            "mov",
            &[
                Operand::Register(Register::Rax),
                Operand::mem_disp(Register::Rbx, 0x10),
            ],
        );
        assert_eq!(instr.to_string(), "mov rax, [rbx + 0x10]");

        let instr = Instruction::new("syscall", &[]);
        assert_eq!(instr.to_string(), "syscall");
    }

    #[test]
    fn with_operand_rewrites_a_copy() {
        let original = Instruction::new("call", &[Operand::Symbol("puts")]);
        let rewritten = original.with_operand(0, Operand::Imm32(0));

        assert_eq!(original.operands()[0], Operand::Symbol("puts"));
        assert_eq!(rewritten.operands()[0], Operand::Imm32(0));
    }
}
