//! The static instruction-encoding table.
//!
//! Matching is a linear scan: the first entry whose mnemonic, operand kinds
//! and size constraints all hold wins. A size of 0 is a wildcard.
//! General-purpose registers satisfy any size constraint, because their
//! width class already selects the operand size at encode time (REX.W and
//! the 0x66 prefix are derived from the register, not from the table);
//! vector registers must match exactly so that the VEX/EVEX length and
//! prefix family are picked correctly. An entry that exists only for one
//! GP width (the `B8+r` move) opts into strict sizes, so narrower or wider
//! registers fall through to the next form.

use crate::operand::{Operand, OperandKind};

/// Prefix family an entry requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PrefixFamily {
    /// No mandatory prefix; REX is synthesized on demand.
    None,
    /// Legacy REX form (64-bit GP operands).
    Rex,
    /// Two-byte VEX (falls back to three-byte when the operands demand it).
    Vex2,
    /// Three-byte VEX.
    Vex3,
    /// Four-byte EVEX.
    Evex,
}

/// CPU feature an instruction requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CpuFlag {
    /// x86-64 baseline.
    Base,
    /// SSE.
    Sse,
    /// AVX.
    Avx,
    /// AVX-512 foundation.
    Avx512F,
}

/// How the ModR/M byte is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModRmSpec {
    /// No ModR/M byte.
    None,
    /// `reg` carries an opcode extension (`/0`..`/7`); the operand in
    /// `rm` lands in the r/m field.
    Digit { digit: u8, rm: usize },
    /// Both fields carry operands: `reg` and `rm` are operand slot indices.
    Slots { reg: usize, rm: usize },
}

/// One instruction form.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Entry {
    pub mnemonic: &'static str,
    pub operands: [OperandKind; 4],
    /// Expected operand sizes in bits; 0 is a wildcard.
    pub sizes: [u16; 4],
    pub opcode: &'static [u8],
    pub modrm: ModRmSpec,
    pub prefix: PrefixFamily,
    /// VEX/EVEX `pp` field (implied 66/F3/F2 prefix).
    pub pp: u8,
    /// VEX/EVEX opcode-map select.
    pub mmmmm: u8,
    pub cpu: CpuFlag,
    /// `+r` form: the low 3 register bits are OR-ed into the last opcode
    /// byte and the extension bit travels in REX.B.
    pub plus_reg: bool,
    /// Operand size defaults to 64 bits; REX.W is never emitted.
    pub default_w: bool,
    /// Operand slot encoded in VEX/EVEX `vvvv` for three-operand forms.
    pub vvvv_slot: Option<usize>,
    /// Operand slot carrying an AVX-512 opmask register.
    pub mask_slot: Option<usize>,
    /// GP registers must match this entry's sizes exactly instead of
    /// relying on width-derived encoding.
    pub strict_sizes: bool,
}

const NONE4: [OperandKind; 4] = [OperandKind::None; 4];

const DEFAULT: Entry = Entry {
    mnemonic: "",
    operands: NONE4,
    sizes: [0; 4],
    opcode: &[],
    modrm: ModRmSpec::None,
    prefix: PrefixFamily::None,
    pp: 0,
    mmmmm: 0,
    cpu: CpuFlag::Base,
    plus_reg: false,
    default_w: false,
    vvvv_slot: None,
    mask_slot: None,
    strict_sizes: false,
};

const fn ops1(a: OperandKind) -> [OperandKind; 4] {
    [a, OperandKind::None, OperandKind::None, OperandKind::None]
}

const fn ops2(a: OperandKind, b: OperandKind) -> [OperandKind; 4] {
    [a, b, OperandKind::None, OperandKind::None]
}

const fn ops3(a: OperandKind, b: OperandKind, c: OperandKind) -> [OperandKind; 4] {
    [a, b, c, OperandKind::None]
}

use OperandKind::{Imm8, Imm16, Imm32, Imm64, Memory, Register};

/// Supported instruction forms, scanned first to last.
pub(crate) static TABLE: &[Entry] = &[
    // mov
    Entry {
        mnemonic: "mov",
        operands: ops2(Register, Imm32),
        sizes: [32, 32, 0, 0],
        opcode: &[0xB8],
        plus_reg: true,
        strict_sizes: true,
        ..DEFAULT
    },
    Entry {
        mnemonic: "mov",
        operands: ops2(Register, Imm32),
        opcode: &[0xC7],
        modrm: ModRmSpec::Digit { digit: 0, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "mov",
        operands: ops2(Register, Imm64),
        opcode: &[0xB8],
        plus_reg: true,
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "mov",
        operands: ops2(Register, Imm16),
        opcode: &[0xC7],
        modrm: ModRmSpec::Digit { digit: 0, rm: 0 },
        ..DEFAULT
    },
    Entry {
        mnemonic: "mov",
        operands: ops2(Register, Imm8),
        opcode: &[0xC6],
        modrm: ModRmSpec::Digit { digit: 0, rm: 0 },
        ..DEFAULT
    },
    Entry {
        mnemonic: "mov",
        operands: ops2(Register, Register),
        opcode: &[0x89],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "mov",
        operands: ops2(Register, Memory),
        opcode: &[0x8B],
        modrm: ModRmSpec::Slots { reg: 0, rm: 1 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "mov",
        operands: ops2(Memory, Register),
        opcode: &[0x89],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    // add
    Entry {
        mnemonic: "add",
        operands: ops2(Register, Register),
        opcode: &[0x01],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "add",
        operands: ops2(Register, Imm8),
        opcode: &[0x83],
        modrm: ModRmSpec::Digit { digit: 0, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "add",
        operands: ops2(Register, Imm32),
        opcode: &[0x81],
        modrm: ModRmSpec::Digit { digit: 0, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "add",
        operands: ops2(Register, Memory),
        opcode: &[0x03],
        modrm: ModRmSpec::Slots { reg: 0, rm: 1 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "add",
        operands: ops2(Memory, Register),
        opcode: &[0x01],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    // sub
    Entry {
        mnemonic: "sub",
        operands: ops2(Register, Register),
        opcode: &[0x29],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "sub",
        operands: ops2(Register, Imm8),
        opcode: &[0x83],
        modrm: ModRmSpec::Digit { digit: 5, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "sub",
        operands: ops2(Register, Imm32),
        opcode: &[0x81],
        modrm: ModRmSpec::Digit { digit: 5, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "sub",
        operands: ops2(Register, Memory),
        opcode: &[0x2B],
        modrm: ModRmSpec::Slots { reg: 0, rm: 1 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "sub",
        operands: ops2(Memory, Register),
        opcode: &[0x29],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    // and
    Entry {
        mnemonic: "and",
        operands: ops2(Register, Register),
        opcode: &[0x21],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "and",
        operands: ops2(Register, Imm8),
        opcode: &[0x83],
        modrm: ModRmSpec::Digit { digit: 4, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "and",
        operands: ops2(Register, Imm32),
        opcode: &[0x81],
        modrm: ModRmSpec::Digit { digit: 4, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "and",
        operands: ops2(Register, Memory),
        opcode: &[0x23],
        modrm: ModRmSpec::Slots { reg: 0, rm: 1 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "and",
        operands: ops2(Memory, Register),
        opcode: &[0x21],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    // or
    Entry {
        mnemonic: "or",
        operands: ops2(Register, Register),
        opcode: &[0x09],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "or",
        operands: ops2(Register, Imm8),
        opcode: &[0x83],
        modrm: ModRmSpec::Digit { digit: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "or",
        operands: ops2(Register, Imm32),
        opcode: &[0x81],
        modrm: ModRmSpec::Digit { digit: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "or",
        operands: ops2(Register, Memory),
        opcode: &[0x0B],
        modrm: ModRmSpec::Slots { reg: 0, rm: 1 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "or",
        operands: ops2(Memory, Register),
        opcode: &[0x09],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    // xor
    Entry {
        mnemonic: "xor",
        operands: ops2(Register, Register),
        opcode: &[0x31],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "xor",
        operands: ops2(Register, Imm8),
        opcode: &[0x83],
        modrm: ModRmSpec::Digit { digit: 6, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "xor",
        operands: ops2(Register, Imm32),
        opcode: &[0x81],
        modrm: ModRmSpec::Digit { digit: 6, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "xor",
        operands: ops2(Register, Memory),
        opcode: &[0x33],
        modrm: ModRmSpec::Slots { reg: 0, rm: 1 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "xor",
        operands: ops2(Memory, Register),
        opcode: &[0x31],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    // cmp
    Entry {
        mnemonic: "cmp",
        operands: ops2(Register, Register),
        opcode: &[0x39],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "cmp",
        operands: ops2(Register, Imm8),
        opcode: &[0x83],
        modrm: ModRmSpec::Digit { digit: 7, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "cmp",
        operands: ops2(Register, Imm32),
        opcode: &[0x81],
        modrm: ModRmSpec::Digit { digit: 7, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "cmp",
        operands: ops2(Register, Memory),
        opcode: &[0x3B],
        modrm: ModRmSpec::Slots { reg: 0, rm: 1 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    Entry {
        mnemonic: "cmp",
        operands: ops2(Memory, Register),
        opcode: &[0x39],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    // lea
    Entry {
        mnemonic: "lea",
        operands: ops2(Register, Memory),
        opcode: &[0x8D],
        modrm: ModRmSpec::Slots { reg: 0, rm: 1 },
        prefix: PrefixFamily::Rex,
        ..DEFAULT
    },
    // control flow
    Entry {
        mnemonic: "call",
        operands: ops1(Imm32),
        opcode: &[0xE8],
        default_w: true,
        ..DEFAULT
    },
    Entry {
        mnemonic: "jmp",
        operands: ops1(Imm32),
        opcode: &[0xE9],
        default_w: true,
        ..DEFAULT
    },
    Entry {
        mnemonic: "jmp",
        operands: ops1(Imm8),
        opcode: &[0xEB],
        default_w: true,
        ..DEFAULT
    },
    Entry {
        mnemonic: "je",
        operands: ops1(Imm32),
        opcode: &[0x0F, 0x84],
        default_w: true,
        ..DEFAULT
    },
    Entry {
        mnemonic: "je",
        operands: ops1(Imm8),
        opcode: &[0x74],
        default_w: true,
        ..DEFAULT
    },
    Entry {
        mnemonic: "jne",
        operands: ops1(Imm32),
        opcode: &[0x0F, 0x85],
        default_w: true,
        ..DEFAULT
    },
    Entry {
        mnemonic: "jne",
        operands: ops1(Imm8),
        opcode: &[0x75],
        default_w: true,
        ..DEFAULT
    },
    Entry {
        mnemonic: "nop",
        opcode: &[0x90],
        ..DEFAULT
    },
    Entry {
        mnemonic: "ret",
        opcode: &[0xC3],
        default_w: true,
        ..DEFAULT
    },
    Entry {
        mnemonic: "syscall",
        opcode: &[0x0F, 0x05],
        ..DEFAULT
    },
    // stack
    Entry {
        mnemonic: "push",
        operands: ops1(Register),
        opcode: &[0x50],
        plus_reg: true,
        default_w: true,
        ..DEFAULT
    },
    Entry {
        mnemonic: "pop",
        operands: ops1(Register),
        opcode: &[0x58],
        plus_reg: true,
        default_w: true,
        ..DEFAULT
    },
    // SSE moves
    Entry {
        mnemonic: "movaps",
        operands: ops2(Register, Register),
        sizes: [128, 128, 0, 0],
        opcode: &[0x0F, 0x28],
        modrm: ModRmSpec::Slots { reg: 0, rm: 1 },
        cpu: CpuFlag::Sse,
        ..DEFAULT
    },
    Entry {
        mnemonic: "movaps",
        operands: ops2(Register, Memory),
        sizes: [128, 128, 0, 0],
        opcode: &[0x0F, 0x28],
        modrm: ModRmSpec::Slots { reg: 0, rm: 1 },
        cpu: CpuFlag::Sse,
        ..DEFAULT
    },
    Entry {
        mnemonic: "movaps",
        operands: ops2(Memory, Register),
        sizes: [128, 128, 0, 0],
        opcode: &[0x0F, 0x29],
        modrm: ModRmSpec::Slots { reg: 1, rm: 0 },
        cpu: CpuFlag::Sse,
        ..DEFAULT
    },
    // AVX / AVX-512 packed add
    Entry {
        mnemonic: "vaddps",
        operands: ops3(Register, Register, Register),
        sizes: [128, 128, 128, 0],
        opcode: &[0x58],
        modrm: ModRmSpec::Slots { reg: 0, rm: 2 },
        prefix: PrefixFamily::Vex2,
        pp: 0,
        mmmmm: 1,
        cpu: CpuFlag::Avx,
        vvvv_slot: Some(1),
        ..DEFAULT
    },
    Entry {
        mnemonic: "vaddps",
        operands: ops3(Register, Register, Register),
        sizes: [256, 256, 256, 0],
        opcode: &[0x58],
        modrm: ModRmSpec::Slots { reg: 0, rm: 2 },
        prefix: PrefixFamily::Vex2,
        pp: 0,
        mmmmm: 1,
        cpu: CpuFlag::Avx,
        vvvv_slot: Some(1),
        ..DEFAULT
    },
    Entry {
        mnemonic: "vaddps",
        operands: ops3(Register, Register, Register),
        sizes: [512, 512, 512, 0],
        opcode: &[0x58],
        modrm: ModRmSpec::Slots { reg: 0, rm: 2 },
        prefix: PrefixFamily::Evex,
        pp: 0,
        mmmmm: 1,
        cpu: CpuFlag::Avx512F,
        vvvv_slot: Some(1),
        ..DEFAULT
    },
    Entry {
        mnemonic: "vaddps",
        operands: [Register, Register, Register, Register],
        sizes: [512, 512, 512, 0],
        opcode: &[0x58],
        modrm: ModRmSpec::Slots { reg: 0, rm: 2 },
        prefix: PrefixFamily::Evex,
        pp: 0,
        mmmmm: 1,
        cpu: CpuFlag::Avx512F,
        vvvv_slot: Some(1),
        mask_slot: Some(3),
        ..DEFAULT
    },
];

impl Entry {
    fn size_matches(&self, slot: usize, operand: &Operand<'_>) -> bool {
        let expected = self.sizes[slot];
        if expected == 0 {
            return true;
        }
        match operand {
            // GP register width is authoritative unless the entry insists;
            // vector widths select the prefix family and must always agree.
            Operand::Register(r) if r.class().is_gp() && !self.strict_sizes => true,
            Operand::Register(r) => r.width() == Some(expected),
            _ => operand.size_bits(expected) == expected,
        }
    }

    fn matches(&self, mnemonic: &str, operands: &[Operand<'_>]) -> bool {
        if self.mnemonic != mnemonic {
            return false;
        }
        for slot in 0..4 {
            let operand = operands.get(slot).copied().unwrap_or(Operand::None);
            if self.operands[slot] != operand.kind() || !self.size_matches(slot, &operand) {
                return false;
            }
        }
        true
    }
}

/// Finds the first entry matching the mnemonic and operand shape.
pub(crate) fn lookup(mnemonic: &str, operands: &[Operand<'_>]) -> Option<&'static Entry> {
    TABLE.iter().find(|entry| entry.matches(mnemonic, operands))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::Register as Reg;

    #[test]
    fn first_matching_entry_wins() {
        let entry = lookup(
            "mov",
            &[Operand::Register(Reg::Rax), Operand::Imm32(1)],
        )
        .unwrap();
        assert_eq!(entry.opcode, &[0xC7]);

        let entry = lookup(
            "mov",
            &[Operand::Register(Reg::R8), Operand::Imm64(1)],
        )
        .unwrap();
        assert_eq!(entry.opcode, &[0xB8]);
        assert!(entry.plus_reg);
    }

    #[test]
    fn strict_entries_gate_on_gp_width() {
        // The B8+r form exists only for 32-bit registers; 64-bit operands
        // fall through to C7 /0.
        let entry = lookup(
            "mov",
            &[Operand::Register(Reg::Eax), Operand::Imm32(1)],
        )
        .unwrap();
        assert_eq!(entry.opcode, &[0xB8]);
        assert!(entry.plus_reg && entry.strict_sizes);

        let entry = lookup(
            "mov",
            &[Operand::Register(Reg::Rax), Operand::Imm32(1)],
        )
        .unwrap();
        assert!(!entry.strict_sizes);
    }

    #[test]
    fn operand_kinds_must_match_slot_for_slot() {
        assert!(lookup("mov", &[Operand::Imm32(0), Operand::Register(Reg::Rax)]).is_none());
        assert!(lookup("syscall", &[Operand::Register(Reg::Rax)]).is_none());
        assert!(lookup("frobnicate", &[]).is_none());
    }

    #[test]
    fn vector_width_selects_the_prefix_family() {
        let ops = |a, b, c| [Operand::Register(a), Operand::Register(b), Operand::Register(c)];

        let xmm = lookup("vaddps", &ops(Reg::Xmm0, Reg::Xmm1, Reg::Xmm2)).unwrap();
        assert_eq!(xmm.prefix, PrefixFamily::Vex2);

        let zmm = lookup("vaddps", &ops(Reg::Zmm0, Reg::Zmm1, Reg::Zmm2)).unwrap();
        assert_eq!(zmm.prefix, PrefixFamily::Evex);
    }
}
