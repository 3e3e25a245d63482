//! x86-64 register enumeration.
//!
//! The discriminants are load-bearing: registers are laid out in blocks of
//! sixteen per width class, in hardware encoding order
//! (`A, C, D, B, SP, BP, SI, DI, R8..R15`), starting at 1. This makes the
//! 4-bit hardware register number `(discriminant - 1) % 16` and the width
//! class `(discriminant - 1) / 16`, which is exactly what the ModR/M, SIB
//! and REX/VEX/EVEX encoders need.

/// Width class of a register, derived from its position in the enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterClass {
    /// 8-bit general purpose (`al`, `sil`, `r8b`, ...).
    Byte,
    /// 16-bit general purpose.
    Word,
    /// 32-bit general purpose.
    Dword,
    /// 64-bit general purpose.
    Qword,
    /// 128-bit SSE vector.
    Xmm,
    /// 256-bit AVX vector.
    Ymm,
    /// 512-bit AVX-512 vector.
    Zmm,
    /// AVX-512 operation mask (`k0..k7`).
    Mask,
    /// The instruction pointer.
    Rip,
    /// Segment registers.
    Segment,
    /// The flags register.
    Flags,
    /// Control registers.
    Control,
    /// Debug registers.
    Debug,
}

impl RegisterClass {
    /// Register width in bits, for the classes that have one.
    pub const fn width(self) -> Option<u16> {
        match self {
            Self::Byte => Some(8),
            Self::Word => Some(16),
            Self::Dword => Some(32),
            Self::Qword => Some(64),
            Self::Xmm => Some(128),
            Self::Ymm => Some(256),
            Self::Zmm => Some(512),
            _ => None,
        }
    }

    /// Whether this class is a general-purpose register class.
    pub const fn is_gp(self) -> bool {
        matches!(self, Self::Byte | Self::Word | Self::Dword | Self::Qword)
    }

    /// Whether this class is a SIMD vector class.
    pub const fn is_vector(self) -> bool {
        matches!(self, Self::Xmm | Self::Ymm | Self::Zmm)
    }
}

/// An x86-64 register.
///
/// See the module docs for the layout contract. Reordering variants breaks
/// instruction encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
#[rustfmt::skip]
#[allow(missing_docs)] // the assembly names are the documentation
pub enum Register {
    // 8-bit low. AH/BH/CH/DH are deliberately absent: their encodings are
    // unavailable once a REX prefix is present.
    Al = 1, Cl, Dl, Bl, Spl, Bpl, Sil, Dil,
    R8b, R9b, R10b, R11b, R12b, R13b, R14b, R15b,

    // 16-bit
    Ax, Cx, Dx, Bx, Sp, Bp, Si, Di,
    R8w, R9w, R10w, R11w, R12w, R13w, R14w, R15w,

    // 32-bit
    Eax, Ecx, Edx, Ebx, Esp, Ebp, Esi, Edi,
    R8d, R9d, R10d, R11d, R12d, R13d, R14d, R15d,

    // 64-bit
    Rax, Rcx, Rdx, Rbx, Rsp, Rbp, Rsi, Rdi,
    R8, R9, R10, R11, R12, R13, R14, R15,

    // SSE / AVX / AVX-512 vectors
    Xmm0, Xmm1, Xmm2, Xmm3, Xmm4, Xmm5, Xmm6, Xmm7,
    Xmm8, Xmm9, Xmm10, Xmm11, Xmm12, Xmm13, Xmm14, Xmm15,

    Ymm0, Ymm1, Ymm2, Ymm3, Ymm4, Ymm5, Ymm6, Ymm7,
    Ymm8, Ymm9, Ymm10, Ymm11, Ymm12, Ymm13, Ymm14, Ymm15,

    Zmm0, Zmm1, Zmm2, Zmm3, Zmm4, Zmm5, Zmm6, Zmm7,
    Zmm8, Zmm9, Zmm10, Zmm11, Zmm12, Zmm13, Zmm14, Zmm15,

    // AVX-512 operation masks
    K0, K1, K2, K3, K4, K5, K6, K7,

    // Instruction pointer
    Rip,

    // Segments
    Cs, Ds, Ss, Es, Fs, Gs,

    // Flags
    RFlags,

    // Control registers
    Cr0, Cr1, Cr2, Cr3, Cr4, Cr5, Cr6, Cr7,
    Cr8, Cr9, Cr10, Cr11, Cr12, Cr13, Cr14, Cr15,

    // Debug registers
    Dr0, Dr1, Dr2, Dr3, Dr4, Dr5, Dr6, Dr7,
}

impl Register {
    /// The 4-bit hardware register number.
    ///
    /// The low three bits go into ModR/M or SIB fields; the high bit is the
    /// extension carried by REX.R/X/B (or their VEX/EVEX counterparts).
    pub const fn code(self) -> u8 {
        (self as u8 - 1) % 16
    }

    /// The low three bits of the hardware number, as placed in ModR/M or SIB.
    pub const fn code3(self) -> u8 {
        self.code() & 0x7
    }

    /// Whether the register needs an extension bit (`r8`-`r15` and friends).
    pub const fn is_extended(self) -> bool {
        self.code() > 7
    }

    /// Width class.
    pub const fn class(self) -> RegisterClass {
        match self as u8 {
            1..=16 => RegisterClass::Byte,
            17..=32 => RegisterClass::Word,
            33..=48 => RegisterClass::Dword,
            49..=64 => RegisterClass::Qword,
            65..=80 => RegisterClass::Xmm,
            81..=96 => RegisterClass::Ymm,
            97..=112 => RegisterClass::Zmm,
            113..=120 => RegisterClass::Mask,
            121 => RegisterClass::Rip,
            122..=127 => RegisterClass::Segment,
            128 => RegisterClass::Flags,
            129..=144 => RegisterClass::Control,
            _ => RegisterClass::Debug,
        }
    }

    /// Register width in bits, when the class has one.
    pub const fn width(self) -> Option<u16> {
        self.class().width()
    }

    /// The uniform byte registers only encodable with a REX prefix present.
    pub const fn requires_rex(self) -> bool {
        matches!(self, Self::Spl | Self::Bpl | Self::Sil | Self::Dil)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn class_blocks_are_anchored() {
        assert_eq!(Register::Al as u8, 1);
        assert_eq!(Register::Ax as u8, 17);
        assert_eq!(Register::Eax as u8, 33);
        assert_eq!(Register::Rax as u8, 49);
        assert_eq!(Register::Xmm0 as u8, 65);
        assert_eq!(Register::Ymm0 as u8, 81);
        assert_eq!(Register::Zmm0 as u8, 97);
        assert_eq!(Register::K0 as u8, 113);
        assert_eq!(Register::Rip as u8, 121);
        assert_eq!(Register::RFlags as u8, 128);
        assert_eq!(Register::Cr0 as u8, 129);
        assert_eq!(Register::Dr7 as u8, 152);
    }

    #[test]
    fn hardware_codes_follow_position_in_class() {
        assert_eq!(Register::Rax.code(), 0);
        assert_eq!(Register::Rcx.code(), 1);
        assert_eq!(Register::Rsp.code(), 4);
        assert_eq!(Register::Rdi.code(), 7);
        assert_eq!(Register::R8.code(), 8);
        assert_eq!(Register::R15.code(), 15);
        assert_eq!(Register::R15.code3(), 7);
        assert_eq!(Register::Xmm9.code(), 9);

        // Codes agree across width classes.
        for (wide, narrow) in [
            (Register::Rax, Register::Al),
            (Register::Rbp, Register::Bpl),
            (Register::R12, Register::R12d),
            (Register::Rsi, Register::Si),
        ] {
            assert_eq!(wide.code(), narrow.code());
        }
    }

    #[test]
    fn widths_by_class() {
        assert_eq!(Register::Al.width(), Some(8));
        assert_eq!(Register::Ax.width(), Some(16));
        assert_eq!(Register::Eax.width(), Some(32));
        assert_eq!(Register::Rax.width(), Some(64));
        assert_eq!(Register::Xmm0.width(), Some(128));
        assert_eq!(Register::Ymm15.width(), Some(256));
        assert_eq!(Register::Zmm8.width(), Some(512));
        assert_eq!(Register::K3.width(), None);
        assert_eq!(Register::Rip.width(), None);
    }

    #[test]
    fn extended_registers() {
        assert!(!Register::Rax.is_extended());
        assert!(Register::R8.is_extended());
        assert!(Register::R8b.is_extended());
        assert!(Register::Xmm12.is_extended());
        assert!(!Register::Xmm7.is_extended());
    }

    #[test]
    fn display_uses_assembly_names() {
        assert_eq!(Register::Rax.to_string(), "rax");
        assert_eq!(Register::R10d.to_string(), "r10d");
        assert_eq!(Register::Xmm4.to_string(), "xmm4");
        assert_eq!(Register::RFlags.to_string(), "rflags");
        assert_eq!(Register::Cr8.to_string(), "cr8");
    }

    #[test]
    fn enumeration_is_dense() {
        let mut expected = 1u8;
        for reg in Register::iter() {
            assert_eq!(reg as u8, expected, "{reg} is out of place");
            expected += 1;
        }
    }
}
