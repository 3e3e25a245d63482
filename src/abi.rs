//! Calling-convention (ABI) descriptions.
//!
//! Each ABI exposes the register set a code generator may use: how many
//! general-purpose and floating-point registers are available, which
//! registers return values, and the ordered argument-register sequences.
//! An external register allocator is expected to consume these tables; the
//! assembler itself never allocates registers.

use core::fmt;

use crate::platform::{self, Isa, Platform};
use crate::register::Register;

/// Windows x64 GP argument registers.
const WINDOWS_X64_GP_ARGS: &[Register] = &[Register::Rcx, Register::Rdx, Register::R8, Register::R9];

/// Windows x64 FP argument registers.
const WINDOWS_X64_FP_ARGS: &[Register] = &[
    Register::Xmm0,
    Register::Xmm1,
    Register::Xmm2,
    Register::Xmm3,
    Register::Xmm4,
    Register::Xmm5,
];

/// System V GP argument registers, in declaration order.
const SYSV_X64_GP_ARGS: &[Register] = &[
    Register::Rdi,
    Register::Rsi,
    Register::Rdx,
    Register::Rcx,
    Register::R8,
    Register::R9,
];

/// System V FP argument registers.
const SYSV_X64_FP_ARGS: &[Register] = &[
    Register::Xmm0,
    Register::Xmm1,
    Register::Xmm2,
    Register::Xmm3,
    Register::Xmm4,
    Register::Xmm5,
    Register::Xmm6,
    Register::Xmm7,
];

/// A supported platform + architecture ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Abi {
    /// Windows x64 calling convention.
    WindowsX64,
    /// System V AMD64, Linux.
    LinuxX64,
    /// System V AMD64, macOS.
    MacOSX64,
    /// AAPCS64, Apple silicon. Recognized but not yet encodable.
    MacOSAarch64,
}

impl Abi {
    /// The ABI of the running process, when the host is supported.
    pub fn current() -> Option<Self> {
        match (platform::current_isa()?, platform::current_platform()?) {
            (Isa::X86_64, Platform::Windows) => Some(Self::WindowsX64),
            (Isa::X86_64, Platform::Linux) => Some(Self::LinuxX64),
            (Isa::X86_64, Platform::MacOS) => Some(Self::MacOSX64),
            (Isa::Aarch64, Platform::MacOS) => Some(Self::MacOSAarch64),
            _ => None,
        }
    }

    /// How many GP registers a register allocator may hand out for calls.
    pub const fn max_gp_registers(self) -> usize {
        self.gp_argument_registers().len()
    }

    /// How many FP registers a register allocator may hand out for calls.
    pub const fn max_fp_registers(self) -> usize {
        self.fp_argument_registers().len()
    }

    /// The register holding a call's GP return value.
    pub const fn return_gp_register(self) -> Option<Register> {
        match self {
            Self::WindowsX64 | Self::LinuxX64 | Self::MacOSX64 => Some(Register::Rax),
            Self::MacOSAarch64 => None,
        }
    }

    /// The register holding a call's FP return value.
    pub const fn return_fp_register(self) -> Option<Register> {
        match self {
            Self::WindowsX64 | Self::LinuxX64 | Self::MacOSX64 => Some(Register::Xmm0),
            Self::MacOSAarch64 => None,
        }
    }

    /// GP argument registers in the order arguments are assigned.
    pub const fn gp_argument_registers(self) -> &'static [Register] {
        match self {
            Self::WindowsX64 => WINDOWS_X64_GP_ARGS,
            Self::LinuxX64 | Self::MacOSX64 => SYSV_X64_GP_ARGS,
            Self::MacOSAarch64 => &[],
        }
    }

    /// FP argument registers in the order arguments are assigned.
    pub const fn fp_argument_registers(self) -> &'static [Register] {
        match self {
            Self::WindowsX64 => WINDOWS_X64_FP_ARGS,
            Self::LinuxX64 | Self::MacOSX64 => SYSV_X64_FP_ARGS,
            Self::MacOSAarch64 => &[],
        }
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WindowsX64 => "windows-x64",
            Self::LinuxX64 => "linux-x64",
            Self::MacOSX64 => "macos-x64",
            Self::MacOSAarch64 => "macos-aarch64",
        };
        f.write_str(name)
    }
}
