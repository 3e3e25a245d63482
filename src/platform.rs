//! Host platform and instruction-set detection.

/// Operating systems the assembler can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Platform {
    /// Microsoft Windows.
    Windows,
    /// Linux.
    Linux,
    /// Apple macOS.
    MacOS,
}

/// Instruction-set architectures the assembler knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Isa {
    /// 64-bit x86.
    #[strum(serialize = "x86_64")]
    X86_64,
    /// 64-bit Arm.
    #[strum(serialize = "aarch64")]
    Aarch64,
}

/// The operating system this process is running on, when supported.
pub fn current_platform() -> Option<Platform> {
    if cfg!(target_os = "windows") {
        Some(Platform::Windows)
    } else if cfg!(target_os = "linux") {
        Some(Platform::Linux)
    } else if cfg!(target_os = "macos") {
        Some(Platform::MacOS)
    } else {
        None
    }
}

/// The instruction set this process is running on, when supported.
pub fn current_isa() -> Option<Isa> {
    if cfg!(target_arch = "x86_64") {
        Some(Isa::X86_64)
    } else if cfg!(target_arch = "aarch64") {
        Some(Isa::Aarch64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert_eq!(Platform::Windows.to_string(), "windows");
        assert_eq!(Isa::X86_64.to_string(), "x86_64");
        assert_eq!(Isa::Aarch64.to_string(), "aarch64");
    }

    #[test]
    fn host_is_recognized() {
        // The library only builds on the platforms it targets, so detection
        // is expected to succeed wherever the tests run.
        if cfg!(any(
            target_os = "windows",
            target_os = "linux",
            target_os = "macos"
        )) {
            assert!(current_platform().is_some());
        }
    }
}
