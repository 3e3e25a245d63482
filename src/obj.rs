//! Relocatable object-file output.
//!
//! Only the COFF writer is implemented; ELF and Mach-O are recognized so
//! the format/extension mapping is total, but writing them fails with
//! [`Error::UnsupportedAbi`].

pub mod coff;

use std::fs;
use std::path::Path;

use crate::abi::Abi;
use crate::bytecode::ByteCode;
use crate::data::Data;
use crate::error::Error;

/// Object-file container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjFormat {
    /// PE/COFF, Windows.
    Coff,
    /// ELF, Linux.
    Elf,
    /// Mach-O, macOS.
    MachO,
}

impl ObjFormat {
    /// The object format conventionally used by an ABI.
    pub const fn from_abi(abi: Abi) -> Self {
        match abi {
            Abi::WindowsX64 => Self::Coff,
            Abi::LinuxX64 => Self::Elf,
            Abi::MacOSX64 | Abi::MacOSAarch64 => Self::MachO,
        }
    }

    /// The file extension objects of this format carry.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Coff => ".obj",
            Self::Elf | Self::MachO => ".o",
        }
    }
}

/// Writes the assembled session to a relocatable object file.
///
/// A failure leaves the bytecode and data tables intact; the caller can
/// retry with another path or ABI.
pub fn write_file<P: AsRef<Path>>(
    path: P,
    bytecode: &ByteCode,
    data: &Data<'_>,
    abi: Abi,
) -> Result<(), Error> {
    let image = match ObjFormat::from_abi(abi) {
        ObjFormat::Coff => coff::generate(bytecode, data, coff::MachineType::Amd64)?,
        format @ (ObjFormat::Elf | ObjFormat::MachO) => {
            tracing::error!(target: "spasm", "no {format:?} writer for ABI {abi}");
            return Err(Error::UnsupportedAbi(abi));
        }
    };

    fs::write(path.as_ref(), &image).map_err(|source| {
        tracing::error!(target: "spasm", "cannot write to file: {}", path.as_ref().display());
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    })
}
