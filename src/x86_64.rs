//! The x86-64 instruction encoder.
//!
//! An instruction is encoded as: optional legacy operand-size prefix (0x66),
//! optional REX / VEX / EVEX prefix, opcode bytes, optional ModR/M + SIB +
//! displacement, then immediates in little-endian tag width.
//!
//! The table ([`table`]) picks the form; everything width-dependent (REX.W,
//! the 0x66 prefix, the VEX/EVEX vector length) is derived from the actual
//! operands, which is what lets one table entry cover all GP widths.

pub(crate) mod table;

use crate::bytecode::ByteCode;
use crate::error::Error;
use crate::instruction::Instruction;
use crate::operand::Operand;
use crate::register::{Register, RegisterClass};

use table::{Entry, ModRmSpec, PrefixFamily};

/// Builds a ModR/M byte.
const fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
    ((mode & 0b11) << 6) | ((reg & 0b111) << 3) | (rm & 0b111)
}

/// Builds a SIB byte.
const fn sib(scale: u8, index: u8, base: u8) -> u8 {
    ((scale & 0b11) << 6) | ((index & 0b111) << 3) | (base & 0b111)
}

/// Whether this register drives a REX/VEX/EVEX extension bit.
fn ext_bit(register: Register) -> bool {
    let class = register.class();
    (class.is_gp() || class.is_vector()) && register.is_extended()
}

fn bit(flag: bool) -> u8 {
    flag as u8
}

/// Encodes one instruction into `out`.
///
/// Name operands (`Data`/`Symbol`) must have been rewritten to immediates
/// by the assembler driver before this point.
pub fn encode_instruction(instruction: &Instruction<'_>, out: &mut ByteCode) -> Result<(), Error> {
    let operands = instruction.operands();

    validate_operands(instruction)?;

    let Some(entry) = table::lookup(instruction.mnemonic(), operands) else {
        tracing::error!(target: "spasm", "cannot find encoding info for instruction: {instruction}");
        return Err(Error::EncodingUnknown {
            mnemonic: instruction.mnemonic().to_owned(),
            operands: instruction.operand_kinds(),
        });
    };

    tracing::trace!(target: "spasm", cpu = ?entry.cpu, "encoding `{instruction}`");

    // Legacy operand-size override for 16-bit GP operands.
    if operands
        .iter()
        .filter_map(Operand::register)
        .any(|r| r.class() == RegisterClass::Word)
    {
        out.push(0x66);
    }

    let prefix = PrefixBits::collect(entry, operands);
    match entry.prefix {
        PrefixFamily::None | PrefixFamily::Rex => prefix.emit_rex(operands, out),
        PrefixFamily::Vex2 | PrefixFamily::Vex3 => prefix.emit_vex(entry, operands, out),
        PrefixFamily::Evex => prefix.emit_evex(entry, operands, out)?,
    }

    // Opcode; `+r` folds the register number into the last byte. The GP
    // opcode pairs step down by one for 8-bit operands (89 -> 88 and so on).
    let byte_operands = operands
        .iter()
        .filter_map(Operand::register)
        .any(|r| r.class() == RegisterClass::Byte);
    let byte_form = byte_operands
        && matches!(entry.modrm, ModRmSpec::Slots { .. })
        && matches!(entry.prefix, PrefixFamily::None | PrefixFamily::Rex)
        && entry.opcode.len() == 1;

    let last = entry.opcode.len() - 1;
    for (i, &byte) in entry.opcode.iter().enumerate() {
        let byte = if byte_form && i == last { byte - 1 } else { byte };
        if entry.plus_reg && i == last {
            out.push(byte | register_at(instruction, 0)?.code3());
        } else {
            out.push(byte);
        }
    }

    match entry.modrm {
        ModRmSpec::None => {}
        ModRmSpec::Digit { digit, rm } => {
            emit_modrm_group(instruction, digit, rm, out)?;
        }
        ModRmSpec::Slots { reg, rm } => {
            let reg_field = register_at(instruction, reg)?.code3();
            emit_modrm_group(instruction, reg_field, rm, out)?;
        }
    }

    for operand in operands {
        match operand {
            Operand::Imm8(v) => out.push(*v as u8),
            Operand::Imm16(v) => out.extend_from_slice(&(*v as i16).to_le_bytes()),
            Operand::Imm32(v) => out.extend_from_slice(&(*v as i32).to_le_bytes()),
            Operand::Imm64(v) => out.extend_from_slice(&v.to_le_bytes()),
            _ => {}
        }
    }

    Ok(())
}

fn validate_operands(instruction: &Instruction<'_>) -> Result<(), Error> {
    for operand in instruction.operands() {
        match *operand {
            Operand::Memory {
                base,
                index,
                scale,
                ..
            } => {
                if !matches!(scale, 0 | 1 | 2 | 4 | 8) {
                    return Err(Error::InvalidOperand(format!(
                        "invalid scale {scale} in `{instruction}`"
                    )));
                }
                if let Some(base) = base {
                    if base.class() != RegisterClass::Qword && base.class() != RegisterClass::Rip {
                        return Err(Error::InvalidOperand(format!(
                            "memory base `{base}` is not a 64-bit register in `{instruction}`"
                        )));
                    }
                }
                if let Some(index) = index {
                    if index.class() != RegisterClass::Qword {
                        return Err(Error::InvalidOperand(format!(
                            "memory index `{index}` is not a 64-bit register in `{instruction}`"
                        )));
                    }
                    if base == Some(Register::Rip) {
                        return Err(Error::InvalidOperand(format!(
                            "rip-relative address cannot carry an index in `{instruction}`"
                        )));
                    }
                }
            }
            Operand::Data(name) | Operand::Symbol(name) => {
                return Err(Error::InvalidOperand(format!(
                    "unresolved name operand `{name}` reached the encoder in `{instruction}`"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn register_at(instruction: &Instruction<'_>, slot: usize) -> Result<Register, Error> {
    instruction
        .operands()
        .get(slot)
        .and_then(Operand::register)
        .ok_or_else(|| {
            Error::InvalidOperand(format!(
                "operand {slot} of `{instruction}` must be a register"
            ))
        })
}

/// The W/R/X/B extension bits shared by REX, VEX and EVEX.
struct PrefixBits {
    w: bool,
    r: bool,
    x: bool,
    b: bool,
}

impl PrefixBits {
    fn collect(entry: &Entry, operands: &[Operand<'_>]) -> Self {
        let mut bits = Self {
            w: false,
            r: false,
            x: false,
            b: false,
        };

        // 64-bit GP operands promote the operand size unless the
        // instruction already defaults to 64 bits.
        if !entry.default_w {
            bits.w = operands
                .iter()
                .filter_map(Operand::register)
                .any(|r| r.class() == RegisterClass::Qword);
        }

        match entry.modrm {
            ModRmSpec::Slots { reg, rm } => {
                if let Some(r) = operands.get(reg).and_then(Operand::register) {
                    bits.r = ext_bit(r);
                }
                bits.route_rm(operands.get(rm));
            }
            ModRmSpec::Digit { rm, .. } => bits.route_rm(operands.get(rm)),
            ModRmSpec::None => {
                if entry.plus_reg {
                    if let Some(r) = operands.first().and_then(Operand::register) {
                        bits.b = ext_bit(r);
                    }
                }
            }
        }

        bits
    }

    fn route_rm(&mut self, operand: Option<&Operand<'_>>) {
        match operand {
            Some(Operand::Register(r)) => self.b = ext_bit(*r),
            Some(Operand::Memory { base, index, .. }) => {
                if let Some(base) = base {
                    self.b = ext_bit(*base);
                }
                if let Some(index) = index {
                    self.x = ext_bit(*index);
                }
            }
            _ => {}
        }
    }

    /// Emits a REX byte when any bit is set or a uniform byte register
    /// demands the prefix; omitted otherwise.
    fn emit_rex(&self, operands: &[Operand<'_>], out: &mut ByteCode) {
        let forced = operands
            .iter()
            .filter_map(Operand::register)
            .any(Register::requires_rex);

        if self.w || self.r || self.x || self.b || forced {
            out.push(0x40 | bit(self.w) << 3 | bit(self.r) << 2 | bit(self.x) << 1 | bit(self.b));
        }
    }

    fn vvvv(entry: &Entry, operands: &[Operand<'_>]) -> u8 {
        entry
            .vvvv_slot
            .and_then(|slot| operands.get(slot))
            .and_then(Operand::register)
            .map(Register::code)
            .unwrap_or(0)
    }

    /// VEX vector length / EVEX L'L from the entry's first operand size.
    fn vector_len(entry: &Entry) -> u8 {
        match entry.sizes[0] {
            512 => 2,
            256 => 1,
            _ => 0,
        }
    }

    /// Emits a two-byte VEX prefix when possible, three-byte otherwise.
    /// All register-extension fields are stored inverted.
    fn emit_vex(&self, entry: &Entry, operands: &[Operand<'_>], out: &mut ByteCode) {
        let vvvv = Self::vvvv(entry, operands);
        let l = Self::vector_len(entry) & 0x1;

        let needs_vex3 = entry.prefix == PrefixFamily::Vex3
            || self.x
            || self.b
            || self.w
            || entry.mmmmm != 0x01;

        if needs_vex3 {
            out.push(0xC4);
            out.push(bit(!self.r) << 7 | bit(!self.x) << 6 | bit(!self.b) << 5 | (entry.mmmmm & 0x1F));
            out.push(bit(self.w) << 7 | ((!vvvv & 0xF) << 3) | l << 2 | (entry.pp & 0x3));
        } else {
            out.push(0xC5);
            out.push(bit(!self.r) << 7 | ((!vvvv & 0xF) << 3) | l << 2 | (entry.pp & 0x3));
        }
    }

    /// Emits the four-byte EVEX prefix.
    fn emit_evex(
        &self,
        entry: &Entry,
        operands: &[Operand<'_>],
        out: &mut ByteCode,
    ) -> Result<(), Error> {
        let vvvv = Self::vvvv(entry, operands);
        let ll = Self::vector_len(entry) & 0x3;

        let aaa = match entry.mask_slot {
            Some(slot) => {
                let mask = operands.get(slot).and_then(Operand::register);
                match mask {
                    Some(k) if k.class() == RegisterClass::Mask => k.code3(),
                    _ => {
                        return Err(Error::InvalidOperand(
                            "opmask operand must be one of k0-k7".to_owned(),
                        ))
                    }
                }
            }
            None => 0,
        };

        // R' and V' extend into registers 16-31, which the register set
        // does not reach; they stay clear (stored inverted).
        out.push(0x62);
        out.push(bit(!self.r) << 7 | bit(!self.x) << 6 | bit(!self.b) << 5 | 1 << 4 | (entry.mmmmm & 0x3));
        out.push(bit(self.w) << 7 | ((!vvvv & 0xF) << 3) | 1 << 2 | (entry.pp & 0x3));
        out.push(ll << 5 | 1 << 3 | (aaa & 0x7));
        Ok(())
    }
}

/// Displacement attached to a memory ModR/M encoding.
enum Disp {
    None,
    D8(i8),
    D32(i32),
}

fn emit_modrm_group(
    instruction: &Instruction<'_>,
    reg_field: u8,
    rm_slot: usize,
    out: &mut ByteCode,
) -> Result<(), Error> {
    let rm_operand = instruction.operands().get(rm_slot).copied().ok_or_else(|| {
        Error::InvalidOperand(format!(
            "operand {rm_slot} of `{instruction}` must be present"
        ))
    })?;

    match rm_operand {
        Operand::Register(r) => {
            out.push(modrm(0b11, reg_field, r.code3()));
            Ok(())
        }
        Operand::Memory {
            base,
            index,
            scale,
            disp,
        } => {
            emit_memory(reg_field, base, index, scale, disp, out);
            Ok(())
        }
        _ => Err(Error::InvalidOperand(format!(
            "operand {rm_slot} of `{instruction}` cannot be addressed through ModR/M"
        ))),
    }
}

fn emit_memory(
    reg_field: u8,
    base: Option<Register>,
    index: Option<Register>,
    scale: u8,
    disp: i32,
    out: &mut ByteCode,
) {
    let scale_bits = match scale {
        2 => 1,
        4 => 2,
        8 => 3,
        _ => 0,
    };
    let index_field = index.map(Register::code3).unwrap_or(0b100);

    if base == Some(Register::Rip) {
        // RIP-relative: mod=00, rm=101, disp32.
        out.push(modrm(0b00, reg_field, 0b101));
        out.extend_from_slice(&disp.to_le_bytes());
        return;
    }

    let Some(base) = base else {
        // Absolute [disp32]: SIB with no base. mod=00/rm=101 without a SIB
        // would be RIP-relative on x86-64.
        out.push(modrm(0b00, reg_field, 0b100));
        out.push(sib(scale_bits, index_field, 0b101));
        out.extend_from_slice(&disp.to_le_bytes());
        return;
    };

    // rsp/r12 as base always need a SIB byte; rbp/r13 cannot be encoded
    // without a displacement.
    let needs_sib = index.is_some() || scale > 1 || base.code3() == 0b100;

    let (mode, disp) = if disp == 0 && base.code3() != 0b101 {
        (0b00, Disp::None)
    } else if (-128..=127).contains(&disp) {
        (0b01, Disp::D8(disp as i8))
    } else {
        (0b10, Disp::D32(disp))
    };

    let rm = if needs_sib { 0b100 } else { base.code3() };
    out.push(modrm(mode, reg_field, rm));

    if needs_sib {
        out.push(sib(scale_bits, index_field, base.code3()));
    }

    match disp {
        Disp::None => {}
        Disp::D8(d) => out.push(d as u8),
        Disp::D32(d) => out.extend_from_slice(&d.to_le_bytes()),
    }
}
