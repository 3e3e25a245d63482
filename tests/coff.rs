//! Structural checks on emitted COFF objects.

use spasm::{Abi, ByteCode, Data, Instructions, Operand, Register};

fn u16_at(image: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([image[at], image[at + 1]])
}

fn u32_at(image: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([image[at], image[at + 1], image[at + 2], image[at + 3]])
}

/// The Windows minimal-exit scenario: `sub rsp, 40; mov rcx, 0xAAAA;
/// call ExitProcess`, statically assembled.
fn windows_exit_session() -> (ByteCode, Data<'static>) {
    let assemble = spasm::get_assembler(Abi::WindowsX64).unwrap();

    let mut instructions = Instructions::new();
    instructions.push_back(
        "sub",
        &[Operand::Register(Register::Rsp), Operand::Imm32(40)],
    );
    instructions.push_back(
        "mov",
        &[Operand::Register(Register::Rcx), Operand::Imm32(0xAAAA)],
    );
    instructions.push_back("call", &[Operand::Symbol("ExitProcess")]);

    let mut bytecode = ByteCode::new();
    let mut data = Data::new();
    assemble(&instructions, &mut bytecode, &mut data).unwrap();
    (bytecode, data)
}

#[test]
fn windows_exit_records_the_exit_process_relocation() {
    let (bytecode, data) = windows_exit_session();

    let (name, symbol) = data.externs().next().unwrap();
    assert_eq!(name, "ExitProcess");
    assert_eq!(symbol.refs().len(), 1);
    assert_eq!(symbol.refs()[0].offset, bytecode.len() - 4);
    assert_eq!(symbol.refs()[0].kind, spasm::RelocKind::Rel32);

    // No explicit export, so `main` was synthesized at offset 0.
    assert_eq!(data.exports().next().unwrap().0, "main");
}

#[test]
fn object_file_passes_the_header_invariants() {
    let (bytecode, data) = windows_exit_session();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exit.obj");
    spasm::obj_write_file(&path, &bytecode, &data, Abi::WindowsX64).unwrap();

    let image = std::fs::read(&path).unwrap();

    // File header.
    assert_eq!(u16_at(&image, 0), 0x8664); // machine
    assert_eq!(u16_at(&image, 2), 1); // number of sections
    let num_symbols = u32_at(&image, 12) as usize;
    assert_eq!(num_symbols, 2 + data.num_exports() + data.num_externs());

    // Section header.
    assert_eq!(&image[20..26], b".text\0");
    assert_eq!(u32_at(&image, 36) as usize, bytecode.len());
    let num_relocations = u16_at(&image, 52) as usize;
    assert_eq!(num_relocations, data.num_relocations());

    // Every relocation points at a real symbol behind the preamble.
    let reloc_offset = u32_at(&image, 44) as usize;
    for i in 0..num_relocations {
        let at = reloc_offset + i * 10;
        let symbol_index = u32_at(&image, at + 4) as usize;
        assert!((2..num_symbols).contains(&symbol_index));
    }
}

#[test]
fn symbol_indices_match_object_file_positions() {
    let (bytecode, data) = windows_exit_session();
    let image = spasm::obj::coff::generate(&bytecode, &data, spasm::obj::coff::MachineType::Amd64)
        .unwrap();

    let symtab = u32_at(&image, 8) as usize;
    for symbol in data.object_symbols() {
        let at = symtab + (2 + symbol.index as usize) * 18;
        if symbol.name.len() < 8 {
            let mut expected = [0u8; 8];
            expected[..symbol.name.len()].copy_from_slice(symbol.name.as_bytes());
            assert_eq!(&image[at..at + 8], &expected);
        } else {
            // Long name: zero marker then string-table offset.
            assert_eq!(u32_at(&image, at), 0);
            let strtab = symtab + (2 + data.object_symbols().len()) * 18;
            let name_at = strtab + u32_at(&image, at + 4) as usize;
            let name = symbol.name.as_bytes();
            assert_eq!(&image[name_at..name_at + name.len()], name);
            assert_eq!(image[name_at + name.len()], 0);
        }
    }
}

#[test]
fn io_failure_is_terminal_but_preserves_the_session() {
    let (bytecode, data) = windows_exit_session();
    let before = bytecode.clone();

    let err = spasm::obj_write_file(
        "/nonexistent-dir/out.obj",
        &bytecode,
        &data,
        Abi::WindowsX64,
    )
    .unwrap_err();

    assert!(matches!(err, spasm::Error::Io { .. }));
    assert_eq!(bytecode, before);
    assert_eq!(data.num_externs(), 1);
}
