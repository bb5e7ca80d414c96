//! WebAssembly module decoder.
//!
//! Validates the header, then walks the section list and hands each payload
//! to its section parser through a cursor that covers exactly the declared
//! payload length.

pub mod cursor;
pub mod sections;
mod types;

pub use cursor::Cursor;
pub use types::*;

use crate::error::CompileError;

/// Decode a WebAssembly binary into a [`Module`].
pub fn decode_module(bytes: &[u8]) -> Result<Module, CompileError> {
    let mut cursor = Cursor::new(bytes);

    let magic = cursor.read_u32()?;
    if magic != WASM_MAGIC {
        return Err(CompileError::invalid(
            0,
            format!("bad magic number {magic:#010x}"),
        ));
    }
    let version = cursor.read_u32()?;
    if version != WASM_VERSION {
        return Err(CompileError::invalid(
            4,
            format!("unsupported version {version}"),
        ));
    }

    let mut module = Module {
        magic,
        version,
        ..Default::default()
    };

    while cursor.has_remaining() {
        let id_offset = cursor.offset();
        let id_byte = cursor.read_u8()?;
        let size = cursor.read_var_u32()?;
        let id = SectionId::from_byte(id_byte).ok_or_else(|| {
            CompileError::invalid(id_offset, format!("unknown section id {id_byte}"))
        })?;

        let mut payload = cursor.sub_cursor(size as usize)?;
        let header = SectionHeader {
            id,
            offset: payload.offset(),
            size,
        };

        match id {
            SectionId::Type => module.types = sections::parse_type_section(&mut payload)?,
            SectionId::Function => {
                module.functions = sections::parse_function_section(&mut payload)?
            }
            SectionId::Export => module.exports = sections::parse_export_section(&mut payload)?,
            SectionId::Code => module.bodies = sections::parse_code_section(&mut payload)?,
            SectionId::Import => module.imports = sections::parse_import_section(&mut payload)?,
            // Custom, table, memory, global, start, element and data sections
            // carry nothing this compiler consumes.
            _ => payload.skip_rest(),
        }

        if payload.has_remaining() {
            return Err(CompileError::invalid(
                payload.offset(),
                format!(
                    "section size mismatch: {:?} section declared {size} bytes, {} left unread",
                    id,
                    payload.remaining()
                ),
            ));
        }
        module.sections.push(header);
    }

    if module.functions.len() != module.bodies.len() {
        return Err(CompileError::invalid(
            cursor.offset(),
            format!(
                "function section declares {} functions but code section has {} bodies",
                module.functions.len(),
                module.bodies.len()
            ),
        ));
    }

    Ok(module)
}
