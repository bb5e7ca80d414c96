//! Per-section payload parsers.
//!
//! Each parser receives a cursor scoped to exactly one section payload. The
//! caller checks that the payload was fully consumed.

use super::cursor::Cursor;
use super::types::*;
use crate::error::CompileError;

/// Upper bound on expanded locals per function body.
pub const MAX_FUNCTION_LOCALS: usize = 50_000;

const V128: u8 = 0x7b;
const REF_FUNC: u8 = 0x70;
const REF_EXTERN: u8 = 0x6f;

fn read_value_type(cursor: &mut Cursor) -> Result<ValueType, CompileError> {
    let offset = cursor.offset();
    let byte = cursor.read_u8()?;
    ValueType::from_byte(byte)
        .ok_or_else(|| CompileError::invalid(offset, format!("invalid value type 0x{byte:02x}")))
}

/// Read a vector count. The count is capped by the bytes left so that a
/// corrupt count cannot trigger a huge allocation.
fn read_count(cursor: &mut Cursor) -> Result<(u32, usize), CompileError> {
    let count = cursor.read_var_u32()?;
    Ok((count, (count as usize).min(cursor.remaining())))
}

pub fn parse_type_section(cursor: &mut Cursor) -> Result<Vec<FunctionType>, CompileError> {
    let (count, capacity) = read_count(cursor)?;
    let mut types = Vec::with_capacity(capacity);
    for _ in 0..count {
        types.push(parse_function_type(cursor)?);
    }
    Ok(types)
}

fn parse_function_type(cursor: &mut Cursor) -> Result<FunctionType, CompileError> {
    let offset = cursor.offset();
    let marker = cursor.read_u8()?;
    if marker != FUNC_TYPE_MARKER {
        return Err(CompileError::invalid(
            offset,
            format!("expected function type marker 0x60, found 0x{marker:02x}"),
        ));
    }

    let (param_count, capacity) = read_count(cursor)?;
    let mut params = Vec::with_capacity(capacity);
    for _ in 0..param_count {
        params.push(read_value_type(cursor)?);
    }

    let result_offset = cursor.offset();
    let result_count = cursor.read_var_u32()?;
    if result_count != 1 {
        return Err(CompileError::invalid(
            result_offset,
            format!("function types must have exactly one result, found {result_count}"),
        ));
    }
    let result = read_value_type(cursor)?;

    Ok(FunctionType { params, result })
}

pub fn parse_function_section(cursor: &mut Cursor) -> Result<Vec<u32>, CompileError> {
    let (count, capacity) = read_count(cursor)?;
    let mut indices = Vec::with_capacity(capacity);
    for _ in 0..count {
        indices.push(cursor.read_var_u32()?);
    }
    Ok(indices)
}

/// Length-prefixed UTF-8 name.
fn read_name(cursor: &mut Cursor, what: &str) -> Result<String, CompileError> {
    let offset = cursor.offset();
    let bytes = cursor.read_length_prefixed()?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CompileError::invalid(offset, format!("{what} is not valid UTF-8")))
}

pub fn parse_export_section(cursor: &mut Cursor) -> Result<Vec<ExportEntry>, CompileError> {
    let (count, capacity) = read_count(cursor)?;
    let mut exports = Vec::with_capacity(capacity);
    for _ in 0..count {
        let name = read_name(cursor, "export name")?;

        let kind_offset = cursor.offset();
        let kind_byte = cursor.read_u8()?;
        let kind = ExportKind::from_byte(kind_byte).ok_or_else(|| {
            CompileError::invalid(kind_offset, format!("invalid export kind 0x{kind_byte:02x}"))
        })?;

        let index = cursor.read_var_u32()?;
        exports.push(ExportEntry { name, kind, index });
    }
    Ok(exports)
}

pub fn parse_import_section(cursor: &mut Cursor) -> Result<Vec<ImportEntry>, CompileError> {
    let (count, capacity) = read_count(cursor)?;
    let mut imports = Vec::with_capacity(capacity);
    for _ in 0..count {
        let module = read_name(cursor, "import module name")?;
        let field = read_name(cursor, "import field name")?;
        let kind = parse_import_kind(cursor)?;
        imports.push(ImportEntry {
            module,
            field,
            kind,
        });
    }
    Ok(imports)
}

/// Kind byte followed by its descriptor. Only what shapes the index spaces
/// is kept; the rest is validated and dropped.
fn parse_import_kind(cursor: &mut Cursor) -> Result<ImportKind, CompileError> {
    let offset = cursor.offset();
    match cursor.read_u8()? {
        0x00 => Ok(ImportKind::Func {
            type_idx: cursor.read_var_u32()?,
        }),
        0x01 => {
            let ref_offset = cursor.offset();
            let ref_type = cursor.read_u8()?;
            if ref_type != REF_FUNC && ref_type != REF_EXTERN {
                return Err(CompileError::invalid(
                    ref_offset,
                    format!("invalid table element type 0x{ref_type:02x}"),
                ));
            }
            skip_limits(cursor)?;
            Ok(ImportKind::Table)
        }
        0x02 => {
            skip_limits(cursor)?;
            Ok(ImportKind::Memory)
        }
        0x03 => {
            let ty_offset = cursor.offset();
            let ty = cursor.read_u8()?;
            if ValueType::from_byte(ty).is_none() && ![V128, REF_FUNC, REF_EXTERN].contains(&ty) {
                return Err(CompileError::invalid(
                    ty_offset,
                    format!("invalid global type 0x{ty:02x}"),
                ));
            }
            let mut_offset = cursor.offset();
            let mutable = match cursor.read_u8()? {
                0 => false,
                1 => true,
                other => {
                    return Err(CompileError::invalid(
                        mut_offset,
                        format!("invalid global mutability 0x{other:02x}"),
                    ))
                }
            };
            Ok(ImportKind::Global { mutable })
        }
        other => Err(CompileError::invalid(
            offset,
            format!("invalid import kind 0x{other:02x}"),
        )),
    }
}

/// Table/memory limits: a flags byte (bit 0 max present, bit 1 shared,
/// bit 2 64-bit bounds), the minimum, then the optional maximum.
fn skip_limits(cursor: &mut Cursor) -> Result<(), CompileError> {
    let offset = cursor.offset();
    let flags = cursor.read_u8()?;
    if flags > 0x07 {
        return Err(CompileError::invalid(
            offset,
            format!("invalid limits flags 0x{flags:02x}"),
        ));
    }
    let bounds = if flags & 0x01 != 0 { 2 } else { 1 };
    for _ in 0..bounds {
        if flags & 0x04 != 0 {
            cursor.read_var_u64()?;
        } else {
            cursor.read_var_u32()?;
        }
    }
    Ok(())
}

pub fn parse_code_section(cursor: &mut Cursor) -> Result<Vec<FunctionBody>, CompileError> {
    let (count, capacity) = read_count(cursor)?;
    let mut bodies = Vec::with_capacity(capacity);
    for _ in 0..count {
        let size = cursor.read_var_u32()?;
        let mut body = cursor.sub_cursor(size as usize)?;
        bodies.push(parse_function_body(&mut body)?);
    }
    Ok(bodies)
}

/// Parse one body: run-length encoded locals, then the raw instruction bytes.
pub fn parse_function_body(body: &mut Cursor) -> Result<FunctionBody, CompileError> {
    let locals = parse_local_decls(body)?;
    let code_offset = body.offset();
    let code = body.rest().to_vec();
    body.skip_rest();
    Ok(FunctionBody {
        locals,
        code,
        code_offset,
    })
}

/// Expand `(run length, type)` pairs into a flat list, preserving wire order.
pub fn parse_local_decls(cursor: &mut Cursor) -> Result<Vec<ValueType>, CompileError> {
    let run_count = cursor.read_var_u32()?;
    let mut locals = Vec::new();
    for _ in 0..run_count {
        let run_offset = cursor.offset();
        let run_length = cursor.read_var_u32()? as usize;
        let ty = read_value_type(cursor)?;
        if locals.len() + run_length > MAX_FUNCTION_LOCALS {
            return Err(CompileError::invalid(
                run_offset,
                format!("too many locals (limit {MAX_FUNCTION_LOCALS})"),
            ));
        }
        locals.extend(std::iter::repeat(ty).take(run_length));
    }
    Ok(locals)
}
