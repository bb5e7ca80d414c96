//! Decoded module structures.
//!
//! Every structure owns its data; nothing borrows from the input buffer, so
//! the caller may drop the raw bytes once decoding returns.

use std::fmt;

/// `\0asm` read as a little-endian u32.
pub const WASM_MAGIC: u32 = 0x6d73_6100;

/// The only binary format version accepted.
pub const WASM_VERSION: u32 = 1;

/// Marker byte that starts every function type entry.
pub const FUNC_TYPE_MARKER: u8 = 0x60;

/// Primitive value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x7f => Some(ValueType::I32),
            0x7e => Some(ValueType::I64),
            0x7d => Some(ValueType::F32),
            0x7c => Some(ValueType::F64),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ValueType::I32 => 0x7f,
            ValueType::I64 => 0x7e,
            ValueType::F32 => 0x7d,
            ValueType::F64 => 0x7c,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::I32 => write!(f, "i32"),
            ValueType::I64 => write!(f, "i64"),
            ValueType::F32 => write!(f, "f32"),
            ValueType::F64 => write!(f, "f64"),
        }
    }
}

/// A function signature. Only single-result signatures are supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    pub params: Vec<ValueType>,
    pub result: ValueType,
}

/// Kind of an exported module member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
}

impl ExportKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ExportKind::Func),
            1 => Some(ExportKind::Table),
            2 => Some(ExportKind::Memory),
            3 => Some(ExportKind::Global),
            _ => None,
        }
    }
}

/// An export from the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub name: String,
    pub kind: ExportKind,
    /// Index into the index space selected by `kind`.
    pub index: u32,
}

/// Kind of an imported module member, with the part of its descriptor
/// that affects index spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Func { type_idx: u32 },
    Table,
    Memory,
    Global { mutable: bool },
}

/// An import entry. Imported members are never compiled; they only shift
/// the index space of their kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub module: String,
    pub field: String,
    pub kind: ImportKind,
}

/// Section identifiers. Values of 12 and above are invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SectionId {
    Custom = 0,
    Type = 1,
    Import = 2,
    Function = 3,
    Table = 4,
    Memory = 5,
    Global = 6,
    Export = 7,
    Start = 8,
    Element = 9,
    Code = 10,
    Data = 11,
}

impl SectionId {
    pub fn from_byte(byte: u8) -> Option<Self> {
        let id = match byte {
            0 => SectionId::Custom,
            1 => SectionId::Type,
            2 => SectionId::Import,
            3 => SectionId::Function,
            4 => SectionId::Table,
            5 => SectionId::Memory,
            6 => SectionId::Global,
            7 => SectionId::Export,
            8 => SectionId::Start,
            9 => SectionId::Element,
            10 => SectionId::Code,
            11 => SectionId::Data,
            _ => return None,
        };
        Some(id)
    }
}

/// Where a section sat in the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub id: SectionId,
    /// Absolute offset of the payload's first byte.
    pub offset: usize,
    pub size: u32,
}

/// A single entry of the code section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionBody {
    /// Declared locals after run-length expansion (parameters not included).
    pub locals: Vec<ValueType>,
    /// Raw instruction stream, terminated by `end`.
    pub code: Vec<u8>,
    /// Absolute offset of `code[0]` in the module.
    pub code_offset: usize,
}

/// A decoded module.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub magic: u32,
    pub version: u32,

    /// Sections in the order they appeared.
    pub sections: Vec<SectionHeader>,

    /// Type section: function signatures.
    pub types: Vec<FunctionType>,

    /// Function section: type index of each locally defined function.
    pub functions: Vec<u32>,

    /// Import section, in wire order.
    pub imports: Vec<ImportEntry>,

    pub exports: Vec<ExportEntry>,

    /// Code section, parallel to `functions`.
    pub bodies: Vec<FunctionBody>,
}

impl Module {
    /// Signature of the locally defined function `func_idx`.
    pub fn func_type(&self, func_idx: usize) -> Option<&FunctionType> {
        let type_idx = *self.functions.get(func_idx)?;
        self.types.get(type_idx as usize)
    }

    /// Number of entries in the import section.
    pub fn import_count(&self) -> usize {
        self.imports.len()
    }

    /// Number of imported functions. These occupy the first slots of the
    /// function index space, ahead of every locally defined function.
    pub fn num_imported_functions(&self) -> u32 {
        self.imports
            .iter()
            .filter(|i| matches!(i.kind, ImportKind::Func { .. }))
            .count() as u32
    }

    /// First function export pointing at `func_idx` (an index into the
    /// function index space, imports included).
    pub fn export_name(&self, func_idx: u32) -> Option<&str> {
        self.exports
            .iter()
            .find(|e| e.kind == ExportKind::Func && e.index == func_idx)
            .map(|e| e.name.as_str())
    }
}
