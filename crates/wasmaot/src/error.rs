//! Error taxonomy shared by every pipeline stage.
//!
//! Each stage surfaces the first failure to its caller. Offsets are absolute
//! positions in the input module; function indices are positions in the
//! function index table.

use thiserror::Error;

/// A fatal decode, lowering or code generation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A read would run past the end of the buffer (or of the current section/body).
    #[error("unexpected end of input at offset {offset:#x}: {needed} more byte(s) needed")]
    OutOfBounds { offset: usize, needed: usize },

    /// The module is malformed: bad header, unknown section id, bad type entry, ...
    #[error("invalid module at offset {offset:#x}: {reason}")]
    InvalidModule { offset: usize, reason: String },

    /// An opcode popped from an empty operand stack.
    #[error("operand stack underflow in function {func} at offset {offset:#x}")]
    StackUnderflow { func: u32, offset: usize },

    /// An opcode pushed past the configured operand stack capacity.
    #[error("operand stack overflow in function {func} at offset {offset:#x}, capacity {capacity}")]
    StackOverflow {
        func: u32,
        offset: usize,
        capacity: usize,
    },

    /// The instruction stream contains an opcode outside the supported subset.
    #[error("unsupported opcode 0x{opcode:02x} in function {func} at offset {offset:#x}")]
    UnsupportedOpcode { func: u32, offset: usize, opcode: u8 },

    /// Register allocation or emission could not proceed.
    #[error("code generation failed for function {func}: {reason}")]
    Codegen { func: u32, reason: String },
}

impl CompileError {
    pub(crate) fn invalid(offset: usize, reason: impl Into<String>) -> Self {
        CompileError::InvalidModule {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn codegen(func: u32, reason: impl Into<String>) -> Self {
        CompileError::Codegen {
            func,
            reason: reason.into(),
        }
    }
}
