//! Intermediate Representation (IR) between WebAssembly bytecode and machine code.
//!
//! The IR is a linear list of instructions per function, with the operand
//! stack resolved into explicit operands.

mod types;
pub use types::*;

pub mod builder;
pub use builder::{build_ir_functions, IrBuilder};
