//! # IR Builder
//!
//! Lowers the function bodies of a decoded [`Module`] into [`IrFunction`]s.
//!
//! ## Pipeline overview
//!
//! ```text
//! Module
//!   └── build_ir_functions()
//!         └── for each function (function index order):
//!               IrBuilder::translate_function()
//!                 └── for each opcode until `end`:
//!                       translate_opcode()
//!                         ├── i32.const / local.get  ─► push operand
//!                         ├── local.set / local.tee  ─► pin + LocalSet
//!                         └── i32.add                ─► Add
//!               ─► IrFunction
//! ```
//!
//! | Module        | Responsibility                                     |
//! |---------------|----------------------------------------------------|
//! | [`core`]      | `IrBuilder` state, operand stack, variable numbering |
//! | [`translate`] | opcode → IR dispatch                               |

pub mod core;
pub mod translate;

pub use self::core::{IrBuilder, OperandStack};

use super::types::IrFunction;
use crate::error::CompileError;
use crate::parser::Module;

/// Lower every locally defined function of `module`.
///
/// A type index outside the type section is reported here, when the
/// function that uses it is lowered.
pub fn build_ir_functions(
    module: &Module,
    stack_capacity: usize,
) -> Result<Vec<IrFunction>, CompileError> {
    let mut builder = IrBuilder::new(stack_capacity);
    let mut functions = Vec::with_capacity(module.functions.len());

    for (func_idx, (&type_idx, body)) in module.functions.iter().zip(&module.bodies).enumerate() {
        let ty = module.types.get(type_idx as usize).ok_or_else(|| {
            CompileError::invalid(
                body.code_offset,
                format!(
                    "function {func_idx} references type {type_idx}, but only {} are declared",
                    module.types.len()
                ),
            )
        })?;
        functions.push(builder.translate_function(func_idx as u32, type_idx, ty, body)?);
    }

    Ok(functions)
}
