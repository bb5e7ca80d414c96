//! Opcode translation - converts the supported WebAssembly opcodes to IR.

use super::super::types::*;
use super::core::{Flow, IrBuilder};
use crate::error::CompileError;
use crate::parser::Cursor;

/// Opcodes of the supported subset.
pub mod opcode {
    pub const UNREACHABLE: u8 = 0x00;
    pub const NOP: u8 = 0x01;
    pub const END: u8 = 0x0b;
    pub const LOCAL_GET: u8 = 0x20;
    pub const LOCAL_SET: u8 = 0x21;
    pub const LOCAL_TEE: u8 = 0x22;
    pub const I32_CONST: u8 = 0x41;
    pub const I32_ADD: u8 = 0x6a;
}

impl IrBuilder {
    /// Translate one opcode (whose byte sat at `offset`), reading its immediates from `cursor`.
    pub(super) fn translate_opcode(
        &mut self,
        op: u8,
        offset: usize,
        cursor: &mut Cursor,
    ) -> Result<Flow, CompileError> {
        match op {
            opcode::END => return Ok(Flow::End),

            opcode::NOP => {}

            opcode::UNREACHABLE => {
                // Anything after this point until `end` is dead; it is still
                // decoded but not lowered.
                self.unreachable = true;
                self.stack.clear();
            }

            opcode::I32_CONST => {
                let value = cursor.read_var_i32()?;
                if !self.unreachable {
                    self.push(IrValue::Imm(value), offset)?;
                }
            }

            opcode::LOCAL_GET => {
                let local = self.local(cursor.read_var_u32()?, offset)?;
                if !self.unreachable {
                    self.push(IrValue::Local(local), offset)?;
                }
            }

            opcode::LOCAL_SET => {
                let local = self.local(cursor.read_var_u32()?, offset)?;
                if !self.unreachable {
                    let value = self.pop(offset)?;
                    self.pin_local(local);
                    self.emit(IrInstr::LocalSet { local, value });
                }
            }

            opcode::LOCAL_TEE => {
                // set, then read the value back through the local
                let local = self.local(cursor.read_var_u32()?, offset)?;
                if !self.unreachable {
                    let value = self.pop(offset)?;
                    self.pin_local(local);
                    self.emit(IrInstr::LocalSet { local, value });
                    self.push(IrValue::Local(local), offset)?;
                }
            }

            opcode::I32_ADD => {
                if !self.unreachable {
                    let rhs = self.pop(offset)?;
                    let lhs = self.pop(offset)?;
                    let dest = self.new_var();
                    self.emit(IrInstr::Add { dest, lhs, rhs });
                    self.push(IrValue::Var(dest), offset)?;
                }
            }

            _ => {
                return Err(CompileError::UnsupportedOpcode {
                    func: self.func_idx,
                    offset,
                    opcode: op,
                })
            }
        }
        Ok(Flow::Continue)
    }
}
