//! Core IR builder state.
//!
//! This module contains the `IrBuilder` state machine that lowers a function
//! body to IR by simulating the WebAssembly operand stack.

use super::super::types::*;
use crate::error::CompileError;
use crate::parser::{Cursor, FunctionBody, FunctionType};

/// Simulated operand stack with a fixed capacity.
#[derive(Debug, Clone)]
pub struct OperandStack {
    pub(super) values: Vec<IrValue>,
    capacity: usize,
}

impl OperandStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Push a value. Hands the value back when the stack is full.
    pub fn push(&mut self, value: IrValue) -> Result<(), IrValue> {
        if self.values.len() >= self.capacity {
            return Err(value);
        }
        self.values.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<IrValue> {
        self.values.pop()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Outcome of lowering one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    Continue,
    End,
}

/// IR builder state, reused across the functions of one compilation.
///
/// Lowering checks stack depth and local indices only. Operand types are not
/// validated: an `i64` or `f64` local fed to `i32.add` is lowered as is.
pub struct IrBuilder {
    /// Function being lowered (for error reporting).
    pub(super) func_idx: u32,

    /// Simulated operand stack.
    pub(super) stack: OperandStack,

    /// Instructions emitted so far.
    pub(super) instructions: Vec<IrInstr>,

    /// Next virtual register to allocate.
    pub(super) next_var_id: u32,

    /// Parameters plus declared locals.
    pub(super) num_locals: u32,

    /// Set once `unreachable` ends the live part of the body.
    pub(super) unreachable: bool,
}

impl IrBuilder {
    pub fn new(stack_capacity: usize) -> Self {
        Self {
            func_idx: 0,
            stack: OperandStack::new(stack_capacity),
            instructions: Vec::new(),
            next_var_id: 0,
            num_locals: 0,
            unreachable: false,
        }
    }

    /// Allocate a new virtual register.
    pub(super) fn new_var(&mut self) -> VarId {
        let id = VarId(self.next_var_id);
        self.next_var_id += 1;
        id
    }

    pub(super) fn emit(&mut self, instr: IrInstr) {
        self.instructions.push(instr);
    }

    pub(super) fn push(&mut self, value: IrValue, offset: usize) -> Result<(), CompileError> {
        self.stack
            .push(value)
            .map_err(|_| CompileError::StackOverflow {
                func: self.func_idx,
                offset,
                capacity: self.stack.capacity(),
            })
    }

    pub(super) fn pop(&mut self, offset: usize) -> Result<IrValue, CompileError> {
        self.stack.pop().ok_or(CompileError::StackUnderflow {
            func: self.func_idx,
            offset,
        })
    }

    /// Validate a local index from the instruction stream.
    pub(super) fn local(&self, index: u32, offset: usize) -> Result<LocalIdx, CompileError> {
        if index >= self.num_locals {
            return Err(CompileError::invalid(
                offset,
                format!(
                    "local index {index} out of range in function {} ({} locals)",
                    self.func_idx, self.num_locals
                ),
            ));
        }
        Ok(LocalIdx(index))
    }

    /// Snapshot every stacked reference to `local` before the slot is overwritten,
    /// so the stack keeps the value that was read.
    pub(super) fn pin_local(&mut self, local: LocalIdx) {
        for i in 0..self.stack.values.len() {
            if self.stack.values[i] == IrValue::Local(local) {
                let dest = self.new_var();
                self.emit(IrInstr::LocalGet { dest, local });
                self.stack.values[i] = IrValue::Var(dest);
            }
        }
    }

    /// Lower one function body to IR.
    pub fn translate_function(
        &mut self,
        func_idx: u32,
        type_idx: u32,
        ty: &FunctionType,
        body: &FunctionBody,
    ) -> Result<IrFunction, CompileError> {
        // Reset per-function state so each function starts fresh
        self.func_idx = func_idx;
        self.stack.clear();
        self.instructions.clear();
        self.next_var_id = 0;
        self.unreachable = false;
        self.num_locals = u32::try_from(ty.params.len() + body.locals.len()).map_err(|_| {
            CompileError::invalid(body.code_offset, "too many locals")
        })?;

        let mut cursor = Cursor::with_base(&body.code, body.code_offset);
        loop {
            let offset = cursor.offset();
            let opcode = cursor.read_u8()?;
            if self.translate_opcode(opcode, offset, &mut cursor)? == Flow::End {
                break;
            }
        }

        if cursor.has_remaining() {
            return Err(CompileError::invalid(
                cursor.offset(),
                format!(
                    "{} trailing byte(s) after end of function {func_idx}",
                    cursor.remaining()
                ),
            ));
        }

        let terminator = if self.unreachable {
            IrTerminator::Unreachable
        } else {
            let value = self.stack.pop();
            if !self.stack.is_empty() {
                return Err(CompileError::invalid(
                    cursor.offset(),
                    format!(
                        "{} value(s) left on the operand stack at end of function {func_idx}",
                        self.stack.len()
                    ),
                ));
            }
            IrTerminator::Return { value }
        };

        Ok(IrFunction {
            func_idx,
            type_idx,
            params: ty.params.clone(),
            locals: body.locals.clone(),
            result: ty.result,
            instructions: std::mem::take(&mut self.instructions),
            terminator,
            var_count: self.next_var_id,
        })
    }
}
