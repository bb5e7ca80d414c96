//! Machine code generation from IR.
//!
//! Walks each [`IrFunction`] in the order it was lowered, assigns physical
//! registers through a [`RegisterAllocator`] and appends the resulting
//! instructions to a per-module [`CodeBuffer`].
//!
//! ## Register discipline
//!
//! ```text
//! entry        params bound to the first registers (l0 → r0, l1 → r1, ...)
//! Imm(v)       fresh reg ← mov reg, v
//! Local(l)     fresh reg ← mov reg, <reg of l>      (zero if l never set)
//! Var(v)       the register defined for v, consumed once
//! Add          add lhs_reg, rhs_reg; rhs_reg freed; lhs_reg defines dest
//! LocalSet     local rebound to the value's register; old register freed
//! Return       ret <reg of value>
//! ```
//!
//! Every operand of `add` lives in a register of its own, so the clobbered
//! destination never aliases a local or another live value.

pub mod instruction;
pub mod listing;
pub mod regalloc;

pub use instruction::{MachineInstr, PhysReg};
pub use regalloc::{FreeListAllocator, MonotonicAllocator, RegisterAllocator, RegisterFile};

use crate::error::CompileError;
use crate::ir::*;
use std::collections::HashMap;
use std::ops::Range;

/// Location of one function inside the [`CodeBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCode {
    pub func_idx: u32,
    pub range: Range<usize>,
    /// Distinct physical registers the function touched.
    pub registers_used: u16,
}

/// Machine code for a whole module, function after function.
#[derive(Debug, Clone, Default)]
pub struct CodeBuffer {
    instructions: Vec<MachineInstr>,
    functions: Vec<FunctionCode>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_function(&mut self, func_idx: u32, code: Vec<MachineInstr>, registers_used: u16) {
        let start = self.instructions.len();
        self.instructions.extend(code);
        self.functions.push(FunctionCode {
            func_idx,
            range: start..self.instructions.len(),
            registers_used,
        });
    }

    /// Instructions of the function with index `func_idx`.
    pub fn function(&self, func_idx: u32) -> Option<&[MachineInstr]> {
        self.functions
            .iter()
            .find(|f| f.func_idx == func_idx)
            .map(|f| &self.instructions[f.range.clone()])
    }

    pub fn functions(&self) -> &[FunctionCode] {
        &self.functions
    }

    pub fn instructions(&self) -> &[MachineInstr] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Code generator, parameterised by its allocation strategy.
pub struct CodeGenerator<A: RegisterAllocator> {
    allocator: A,
}

impl<A: RegisterAllocator> CodeGenerator<A> {
    pub fn new(allocator: A) -> Self {
        Self { allocator }
    }

    /// Generate code for every function. The first failing function aborts
    /// the whole module.
    pub fn generate_module(
        &mut self,
        functions: &[IrFunction],
    ) -> Result<CodeBuffer, CompileError> {
        let mut buffer = CodeBuffer::new();
        for func in functions {
            let code = self.generate_function(func)?;
            buffer.push_function(func.func_idx, code, self.allocator.registers_used());
        }
        Ok(buffer)
    }

    /// Generate code for one function. Nothing is returned on failure, so a
    /// partially emitted function never reaches the buffer.
    pub fn generate_function(
        &mut self,
        func: &IrFunction,
    ) -> Result<Vec<MachineInstr>, CompileError> {
        self.allocator.reset();
        let mut emitter = FunctionEmitter {
            func_idx: func.func_idx,
            num_locals: func.num_locals(),
            allocator: &mut self.allocator,
            regs: RegisterFile::new(func.num_locals()),
            vars: HashMap::new(),
            code: Vec::new(),
        };

        emitter.bind_params(func.params.len())?;
        for instr in &func.instructions {
            emitter.emit_instr(instr)?;
        }
        emitter.emit_terminator(&func.terminator)?;

        debug_assert!(emitter.regs.is_consistent());
        Ok(emitter.code)
    }
}

/// Per-function emission state.
struct FunctionEmitter<'a, A: RegisterAllocator> {
    func_idx: u32,
    num_locals: usize,
    allocator: &'a mut A,
    regs: RegisterFile,
    /// Registers holding virtual registers that have not been consumed yet.
    vars: HashMap<VarId, PhysReg>,
    code: Vec<MachineInstr>,
}

impl<A: RegisterAllocator> FunctionEmitter<'_, A> {
    fn error(&self, reason: impl Into<String>) -> CompileError {
        CompileError::codegen(self.func_idx, reason)
    }

    fn fresh(&mut self) -> Result<PhysReg, CompileError> {
        self.allocator.allocate().ok_or_else(|| {
            self.error(format!(
                "out of physical registers ({} available, spilling is not supported)",
                self.allocator.num_registers()
            ))
        })
    }

    fn bind_params(&mut self, count: usize) -> Result<(), CompileError> {
        for i in 0..count {
            let reg = self.fresh()?;
            self.regs.bind(LocalIdx(i as u32), reg);
        }
        Ok(())
    }

    fn check_local(&self, local: LocalIdx) -> Result<(), CompileError> {
        if (local.0 as usize) < self.num_locals {
            Ok(())
        } else {
            Err(self.error(format!(
                "unbound local {local} ({} locals)",
                self.num_locals
            )))
        }
    }

    fn define(&mut self, dest: VarId, reg: PhysReg) -> Result<(), CompileError> {
        if self.vars.insert(dest, reg).is_some() {
            return Err(self.error(format!("{dest} defined twice")));
        }
        Ok(())
    }

    /// Bring `value` into a register owned by the caller, which may clobber it.
    fn materialize(&mut self, value: IrValue) -> Result<PhysReg, CompileError> {
        match value {
            IrValue::Imm(imm) => {
                let dst = self.fresh()?;
                self.code.push(MachineInstr::LoadImm { dst, imm });
                Ok(dst)
            }
            IrValue::Local(local) => {
                self.check_local(local)?;
                let dst = self.fresh()?;
                match self.regs.reg_of(local) {
                    Some(src) => self.code.push(MachineInstr::Mov { dst, src }),
                    // declared locals start out as zero
                    None => self.code.push(MachineInstr::LoadImm { dst, imm: 0 }),
                }
                Ok(dst)
            }
            IrValue::Var(var) => self.vars.remove(&var).ok_or_else(|| {
                self.error(format!("{var} used before definition or consumed twice"))
            }),
        }
    }

    fn emit_instr(&mut self, instr: &IrInstr) -> Result<(), CompileError> {
        match *instr {
            IrInstr::LocalGet { dest, local } => {
                let reg = self.materialize(IrValue::Local(local))?;
                self.define(dest, reg)?;
            }

            IrInstr::LocalSet { local, value } => {
                self.check_local(local)?;
                let reg = self.materialize(value)?;
                if let Some(old) = self.regs.bind(local, reg) {
                    self.allocator.free(old);
                }
            }

            IrInstr::Add { dest, lhs, rhs } => {
                let dst = self.materialize(lhs)?;
                let src = self.materialize(rhs)?;
                self.code.push(MachineInstr::Add { dst, src });
                self.allocator.free(src);
                self.define(dest, dst)?;
            }
        }
        Ok(())
    }

    fn emit_terminator(&mut self, terminator: &IrTerminator) -> Result<(), CompileError> {
        match *terminator {
            IrTerminator::Return { value: Some(value) } => {
                // a bound local can be returned in place
                let src = match value {
                    IrValue::Local(local) => match self.regs.reg_of(local) {
                        Some(reg) => reg,
                        None => self.materialize(value)?,
                    },
                    _ => self.materialize(value)?,
                };
                self.code.push(MachineInstr::Ret { src });
            }
            IrTerminator::Return { value: None } => {
                return Err(self.error("missing return value: operand stack is empty at end"));
            }
            IrTerminator::Unreachable => self.code.push(MachineInstr::Trap),
        }
        Ok(())
    }
}
