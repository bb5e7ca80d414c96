//! IR type definitions.
//!
//! The IR replaces the implicit WebAssembly operand stack with explicit
//! operands. An operand is an immediate, a reference to a local slot, or a
//! virtual register defined by exactly one earlier instruction.

use crate::parser::ValueType;
use std::fmt;

/// A virtual register. Numbered sequentially per function: v0, v1, v2, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Index into a function's local space (parameters first, then declared locals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalIdx(pub u32);

impl fmt::Display for LocalIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

/// An operand flowing between IR instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrValue {
    /// `i32.const` immediate, materialised by the emitter.
    Imm(i32),
    /// The current contents of a local slot.
    Local(LocalIdx),
    /// Result of an earlier instruction.
    Var(VarId),
}

impl fmt::Display for IrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrValue::Imm(v) => write!(f, "{v}"),
            IrValue::Local(l) => write!(f, "{l}"),
            IrValue::Var(v) => write!(f, "{v}"),
        }
    }
}

/// A single lowered operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrInstr {
    /// Snapshot a local into a virtual register (dest = local).
    LocalGet { dest: VarId, local: LocalIdx },

    /// Bind a value to a local slot (local = value).
    LocalSet { local: LocalIdx, value: IrValue },

    /// Wrapping 32-bit addition (dest = lhs + rhs).
    Add {
        dest: VarId,
        lhs: IrValue,
        rhs: IrValue,
    },
}

impl IrInstr {
    /// Virtual register defined by this instruction, if any.
    pub fn dest(&self) -> Option<VarId> {
        match self {
            IrInstr::LocalGet { dest, .. } | IrInstr::Add { dest, .. } => Some(*dest),
            IrInstr::LocalSet { .. } => None,
        }
    }

    /// Operands read by this instruction.
    pub fn operands(&self) -> Vec<IrValue> {
        match self {
            IrInstr::LocalGet { local, .. } => vec![IrValue::Local(*local)],
            IrInstr::LocalSet { value, .. } => vec![*value],
            IrInstr::Add { lhs, rhs, .. } => vec![*lhs, *rhs],
        }
    }
}

impl fmt::Display for IrInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrInstr::LocalGet { dest, local } => write!(f, "{dest} = get {local}"),
            IrInstr::LocalSet { local, value } => write!(f, "set {local}, {value}"),
            IrInstr::Add { dest, lhs, rhs } => write!(f, "{dest} = add {lhs}, {rhs}"),
        }
    }
}

/// How a function body ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrTerminator {
    /// Return the top of the operand stack. `None` when the stack was empty.
    Return { value: Option<IrValue> },

    /// An `unreachable` opcode was hit.
    Unreachable,
}

/// IR of one locally defined function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrFunction {
    /// Position in the function index table.
    pub func_idx: u32,

    /// Index into the type section.
    pub type_idx: u32,

    pub params: Vec<ValueType>,

    /// Declared locals; their local indices start at `params.len()`.
    pub locals: Vec<ValueType>,

    pub result: ValueType,

    /// Instructions in the order they were lowered.
    pub instructions: Vec<IrInstr>,

    pub terminator: IrTerminator,

    /// Number of virtual registers defined (v0..var_count).
    pub var_count: u32,
}

impl IrFunction {
    /// Total local slots: parameters plus declared locals.
    pub fn num_locals(&self) -> usize {
        self.params.len() + self.locals.len()
    }

    pub fn local_type(&self, local: LocalIdx) -> Option<ValueType> {
        let idx = local.0 as usize;
        if idx < self.params.len() {
            Some(self.params[idx])
        } else {
            self.locals.get(idx - self.params.len()).copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_id_display() {
        assert_eq!(VarId(0).to_string(), "v0");
        assert_eq!(VarId(42).to_string(), "v42");
    }

    #[test]
    fn test_instr_display() {
        let add = IrInstr::Add {
            dest: VarId(2),
            lhs: IrValue::Local(LocalIdx(0)),
            rhs: IrValue::Imm(-5),
        };
        assert_eq!(add.to_string(), "v2 = add l0, -5");
        let set = IrInstr::LocalSet {
            local: LocalIdx(1),
            value: IrValue::Var(VarId(2)),
        };
        assert_eq!(set.to_string(), "set l1, v2");
        let get = IrInstr::LocalGet {
            dest: VarId(3),
            local: LocalIdx(1),
        };
        assert_eq!(get.to_string(), "v3 = get l1");
    }

    #[test]
    fn test_dest_and_operands() {
        let add = IrInstr::Add {
            dest: VarId(0),
            lhs: IrValue::Imm(1),
            rhs: IrValue::Imm(2),
        };
        assert_eq!(add.dest(), Some(VarId(0)));
        assert_eq!(add.operands(), vec![IrValue::Imm(1), IrValue::Imm(2)]);

        let set = IrInstr::LocalSet {
            local: LocalIdx(0),
            value: IrValue::Imm(3),
        };
        assert_eq!(set.dest(), None);
    }

    #[test]
    fn test_local_types_span_params_and_locals() {
        let func = IrFunction {
            func_idx: 0,
            type_idx: 0,
            params: vec![ValueType::I32],
            locals: vec![ValueType::F64, ValueType::I64],
            result: ValueType::I32,
            instructions: vec![],
            terminator: IrTerminator::Unreachable,
            var_count: 0,
        };
        assert_eq!(func.num_locals(), 3);
        assert_eq!(func.local_type(LocalIdx(0)), Some(ValueType::I32));
        assert_eq!(func.local_type(LocalIdx(2)), Some(ValueType::I64));
        assert_eq!(func.local_type(LocalIdx(3)), None);
    }
}
