//! Target machine instructions.
//!
//! Two-operand, x86-style: the destination register is also the left source
//! of `add`.

use std::fmt;

/// A physical register of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysReg(pub u16);

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// One emitted instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineInstr {
    /// dst = imm
    LoadImm { dst: PhysReg, imm: i32 },
    /// dst = src
    Mov { dst: PhysReg, src: PhysReg },
    /// dst = dst + src (wrapping, 32-bit)
    Add { dst: PhysReg, src: PhysReg },
    /// Return the value held in `src`.
    Ret { src: PhysReg },
    /// Trap unconditionally.
    Trap,
}

impl MachineInstr {
    /// Register written by this instruction.
    pub fn def(&self) -> Option<PhysReg> {
        match self {
            MachineInstr::LoadImm { dst, .. }
            | MachineInstr::Mov { dst, .. }
            | MachineInstr::Add { dst, .. } => Some(*dst),
            MachineInstr::Ret { .. } | MachineInstr::Trap => None,
        }
    }

    /// Registers read by this instruction.
    pub fn uses(&self) -> Vec<PhysReg> {
        match self {
            MachineInstr::LoadImm { .. } | MachineInstr::Trap => vec![],
            MachineInstr::Mov { src, .. } | MachineInstr::Ret { src } => vec![*src],
            MachineInstr::Add { dst, src } => vec![*dst, *src],
        }
    }
}

impl fmt::Display for MachineInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineInstr::LoadImm { dst, imm } => write!(f, "mov {dst}, {imm}"),
            MachineInstr::Mov { dst, src } => write!(f, "mov {dst}, {src}"),
            MachineInstr::Add { dst, src } => write!(f, "add {dst}, {src}"),
            MachineInstr::Ret { src } => write!(f, "ret {src}"),
            MachineInstr::Trap => write!(f, "ud2"),
        }
    }
}
