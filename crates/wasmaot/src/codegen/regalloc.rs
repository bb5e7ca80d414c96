//! Register allocation.
//!
//! The emitter talks to an allocator only through [`RegisterAllocator`], so
//! the naive monotonic counter can be swapped for a smarter strategy without
//! touching lowering or emission.

use super::instruction::PhysReg;
use crate::ir::LocalIdx;
use std::collections::BTreeSet;

/// Hands out physical registers for one function at a time.
pub trait RegisterAllocator {
    /// A register not currently in use, or `None` when the register file is exhausted.
    fn allocate(&mut self) -> Option<PhysReg>;

    /// Return a register whose value is dead.
    fn free(&mut self, reg: PhysReg);

    /// Forget all assignments (called before each function).
    fn reset(&mut self);

    /// Size of the register file.
    fn num_registers(&self) -> u16;

    /// Number of distinct registers handed out since the last reset.
    fn registers_used(&self) -> u16;
}

/// Counter-based allocator: r0, r1, r2, ... Registers are never reclaimed,
/// so a function can use at most `num_registers` values in total.
#[derive(Debug, Clone)]
pub struct MonotonicAllocator {
    next: u16,
    limit: u16,
}

impl MonotonicAllocator {
    pub fn new(num_registers: u16) -> Self {
        Self {
            next: 0,
            limit: num_registers,
        }
    }
}

impl RegisterAllocator for MonotonicAllocator {
    fn allocate(&mut self) -> Option<PhysReg> {
        if self.next >= self.limit {
            return None;
        }
        let reg = PhysReg(self.next);
        self.next += 1;
        Some(reg)
    }

    fn free(&mut self, _reg: PhysReg) {}

    fn reset(&mut self) {
        self.next = 0;
    }

    fn num_registers(&self) -> u16 {
        self.limit
    }

    fn registers_used(&self) -> u16 {
        self.next
    }
}

/// Reuses freed registers, lowest number first, before touching new ones.
#[derive(Debug, Clone)]
pub struct FreeListAllocator {
    next: u16,
    limit: u16,
    free: BTreeSet<PhysReg>,
}

impl FreeListAllocator {
    pub fn new(num_registers: u16) -> Self {
        Self {
            next: 0,
            limit: num_registers,
            free: BTreeSet::new(),
        }
    }
}

impl RegisterAllocator for FreeListAllocator {
    fn allocate(&mut self) -> Option<PhysReg> {
        if let Some(reg) = self.free.pop_first() {
            return Some(reg);
        }
        if self.next >= self.limit {
            return None;
        }
        let reg = PhysReg(self.next);
        self.next += 1;
        Some(reg)
    }

    fn free(&mut self, reg: PhysReg) {
        if reg.0 < self.next {
            self.free.insert(reg);
        }
    }

    fn reset(&mut self) {
        self.next = 0;
        self.free.clear();
    }

    fn num_registers(&self) -> u16 {
        self.limit
    }

    fn registers_used(&self) -> u16 {
        self.next
    }
}

/// Register descriptor tables: which local each register holds and which
/// register each local lives in. The two maps are kept inverse of each other.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    reg_to_local: Vec<Option<LocalIdx>>,
    local_to_reg: Vec<Option<PhysReg>>,
}

impl RegisterFile {
    pub fn new(num_locals: usize) -> Self {
        Self {
            reg_to_local: Vec::new(),
            local_to_reg: vec![None; num_locals],
        }
    }

    /// Register currently holding `local`.
    pub fn reg_of(&self, local: LocalIdx) -> Option<PhysReg> {
        self.local_to_reg.get(local.0 as usize).copied().flatten()
    }

    /// Local currently held in `reg`.
    pub fn local_in(&self, reg: PhysReg) -> Option<LocalIdx> {
        self.reg_to_local.get(reg.0 as usize).copied().flatten()
    }

    /// Bind `local` to `reg`, returning the register it previously occupied.
    ///
    /// `reg` must not hold another local and `local` must be in range.
    pub fn bind(&mut self, local: LocalIdx, reg: PhysReg) -> Option<PhysReg> {
        debug_assert!(
            self.local_in(reg).is_none(),
            "{reg} already holds {:?}",
            self.local_in(reg)
        );
        let old = self.local_to_reg[local.0 as usize].replace(reg);
        if let Some(old) = old {
            self.reg_to_local[old.0 as usize] = None;
        }
        let slot = reg.0 as usize;
        if self.reg_to_local.len() <= slot {
            self.reg_to_local.resize(slot + 1, None);
        }
        self.reg_to_local[slot] = Some(local);
        old
    }

    /// Check that both tables describe the same bindings.
    pub fn is_consistent(&self) -> bool {
        let forward = self
            .local_to_reg
            .iter()
            .enumerate()
            .filter_map(|(l, r)| r.map(|r| (l, r)))
            .all(|(l, r)| self.local_in(r) == Some(LocalIdx(l as u32)));
        let backward = self
            .reg_to_local
            .iter()
            .enumerate()
            .filter_map(|(r, l)| l.map(|l| (r, l)))
            .all(|(r, l)| self.reg_of(l) == Some(PhysReg(r as u16)));
        forward && backward
    }
}
