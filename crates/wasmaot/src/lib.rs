//! wasmaot — ahead-of-time compiler from a WebAssembly subset to register machine code.
//!
//! The pipeline has three stages that run strictly forward:
//!
//! 1. [`parser`] decodes the binary module (header, sections, function bodies).
//! 2. [`ir`] lowers each body from stack bytecode to a virtual-register IR.
//! 3. [`codegen`] allocates physical registers and emits machine instructions.
//!
//! Supported instructions: `i32.const`, `local.get`, `local.set`, `local.tee`,
//! `i32.add`, `nop`, `unreachable` and `end`. Everything a call allocates is
//! owned by the returned [`CompiledModule`] or dropped before [`compile`] returns.
//!
//! The input is decoded, not validated: operand types are never checked, so
//! a module that passes here is not necessarily a valid WebAssembly module.

pub mod codegen;
pub mod error;
pub mod ir;
pub mod parser;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use error::CompileError;

use codegen::{CodeBuffer, CodeGenerator, FreeListAllocator, MonotonicAllocator, RegisterAllocator};
use ir::{build_ir_functions, IrFunction};
use parser::{decode_module, Module};

/// Register allocation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocatorKind {
    /// Hand out registers in increasing order and never reclaim them.
    #[default]
    Monotonic,
    /// Reuse registers whose values are dead.
    FreeList,
}

/// Configuration options for compilation
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Capacity of the simulated operand stack, per function
    pub stack_capacity: usize,
    /// Number of physical registers available to each function
    pub num_registers: u16,
    pub allocator: AllocatorKind,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            stack_capacity: 1024,
            num_registers: 16,
            allocator: AllocatorKind::Monotonic,
        }
    }
}

/// Output of a successful compilation: the decoded module, its IR and the
/// generated machine code.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub module: Module,
    pub ir: Vec<IrFunction>,
    pub code: CodeBuffer,
}

impl CompiledModule {
    /// Text listing of the generated code, one labelled block per function.
    pub fn listing(&self) -> String {
        codegen::listing::render_listing(&self.module, &self.code)
    }
}

/// Compile a WebAssembly module to machine code.
///
/// This is the main entry point for the pipeline. The first error of any
/// stage aborts compilation; the typed cause is available through
/// `err.downcast_ref::<CompileError>()`.
///
/// # Example
/// ```no_run
/// use wasmaot::{compile, CompileOptions};
///
/// let wasm_bytes = std::fs::read("input.wasm").unwrap();
/// let compiled = compile(&wasm_bytes, &CompileOptions::default()).unwrap();
/// print!("{}", compiled.listing());
/// ```
pub fn compile(wasm_bytes: &[u8], options: &CompileOptions) -> Result<CompiledModule> {
    let module = decode_module(wasm_bytes).context("failed to decode WebAssembly module")?;

    let ir = build_ir_functions(&module, options.stack_capacity)
        .context("failed to lower function bodies")?;

    let code = match options.allocator {
        AllocatorKind::Monotonic => {
            generate_code(MonotonicAllocator::new(options.num_registers), &ir)?
        }
        AllocatorKind::FreeList => {
            generate_code(FreeListAllocator::new(options.num_registers), &ir)?
        }
    };

    Ok(CompiledModule { module, ir, code })
}

fn generate_code<A: RegisterAllocator>(allocator: A, ir: &[IrFunction]) -> Result<CodeBuffer> {
    CodeGenerator::new(allocator)
        .generate_module(ir)
        .context("failed to generate machine code")
}
