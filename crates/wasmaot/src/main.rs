use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use wasmaot::{compile, AllocatorKind, CompileOptions};

/// wasmaot — ahead-of-time compiler from a WebAssembly subset to register machine code.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input WebAssembly binary (.wasm)
    input: PathBuf,

    /// Output listing file (stdout when omitted)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Operand stack capacity per function
    #[arg(long, default_value_t = 1024)]
    stack_capacity: usize,

    /// Number of physical registers
    #[arg(long, default_value_t = 16)]
    registers: u16,

    /// Register allocation strategy
    #[arg(long, value_enum, default_value_t = Allocator::Monotonic)]
    allocator: Allocator,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Allocator {
    Monotonic,
    FreeList,
}

impl From<Allocator> for AllocatorKind {
    fn from(allocator: Allocator) -> Self {
        match allocator {
            Allocator::Monotonic => AllocatorKind::Monotonic,
            Allocator::FreeList => AllocatorKind::FreeList,
        }
    }
}

/// Read the module bytes the compiler works on.
fn load_module_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    eprintln!("wasmaot: compiling {}", cli.input.display());

    let wasm_bytes = load_module_bytes(&cli.input)?;

    let options = CompileOptions {
        stack_capacity: cli.stack_capacity,
        num_registers: cli.registers,
        allocator: cli.allocator.into(),
    };

    let compiled = compile(&wasm_bytes, &options).context("compilation failed")?;
    eprintln!(
        "wasmaot: compiled {} function(s), {} instruction(s)",
        compiled.code.functions().len(),
        compiled.code.len()
    );

    let listing = compiled.listing();
    if let Some(output_path) = cli.output {
        fs::write(&output_path, &listing)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        eprintln!("wasmaot: wrote {}", output_path.display());
    } else {
        print!("{}", listing);
    }

    Ok(())
}
