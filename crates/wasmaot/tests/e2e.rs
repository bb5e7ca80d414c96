//! End-to-end integration tests for wasmaot.
//!
//! These tests verify the complete pipeline: Wasm → IR → machine code. The
//! generated code is checked by running it on a small register machine model.

use anyhow::{Context, Result};
use proptest::prelude::*;
use wasmaot::codegen::{MachineInstr, PhysReg};
use wasmaot::{compile, AllocatorKind, CompileError, CompileOptions, CompiledModule};

/// Helper to compile WAT source with the given options.
fn compile_wat_with(wat_source: &str, options: &CompileOptions) -> Result<CompiledModule> {
    let wasm_bytes = wat::parse_str(wat_source).context("failed to parse WAT")?;
    compile(&wasm_bytes, options)
}

fn compile_wat(wat_source: &str) -> Result<CompiledModule> {
    compile_wat_with(wat_source, &CompileOptions::default())
}

/// Execute one function's code. Returns `None` when it traps.
fn run(code: &[MachineInstr], args: &[i32]) -> Option<i32> {
    let mut regs = [0i32; 64];
    regs[..args.len()].copy_from_slice(args);
    let get = |regs: &[i32; 64], r: PhysReg| regs[r.0 as usize];

    for instr in code {
        match *instr {
            MachineInstr::LoadImm { dst, imm } => regs[dst.0 as usize] = imm,
            MachineInstr::Mov { dst, src } => regs[dst.0 as usize] = get(&regs, src),
            MachineInstr::Add { dst, src } => {
                regs[dst.0 as usize] = get(&regs, dst).wrapping_add(get(&regs, src))
            }
            MachineInstr::Ret { src } => return Some(get(&regs, src)),
            MachineInstr::Trap => return None,
        }
    }
    panic!("function fell off the end of its code");
}

fn compile_error(err: &anyhow::Error) -> &CompileError {
    err.downcast_ref::<CompileError>()
        .unwrap_or_else(|| panic!("not a compile error: {err:#}"))
}

#[test]
fn test_add_export_from_raw_bytes() -> Result<()> {
    #[rustfmt::skip]
    let bytes = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00,
        // type section: (i32, i32) -> i32
        0x01, 0x07, 0x01, 0x60, 0x02, 0x7f, 0x7f, 0x01, 0x7f,
        // function section: one function of type 0
        0x03, 0x02, 0x01, 0x00,
        // export section: "add" -> func 0
        0x07, 0x07, 0x01, 0x03, b'a', b'd', b'd', 0x00, 0x00,
        // code section: local.get 0, local.get 1, i32.add, end
        0x0a, 0x09, 0x01, 0x07, 0x00, 0x20, 0x00, 0x20, 0x01, 0x6a, 0x0b,
    ];

    let compiled = compile(&bytes, &CompileOptions::default())?;
    assert_eq!(compiled.module.exports.len(), 1);
    assert_eq!(compiled.module.exports[0].name, "add");

    let code = compiled.code.function(0).context("no code for function 0")?;
    let last = code.last().context("empty function")?;
    let MachineInstr::Ret { src } = *last else {
        panic!("last instruction is not a return: {last}");
    };
    // the returned register holds the sum written by the add
    assert!(code
        .iter()
        .any(|i| matches!(*i, MachineInstr::Add { dst, .. } if dst == src)));
    assert_eq!(run(code, &[2, 3]), Some(5));
    assert_eq!(run(code, &[i32::MAX, 1]), Some(i32::MIN));

    Ok(())
}

#[test]
fn test_listing_names_exports() -> Result<()> {
    let compiled = compile_wat(
        r#"
        (module
            (func (export "addNumbers") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add))
        "#,
    )?;

    let listing = compiled.listing();
    println!("Generated listing:\n{}", listing);
    assert!(listing.starts_with("add_numbers:"));
    assert!(listing.contains("add r2, r3"));
    assert!(listing.contains("ret r2"));

    Ok(())
}

#[test]
fn test_constants_and_locals() -> Result<()> {
    let compiled = compile_wat(
        r#"
        (module
            (func (param i32) (result i32)
                (local i32)
                local.get 0
                i32.const -10
                i32.add
                local.set 1
                local.get 1
                local.get 1
                i32.add))
        "#,
    )?;
    let code = compiled.code.function(0).context("missing function")?;
    assert_eq!(run(code, &[15]), Some(10));
    Ok(())
}

#[test]
fn test_tee_keeps_value_on_stack() -> Result<()> {
    let compiled = compile_wat(
        r#"
        (module
            (func (param i32) (result i32)
                (local i32)
                local.get 0
                local.tee 1
                local.get 1
                i32.add))
        "#,
    )?;
    let code = compiled.code.function(0).context("missing function")?;
    assert_eq!(run(code, &[21]), Some(42));
    Ok(())
}

#[test]
fn test_stacked_local_read_survives_overwrite() -> Result<()> {
    let compiled = compile_wat(
        r#"
        (module
            (func (param i32) (result i32)
                local.get 0
                i32.const 5
                local.set 0
                local.get 0
                i32.add))
        "#,
    )?;
    let code = compiled.code.function(0).context("missing function")?;
    // old value of the param plus the new value 5
    assert_eq!(run(code, &[100]), Some(105));
    Ok(())
}

#[test]
fn test_declared_locals_start_at_zero() -> Result<()> {
    let compiled = compile_wat(
        r#"
        (module
            (func (result i32)
                (local i32)
                local.get 0
                i32.const 3
                i32.add))
        "#,
    )?;
    let code = compiled.code.function(0).context("missing function")?;
    assert_eq!(run(code, &[]), Some(3));
    Ok(())
}

#[test]
fn test_unreachable_traps() -> Result<()> {
    let compiled = compile_wat(
        r#"
        (module
            (func (result i32)
                unreachable
                i32.const 1))
        "#,
    )?;
    let code = compiled.code.function(0).context("missing function")?;
    assert_eq!(code, &[MachineInstr::Trap]);
    assert_eq!(run(code, &[]), None);
    Ok(())
}

#[test]
fn test_multiple_functions() -> Result<()> {
    let compiled = compile_wat(
        r#"
        (module
            (func (export "one") (result i32) i32.const 1)
            (func (export "sum3") (param i32 i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add
                local.get 2
                i32.add))
        "#,
    )?;
    assert_eq!(compiled.ir.len(), 2);
    assert_eq!(compiled.code.functions().len(), 2);
    let one = compiled.code.function(0).context("missing function 0")?;
    let sum3 = compiled.code.function(1).context("missing function 1")?;
    assert_eq!(run(one, &[]), Some(1));
    assert_eq!(run(sum3, &[1, 2, 3]), Some(6));
    Ok(())
}

#[test]
fn test_free_list_allocator_uses_fewer_registers() -> Result<()> {
    let wat = r#"
        (module
            (func (param i32) (result i32)
                local.get 0
                i32.const 1
                i32.add
                i32.const 2
                i32.add
                i32.const 3
                i32.add
                i32.const 4
                i32.add))
    "#;
    let monotonic = compile_wat(wat)?;
    let free_list = compile_wat_with(
        wat,
        &CompileOptions {
            allocator: AllocatorKind::FreeList,
            ..CompileOptions::default()
        },
    )?;

    let used = |c: &CompiledModule| c.code.functions()[0].registers_used;
    assert!(used(&free_list) < used(&monotonic));

    for compiled in [&monotonic, &free_list] {
        let code = compiled.code.function(0).context("missing function")?;
        assert_eq!(run(code, &[10]), Some(20));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Error reporting
// ---------------------------------------------------------------------------

#[test]
fn test_bad_header_is_invalid_module() {
    let err = compile(b"\0asm\x02\0\0\0", &CompileOptions::default()).unwrap_err();
    assert!(format!("{err:#}").contains("failed to decode WebAssembly module"));
    assert!(matches!(
        compile_error(&err),
        CompileError::InvalidModule { offset: 4, .. }
    ));
}

#[test]
fn test_truncated_module_is_out_of_bounds() -> Result<()> {
    let wasm = wat::parse_str(
        r#"(module (func (param i32 i32) (result i32) local.get 0 local.get 1 i32.add))"#,
    )?;
    let err = compile(&wasm[..wasm.len() - 1], &CompileOptions::default()).unwrap_err();
    assert!(matches!(compile_error(&err), CompileError::OutOfBounds { .. }));
    Ok(())
}

#[test]
fn test_unsupported_opcode_is_reported() {
    let err = compile_wat(
        r#"
        (module
            (func (result i32) i32.const 1)
            (func (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.mul))
        "#,
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("failed to lower function bodies"));
    assert!(matches!(
        compile_error(&err),
        CompileError::UnsupportedOpcode {
            func: 1,
            opcode: 0x6c,
            ..
        }
    ));
}

#[test]
fn test_stack_capacity_is_enforced() {
    let options = CompileOptions {
        stack_capacity: 1,
        ..CompileOptions::default()
    };
    let err = compile_wat_with(
        r#"
        (module
            (func (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add))
        "#,
        &options,
    )
    .unwrap_err();
    assert!(matches!(
        compile_error(&err),
        CompileError::StackOverflow {
            func: 0,
            capacity: 1,
            ..
        }
    ));
}

#[test]
fn test_running_out_of_registers_is_a_codegen_error() {
    let options = CompileOptions {
        num_registers: 2,
        ..CompileOptions::default()
    };
    let err = compile_wat_with(
        r#"
        (module
            (func (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add))
        "#,
        &options,
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("failed to generate machine code"));
    assert!(matches!(compile_error(&err), CompileError::Codegen { func: 0, .. }));
}

#[test]
fn test_empty_result_is_a_codegen_error() {
    let err = compile_wat(r#"(module (func (result i32) nop))"#).unwrap_err();
    assert!(matches!(compile_error(&err), CompileError::Codegen { .. }));
}

proptest! {
    #[test]
    fn constant_chains_sum_with_wrapping(values in prop::collection::vec(any::<i32>(), 1..24)) {
        let mut body = format!("i32.const {}\n", values[0]);
        for v in &values[1..] {
            body.push_str(&format!("i32.const {v}\ni32.add\n"));
        }
        let wat = format!("(module (func (result i32) {body}))");
        let options = CompileOptions {
            allocator: AllocatorKind::FreeList,
            ..CompileOptions::default()
        };

        let compiled = compile_wat_with(&wat, &options).unwrap();
        let code = compiled.code.function(0).unwrap();
        let expected = values.iter().fold(0i32, |acc, v| acc.wrapping_add(*v));
        prop_assert_eq!(run(code, &[]), Some(expected));
    }
}
