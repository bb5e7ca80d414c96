//! Text listing of generated machine code.

use super::CodeBuffer;
use crate::parser::Module;
use heck::ToSnakeCase;
use std::fmt::Write;

/// Label of a locally defined function: its export name in snake_case, or
/// `func_<index>` when it is not exported.
///
/// Export indices count imported functions first, so the local index is
/// shifted by the number of function imports before the lookup.
pub fn function_label(module: &Module, func_idx: u32) -> String {
    match module.export_name(module.num_imported_functions() + func_idx) {
        Some(name) if !name.to_snake_case().is_empty() => name.to_snake_case(),
        _ => format!("func_{func_idx}"),
    }
}

/// Render every function of `code` as an assembly-like listing.
pub fn render_listing(module: &Module, code: &CodeBuffer) -> String {
    let mut out = String::new();
    for (i, func) in code.functions().iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "{}:  ; {} register(s)",
            function_label(module, func.func_idx),
            func.registers_used
        );
        for instr in &code.instructions()[func.range.clone()] {
            let _ = writeln!(out, "    {instr}");
        }
    }
    out
}
