//! x86-64 backend — lowers IR modules to GAS-syntax assembly text.
//!
//! Module layout:
//! - `abi`         — register definitions and calling-convention constants
//! - `instruction` — operand and assembly-line types
//! - `labels`      — block-entry and φ-edge label naming
//! - `slots`       — the slot allocator (register pool + stack spill area)
//! - `liveness`    — reachable-use analysis for slot reclamation
//! - `codegen`     — code generation driver (IR → assembly)

pub mod abi;
pub mod instruction;
pub mod labels;
mod liveness;
pub mod slots;
mod codegen;

// Re-export the public API at `backend::` level.
pub use codegen::Program;

use crate::ir::Module;

/// Compile a parsed module to x86-64 assembly text.
pub fn compile_module_to_x64(module: &Module) -> String {
    let mut program = Program::new(module);
    program.emit_module();
    program.finish()
}
