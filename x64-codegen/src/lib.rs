pub mod frontend;
pub mod ir;
pub mod backend;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Lexical error: unexpected character at position {location}")]
    Lexical { location: usize },

    #[error("Parse error at position {location}: {message}")]
    Parse {
        location: usize,
        message: String,
    },
}

/// Parse textual IR into a structured module.
pub fn parse_module(source: &str) -> Result<ir::Module, CompileError> {
    frontend::parser::parse(source)
}

/// Compile textual IR directly to x86-64 assembly.
pub fn compile_to_x64(source: &str) -> Result<String, CompileError> {
    let module = parse_module(source)?;
    Ok(backend::compile_module_to_x64(&module))
}
