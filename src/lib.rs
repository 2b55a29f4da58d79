//! Compiles tape-machine programs (`> < + - . , [ ]`) into an LLVM-like IR module.
//!
//! ```text
//! source -> Lexer -> Parser -> Ast -> codegen -> Module -> ArtifactSink
//! ```

extern crate thiserror;

pub mod codegen;
pub mod emit;
pub mod interpreter;
pub mod ir;
pub mod lexer;
pub mod parser;

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

pub use crate::codegen::{generate, TAPE_SIZE};
pub use crate::ir::{Module, VerifyError};
pub use crate::parser::parser::parse;
pub use crate::parser::{Ast, ParseError};

#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The generator built a malformed module, never caused by the input program
    #[error("internal compiler error: {0}")]
    Internal(#[from] VerifyError),
}

/// Parse `source`, logging the phase
pub fn parse_source(source: &str) -> Result<Ast, CompileError> {
    info!("Starting parsing");
    let now = Instant::now();
    let ast = parse(source)?;
    info!("Finished parsing in {:.2?}", now.elapsed());
    debug!(
        nodes = ast.len(),
        instructions = ast.instruction_count(),
        loops = ast.loop_count()
    );
    Ok(ast)
}

/// Generate and verify the module for a parsed program, logging the phase
pub fn compile_ast(ast: &Ast) -> Result<Module, CompileError> {
    info!("Starting code generation");
    let now = Instant::now();
    let module = generate(ast)?;
    info!("Finished code generation in {:.2?}", now.elapsed());
    debug!(functions = module.functions.len(), globals = module.globals.len());
    Ok(module)
}

/// Parse `source` and generate its verified IR module
pub fn compile(source: &str) -> Result<Module, CompileError> {
    compile_ast(&parse_source(source)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MissingBracket;

    #[test]
    fn parse_errors_pass_through() {
        match compile("+]") {
            Err(CompileError::Parse(e)) => assert_eq!(e.missing(), MissingBracket::Open),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn compiles_to_a_verified_module() {
        let module = compile("++[->+<]").unwrap();
        assert!(ir::verify_module(&module).is_ok());
        assert!(module.function_by_name(codegen::ENTRY_POINT).is_some());
    }

    #[test]
    fn deep_nesting_compiles() {
        let depth = 100_000;
        let source = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        let module = compile(&source).unwrap();
        let (_, main) = module.function_by_name(codegen::ENTRY_POINT).unwrap();
        assert_eq!(main.blocks.len(), 2 + 3 * depth);
    }
}
