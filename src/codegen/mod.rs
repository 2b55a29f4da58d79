//! Lowers an [Ast] into an IR [Module].
//!
//! The module has one entry routine, `i32 @main()`, that works on a private zero-initialized
//! tape of [TAPE_SIZE] bytes through a pointer kept in a stack slot. Output goes through
//! `putchar` followed by `fflush(stdout)` after every character; input comes from `getchar`.
//! Moving the pointer off either end of the tape is not checked: the generated program simply
//! has undefined behaviour, as a C program indexing past an array would.

pub mod lowering;

use std::time::Instant;

use tracing::debug;

use crate::ir::{
    verify_module, FunctionBuilder, FunctionId, Global, GlobalId, Initializer, Linkage, Module,
    Operand, Signature, Type, VerifyError,
};
use crate::parser::Ast;

/// Number of cells on the tape
pub const TAPE_SIZE: usize = 60_000;

pub const MODULE_NAME: &str = "tapeir";
pub const ENTRY_POINT: &str = "main";
pub const TAPE_GLOBAL: &str = "tape";
pub const STDOUT_GLOBAL: &str = "stdout";
pub const PUTCHAR: &str = "putchar";
pub const GETCHAR: &str = "getchar";
pub const FFLUSH: &str = "fflush";

/// A declared external routine
#[derive(Debug, Clone)]
pub struct Extern {
    pub id: FunctionId,
    pub signature: Signature,
}

/// Everything a lowering step needs, passed explicitly from node to node
#[derive(Debug)]
pub struct Context {
    pub module: Module,
    pub builder: FunctionBuilder,

    /// Stack slot holding the current tape pointer
    pub tape_pointer: Operand,

    pub tape: GlobalId,
    pub stdout: GlobalId,
    pub putchar: Extern,
    pub getchar: Extern,
    pub fflush: Extern,
}

fn declare(module: &mut Module, name: &str, ret: Type, params: Vec<Type>) -> Extern {
    let signature = Signature { ret, params };
    let id = module.reserve_function(name, signature.clone());
    Extern { id, signature }
}

impl Context {
    /// Declares the tape, the I/O routines and `main`, and emits `main`'s entry block
    pub fn new() -> Context {
        let mut module = Module::new(MODULE_NAME);

        let tape = module.add_global(Global {
            name: TAPE_GLOBAL.to_string(),
            ty: Type::Array(Box::new(Type::I8), TAPE_SIZE),
            linkage: Linkage::Private,
            initializer: Some(Initializer::Zero),
        });
        let stdout = module.add_global(Global {
            name: STDOUT_GLOBAL.to_string(),
            ty: Type::Ptr,
            linkage: Linkage::External,
            initializer: None,
        });

        let putchar = declare(&mut module, PUTCHAR, Type::I32, vec![Type::I32]);
        let getchar = declare(&mut module, GETCHAR, Type::I32, vec![]);
        let fflush = declare(&mut module, FFLUSH, Type::I32, vec![Type::Ptr]);

        let mut builder = FunctionBuilder::new(
            ENTRY_POINT,
            Signature {
                ret: Type::I32,
                params: vec![],
            },
        );
        let entry = builder.append_block("entry");
        builder.position_at_end(entry);
        let tape_pointer = builder.alloca(Type::Ptr, "current_ptr");
        let start = builder.gep(
            Type::I8,
            Operand::Global(tape),
            Operand::Const(Type::I32, 0),
            "tape_start",
        );
        builder.store(start, tape_pointer.clone());

        Context {
            module,
            builder,
            tape_pointer,
            tape,
            stdout,
            putchar,
            getchar,
            fflush,
        }
    }

    /// Closes `main` with the exit block, adds it to the module and verifies the result
    pub fn finish(mut self) -> Result<Module, VerifyError> {
        let exit = self.builder.append_block("exit");
        self.builder.br(exit);
        self.builder.position_at_end(exit);
        self.builder.ret(Some(Operand::Const(Type::I32, 0)));

        self.module.add_function(self.builder.finish());
        verify_module(&self.module)?;
        Ok(self.module)
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

/// Generate and verify the IR for a whole program.
///
/// An `Err` here means the generator produced something malformed; a parsed [Ast] should
/// never cause one.
pub fn generate(ast: &Ast) -> Result<Module, VerifyError> {
    let now = Instant::now();

    let mut cx = Context::new();
    lowering::lower_node(ast, ast.root(), &mut cx);
    let module = cx.finish()?;

    debug!(
        blocks = module
            .function_by_name(ENTRY_POINT)
            .map(|(_, f)| f.blocks.len())
            .unwrap_or(0),
        elapsed = ?now.elapsed(),
        "generated IR"
    );
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, Instruction};
    use crate::parser::parser::parse;

    fn main_of(module: &Module) -> &Function {
        module.function_by_name(ENTRY_POINT).unwrap().1
    }

    fn block_names(module: &Module) -> Vec<&str> {
        main_of(module)
            .blocks
            .iter()
            .map(|b| b.name.as_str())
            .collect()
    }

    #[test]
    fn empty_program_has_entry_and_exit() {
        let module = generate(&parse("").unwrap()).unwrap();
        assert_eq!(block_names(&module), vec!["entry", "exit"]);

        let main = main_of(&module);
        assert_eq!(
            main.blocks[1].instructions,
            vec![Instruction::Ret {
                value: Some(Operand::Const(Type::I32, 0))
            }]
        );
    }

    #[test]
    fn declares_the_runtime_interface() {
        let module = generate(&parse("").unwrap()).unwrap();
        let (_, tape) = module.global_by_name(TAPE_GLOBAL).unwrap();
        assert_eq!(tape.ty, Type::Array(Box::new(Type::I8), TAPE_SIZE));
        assert_eq!(tape.linkage, Linkage::Private);
        assert_eq!(tape.initializer, Some(Initializer::Zero));

        for name in [PUTCHAR, GETCHAR, FFLUSH] {
            assert!(module.function_by_name(name).unwrap().1.is_declaration());
        }
        assert_eq!(
            module.function_by_name(GETCHAR).unwrap().1.signature.params,
            vec![]
        );
    }

    #[test]
    fn loops_get_condition_body_and_after_blocks() {
        let module = generate(&parse("+[-]").unwrap()).unwrap();
        assert_eq!(
            block_names(&module),
            vec!["entry", "condition", "loop_body", "after_loop", "exit"]
        );
    }

    #[test]
    fn nested_loops_get_unique_block_names() {
        let module = generate(&parse("[[]][]").unwrap()).unwrap();
        let names = block_names(&module);
        assert_eq!(names.len(), 2 + 3 * 3);
        assert!(names.contains(&"condition2"));
        assert!(names.contains(&"after_loop1"));
    }

    #[test]
    fn generation_is_deterministic() {
        let ast = parse("++[>+<-]>.,").unwrap();
        let first = generate(&ast).unwrap();
        let second = generate(&ast).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_string(), second.to_string());
    }
}
