//! Structural checks over a finished [Module].
//!
//! A module that passes is safe to hand to a serializer or an evaluator: every block is
//! terminated exactly once, every branch lands on a real block, every value is defined exactly
//! once, a use in the defining block comes after the definition, and operand types line up with
//! what each instruction expects. Dominance across blocks is not checked.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::{
    BlockId, CastOp, Function, Instruction, Linkage, Module, Operand, Type, ValueId,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("function `{function}` has no body")]
    EmptyFunction { function: String },

    #[error("block `{block}` in `{function}` does not end with a terminator")]
    MissingTerminator { function: String, block: String },

    #[error("block `{block}` in `{function}` has a terminator before its last instruction")]
    TerminatorNotLast { function: String, block: String },

    #[error("`{function}` branches from `{block}` to block #{target}, which does not exist")]
    UnknownBlock {
        function: String,
        block: String,
        target: usize,
    },

    #[error("`{function}` uses value #{value} which is never defined")]
    UndefinedValue { function: String, value: usize },

    #[error("`{function}` uses value #{value} in `{block}` before defining it there")]
    UseBeforeDefinition {
        function: String,
        block: String,
        value: usize,
    },

    #[error("`{function}` defines value #{value} more than once")]
    RedefinedValue { function: String, value: usize },

    #[error("`{function}` refers to global #{global}, which does not exist")]
    UnknownGlobal { function: String, global: usize },

    #[error("`{function}` calls function #{callee}, which does not exist")]
    UnknownFunction { function: String, callee: usize },

    #[error("type mismatch in `{function}`, block `{block}`: {message}")]
    TypeMismatch {
        function: String,
        block: String,
        message: String,
    },

    #[error("`{name}` is defined more than once in the module")]
    DuplicateSymbol { name: String },

    #[error("private global `{name}` has no initializer")]
    MissingInitializer { name: String },
}

/// Check every symbol and every function body in `module`
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    let mut seen = HashSet::new();
    let names = module
        .globals
        .iter()
        .map(|g| &g.name)
        .chain(module.functions.iter().map(|f| &f.name));
    for name in names {
        if !seen.insert(name) {
            return Err(VerifyError::DuplicateSymbol { name: name.clone() });
        }
    }

    for global in module.globals.iter() {
        if global.linkage == Linkage::Private && global.initializer.is_none() {
            return Err(VerifyError::MissingInitializer {
                name: global.name.clone(),
            });
        }
    }

    for function in module.functions.iter().filter(|f| !f.is_declaration()) {
        verify_function(module, function)?;
    }

    Ok(())
}

/// Check one defined function, in the context of the module it belongs to
pub fn verify_function(module: &Module, function: &Function) -> Result<(), VerifyError> {
    if function.is_declaration() {
        return Err(VerifyError::EmptyFunction {
            function: function.name.clone(),
        });
    }

    let mut defined = HashMap::new();
    for (i, block) in function.blocks.iter().enumerate() {
        for dest in block.instructions.iter().filter_map(|i| i.dest()) {
            if dest.0 >= function.values.len() || defined.insert(dest, BlockId(i)).is_some() {
                return Err(VerifyError::RedefinedValue {
                    function: function.name.clone(),
                    value: dest.0,
                });
            }
        }
    }

    let checker = Checker {
        module,
        function,
        defined,
    };
    for i in 0..function.blocks.len() {
        checker.check_block(BlockId(i))?;
    }

    Ok(())
}

struct Checker<'a> {
    module: &'a Module,
    function: &'a Function,
    /// The block each value is defined in
    defined: HashMap<ValueId, BlockId>,
}

impl<'a> Checker<'a> {
    fn check_block(&self, id: BlockId) -> Result<(), VerifyError> {
        let block = self.function.block(id);

        match block.instructions.last() {
            Some(last) if last.is_terminator() => {}
            _ => {
                return Err(VerifyError::MissingTerminator {
                    function: self.function.name.clone(),
                    block: block.name.clone(),
                })
            }
        }

        let body = &block.instructions[..block.instructions.len() - 1];
        if body.iter().any(|i| i.is_terminator()) {
            return Err(VerifyError::TerminatorNotLast {
                function: self.function.name.clone(),
                block: block.name.clone(),
            });
        }

        let mut seen = HashSet::new();
        for instruction in block.instructions.iter() {
            for target in instruction.successors() {
                if target.0 >= self.function.blocks.len() {
                    return Err(VerifyError::UnknownBlock {
                        function: self.function.name.clone(),
                        block: block.name.clone(),
                        target: target.0,
                    });
                }
            }
            for operand in instruction.operands() {
                self.check_operand(id, &seen, operand)?;
            }
            self.check_types(id, instruction)?;
            seen.extend(instruction.dest());
        }

        Ok(())
    }

    /// `seen` holds the values defined so far in `block`
    fn check_operand(
        &self,
        block: BlockId,
        seen: &HashSet<ValueId>,
        operand: &Operand,
    ) -> Result<(), VerifyError> {
        match operand {
            Operand::Value(id) => match self.defined.get(id) {
                None => Err(VerifyError::UndefinedValue {
                    function: self.function.name.clone(),
                    value: id.0,
                }),
                Some(home) if *home == block && !seen.contains(id) => {
                    Err(VerifyError::UseBeforeDefinition {
                        function: self.function.name.clone(),
                        block: self.function.block(block).name.clone(),
                        value: id.0,
                    })
                }
                Some(_) => Ok(()),
            },
            Operand::Global(id) if id.0 >= self.module.globals.len() => {
                Err(VerifyError::UnknownGlobal {
                    function: self.function.name.clone(),
                    global: id.0,
                })
            }
            _ => Ok(()),
        }
    }

    fn type_of(&self, operand: &Operand) -> Type {
        self.module.operand_type(self.function, operand)
    }

    fn mismatch(&self, block: BlockId, message: String) -> VerifyError {
        VerifyError::TypeMismatch {
            function: self.function.name.clone(),
            block: self.function.block(block).name.clone(),
            message,
        }
    }

    fn expect_type(
        &self,
        block: BlockId,
        what: &str,
        operand: &Operand,
        expected: &Type,
    ) -> Result<(), VerifyError> {
        let actual = self.type_of(operand);
        if &actual != expected {
            return Err(self.mismatch(
                block,
                format!("{} should be {} but is {}", what, expected, actual),
            ));
        }
        Ok(())
    }

    fn check_types(&self, block: BlockId, instruction: &Instruction) -> Result<(), VerifyError> {
        match instruction {
            Instruction::Alloca { .. } | Instruction::Br { .. } => Ok(()),
            Instruction::Load { ty, ptr, .. } => {
                self.expect_type(block, "load address", ptr, &Type::Ptr)?;
                if *ty == Type::Void {
                    return Err(self.mismatch(block, "cannot load a void value".to_string()));
                }
                Ok(())
            }
            Instruction::Store { value, ptr } => {
                self.expect_type(block, "store address", ptr, &Type::Ptr)?;
                if self.type_of(value) == Type::Void {
                    return Err(self.mismatch(block, "cannot store a void value".to_string()));
                }
                Ok(())
            }
            Instruction::GetElementPtr { base, index, .. } => {
                self.expect_type(block, "getelementptr base", base, &Type::Ptr)?;
                if self.type_of(index).int_width().is_none() {
                    return Err(self.mismatch(block, "getelementptr index is not an integer".into()));
                }
                Ok(())
            }
            Instruction::Binary { lhs, rhs, .. } | Instruction::ICmp { lhs, rhs, .. } => {
                let ty = self.type_of(lhs);
                if ty.int_width().is_none() {
                    return Err(self.mismatch(block, format!("{} is not an integer type", ty)));
                }
                self.expect_type(block, "right operand", rhs, &ty)
            }
            Instruction::Cast { op, value, to, .. } => {
                let from = self.type_of(value);
                let widths = (from.int_width(), to.int_width());
                let ok = match (op, widths) {
                    (CastOp::ZExt, (Some(f), Some(t))) => f < t,
                    (CastOp::Trunc, (Some(f), Some(t))) => f > t,
                    _ => false,
                };
                if !ok {
                    return Err(self.mismatch(
                        block,
                        format!("invalid cast {} from {} to {}", op, from, to),
                    ));
                }
                Ok(())
            }
            Instruction::Call { callee, args, dest } => {
                let Some(target) = self.module.functions.get(callee.0) else {
                    return Err(VerifyError::UnknownFunction {
                        function: self.function.name.clone(),
                        callee: callee.0,
                    });
                };
                if target.signature.params.len() != args.len() {
                    return Err(self.mismatch(
                        block,
                        format!(
                            "`{}` takes {} arguments but was given {}",
                            target.name,
                            target.signature.params.len(),
                            args.len()
                        ),
                    ));
                }
                for (arg, param) in args.iter().zip(target.signature.params.iter()) {
                    self.expect_type(block, "call argument", arg, param)?;
                }
                if let Some(dest) = dest {
                    if target.signature.ret == Type::Void {
                        return Err(self.mismatch(
                            block,
                            format!("the result of void `{}` cannot be named", target.name),
                        ));
                    }
                    let ty = &self.function.value(*dest).ty;
                    if *ty != target.signature.ret {
                        return Err(self.mismatch(
                            block,
                            format!("`{}` returns {} not {}", target.name, target.signature.ret, ty),
                        ));
                    }
                }
                Ok(())
            }
            Instruction::CondBr { cond, .. } => {
                self.expect_type(block, "branch condition", cond, &Type::I1)
            }
            Instruction::Ret { value } => {
                let ret = &self.function.signature.ret;
                match value {
                    Some(value) => self.expect_type(block, "return value", value, ret),
                    None if *ret == Type::Void => Ok(()),
                    None => Err(self.mismatch(block, format!("missing {} return value", ret))),
                }
            }
        }
    }
}
