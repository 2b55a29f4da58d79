//! Textual form of a [Module], close enough to LLVM assembly that `lli` and `llc` accept it.

use std::fmt;

use super::{
    BinaryOp, CastOp, Function, Initializer, Instruction, IntPredicate, Linkage, Module, Operand,
    Type,
};

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::I1 => write!(f, "i1"),
            Type::I8 => write!(f, "i8"),
            Type::I32 => write!(f, "i32"),
            Type::Ptr => write!(f, "ptr"),
            Type::Array(elem, len) => write!(f, "[{} x {}]", len, elem),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "add"),
            BinaryOp::Sub => write!(f, "sub"),
        }
    }
}

impl fmt::Display for IntPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntPredicate::Ne => write!(f, "ne"),
        }
    }
}

impl fmt::Display for CastOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastOp::ZExt => write!(f, "zext"),
            CastOp::Trunc => write!(f, "trunc"),
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Linkage::External => write!(f, "external"),
            Linkage::Private => write!(f, "private"),
        }
    }
}

/// Prints operands by name, which needs the enclosing module and function
struct Printer<'a> {
    module: &'a Module,
    function: &'a Function,
}

impl<'a> Printer<'a> {
    fn operand(&self, operand: &Operand) -> String {
        match operand {
            Operand::Value(id) => format!("%{}", self.function.value(*id).name),
            Operand::Global(id) => format!("@{}", self.module.global(*id).name),
            Operand::Const(_, value) => value.to_string(),
        }
    }

    /// `<type> <operand>`, as used in most argument positions
    fn typed(&self, operand: &Operand) -> String {
        format!(
            "{} {}",
            self.module.operand_type(self.function, operand),
            self.operand(operand)
        )
    }

    fn label(&self, block: super::BlockId) -> String {
        format!("label %{}", self.function.block(block).name)
    }

    fn dest(&self, dest: super::ValueId) -> String {
        format!("%{}", self.function.value(dest).name)
    }

    fn instruction(&self, f: &mut fmt::Formatter<'_>, instruction: &Instruction) -> fmt::Result {
        match instruction {
            Instruction::Alloca { dest, ty } => {
                writeln!(f, "  {} = alloca {}", self.dest(*dest), ty)
            }
            Instruction::Load { dest, ty, ptr } => {
                writeln!(f, "  {} = load {}, {}", self.dest(*dest), ty, self.typed(ptr))
            }
            Instruction::Store { value, ptr } => {
                writeln!(f, "  store {}, {}", self.typed(value), self.typed(ptr))
            }
            Instruction::GetElementPtr {
                dest,
                elem,
                base,
                index,
            } => writeln!(
                f,
                "  {} = getelementptr {}, {}, {}",
                self.dest(*dest),
                elem,
                self.typed(base),
                self.typed(index)
            ),
            Instruction::Binary { dest, op, lhs, rhs } => writeln!(
                f,
                "  {} = {} {}, {}",
                self.dest(*dest),
                op,
                self.typed(lhs),
                self.operand(rhs)
            ),
            Instruction::ICmp {
                dest,
                predicate,
                lhs,
                rhs,
            } => writeln!(
                f,
                "  {} = icmp {} {}, {}",
                self.dest(*dest),
                predicate,
                self.typed(lhs),
                self.operand(rhs)
            ),
            Instruction::Cast {
                dest,
                op,
                value,
                to,
            } => writeln!(
                f,
                "  {} = {} {} to {}",
                self.dest(*dest),
                op,
                self.typed(value),
                to
            ),
            Instruction::Call { dest, callee, args } => {
                let callee = self.module.function(*callee);
                let args: Vec<String> = args.iter().map(|a| self.typed(a)).collect();
                let call = format!(
                    "call {} @{}({})",
                    callee.signature.ret,
                    callee.name,
                    args.join(", ")
                );
                match dest {
                    Some(dest) => writeln!(f, "  {} = {}", self.dest(*dest), call),
                    None => writeln!(f, "  {}", call),
                }
            }
            Instruction::Br { target } => writeln!(f, "  br {}", self.label(*target)),
            Instruction::CondBr {
                cond,
                then_block,
                else_block,
            } => writeln!(
                f,
                "  br {}, {}, {}",
                self.typed(cond),
                self.label(*then_block),
                self.label(*else_block)
            ),
            Instruction::Ret { value: Some(value) } => writeln!(f, "  ret {}", self.typed(value)),
            Instruction::Ret { value: None } => writeln!(f, "  ret void"),
        }
    }

    fn function(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let function = self.function;
        let params: Vec<String> = function
            .signature
            .params
            .iter()
            .map(|p| p.to_string())
            .collect();

        if function.is_declaration() {
            return writeln!(
                f,
                "declare {} @{}({})",
                function.signature.ret,
                function.name,
                params.join(", ")
            );
        }

        writeln!(
            f,
            "define {} @{}({}) {{",
            function.signature.ret,
            function.name,
            params.join(", ")
        )?;
        for (i, block) in function.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", block.name)?;
            for instruction in block.instructions.iter() {
                self.instruction(f, instruction)?;
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in self.globals.iter() {
            match global.initializer {
                Some(Initializer::Zero) => writeln!(
                    f,
                    "@{} = {} global {} zeroinitializer",
                    global.name, global.linkage, global.ty
                )?,
                None => writeln!(f, "@{} = external global {}", global.name, global.ty)?,
            }
        }

        for function in self.functions.iter() {
            writeln!(f)?;
            Printer {
                module: self,
                function,
            }
            .function(f)?;
        }

        Ok(())
    }
}
