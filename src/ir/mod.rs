//! An in-memory, LLVM-flavoured control flow graph.
//!
//! A [Module] holds globals and functions. A defined [Function] is a list of [BasicBlock]s, each
//! of which is a straight run of [Instruction]s that must end in exactly one terminator
//! (`br`, conditional `br` or `ret`). Values are in SSA form and are referred to by [ValueId];
//! the [builder::FunctionBuilder] is the only thing that creates them.

pub mod builder;
pub mod display;
pub mod verify;

use std::collections::HashMap;

pub use self::builder::FunctionBuilder;
pub use self::verify::{verify_function, verify_module, VerifyError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    /// Result of comparisons
    I1,
    I8,
    I32,
    /// An opaque pointer
    Ptr,
    Array(Box<Type>, usize),
}

impl Type {
    /// Size in bytes when stored in memory
    pub fn size(&self) -> usize {
        match self {
            Type::Void => 0,
            Type::I1 | Type::I8 => 1,
            Type::I32 => 4,
            Type::Ptr => 8,
            Type::Array(elem, len) => elem.size() * len,
        }
    }

    /// Width in bits for integer types
    pub fn int_width(&self) -> Option<u32> {
        match self {
            Type::I1 => Some(1),
            Type::I8 => Some(8),
            Type::I32 => Some(32),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Value(ValueId),
    /// The address of a global
    Global(GlobalId),
    /// An integer constant of the given type
    Const(Type, i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPredicate {
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    ZExt,
    Trunc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Alloca {
        dest: ValueId,
        ty: Type,
    },
    Load {
        dest: ValueId,
        ty: Type,
        ptr: Operand,
    },
    Store {
        value: Operand,
        ptr: Operand,
    },
    /// `base + index * size_of(elem)`
    GetElementPtr {
        dest: ValueId,
        elem: Type,
        base: Operand,
        index: Operand,
    },
    Binary {
        dest: ValueId,
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    ICmp {
        dest: ValueId,
        predicate: IntPredicate,
        lhs: Operand,
        rhs: Operand,
    },
    Cast {
        dest: ValueId,
        op: CastOp,
        value: Operand,
        to: Type,
    },
    Call {
        dest: Option<ValueId>,
        callee: FunctionId,
        args: Vec<Operand>,
    },

    // terminators
    Br {
        target: BlockId,
    },
    CondBr {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret {
        value: Option<Operand>,
    },
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Br { .. } | Instruction::CondBr { .. } | Instruction::Ret { .. }
        )
    }

    /// The value this instruction defines, if any
    pub fn dest(&self) -> Option<ValueId> {
        match self {
            Instruction::Alloca { dest, .. }
            | Instruction::Load { dest, .. }
            | Instruction::GetElementPtr { dest, .. }
            | Instruction::Binary { dest, .. }
            | Instruction::ICmp { dest, .. }
            | Instruction::Cast { dest, .. } => Some(*dest),
            Instruction::Call { dest, .. } => *dest,
            Instruction::Store { .. }
            | Instruction::Br { .. }
            | Instruction::CondBr { .. }
            | Instruction::Ret { .. } => None,
        }
    }

    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Instruction::Alloca { .. } | Instruction::Br { .. } => vec![],
            Instruction::Load { ptr, .. } => vec![ptr],
            Instruction::Store { value, ptr } => vec![value, ptr],
            Instruction::GetElementPtr { base, index, .. } => vec![base, index],
            Instruction::Binary { lhs, rhs, .. } | Instruction::ICmp { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            Instruction::Cast { value, .. } => vec![value],
            Instruction::Call { args, .. } => args.iter().collect(),
            Instruction::CondBr { cond, .. } => vec![cond],
            Instruction::Ret { value } => value.iter().collect(),
        }
    }

    /// Blocks this instruction may transfer control to
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Instruction::Br { target } => vec![*target],
            Instruction::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => vec![],
        }
    }
}

/// A straight run of instructions, ending in one terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub name: String,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueInfo {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    External,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub ret: Type,
    pub params: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub signature: Signature,
    pub linkage: Linkage,
    /// Empty for declarations
    pub blocks: Vec<BasicBlock>,
    pub values: Vec<ValueInfo>,
}

impl Function {
    pub fn declare(name: &str, signature: Signature) -> Function {
        Function {
            name: name.to_string(),
            signature,
            linkage: Linkage::External,
            blocks: vec![],
            values: vec![],
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    pub fn value(&self, id: ValueId) -> &ValueInfo {
        &self.values[id.0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initializer {
    Zero,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub name: String,
    pub ty: Type,
    pub linkage: Linkage,
    /// `None` for globals defined elsewhere
    pub initializer: Option<Initializer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    pub name: String,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: &str) -> Module {
        Module {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn add_global(&mut self, global: Global) -> GlobalId {
        self.globals.push(global);
        GlobalId(self.globals.len() - 1)
    }

    pub fn add_function(&mut self, function: Function) -> FunctionId {
        self.functions.push(function);
        FunctionId(self.functions.len() - 1)
    }

    /// Reserve a slot for a function whose body is built later
    pub fn reserve_function(&mut self, name: &str, signature: Signature) -> FunctionId {
        self.add_function(Function::declare(name, signature))
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.0]
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0]
    }

    pub fn function_by_name(&self, name: &str) -> Option<(FunctionId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(i, f)| (FunctionId(i), f))
    }

    pub fn global_by_name(&self, name: &str) -> Option<(GlobalId, &Global)> {
        self.globals
            .iter()
            .enumerate()
            .find(|(_, g)| g.name == name)
            .map(|(i, g)| (GlobalId(i), g))
    }

    /// Type of an operand, as seen from inside `function`
    pub fn operand_type(&self, function: &Function, operand: &Operand) -> Type {
        match operand {
            Operand::Value(id) => function.value(*id).ty.clone(),
            Operand::Global(_) => Type::Ptr,
            Operand::Const(ty, _) => ty.clone(),
        }
    }
}

/// Hands out names that are unique within a function, LLVM style: `ptr`, `ptr1`, `ptr2`...
#[derive(Debug, Default)]
pub(crate) struct NameTable {
    used: HashMap<String, usize>,
}

impl NameTable {
    pub fn unique(&mut self, hint: &str) -> String {
        let count = self.used.entry(hint.to_string()).or_insert(0);
        let name = if *count == 0 {
            hint.to_string()
        } else {
            format!("{}{}", hint, count)
        };
        *count += 1;
        name
    }
}
