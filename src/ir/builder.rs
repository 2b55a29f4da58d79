use super::{
    BasicBlock, BinaryOp, BlockId, CastOp, Function, FunctionId, Instruction, IntPredicate,
    NameTable, Operand, Signature, Type, ValueId, ValueInfo,
};

/// Builds the body of one function, appending to the block at the current insertion point.
///
/// Nothing here checks that blocks are terminated properly; that is the verifier's job.
#[derive(Debug)]
pub struct FunctionBuilder {
    function: Function,
    names: NameTable,
    insert_point: Option<BlockId>,
}

impl FunctionBuilder {
    pub fn new(name: &str, signature: Signature) -> FunctionBuilder {
        FunctionBuilder {
            function: Function::declare(name, signature),
            names: NameTable::default(),
            insert_point: None,
        }
    }

    pub fn append_block(&mut self, name: &str) -> BlockId {
        let name = self.names.unique(name);
        self.function.blocks.push(BasicBlock {
            name,
            instructions: vec![],
        });
        BlockId(self.function.blocks.len() - 1)
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.insert_point = Some(block);
    }

    pub fn insert_block(&self) -> Option<BlockId> {
        self.insert_point
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn finish(self) -> Function {
        self.function
    }

    pub fn type_of(&self, operand: &Operand) -> Type {
        match operand {
            Operand::Value(id) => self.function.value(*id).ty.clone(),
            Operand::Global(_) => Type::Ptr,
            Operand::Const(ty, _) => ty.clone(),
        }
    }

    fn new_value(&mut self, name: &str, ty: Type) -> ValueId {
        let name = self.names.unique(name);
        self.function.values.push(ValueInfo { name, ty });
        ValueId(self.function.values.len() - 1)
    }

    fn push(&mut self, instruction: Instruction) {
        // building without a block is a bug in the caller
        let block = self
            .insert_point
            .expect("no insertion point set on the function builder");
        self.function.blocks[block.0].instructions.push(instruction);
    }

    pub fn alloca(&mut self, ty: Type, name: &str) -> Operand {
        let dest = self.new_value(name, Type::Ptr);
        self.push(Instruction::Alloca { dest, ty });
        Operand::Value(dest)
    }

    pub fn load(&mut self, ty: Type, ptr: Operand, name: &str) -> Operand {
        let dest = self.new_value(name, ty.clone());
        self.push(Instruction::Load { dest, ty, ptr });
        Operand::Value(dest)
    }

    pub fn store(&mut self, value: Operand, ptr: Operand) {
        self.push(Instruction::Store { value, ptr });
    }

    pub fn gep(&mut self, elem: Type, base: Operand, index: Operand, name: &str) -> Operand {
        let dest = self.new_value(name, Type::Ptr);
        self.push(Instruction::GetElementPtr {
            dest,
            elem,
            base,
            index,
        });
        Operand::Value(dest)
    }

    fn binary(&mut self, op: BinaryOp, lhs: Operand, rhs: Operand, name: &str) -> Operand {
        let ty = self.type_of(&lhs);
        let dest = self.new_value(name, ty);
        self.push(Instruction::Binary { dest, op, lhs, rhs });
        Operand::Value(dest)
    }

    pub fn add(&mut self, lhs: Operand, rhs: Operand, name: &str) -> Operand {
        self.binary(BinaryOp::Add, lhs, rhs, name)
    }

    pub fn sub(&mut self, lhs: Operand, rhs: Operand, name: &str) -> Operand {
        self.binary(BinaryOp::Sub, lhs, rhs, name)
    }

    pub fn icmp(
        &mut self,
        predicate: IntPredicate,
        lhs: Operand,
        rhs: Operand,
        name: &str,
    ) -> Operand {
        let dest = self.new_value(name, Type::I1);
        self.push(Instruction::ICmp {
            dest,
            predicate,
            lhs,
            rhs,
        });
        Operand::Value(dest)
    }

    pub fn cast(&mut self, op: CastOp, value: Operand, to: Type, name: &str) -> Operand {
        let dest = self.new_value(name, to.clone());
        self.push(Instruction::Cast {
            dest,
            op,
            value,
            to,
        });
        Operand::Value(dest)
    }

    /// Emit a call whose result, if any, is dropped
    pub fn call(&mut self, callee: FunctionId, args: Vec<Operand>) {
        self.push(Instruction::Call {
            dest: None,
            callee,
            args,
        });
    }

    /// Emit a call and name its result. Calling a `void` function this way builds a module the
    /// verifier rejects.
    pub fn call_value(
        &mut self,
        callee: FunctionId,
        signature: &Signature,
        args: Vec<Operand>,
        name: &str,
    ) -> Operand {
        let dest = self.new_value(name, signature.ret.clone());
        self.push(Instruction::Call {
            dest: Some(dest),
            callee,
            args,
        });
        Operand::Value(dest)
    }

    pub fn br(&mut self, target: BlockId) {
        self.push(Instruction::Br { target });
    }

    pub fn cond_br(&mut self, cond: Operand, then_block: BlockId, else_block: BlockId) {
        self.push(Instruction::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Option<Operand>) {
        self.push(Instruction::Ret { value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_signature() -> Signature {
        Signature {
            ret: Type::I32,
            params: vec![],
        }
    }

    #[test]
    fn names_are_made_unique() {
        let mut b = FunctionBuilder::new("main", main_signature());
        let first = b.append_block("loop_body");
        let second = b.append_block("loop_body");
        b.position_at_end(first);
        let slot = b.alloca(Type::I8, "cell");
        b.load(Type::I8, slot, "cell");

        let f = b.finish();
        assert_eq!(f.block(first).name, "loop_body");
        assert_eq!(f.block(second).name, "loop_body1");
        assert_eq!(f.value(ValueId(0)).name, "cell");
        assert_eq!(f.value(ValueId(1)).name, "cell1");
    }

    #[test]
    fn instructions_go_to_the_insertion_point() {
        let mut b = FunctionBuilder::new("main", main_signature());
        let entry = b.append_block("entry");
        let exit = b.append_block("exit");
        b.position_at_end(exit);
        b.ret(Some(Operand::Const(Type::I32, 0)));
        b.position_at_end(entry);
        b.br(exit);

        let f = b.finish();
        assert_eq!(f.block(entry).instructions, vec![Instruction::Br { target: exit }]);
        assert!(f.block(exit).terminator().is_some());
    }

    #[test]
    fn arithmetic_keeps_the_operand_type() {
        let mut b = FunctionBuilder::new("main", main_signature());
        let entry = b.append_block("entry");
        b.position_at_end(entry);
        let sum = b.add(Operand::Const(Type::I8, 1), Operand::Const(Type::I8, 2), "sum");
        assert_eq!(b.type_of(&sum), Type::I8);
        let wide = b.cast(CastOp::ZExt, sum, Type::I32, "wide");
        assert_eq!(b.type_of(&wide), Type::I32);
    }

    #[test]
    fn call_value_takes_the_return_type() {
        let getchar = Signature {
            ret: Type::I32,
            params: vec![],
        };
        let mut b = FunctionBuilder::new("main", main_signature());
        let entry = b.append_block("entry");
        b.position_at_end(entry);
        let read = b.call_value(FunctionId(0), &getchar, vec![], "read");
        b.call(FunctionId(1), vec![read.clone()]);

        assert_eq!(b.type_of(&read), Type::I32);
        let f = b.finish();
        assert!(matches!(
            f.blocks[0].instructions[..],
            [
                Instruction::Call { dest: Some(_), .. },
                Instruction::Call { dest: None, .. }
            ]
        ));
    }
}
