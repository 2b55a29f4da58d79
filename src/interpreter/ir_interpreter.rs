//! Executes a generated [Module] on a [Runtime].
//!
//! Only the shapes the code generator emits are understood: the tape global is backed by the
//! runtime's tape, other pointer globals (like `stdout`) are opaque handles, `alloca` slots hold
//! a single value each, and the only external routines are `putchar`, `getchar` and `fflush`.

use std::collections::HashMap;

use tracing::trace;

use crate::codegen::{ENTRY_POINT, FFLUSH, GETCHAR, PUTCHAR, TAPE_GLOBAL};
use crate::ir::{
    BinaryOp, BlockId, CastOp, Function, GlobalId, Instruction, IntPredicate, Module, Operand,
    Type, ValueId,
};

use super::{Result, Runtime, RuntimeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Tape,
    Slot(ValueId),
    Global(GlobalId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pointer {
    region: Region,
    offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value {
    /// Stored zero-extended to 64 bits, already truncated to the value's width
    Int(u64),
    Ptr(Pointer),
}

fn truncate(value: u64, width: u32) -> u64 {
    if width >= 64 {
        value
    } else {
        value & ((1u64 << width) - 1)
    }
}

fn sign_extend(value: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

fn width_of(ty: &Type) -> Result<u32> {
    ty.int_width()
        .ok_or_else(|| RuntimeError::Unsupported(format!("{} is not an integer type", ty)))
}

pub struct IrInterpreter {
    /// Stop after this many instructions, `None` runs forever
    step_limit: Option<u64>,
}

impl IrInterpreter {
    pub fn new() -> Self {
        Self { step_limit: None }
    }

    pub fn with_step_limit(limit: u64) -> Self {
        Self {
            step_limit: Some(limit),
        }
    }

    /// Run the entry point to completion and return its exit status
    pub fn run(&mut self, runtime: &mut Runtime, module: &Module) -> Result<i32> {
        let (_, function) = module
            .function_by_name(ENTRY_POINT)
            .filter(|(_, f)| !f.is_declaration())
            .ok_or_else(|| RuntimeError::Unsupported(format!("no `{}` to run", ENTRY_POINT)))?;

        let tape = match module.global_by_name(TAPE_GLOBAL) {
            Some((id, global)) => {
                if global.ty != Type::Array(Box::new(Type::I8), runtime.tape().len()) {
                    return Err(RuntimeError::Unsupported(format!(
                        "tape global is {} but the runtime has {} cells",
                        global.ty,
                        runtime.tape().len()
                    )));
                }
                Some(id)
            }
            None => None,
        };

        let mut frame = Frame {
            module,
            function,
            runtime,
            tape,
            values: vec![None; function.values.len()],
            slots: HashMap::new(),
        };

        let mut steps = 0u64;
        let mut block = BlockId(0);
        'blocks: loop {
            trace!(block = %function.block(block).name, "entering block");
            for instruction in function.block(block).instructions.iter() {
                steps += 1;
                if let Some(limit) = self.step_limit {
                    if steps > limit {
                        return Err(RuntimeError::StepLimitExceeded(limit));
                    }
                }

                match frame.execute(instruction)? {
                    Flow::Next => {}
                    Flow::Jump(target) => {
                        block = target;
                        continue 'blocks;
                    }
                    Flow::Return(status) => return Ok(status),
                }
            }

            return Err(RuntimeError::Unsupported(format!(
                "fell off the end of block `{}`",
                function.block(block).name
            )));
        }
    }
}

impl Default for IrInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

enum Flow {
    Next,
    Jump(BlockId),
    Return(i32),
}

struct Frame<'a> {
    module: &'a Module,
    function: &'a Function,
    runtime: &'a mut Runtime,
    tape: Option<GlobalId>,
    values: Vec<Option<Value>>,
    slots: HashMap<ValueId, Value>,
}

impl<'a> Frame<'a> {
    fn eval(&self, operand: &Operand) -> Result<Value> {
        match operand {
            Operand::Value(id) => self.values[id.0].ok_or_else(|| {
                RuntimeError::Unsupported(format!(
                    "%{} used before it was defined",
                    self.function.value(*id).name
                ))
            }),
            Operand::Global(id) if Some(*id) == self.tape => Ok(Value::Ptr(Pointer {
                region: Region::Tape,
                offset: 0,
            })),
            Operand::Global(id) => Ok(Value::Ptr(Pointer {
                region: Region::Global(*id),
                offset: 0,
            })),
            Operand::Const(ty, value) => Ok(Value::Int(truncate(*value as u64, width_of(ty)?))),
        }
    }

    fn eval_int(&self, operand: &Operand) -> Result<u64> {
        match self.eval(operand)? {
            Value::Int(value) => Ok(value),
            Value::Ptr(_) => Err(RuntimeError::Unsupported(
                "expected an integer, found a pointer".into(),
            )),
        }
    }

    fn eval_ptr(&self, operand: &Operand) -> Result<Pointer> {
        match self.eval(operand)? {
            Value::Ptr(ptr) => Ok(ptr),
            Value::Int(_) => Err(RuntimeError::Unsupported(
                "expected a pointer, found an integer".into(),
            )),
        }
    }

    fn define(&mut self, dest: ValueId, value: Value) {
        self.values[dest.0] = Some(value);
    }

    fn dest_width(&self, dest: ValueId) -> Result<u32> {
        width_of(&self.function.value(dest).ty)
    }

    fn load(&self, ty: &Type, ptr: Pointer) -> Result<Value> {
        match ptr.region {
            Region::Tape if *ty == Type::I8 => {
                let index = self.runtime.check_pointer(ptr.offset)?;
                Ok(Value::Int(u64::from(self.runtime.tape()[index])))
            }
            Region::Slot(slot) if ptr.offset == 0 => {
                self.slots.get(&slot).copied().ok_or_else(|| {
                    RuntimeError::Unsupported("load from an uninitialized slot".into())
                })
            }
            // opaque handles, e.g. `stdout`
            Region::Global(_) if *ty == Type::Ptr && ptr.offset == 0 => Ok(Value::Ptr(ptr)),
            _ => Err(RuntimeError::Unsupported(format!(
                "load of {} from {:?}",
                ty, ptr
            ))),
        }
    }

    fn store(&mut self, value: Value, ptr: Pointer) -> Result<()> {
        match (ptr.region, value) {
            (Region::Tape, Value::Int(byte)) => {
                let index = self.runtime.check_pointer(ptr.offset)?;
                self.runtime.tape_mut()[index] = byte as u8;
                Ok(())
            }
            (Region::Slot(slot), value) if ptr.offset == 0 => {
                self.slots.insert(slot, value);
                Ok(())
            }
            _ => Err(RuntimeError::Unsupported(format!("store to {:?}", ptr))),
        }
    }

    fn call(&mut self, name: &str, args: &[Operand]) -> Result<i32> {
        match name {
            PUTCHAR => {
                let arg = args
                    .first()
                    .ok_or_else(|| RuntimeError::Unsupported("putchar without an argument".into()))?;
                let c = self.eval_int(arg)? as u32 as i32;
                self.runtime.putchar(c)
            }
            GETCHAR => self.runtime.getchar(),
            FFLUSH => {
                self.runtime.flush()?;
                Ok(0)
            }
            other => Err(RuntimeError::UnknownExternal(other.to_string())),
        }
    }

    fn execute(&mut self, instruction: &Instruction) -> Result<Flow> {
        match instruction {
            Instruction::Alloca { dest, .. } => {
                let ptr = Pointer {
                    region: Region::Slot(*dest),
                    offset: 0,
                };
                self.define(*dest, Value::Ptr(ptr));
            }
            Instruction::Load { dest, ty, ptr } => {
                let ptr = self.eval_ptr(ptr)?;
                let value = self.load(ty, ptr)?;
                self.define(*dest, value);
            }
            Instruction::Store { value, ptr } => {
                let value = self.eval(value)?;
                let ptr = self.eval_ptr(ptr)?;
                self.store(value, ptr)?;
            }
            Instruction::GetElementPtr {
                dest,
                elem,
                base,
                index,
            } => {
                let base = self.eval_ptr(base)?;
                let index_width = width_of(&self.module.operand_type(self.function, index))?;
                let index = sign_extend(self.eval_int(index)?, index_width);
                let moved = Pointer {
                    offset: base.offset + index * elem.size() as i64,
                    ..base
                };
                self.define(*dest, Value::Ptr(moved));
            }
            Instruction::Binary { dest, op, lhs, rhs } => {
                let (lhs, rhs) = (self.eval_int(lhs)?, self.eval_int(rhs)?);
                let result = match op {
                    BinaryOp::Add => lhs.wrapping_add(rhs),
                    BinaryOp::Sub => lhs.wrapping_sub(rhs),
                };
                let width = self.dest_width(*dest)?;
                self.define(*dest, Value::Int(truncate(result, width)));
            }
            Instruction::ICmp {
                dest,
                predicate,
                lhs,
                rhs,
            } => {
                let equal = self.eval(lhs)? == self.eval(rhs)?;
                let result = match predicate {
                    IntPredicate::Ne => !equal,
                };
                self.define(*dest, Value::Int(u64::from(result)));
            }
            Instruction::Cast {
                dest,
                op,
                value,
                to,
            } => {
                let raw = self.eval_int(value)?;
                let to = width_of(to)?;
                let result = match op {
                    CastOp::ZExt | CastOp::Trunc => truncate(raw, to),
                };
                self.define(*dest, Value::Int(result));
            }
            Instruction::Call { dest, callee, args } => {
                let module = self.module;
                let result = self.call(&module.function(*callee).name, args)?;
                if let Some(dest) = dest {
                    let width = self.dest_width(*dest)?;
                    self.define(*dest, Value::Int(truncate(result as u32 as u64, width)));
                }
            }
            Instruction::Br { target } => return Ok(Flow::Jump(*target)),
            Instruction::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                let target = if self.eval_int(cond)? != 0 {
                    then_block
                } else {
                    else_block
                };
                return Ok(Flow::Jump(*target));
            }
            Instruction::Ret { value } => {
                let status = match value {
                    Some(value) => self.eval_int(value)? as u32 as i32,
                    None => 0,
                };
                return Ok(Flow::Return(status));
            }
        }
        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{generate, TAPE_SIZE};
    use crate::interpreter::SharedBuffer;
    use crate::parser::parser::parse;

    fn run(source: &str, input: &'static [u8]) -> (Runtime, Vec<u8>, i32) {
        let module = generate(&parse(source).unwrap()).unwrap();
        let out = SharedBuffer::new();
        let mut rt = Runtime::new(TAPE_SIZE, Box::new(input), Box::new(out.clone()));
        let status = IrInterpreter::with_step_limit(1_000_000)
            .run(&mut rt, &module)
            .unwrap();
        (rt, out.contents(), status)
    }

    #[test]
    fn empty_program_returns_zero() {
        let (rt, out, status) = run("", b"");
        assert_eq!(status, 0);
        assert!(out.is_empty());
        assert!(rt.tape().iter().all(|c| *c == 0));
    }

    #[test]
    fn bytes_wrap_at_both_ends() {
        let (rt, _, _) = run("->+<", b"");
        assert_eq!(rt.tape()[..2], [255, 1]);

        let (rt, _, _) = run("-+", b"");
        assert_eq!(rt.tape()[0], 0);
    }

    #[test]
    fn high_bytes_are_written_unsigned() {
        let (_, out, _) = run("-.", b"");
        assert_eq!(out, vec![255]);
    }

    #[test]
    fn end_of_input_stores_255() {
        let (rt, _, _) = run(",>,", b"x");
        assert_eq!(rt.tape()[..2], [b'x', 255]);
    }

    #[test]
    fn moving_off_the_tape_is_a_runtime_error() {
        let module = generate(&parse("<+").unwrap()).unwrap();
        let mut rt = Runtime::new(TAPE_SIZE, Box::new(&b""[..]), Box::new(SharedBuffer::new()));
        assert!(matches!(
            IrInterpreter::new().run(&mut rt, &module),
            Err(RuntimeError::OutOfBounds { pointer: -1, .. })
        ));
    }

    #[test]
    fn infinite_loops_hit_the_step_limit() {
        let module = generate(&parse("+[]").unwrap()).unwrap();
        let mut rt = Runtime::new(TAPE_SIZE, Box::new(&b""[..]), Box::new(SharedBuffer::new()));
        assert!(matches!(
            IrInterpreter::with_step_limit(500).run(&mut rt, &module),
            Err(RuntimeError::StepLimitExceeded(500))
        ));
    }

    #[test]
    fn tape_size_must_match() {
        let module = generate(&parse("+").unwrap()).unwrap();
        let mut rt = Runtime::new(16, Box::new(&b""[..]), Box::new(SharedBuffer::new()));
        assert!(matches!(
            IrInterpreter::new().run(&mut rt, &module),
            Err(RuntimeError::Unsupported(_))
        ));
    }
}
