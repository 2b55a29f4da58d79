use crate::ir::{BlockId, CastOp, IntPredicate, Operand, Type};
use crate::parser::{Ast, AstKind, NodeId};

use super::Context;

enum Step {
    Lower(NodeId),
    /// Jump back to `condition` and continue in `after_loop`
    CloseLoop {
        condition: BlockId,
        after_loop: BlockId,
    },
}

/// Lower one node (and everything under it) at the current insertion point.
///
/// Pending work lives on an explicit stack, so loop nesting depth is not limited by the call stack.
pub fn lower_node(ast: &Ast, id: NodeId, cx: &mut Context) {
    let mut steps = vec![Step::Lower(id)];
    while let Some(step) = steps.pop() {
        let id = match step {
            Step::Lower(id) => id,
            Step::CloseLoop {
                condition,
                after_loop,
            } => {
                cx.builder.br(condition);
                cx.builder.position_at_end(after_loop);
                continue;
            }
        };

        match ast.node(id) {
            AstKind::Sequence(children) => {
                steps.extend(children.iter().rev().map(|c| Step::Lower(*c)));
            }
            AstKind::Loop(body) => {
                let (condition, after_loop) = open_loop(cx);
                steps.push(Step::CloseLoop {
                    condition,
                    after_loop,
                });
                steps.extend(body.iter().rev().map(|c| Step::Lower(*c)));
            }
            AstKind::PointerIncrement => move_pointer(cx, 1),
            AstKind::PointerDecrement => move_pointer(cx, -1),
            AstKind::ValueIncrement => change_value(cx, 1),
            AstKind::ValueDecrement => change_value(cx, -1),
            AstKind::Output => output(cx),
            AstKind::Input => input(cx),
        }
    }
}

fn load_pointer(cx: &mut Context) -> Operand {
    let slot = cx.tape_pointer.clone();
    cx.builder.load(Type::Ptr, slot, "ptr")
}

fn move_pointer(cx: &mut Context, by: i64) {
    let ptr = load_pointer(cx);
    let moved = cx
        .builder
        .gep(Type::I8, ptr, Operand::Const(Type::I32, by), "moved_ptr");
    let slot = cx.tape_pointer.clone();
    cx.builder.store(moved, slot);
}

/// `add`/`sub` on `i8` wrap modulo 256
fn change_value(cx: &mut Context, by: i64) {
    let ptr = load_pointer(cx);
    let cell = cx.builder.load(Type::I8, ptr.clone(), "cell");
    let one = Operand::Const(Type::I8, 1);
    let changed = if by > 0 {
        cx.builder.add(cell, one, "inc")
    } else {
        cx.builder.sub(cell, one, "dec")
    };
    cx.builder.store(changed, ptr);
}

fn output(cx: &mut Context) {
    let ptr = load_pointer(cx);
    let cell = cx.builder.load(Type::I8, ptr, "cell");
    let wide = cx.builder.cast(CastOp::ZExt, cell, Type::I32, "wide");

    cx.builder.call(cx.putchar.id, vec![wide]);

    // unbuffered: flush after every character
    let stream = cx
        .builder
        .load(Type::Ptr, Operand::Global(cx.stdout), "stdout_stream");
    cx.builder.call(cx.fflush.id, vec![stream]);
}

fn input(cx: &mut Context) {
    let getchar = cx.getchar.clone();
    let read = cx
        .builder
        .call_value(getchar.id, &getchar.signature, vec![], "read");
    let byte = cx.builder.cast(CastOp::Trunc, read, Type::I8, "byte");
    let ptr = load_pointer(cx);
    cx.builder.store(byte, ptr);
}

/// condition: `*ptr != 0` ? body : after. Leaves the builder in `loop_body`; the body's end
/// jumps back to condition once it has been lowered.
fn open_loop(cx: &mut Context) -> (BlockId, BlockId) {
    let condition = cx.builder.append_block("condition");
    let loop_body = cx.builder.append_block("loop_body");
    let after_loop = cx.builder.append_block("after_loop");

    cx.builder.br(condition);

    cx.builder.position_at_end(condition);
    let ptr = load_pointer(cx);
    let cell = cx.builder.load(Type::I8, ptr, "cell");
    let nonzero = cx
        .builder
        .icmp(IntPredicate::Ne, cell, Operand::Const(Type::I8, 0), "cmp");
    cx.builder.cond_br(nonzero, loop_body, after_loop);

    cx.builder.position_at_end(loop_body);
    (condition, after_loop)
}
