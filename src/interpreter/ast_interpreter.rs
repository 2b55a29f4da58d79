use crate::parser::{Ast, AstKind, NodeId};

use super::{Result, Runtime};

/// Runs the AST directly; the baseline the IR is checked against
pub struct AstInterpreter {}

impl AstInterpreter {
    pub fn new() -> Self {
        Self {}
    }

    pub fn interpret(&mut self, runtime: &mut Runtime, program: &Ast) -> Result<()> {
        // one frame per sequence being run, kept off the call stack so nesting depth is unbounded
        let mut frames = vec![Frame {
            body: program.children(program.root()),
            pc: 0,
            repeats: false,
        }];

        while let Some(frame) = frames.last_mut() {
            let Some(&id) = frame.body.get(frame.pc) else {
                // written this way since the upper-most sequence (program) doesn't repeat
                if frame.repeats && !runtime.value_is_zero()? {
                    frame.pc = 0;
                } else {
                    frames.pop();
                }
                continue;
            };
            frame.pc += 1;

            match program.node(id) {
                AstKind::Sequence(children) => frames.push(Frame {
                    body: children,
                    pc: 0,
                    repeats: false,
                }),
                AstKind::Loop(body) => {
                    if !runtime.value_is_zero()? {
                        frames.push(Frame {
                            body,
                            pc: 0,
                            repeats: true,
                        });
                    }
                }
                AstKind::PointerIncrement => runtime.shift_data_pointer(1),
                AstKind::PointerDecrement => runtime.shift_data_pointer(-1),
                AstKind::ValueIncrement => runtime.deref_and_add_value(1)?,
                AstKind::ValueDecrement => runtime.deref_and_sub_value(1)?,
                AstKind::Output => runtime.write()?,
                AstKind::Input => runtime.read()?,
            }
        }
        Ok(())
    }
}

struct Frame<'a> {
    body: &'a [NodeId],
    pc: usize,
    /// Loops re-test the cell at the end of their body
    repeats: bool,
}

impl Default for AstInterpreter {
    fn default() -> Self {
        Self::new()
    }
}
