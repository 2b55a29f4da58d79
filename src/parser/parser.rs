use tracing::trace;

use crate::lexer::{lexer::Lexer, Position, TokenKind};

use super::{Ast, AstKind, NodeId, ParseError};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    nodes: Vec<AstKind>,
}

/// A `[` still waiting for its `]`, with the children collected so far
struct OpenLoop {
    at: Position,
    children: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Parser<'a> {
        Parser {
            lexer: Lexer::new(source),
            nodes: vec![],
        }
    }

    fn push(&mut self, node: AstKind) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Parses until the end of the stream and returns the top-level children.
    ///
    /// Open loops live on an explicit stack rather than the call stack, so nesting depth is
    /// only bounded by memory. A `]` closes the innermost open loop and is not part of its body.
    fn parse_sequence(&mut self) -> Result<Vec<NodeId>, ParseError> {
        let mut top = vec![];
        let mut open: Vec<OpenLoop> = vec![];

        loop {
            let leaf = match self.lexer.next_token() {
                TokenKind::PointerIncrement => AstKind::PointerIncrement,
                TokenKind::PointerDecrement => AstKind::PointerDecrement,
                TokenKind::ValueIncrement => AstKind::ValueIncrement,
                TokenKind::ValueDecrement => AstKind::ValueDecrement,
                TokenKind::Output => AstKind::Output,
                TokenKind::Input => AstKind::Input,
                TokenKind::LoopStart => {
                    open.push(OpenLoop {
                        at: self.lexer.position(),
                        children: vec![],
                    });
                    continue;
                }
                TokenKind::LoopEnd => match open.pop() {
                    Some(closed) => {
                        trace!(children = closed.children.len(), "closed loop");
                        AstKind::Loop(closed.children)
                    }
                    None => {
                        return Err(ParseError::UnexpectedClosingBracket {
                            at: self.lexer.position(),
                        })
                    }
                },
                TokenKind::Ignore => continue,
                TokenKind::EndOfStream => match open.last() {
                    Some(innermost) => {
                        return Err(ParseError::UnterminatedLoop { at: innermost.at })
                    }
                    None => return Ok(top),
                },
            };

            let id = self.push(leaf);
            match open.last_mut() {
                Some(innermost) => innermost.children.push(id),
                None => top.push(id),
            }
        }
    }

    pub fn parse_program(mut self) -> Result<Ast, ParseError> {
        let children = self.parse_sequence()?;
        let root = self.push(AstKind::Sequence(children));
        Ok(Ast::new(self.nodes, root))
    }
}

/// Parse a whole program
pub fn parse(source: &str) -> Result<Ast, ParseError> {
    Parser::new(source).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MissingBracket;

    #[test]
    fn empty_program_is_an_empty_sequence() {
        let ast = parse("").unwrap();
        assert_eq!(ast.node(ast.root()), &AstKind::Sequence(vec![]));
        assert!(ast.is_empty());
    }

    #[test]
    fn comments_are_dropped() {
        let ast = parse("hello + world .").unwrap();
        let kinds: Vec<_> = ast
            .children(ast.root())
            .iter()
            .map(|id| ast.node(*id).clone())
            .collect();
        assert_eq!(kinds, vec![AstKind::ValueIncrement, AstKind::Output]);
    }

    #[test]
    fn loops_nest() {
        let ast = parse("+[>[-]<]").unwrap();
        let top = ast.children(ast.root());
        assert_eq!(top.len(), 2);

        let outer = ast.children(top[1]);
        assert!(matches!(ast.node(top[1]), AstKind::Loop(_)));
        assert_eq!(outer.len(), 3);
        assert_eq!(ast.node(outer[0]), &AstKind::PointerIncrement);
        assert_eq!(ast.children(outer[1]).len(), 1);
        assert_eq!(ast.node(outer[2]), &AstKind::PointerDecrement);
        assert_eq!(ast.loop_count(), 2);
    }

    #[test]
    fn closing_bracket_is_not_part_of_the_body() {
        let ast = parse("[]").unwrap();
        let top = ast.children(ast.root());
        assert_eq!(ast.node(top[0]), &AstKind::Loop(vec![]));
        assert_eq!(ast.instruction_count(), 0);
    }

    #[test]
    fn stray_close_is_reported() {
        let err = parse("+\n+]").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedClosingBracket {
                at: Position { line: 2, col: 2 }
            }
        );
        assert_eq!(err.missing(), MissingBracket::Open);
    }

    #[test]
    fn unclosed_loop_points_at_its_bracket() {
        let err = parse("[]+[[+]").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnterminatedLoop {
                at: Position { line: 1, col: 4 }
            }
        );
        assert_eq!(err.missing(), MissingBracket::Close);
    }

    #[test]
    fn stops_at_first_error() {
        let err = parse("]]][[[").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedClosingBracket {
                at: Position { line: 1, col: 1 }
            }
        );
    }

    #[test]
    fn display_indents_loops() {
        let ast = parse("[.]").unwrap();
        assert_eq!(
            ast.to_string(),
            "{\n    while (*ptr != 0) {\n        <putchar>\n    }\n}\n"
        );
    }

    #[test]
    fn deep_nesting_does_not_use_the_call_stack() {
        let depth = 100_000;
        let source = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        let ast = parse(&source).unwrap();
        assert_eq!(ast.loop_count(), depth);

        let err = parse(&"[".repeat(depth)).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnterminatedLoop {
                at: Position { line: 1, col: depth }
            }
        );
    }

    #[test]
    fn display_handles_deep_nesting() {
        let depth = 1_000;
        let source = format!("{}+{}", "[".repeat(depth), "]".repeat(depth));
        let text = parse(&source).unwrap().to_string();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2 * depth + 3);
        assert_eq!(lines[depth + 1].trim_start(), "<*ptr++>");
        assert_eq!(lines[depth + 1].len() - "<*ptr++>".len(), 4 * (depth + 1));
        assert_eq!(lines.last(), Some(&"}"));
    }
}
