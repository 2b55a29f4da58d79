pub mod parser;

use std::fmt;

use thiserror::Error;

use crate::lexer::Position;

pub use self::parser::Parser;

/// Index of a node inside an [Ast]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstKind {
    /// Children run in order, once
    Sequence(Vec<NodeId>),
    /// Children run while the current cell is non-zero, tested before each pass
    Loop(Vec<NodeId>),

    PointerIncrement,
    PointerDecrement,

    ValueIncrement,
    ValueDecrement,

    Output,
    Input,
}

impl AstKind {
    pub fn children(&self) -> &[NodeId] {
        match self {
            AstKind::Sequence(children) | AstKind::Loop(children) => children,
            _ => &[],
        }
    }

    pub fn is_instruction(&self) -> bool {
        !matches!(self, AstKind::Sequence(_) | AstKind::Loop(_))
    }
}

/// The parsed program: an arena of nodes with a single `Sequence` root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ast {
    nodes: Vec<AstKind>,
    root: NodeId,
}

impl Ast {
    pub(crate) fn new(nodes: Vec<AstKind>, root: NodeId) -> Ast {
        Ast { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &AstKind {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    /// Every node reachable from the root, parents before children, in program order
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = vec![];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    pub fn instruction_count(&self) -> usize {
        self.walk()
            .into_iter()
            .filter(|id| self.node(*id).is_instruction())
            .count()
    }

    pub fn loop_count(&self) -> usize {
        self.walk()
            .into_iter()
            .filter(|id| matches!(self.node(*id), AstKind::Loop(_)))
            .count()
    }
}

enum Line {
    Node(NodeId, usize),
    Close(usize),
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // explicit stack, nesting depth is unbounded
        let mut lines = vec![Line::Node(self.root, 0)];
        while let Some(line) = lines.pop() {
            let (id, indent) = match line {
                Line::Node(id, indent) => (id, indent),
                Line::Close(indent) => {
                    writeln!(f, "{}}}", " ".repeat(indent))?;
                    continue;
                }
            };

            let pad = " ".repeat(indent);
            match self.node(id) {
                AstKind::Sequence(children) | AstKind::Loop(children) => {
                    if matches!(self.node(id), AstKind::Loop(_)) {
                        writeln!(f, "{}while (*ptr != 0) {{", pad)?;
                    } else {
                        writeln!(f, "{}{{", pad)?;
                    }
                    lines.push(Line::Close(indent));
                    lines.extend(children.iter().rev().map(|c| Line::Node(*c, indent + 4)));
                }
                AstKind::PointerIncrement => writeln!(f, "{}<ptr++>", pad)?,
                AstKind::PointerDecrement => writeln!(f, "{}<ptr-->", pad)?,
                AstKind::ValueIncrement => writeln!(f, "{}<*ptr++>", pad)?,
                AstKind::ValueDecrement => writeln!(f, "{}<*ptr-->", pad)?,
                AstKind::Output => writeln!(f, "{}<putchar>", pad)?,
                AstKind::Input => writeln!(f, "{}<getchar>", pad)?,
            }
        }
        Ok(())
    }
}

/// Which side of a bracket pair is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingBracket {
    Open,
    Close,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{at}: unexpected closing bracket ']' with no matching '['")]
    UnexpectedClosingBracket { at: Position },

    #[error("{at}: unterminated loop, missing closing bracket ']' for this '['")]
    UnterminatedLoop { at: Position },
}

impl ParseError {
    pub fn missing(&self) -> MissingBracket {
        match self {
            ParseError::UnexpectedClosingBracket { .. } => MissingBracket::Open,
            ParseError::UnterminatedLoop { .. } => MissingBracket::Close,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            ParseError::UnexpectedClosingBracket { at } | ParseError::UnterminatedLoop { at } => {
                *at
            }
        }
    }
}
