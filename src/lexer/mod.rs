pub mod lexer;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // `>`: Increment the `data pointer` by one
    PointerIncrement,
    // `<`: Decrement the `data pointer` by one
    PointerDecrement,

    // `+`: Increment the byte at the `data pointer` by one
    ValueIncrement,
    // `-`: Decrement the byte at the `data pointer` by one
    ValueDecrement,

    // `.`: Write the byte at the `data pointer` to the `output device`
    Output,
    // `,`: Read the next byte from the `input device` and write it to the `data pointer`
    Input,

    // `[`: Loop while the byte at the `data pointer` is non-zero
    LoopStart,
    // `]`: Closes the innermost open loop
    LoopEnd,

    // Every other character is a comment
    Ignore,

    // End of stream: no more tokens left, returned forever after
    EndOfStream,
}

impl TokenKind {
    pub fn from_char(c: char) -> TokenKind {
        match c {
            '>' => TokenKind::PointerIncrement,
            '<' => TokenKind::PointerDecrement,
            '+' => TokenKind::ValueIncrement,
            '-' => TokenKind::ValueDecrement,
            '.' => TokenKind::Output,
            ',' => TokenKind::Input,
            '[' => TokenKind::LoopStart,
            ']' => TokenKind::LoopEnd,
            _ => TokenKind::Ignore,
        }
    }

    /// The source character for this token, if it has exactly one
    pub fn as_char(&self) -> Option<char> {
        match self {
            TokenKind::PointerIncrement => Some('>'),
            TokenKind::PointerDecrement => Some('<'),
            TokenKind::ValueIncrement => Some('+'),
            TokenKind::ValueDecrement => Some('-'),
            TokenKind::Output => Some('.'),
            TokenKind::Input => Some(','),
            TokenKind::LoopStart => Some('['),
            TokenKind::LoopEnd => Some(']'),
            TokenKind::Ignore | TokenKind::EndOfStream => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_char() {
            Some(c) => write!(f, "{}", c),
            None if *self == TokenKind::Ignore => write!(f, "<ignore>"),
            None => write!(f, "<eof>"),
        }
    }
}

/// A line/column pair, both starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
