use super::{Position, TokenKind};

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    /** Human Readable positions in file */
    pub cur_line: usize,
    pub cur_col: usize,

    /** 'raw' format / offset within the file (in terms of 'codepoints') */
    pub codepoint_offset: usize,

    chars: std::iter::Peekable<std::str::Chars<'a>>,

    /// Position of the character that produced the last consumed token
    last_position: Position,
}

impl<'a> Lexer<'a> {
    pub fn new(chars: &'a str) -> Lexer<'a> {
        Lexer {
            cur_col: 1,
            cur_line: 1,

            codepoint_offset: 0,

            chars: chars.chars().peekable(),
            last_position: Position { line: 1, col: 1 },
        }
    }

    fn consume_char(&mut self) -> Option<char> {
        match self.chars.next() {
            Some(c) => {
                self.last_position = Position {
                    line: self.cur_line,
                    col: self.cur_col,
                };

                self.cur_col += 1;
                if c == '\n' {
                    self.cur_line += 1;
                    self.cur_col = 1;
                }
                self.codepoint_offset += 1;
                Some(c)
            }
            None => None,
        }
    }

    /// Look at the next token without consuming it
    pub fn peek(&mut self) -> TokenKind {
        match self.chars.peek() {
            Some(&c) => TokenKind::from_char(c),
            None => TokenKind::EndOfStream,
        }
    }

    /// Consume the next character and return its token.
    /// Keeps returning `EndOfStream` once the input is exhausted.
    pub fn next_token(&mut self) -> TokenKind {
        match self.consume_char() {
            Some(c) => TokenKind::from_char(c),
            None => TokenKind::EndOfStream,
        }
    }

    /// Where the most recently consumed token came from
    pub fn position(&self) -> Position {
        self.last_position
    }

    /// Drain the stream, mostly useful for dumping tokens
    pub fn collect_tokens(&mut self) -> Vec<TokenKind> {
        let mut v = vec![];
        loop {
            match self.next_token() {
                TokenKind::EndOfStream => break v,
                tok => v.push(tok),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_operator() {
        let mut lexer = Lexer::new("><+-.,[]");
        assert_eq!(
            lexer.collect_tokens(),
            vec![
                TokenKind::PointerIncrement,
                TokenKind::PointerDecrement,
                TokenKind::ValueIncrement,
                TokenKind::ValueDecrement,
                TokenKind::Output,
                TokenKind::Input,
                TokenKind::LoopStart,
                TokenKind::LoopEnd,
            ]
        );
    }

    #[test]
    fn everything_else_is_ignored() {
        let mut lexer = Lexer::new("a \n#é");
        assert!(lexer
            .collect_tokens()
            .iter()
            .all(|tok| *tok == TokenKind::Ignore));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new("+-");
        assert_eq!(lexer.peek(), TokenKind::ValueIncrement);
        assert_eq!(lexer.peek(), TokenKind::ValueIncrement);
        assert_eq!(lexer.next_token(), TokenKind::ValueIncrement);
        assert_eq!(lexer.peek(), TokenKind::ValueDecrement);
    }

    #[test]
    fn end_of_stream_is_sticky() {
        let mut lexer = Lexer::new(".");
        assert_eq!(lexer.next_token(), TokenKind::Output);
        for _ in 0..3 {
            assert_eq!(lexer.peek(), TokenKind::EndOfStream);
            assert_eq!(lexer.next_token(), TokenKind::EndOfStream);
        }
    }

    #[test]
    fn tracks_positions_across_lines() {
        let mut lexer = Lexer::new("+\n [");
        lexer.next_token();
        assert_eq!(lexer.position(), Position { line: 1, col: 1 });
        lexer.next_token();
        lexer.next_token();
        assert_eq!(lexer.next_token(), TokenKind::LoopStart);
        assert_eq!(lexer.position(), Position { line: 2, col: 2 });
    }
}
