//! Character-level scanning of uplinked scripts

use super::ParseError;

/// Keyword starting an invocation
pub const INVOKE_KEYWORD: &str = "INVOKE";

/// Keyword marking the end of a script
pub const END_KEYWORD: &str = "SCRIPT_END";

/// djb2 string hash (Dan Bernstein)
pub fn djb2(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(5381u64, |hash, &b| hash.wrapping_mul(33).wrapping_add(b as u64))
}

/// Identifiers the grammar recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Invoke,
    End,
}

impl Symbol {
    fn classify(text: &[u8]) -> Option<Symbol> {
        let hash = djb2(text);
        if hash == djb2(INVOKE_KEYWORD.as_bytes()) {
            Some(Symbol::Invoke)
        } else if hash == djb2(END_KEYWORD.as_bytes()) {
            Some(Symbol::End)
        } else {
            None
        }
    }
}

fn is_space(ch: u8) -> bool {
    matches!(ch, b' ' | b'\r' | b'\n')
}

fn is_symbol_char(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

/// Cursor over one script buffer
pub struct Lexer<'a> {
    script: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self { script, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.script.get(self.pos).copied()
    }

    fn skip_space(&mut self) {
        while self.peek().is_some_and(is_space) {
            self.pos += 1;
        }
    }

    /// Read the next identifier
    ///
    /// Running out of input counts as the end symbol.
    pub fn symbol(&mut self) -> Result<Symbol, ParseError> {
        self.skip_space();
        if self.peek().is_none() {
            return Ok(Symbol::End);
        }

        let start = self.pos;
        while self.peek().is_some_and(is_symbol_char) {
            self.pos += 1;
        }

        let text = &self.script[start..self.pos];
        Symbol::classify(text)
            .ok_or_else(|| ParseError::UnknownSymbol(String::from_utf8_lossy(text).into_owned()))
    }

    /// Consume `expected` after any whitespace, or fail
    pub fn expect(&mut self, expected: u8) -> Result<(), ParseError> {
        self.skip_space();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(ParseError::UnexpectedCharacter {
                expected: expected as char,
                found: found as char,
                offset: self.pos,
            }),
            None => Err(ParseError::UnexpectedEnd {
                expected: expected as char,
            }),
        }
    }

    /// Consume `expected` if it comes next; the cursor stays put otherwise
    pub fn accept(&mut self, expected: u8) -> bool {
        self.skip_space();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Read a `"`-delimited string
    ///
    /// There are no escapes: the next `"` always closes the string.
    pub fn string(&mut self) -> Result<&'a [u8], ParseError> {
        self.expect(b'"')?;

        let start = self.pos;
        let len = self.script[start..]
            .iter()
            .position(|&ch| ch == b'"')
            .ok_or(ParseError::UnterminatedString { offset: start - 1 })?;

        self.pos = start + len + 1;
        Ok(&self.script[start..start + len])
    }
}
