use std::str::FromStr;

use super::{ParseError, ParseResult};
use crate::value::TypeTag;

/// Byte cursor over a window `[pos, end)` of a source string.
///
/// Positions are absolute in `src`, so a window carved out for an operand
/// still reports errors against the full input.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    end: usize,
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            end: src.len(),
        }
    }

    pub fn window(src: &'a str, start: usize, end: usize) -> Self {
        Self {
            src,
            pos: start,
            end,
        }
    }

    pub fn src(&self) -> &'a str {
        self.src
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..self.end]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    pub fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.end
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    pub fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub fn eat_str(&mut self, s: &str) -> bool {
        self.skip_ws();
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Consumes a keyword (case-insensitive) that is not followed by an identifier character.
    pub fn eat_word(&mut self, word: &str) -> bool {
        self.skip_ws();
        if word_at(self.src, self.pos, self.end, word) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, c: char, expected: &str) -> ParseResult<()> {
        if self.eat(c) {
            return Ok(());
        }
        Err(self.error_here(expected))
    }

    /// Error for the current position: EOF, or an unexpected character.
    pub fn error_here(&self, expected: &str) -> ParseError {
        match self.peek() {
            None => ParseError::UnexpectedEof { position: self.pos },
            Some(_) if expected.is_empty() => self.unexpected(),
            Some(_) => ParseError::Expected {
                expected: expected.to_string(),
                position: self.pos,
            },
        }
    }

    pub fn unexpected(&self) -> ParseError {
        match self.peek() {
            None => ParseError::UnexpectedEof { position: self.pos },
            Some(found) => ParseError::UnexpectedChar {
                found,
                position: self.pos,
            },
        }
    }

    pub fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some(c) if is_ident_start(c) => {
                self.bump();
            }
            _ => return None,
        }
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.bump();
        }
        Some(&self.src[start..self.pos])
    }

    pub fn integer(&mut self) -> ParseResult<Option<i64>> {
        self.skip_ws();
        let start = self.pos;
        let negative = self.peek() == Some('-')
            && matches!(self.peek_nth(1), Some(c) if c.is_ascii_digit());
        if negative {
            self.bump();
        }
        if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.reset(start);
            return Ok(None);
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        i64::from_str(text)
            .map(Some)
            .map_err(|_| ParseError::IntegerOutOfRange {
                text: text.to_string(),
                position: start,
            })
    }

    /// Single-quoted string literal with `\n \t \r \\ \'` escapes.
    pub fn string_literal(&mut self) -> ParseResult<String> {
        self.skip_ws();
        let start = self.pos;
        if !self.eat('\'') {
            return Err(self.error_here("string literal"));
        }
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedString { position: start }),
                Some('\'') => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(ParseError::UnterminatedString { position: start }),
                    Some(c) => out.push(crate::value::syntax::unescape_char(c)),
                },
                Some(c) => out.push(c),
            }
        }
    }

    /// Optional `:type` suffix. Unrecognised type names roll back when `strict` is false.
    pub fn type_suffix(&mut self, strict: bool) -> ParseResult<Option<TypeTag>> {
        let save = self.pos;
        if !self.eat(':') {
            self.reset(save);
            return Ok(None);
        }
        self.skip_ws();
        let word_pos = self.pos;
        match self.ident() {
            Some(word) => match TypeTag::from_str(word) {
                Ok(tag) => Ok(Some(tag)),
                Err(_) if strict => Err(ParseError::UnknownType {
                    name: word.to_string(),
                    position: word_pos,
                }),
                Err(_) => {
                    self.reset(save);
                    Ok(None)
                }
            },
            None if strict => Err(self.error_here("type name")),
            None => {
                self.reset(save);
                Ok(None)
            }
        }
    }

    pub fn finish(&mut self) -> ParseResult<()> {
        if self.at_end() {
            return Ok(());
        }
        Err(ParseError::TrailingInput {
            rest: self.rest().to_string(),
            position: self.pos,
        })
    }
}

/// True when `word` (ASCII case-insensitive) sits at `pos` with identifier boundaries on both sides.
pub(crate) fn word_at(src: &str, pos: usize, end: usize, word: &str) -> bool {
    let stop = pos + word.len();
    if stop > end || !src.is_char_boundary(stop) {
        return false;
    }
    if !src[pos..stop].eq_ignore_ascii_case(word) {
        return false;
    }
    let before_ok = src[..pos]
        .chars()
        .next_back()
        .map_or(true, |c| !is_ident_char(c));
    let after_ok = src[stop..end].chars().next().map_or(true, |c| !is_ident_char(c));
    before_ok && after_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_boundaries() {
        let src = "x and andy";
        assert!(word_at(src, 2, src.len(), "and"));
        assert!(!word_at(src, 6, src.len(), "and"));
        assert!(word_at("AND", 0, 3, "and"));
    }

    #[test]
    fn test_integer_with_sign() {
        let mut cursor = Cursor::new("-42 rest");
        assert_eq!(cursor.integer().unwrap(), Some(-42));
        let mut cursor = Cursor::new("- 4");
        assert_eq!(cursor.integer().unwrap(), None);
        assert_eq!(cursor.pos(), 0);
    }

    #[test]
    fn test_type_suffix_rollback() {
        let mut cursor = Cursor::new(":Foo");
        assert_eq!(cursor.type_suffix(false).unwrap(), None);
        assert_eq!(cursor.pos(), 0);
        let mut cursor = Cursor::new(": int");
        assert_eq!(cursor.type_suffix(false).unwrap(), Some(TypeTag::Int));
        let mut cursor = Cursor::new(":Foo");
        assert!(matches!(
            cursor.type_suffix(true),
            Err(ParseError::UnknownType { .. })
        ));
    }
}
