use std::str::FromStr;

use super::cursor::{is_ident_start, Cursor};
use super::{ParseError, ParseResult};
use crate::ast::{ArithOp, Builtin, Term};

/// Parses an arithmetic/data term such as `x + 2 * length(l)` or `(a, [1, 2])`.
///
/// `*` and `/` bind tighter than `+` and `-`; all four are left-associative.
#[tracing::instrument(level = "debug")]
pub fn parse_term(input: &str) -> ParseResult<Term> {
    let src = input.trim();
    let mut parser = TermParser::new(Cursor::new(src));
    let term = parser.parse_expr()?;
    parser.cursor.finish()?;
    Ok(term)
}

pub(crate) struct TermParser<'a> {
    pub(crate) cursor: Cursor<'a>,
}

impl<'a> TermParser<'a> {
    pub fn new(cursor: Cursor<'a>) -> Self {
        Self { cursor }
    }

    /// Parses the whole window or fails.
    pub fn parse_complete(mut self) -> ParseResult<Term> {
        let term = self.parse_expr()?;
        self.cursor.finish()?;
        Ok(term)
    }

    pub fn parse_expr(&mut self) -> ParseResult<Term> {
        let mut left = self.parse_product()?;
        loop {
            self.cursor.skip_ws();
            let op = match self.cursor.peek() {
                Some('+') => ArithOp::Add,
                Some('-') => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.cursor.bump();
            let right = self.parse_product()?;
            left = Term::binop(op, left, right);
        }
    }

    fn parse_product(&mut self) -> ParseResult<Term> {
        let mut left = self.parse_factor()?;
        loop {
            self.cursor.skip_ws();
            let op = match self.cursor.peek() {
                Some('*') => ArithOp::Mul,
                Some('/') => ArithOp::Div,
                _ => return Ok(left),
            };
            self.cursor.bump();
            let right = self.parse_factor()?;
            left = Term::binop(op, left, right);
        }
    }

    pub fn parse_factor(&mut self) -> ParseResult<Term> {
        self.cursor.skip_ws();
        let start = self.cursor.pos();
        match self.cursor.peek() {
            None => Err(ParseError::UnexpectedEof { position: start }),
            Some('(') => self.parse_group(),
            Some('[') => self.parse_list(),
            Some('\'') => Ok(Term::StringLit(self.cursor.string_literal()?)),
            Some(c) if c.is_ascii_digit() || c == '-' => match self.cursor.integer()? {
                Some(n) => Ok(Term::IntLit(n)),
                None => Err(self.cursor.unexpected()),
            },
            Some(c) if is_ident_start(c) => self.parse_identifier(),
            Some(_) => Err(self.cursor.unexpected()),
        }
    }

    fn parse_group(&mut self) -> ParseResult<Term> {
        let open = self.cursor.pos();
        self.cursor.bump();
        let first = self.parse_expr()?;
        if self.cursor.eat(',') {
            let second = self.parse_expr()?;
            self.close_paren(open)?;
            return Ok(Term::PairLit(Box::new(first), Box::new(second)));
        }
        self.close_paren(open)?;
        Ok(first)
    }

    fn close_paren(&mut self, open: usize) -> ParseResult<()> {
        if self.cursor.eat(')') {
            return Ok(());
        }
        if self.cursor.at_end() {
            return Err(ParseError::UnmatchedParen { position: open });
        }
        Err(self.cursor.error_here("')'"))
    }

    fn parse_list(&mut self) -> ParseResult<Term> {
        self.cursor.bump();
        let mut items = Vec::new();
        if self.cursor.eat(']') {
            return Ok(Term::ListLit(items));
        }
        loop {
            items.push(self.parse_expr()?);
            if self.cursor.eat(',') {
                continue;
            }
            if self.cursor.eat(']') {
                return Ok(Term::ListLit(items));
            }
            return Err(self.cursor.error_here("',' or ']'"));
        }
    }

    fn parse_identifier(&mut self) -> ParseResult<Term> {
        let start = self.cursor.pos();
        let name = match self.cursor.ident() {
            Some(name) => name,
            None => return Err(self.cursor.unexpected()),
        };
        match name {
            "T" | "true" => return Ok(Term::BoolLit(true)),
            "F" | "false" => return Ok(Term::BoolLit(false)),
            _ => {}
        }

        let after_name = self.cursor.pos();
        self.cursor.skip_ws();
        if self.cursor.peek() == Some('(') {
            let func = Builtin::from_str(name).map_err(|_| ParseError::UnknownFunction {
                name: name.to_string(),
                position: start,
            })?;
            let args = self.parse_args()?;
            return Ok(Term::FunCall { func, args });
        }
        self.cursor.reset(after_name);

        if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
            if name.starts_with(|c: char| c.is_ascii_uppercase()) {
                return Err(ParseError::UppercaseVariable {
                    name: name.to_string(),
                    position: start,
                });
            }
            return Err(ParseError::UnexpectedChar {
                found: '_',
                position: start,
            });
        }
        let hint = self.cursor.type_suffix(false)?;
        Ok(Term::Var {
            name: name.to_string(),
            hint,
        })
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Term>> {
        let open = self.cursor.pos();
        self.cursor.bump();
        let mut args = Vec::new();
        if self.cursor.eat(')') {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.cursor.eat(',') {
                continue;
            }
            self.close_paren(open)?;
            return Ok(args);
        }
    }
}
