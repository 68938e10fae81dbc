use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;

use super::cursor::{is_ident_char, is_ident_start, word_at, Cursor};
use super::term::TermParser;
use super::{ParseError, ParseResult};
use crate::ast::{BoolExpr, CmpOp, LogicOp, Term};
use crate::value::TypeTag;

lazy_static! {
    static ref TYPED_IDENT: Regex =
        Regex::new(r"^([a-z][A-Za-z0-9_]*)\s*(?::\s*([A-Za-z]+))?$").expect("valid identifier regex");
}

const LOGIC_WORDS: [&str; 5] = ["and", "or", "xor", "implies", "iff"];
const LOGIC_SYMBOLS: [&str; 5] = ["<->", "->", "&&", "||", "^"];

/// Parses a guard expression.
///
/// Precedence from loosest to tightest: `iff`/`<->`, `implies`/`->`, `or`/`||`,
/// `xor`/`^`, `and`/`&&`, `not`/`!`, then comparisons and primaries.
#[tracing::instrument(level = "debug")]
pub fn parse_boolean(input: &str) -> ParseResult<BoolExpr> {
    let src = input.trim();
    let mut parser = BoolParser {
        cursor: Cursor::new(src),
    };
    let expr = parser.parse_iff()?;
    parser.cursor.finish()?;
    Ok(expr)
}

struct BoolParser<'a> {
    cursor: Cursor<'a>,
}

impl<'a> BoolParser<'a> {
    fn parse_iff(&mut self) -> ParseResult<BoolExpr> {
        let mut left = self.parse_implies()?;
        while self.cursor.eat_str("<->") || self.cursor.eat_word("iff") {
            let right = self.parse_implies()?;
            left = BoolExpr::logic(LogicOp::Iff, left, right);
        }
        Ok(left)
    }

    fn parse_implies(&mut self) -> ParseResult<BoolExpr> {
        let mut left = self.parse_or()?;
        while self.cursor.eat_str("->") || self.cursor.eat_word("implies") {
            let right = self.parse_or()?;
            left = BoolExpr::logic(LogicOp::Implies, left, right);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> ParseResult<BoolExpr> {
        let mut left = self.parse_xor()?;
        while self.cursor.eat_str("||") || self.cursor.eat_word("or") {
            let right = self.parse_xor()?;
            left = BoolExpr::logic(LogicOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> ParseResult<BoolExpr> {
        let mut left = self.parse_and()?;
        while self.cursor.eat_str("^") || self.cursor.eat_word("xor") {
            let right = self.parse_and()?;
            left = BoolExpr::logic(LogicOp::Xor, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<BoolExpr> {
        let mut left = self.parse_not()?;
        while self.cursor.eat_str("&&") || self.cursor.eat_word("and") {
            let right = self.parse_not()?;
            left = BoolExpr::logic(LogicOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<BoolExpr> {
        self.cursor.skip_ws();
        if self.cursor.starts_with("!") && !self.cursor.starts_with("!=") {
            self.cursor.bump();
            return Ok(BoolExpr::Not(Box::new(self.parse_not()?)));
        }
        if self.cursor.eat_word("not") {
            return Ok(BoolExpr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<BoolExpr> {
        self.cursor.skip_ws();
        let start = self.cursor.pos();
        if self.cursor.peek().is_none() {
            return Err(ParseError::UnexpectedEof { position: start });
        }

        if let Some((op_pos, op)) = self.find_comparison()? {
            return self.parse_comparison(start, op_pos, op);
        }

        match self.cursor.peek() {
            Some('(') => {
                self.cursor.bump();
                let inner = self.parse_iff()?;
                if self.cursor.eat(')') {
                    return Ok(inner);
                }
                if self.cursor.at_end() {
                    return Err(ParseError::UnmatchedParen { position: start });
                }
                Err(self.cursor.error_here("')'"))
            }
            Some(c) if is_ident_start(c) => self.parse_word_primary(),
            _ => Err(self.cursor.unexpected()),
        }
    }

    fn parse_word_primary(&mut self) -> ParseResult<BoolExpr> {
        let start = self.cursor.pos();
        let src = self.cursor.src();
        let end = self.cursor.end();
        for (word, value) in [("T", true), ("F", false), ("true", true), ("false", false)] {
            if word_at(src, start, end, word) && src[start..start + word.len()] == *word {
                self.cursor.reset(start + word.len());
                return Ok(BoolExpr::Lit(value));
            }
        }

        // identifier followed by '(' is a boolean-valued builtin call
        let mut probe = self.cursor.clone();
        probe.ident();
        probe.skip_ws();
        if probe.peek() == Some('(') {
            let mut terms = TermParser::new(self.cursor.clone());
            let term = terms.parse_factor()?;
            return match term {
                Term::FunCall { func, args } if func.returns_bool() => {
                    self.cursor = terms.cursor;
                    Ok(BoolExpr::Call { func, args })
                }
                _ => Err(ParseError::Expected {
                    expected: "boolean expression".to_string(),
                    position: start,
                }),
            };
        }

        let name = match self.cursor.ident() {
            Some(name) => name,
            None => return Err(self.cursor.unexpected()),
        };
        if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
            return Err(ParseError::UppercaseVariable {
                name: name.to_string(),
                position: start,
            });
        }
        let hint = self.cursor.type_suffix(false)?;
        Ok(BoolExpr::Var {
            name: name.to_string(),
            hint,
        })
    }

    fn parse_comparison(&mut self, start: usize, op_pos: usize, op: CmpOp) -> ParseResult<BoolExpr> {
        let src = self.cursor.src();
        let right_start = op_pos + op.as_ref().len();
        let right_end = self.operand_end(right_start);
        let left = parse_operand(src, start, op_pos)?;
        let right = parse_operand(src, right_start, right_end)?;
        self.cursor.reset(right_end);
        Ok(BoolExpr::Cmp { op, left, right })
    }

    /// Looks ahead for a comparison operator at paren depth zero before the
    /// next top-level logical connective or unmatched `)`.
    fn find_comparison(&self) -> ParseResult<Option<(usize, CmpOp)>> {
        let src = self.cursor.src();
        let end = self.cursor.end();
        let mut scan = Scan::new(src, self.cursor.pos(), end);
        while let Some(i) = scan.next_top_level() {
            if is_logic_boundary(src, i, end) {
                return Ok(None);
            }
            let rest = &src[i..end];
            for op in ["==", "!=", "<=", ">=", "<", ">"] {
                if rest.starts_with(op) {
                    let cmp = CmpOp::from_str(op).map_err(|_| ParseError::UnknownOperator {
                        op: op.to_string(),
                        position: i,
                    })?;
                    return Ok(Some((i, cmp)));
                }
            }
            if rest.starts_with('=') {
                return Err(ParseError::UnknownOperator {
                    op: "=".to_string(),
                    position: i,
                });
            }
        }
        Ok(None)
    }

    /// End of a comparison's right operand: the next top-level connective,
    /// an unmatched `)`, or the end of input.
    fn operand_end(&self, from: usize) -> usize {
        let src = self.cursor.src();
        let end = self.cursor.end();
        let mut scan = Scan::new(src, from, end);
        while let Some(i) = scan.next_top_level() {
            if is_logic_boundary(src, i, end) {
                return i;
            }
        }
        scan.stop
    }
}

/// Parses a comparison operand: a term, falling back to a bare (possibly
/// typed) identifier whose type annotation the term grammar rejects.
fn parse_operand(src: &str, start: usize, end: usize) -> ParseResult<Term> {
    let text = src[start..end].trim();
    if text.is_empty() {
        return Err(ParseError::Expected {
            expected: "operand".to_string(),
            position: start,
        });
    }
    let error = match TermParser::new(Cursor::window(src, start, end)).parse_complete() {
        Ok(term) => return Ok(term),
        Err(e) => e,
    };
    match TYPED_IDENT.captures(text) {
        Some(caps) => {
            let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let hint = caps
                .get(2)
                .and_then(|m| TypeTag::from_str(m.as_str()).ok());
            Ok(Term::Var { name, hint })
        }
        None => Err(error),
    }
}

fn is_logic_boundary(src: &str, i: usize, end: usize) -> bool {
    let rest = &src[i..end];
    LOGIC_SYMBOLS.iter().any(|s| rest.starts_with(s))
        || LOGIC_WORDS.iter().any(|w| word_at(src, i, end, w))
}

/// Walks a window yielding byte offsets that sit at bracket depth zero,
/// skipping quoted strings. Stops at an unmatched closing bracket.
struct Scan<'a> {
    src: &'a str,
    pos: usize,
    end: usize,
    depth: usize,
    stop: usize,
}

impl<'a> Scan<'a> {
    fn new(src: &'a str, pos: usize, end: usize) -> Self {
        Self {
            src,
            pos,
            end,
            depth: 0,
            stop: end,
        }
    }

    fn next_top_level(&mut self) -> Option<usize> {
        while self.pos < self.end {
            let i = self.pos;
            let c = self.src[i..].chars().next()?;
            self.pos += c.len_utf8();
            match c {
                '\'' => self.skip_string(),
                '(' | '[' => self.depth += 1,
                ')' | ']' if self.depth == 0 => {
                    self.stop = i;
                    self.pos = self.end;
                    return None;
                }
                ')' | ']' => self.depth -= 1,
                _ if self.depth == 0 => {
                    // only report the start of words, not their interior
                    let prev_ident = self.src[..i].chars().next_back().is_some_and(is_ident_char);
                    if is_ident_char(c) && prev_ident {
                        continue;
                    }
                    return Some(i);
                }
                _ => {}
            }
        }
        None
    }

    fn skip_string(&mut self) {
        let mut escaped = false;
        while self.pos < self.end {
            let Some(c) = self.src[self.pos..].chars().next() else {
                return;
            };
            self.pos += c.len_utf8();
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '\'' {
                return;
            }
        }
    }
}
