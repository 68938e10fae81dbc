use super::cursor::{is_ident_start, Cursor};
use super::{ParseError, ParseResult};
use crate::ast::Pattern;

/// Parses an arc binding pattern such as `(x:Int, [h, t])`.
///
/// A parenthesised group of exactly two elements is a pair pattern; any
/// other arity is a tuple pattern. `(p)` is plain grouping.
#[tracing::instrument(level = "debug")]
pub fn parse_pattern(input: &str) -> ParseResult<Pattern> {
    let src = input.trim();
    let mut cursor = Cursor::new(src);
    let pattern = parse_element(&mut cursor)?;
    cursor.finish()?;
    Ok(pattern)
}

fn parse_element(cursor: &mut Cursor) -> ParseResult<Pattern> {
    cursor.skip_ws();
    let start = cursor.pos();
    match cursor.peek() {
        None => Err(ParseError::UnexpectedEof { position: start }),
        Some('(') => {
            let mut items = parse_sequence(cursor, ')')?;
            Ok(match items.len() {
                1 => items.remove(0),
                2 => {
                    let second = items.remove(1);
                    let first = items.remove(0);
                    Pattern::Pair(Box::new(first), Box::new(second))
                }
                _ => Pattern::Tuple(items),
            })
        }
        Some('[') => Ok(Pattern::List(parse_sequence(cursor, ']')?)),
        Some(c) if c.is_ascii_digit() || c == '-' => match cursor.integer()? {
            Some(n) => Ok(Pattern::IntLit(n)),
            None => Err(cursor.unexpected()),
        },
        Some(c) if is_ident_start(c) => parse_word(cursor),
        Some(_) => Err(cursor.unexpected()),
    }
}

fn parse_sequence(cursor: &mut Cursor, close: char) -> ParseResult<Vec<Pattern>> {
    let open = cursor.pos();
    cursor.bump();
    let mut items = Vec::new();
    if cursor.eat(close) {
        return Ok(items);
    }
    loop {
        items.push(parse_element(cursor)?);
        if cursor.eat(',') {
            continue;
        }
        if cursor.eat(close) {
            return Ok(items);
        }
        if cursor.at_end() {
            return Err(ParseError::UnmatchedParen { position: open });
        }
        return Err(cursor.error_here(&format!("',' or '{}'", close)));
    }
}

fn parse_word(cursor: &mut Cursor) -> ParseResult<Pattern> {
    let start = cursor.pos();
    let name = match cursor.ident() {
        Some(name) => name,
        None => return Err(cursor.unexpected()),
    };
    match name {
        "T" | "true" => return Ok(Pattern::BoolLit(true)),
        "F" | "false" => return Ok(Pattern::BoolLit(false)),
        _ => {}
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(ParseError::UppercaseVariable {
            name: name.to_string(),
            position: start,
        });
    }
    let hint = cursor.type_suffix(true)?;
    Ok(Pattern::Var {
        name: name.to_string(),
        hint,
    })
}
