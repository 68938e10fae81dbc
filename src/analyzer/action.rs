use super::term::TermParser;
use super::cursor::Cursor;
use super::{ParseError, ParseResult};
use crate::ast::{Action, Assignment};

/// Parses `y = x + 1, s = concat(s, 'a')`.
///
/// Assignments are split on top-level commas, then on the first `=`.
#[tracing::instrument(level = "debug")]
pub fn parse_action(input: &str) -> ParseResult<Action> {
    let src = input.trim();
    let mut assignments = Vec::new();
    if src.is_empty() {
        return Ok(Action { assignments });
    }
    for (start, end) in top_level_segments(src) {
        assignments.push(parse_assignment(src, start, end)?);
    }
    Ok(Action { assignments })
}

fn parse_assignment(src: &str, start: usize, end: usize) -> ParseResult<Assignment> {
    let segment = &src[start..end];
    let eq = match segment.find('=') {
        Some(eq) => start + eq,
        None => {
            return Err(ParseError::Expected {
                expected: "'='".to_string(),
                position: end,
            })
        }
    };

    let mut lhs = Cursor::window(src, start, eq);
    lhs.skip_ws();
    let target_pos = lhs.pos();
    let target = match lhs.ident() {
        Some(name) if name.starts_with(|c: char| c.is_ascii_lowercase()) => name.to_string(),
        Some(name) => {
            return Err(ParseError::UppercaseVariable {
                name: name.to_string(),
                position: target_pos,
            })
        }
        None => return Err(lhs.error_here("assignment target")),
    };
    // allow an annotated target `y:Int = ...`
    lhs.type_suffix(true)?;
    lhs.finish()?;

    let value = TermParser::new(Cursor::window(src, eq + 1, end)).parse_complete()?;
    Ok(Assignment { target, value })
}

/// Byte ranges between commas at bracket depth zero, outside strings.
fn top_level_segments(src: &str) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in src.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '\'' {
                in_string = false;
            }
            continue;
        }
        match c {
            '\'' => in_string = true,
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                segments.push((start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push((start, src.len()));
    segments
}
