//! Token syntax shared by markings, CLI bindings and the JSON layer.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{anychar, char, digit1, multispace0, none_of, one_of, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, peek, recognize, value},
    error::{context, convert_error, VerboseError},
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};
use thiserror::Error;

use super::Value;

pub type SyntaxResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueSyntaxError {
    #[error("empty token")]
    Empty,
    #[error("invalid token '{input}': {message}")]
    Invalid { input: String, message: String },
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            other => out.push(other),
        }
    }
    out
}

/// Maps the character after a backslash. Unknown escapes keep the character.
pub fn unescape_char(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> SyntaxResult<'a, O>
where
    F: FnMut(&'a str) -> SyntaxResult<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_bool(input: &str) -> SyntaxResult<Value> {
    context(
        "boolean",
        map(
            terminated(
                alt((
                    value(true, tag_no_case("true")),
                    value(false, tag_no_case("false")),
                    value(true, tag("T")),
                    value(false, tag("F")),
                )),
                not(peek(satisfy(is_ident_char))),
            ),
            Value::Bool,
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_int(input: &str) -> SyntaxResult<Value> {
    context(
        "integer",
        map_res(recognize(pair(opt(one_of("+-")), digit1)), |s: &str| {
            s.parse::<i64>().map(Value::Int)
        }),
    )(input)
}

fn parse_string_body(input: &str) -> SyntaxResult<String> {
    fold_many0(
        alt((none_of("\\'"), preceded(char('\\'), map(anychar, unescape_char)))),
        String::new,
        |mut acc, c| {
            acc.push(c);
            acc
        },
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_string(input: &str) -> SyntaxResult<Value> {
    context(
        "string",
        map(
            delimited(char('\''), parse_string_body, char('\'')),
            Value::String,
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_list(input: &str) -> SyntaxResult<Value> {
    context(
        "list",
        map(
            delimited(
                char('['),
                separated_list0(char(','), ws(parse_token)),
                preceded(multispace0, char(']')),
            ),
            Value::List,
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_pair(input: &str) -> SyntaxResult<Value> {
    context(
        "pair",
        map(
            delimited(
                char('('),
                separated_pair(ws(parse_token), char(','), ws(parse_token)),
                char(')'),
            ),
            |(first, second)| Value::pair(first, second),
        ),
    )(input)
}

pub fn parse_token(input: &str) -> SyntaxResult<Value> {
    context(
        "token",
        alt((parse_bool, parse_int, parse_string, parse_list, parse_pair)),
    )(input)
}

/// Parses a single value written in token syntax.
pub fn parse_value(input: &str) -> Result<Value, ValueSyntaxError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValueSyntaxError::Empty);
    }
    match all_consuming(parse_token)(trimmed) {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ValueSyntaxError::Invalid {
            input: trimmed.to_string(),
            message: convert_error(trimmed, e),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ValueSyntaxError::Invalid {
            input: trimmed.to_string(),
            message: "incomplete input".to_string(),
        }),
    }
}

/// Parses a comma separated token list such as a place marking `1, (2, T), 'x'`.
pub fn parse_value_list(input: &str) -> Result<Vec<Value>, ValueSyntaxError> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level_commas(input)
        .into_iter()
        .map(parse_value)
        .collect()
}

pub fn format_values(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Splits on commas that are outside brackets, parentheses and quoted strings.
pub fn split_top_level_commas(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
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
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(input[start..].trim());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse_value("T").unwrap(), Value::Bool(true));
        assert_eq!(parse_value("true").unwrap(), Value::Bool(true));
        assert_eq!(parse_value("FALSE").unwrap(), Value::Bool(false));
        assert_eq!(parse_value(" -12 ").unwrap(), Value::Int(-12));
        assert_eq!(parse_value("+5").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_parse_string_escapes() {
        assert_eq!(
            parse_value(r"'a\nb\tc\\d\'e\qf'").unwrap(),
            Value::string("a\nb\tc\\d'eqf")
        );
    }

    #[test]
    fn test_parse_nested() {
        let parsed = parse_value("[1, (2, 'x,y'), [T, F]]").unwrap();
        assert_eq!(
            parsed,
            Value::List(vec![
                Value::Int(1),
                Value::pair(Value::Int(2), Value::string("x,y")),
                Value::List(vec![Value::Bool(true), Value::Bool(false)]),
            ])
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_value("  "), Err(ValueSyntaxError::Empty));
        assert!(parse_value("Tx").is_err());
        assert!(parse_value("(1, 2").is_err());
        assert!(parse_value("[1 2]").is_err());
    }

    #[test]
    fn test_split_top_level_commas() {
        assert_eq!(
            split_top_level_commas("1, (2, 3), [4, 5], 'a,b'"),
            vec!["1", "(2, 3)", "[4, 5]", "'a,b'"]
        );
    }

    #[test]
    fn test_parse_value_list() {
        let values = parse_value_list("1, (2, T), 'x'").unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(format_values(&values), "1, (2, T), 'x'");
        assert!(parse_value_list("").unwrap().is_empty());
    }
}
