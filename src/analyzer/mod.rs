//! Hand-written recursive-descent parsers for terms, guards, patterns and actions.
//!
//! All parsers trim their input and report byte positions relative to the
//! trimmed text.

pub mod action;
pub mod boolean;
mod cursor;
pub mod pattern;
pub mod term;

use thiserror::Error;

pub use action::parse_action;
pub use boolean::parse_boolean;
pub use pattern::parse_pattern;
pub use term::parse_term;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected end of input at position {position}")]
    UnexpectedEof { position: usize },
    #[error("Unexpected character '{found}' at position {position}")]
    UnexpectedChar { found: char, position: usize },
    #[error("Expected {expected} at position {position}")]
    Expected { expected: String, position: usize },
    #[error("Unmatched parenthesis at position {position}")]
    UnmatchedParen { position: usize },
    #[error("Unknown function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },
    #[error("Unknown operator '{op}' at position {position}")]
    UnknownOperator { op: String, position: usize },
    #[error("Unknown type '{name}' at position {position}")]
    UnknownType { name: String, position: usize },
    #[error("Variable names must start with a lowercase letter: '{name}' at position {position}")]
    UppercaseVariable { name: String, position: usize },
    #[error("Unterminated string literal starting at position {position}")]
    UnterminatedString { position: usize },
    #[error("Integer literal '{text}' out of range at position {position}")]
    IntegerOutOfRange { text: String, position: usize },
    #[error("Unexpected trailing input '{rest}' at position {position}")]
    TrailingInput { rest: String, position: usize },
}

impl ParseError {
    pub fn position(&self) -> usize {
        match self {
            ParseError::UnexpectedEof { position }
            | ParseError::UnexpectedChar { position, .. }
            | ParseError::Expected { position, .. }
            | ParseError::UnmatchedParen { position }
            | ParseError::UnknownFunction { position, .. }
            | ParseError::UnknownOperator { position, .. }
            | ParseError::UnknownType { position, .. }
            | ParseError::UppercaseVariable { position, .. }
            | ParseError::UnterminatedString { position }
            | ParseError::IntegerOutOfRange { position, .. }
            | ParseError::TrailingInput { position, .. } => *position,
        }
    }
}
