//! Pure evaluation of terms, guards and actions against a variable binding.

pub mod action;
pub mod boolean;
pub mod builtins;
pub mod term;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::value::{TypeTag, Value};

pub use action::eval_action;
pub use boolean::eval_bool;
pub use term::eval_term;

/// Variable name to value. Ordered so that printed bindings and solver
/// declarations are deterministic.
pub type Binding = BTreeMap<String, Value>;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    #[error("Type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },
    #[error("Function {function} expects {expected} arguments, got {found}")]
    ArityMismatch {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Index out of range in {function}: {message}")]
    IndexOutOfRange { function: String, message: String },
    #[error("{0} requires a non-empty list")]
    EmptyList(String),
    #[error("Integer overflow in {0}")]
    Overflow(String),
}

impl EvalError {
    pub fn type_mismatch(context: impl Into<String>, expected: impl Into<String>, found: &Value) -> Self {
        EvalError::TypeMismatch {
            context: context.into(),
            expected: expected.into(),
            found: found.type_tag().to_string(),
        }
    }

    pub fn expected_tag(context: impl Into<String>, expected: TypeTag, found: &Value) -> Self {
        Self::type_mismatch(context, expected.to_string(), found)
    }
}
