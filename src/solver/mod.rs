//! Bridge from guard/term ASTs to an integer/boolean constraint solver.
//!
//! Backends implement [`SolverBackend`]. [`z3_process::Z3Process`] drives an
//! external `z3` binary over SMT-LIB2; [`bounded::BoundedSearch`] is a
//! built-in enumerator used when no binary is available.

pub mod bounded;
pub mod bridge;
pub mod context;
pub mod equation;
pub mod smt;
pub mod z3_process;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::eval::{Binding, EvalError};
use crate::value::Value;

pub use bounded::BoundedSearch;
pub use bridge::{check_predicate_sat, eval_term_via_solver, solve_guard};
pub use context::{SolverContext, SolverSession};
pub use equation::{solve_equation, solve_inequality, Confidence, SolveOutcome};
pub use smt::{SmtExpr, SmtQuery, Sort};
pub use z3_process::Z3Process;

pub type SolverResult<T> = Result<T, SolverError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Solver timed out after {0:?}")]
    Timeout(Duration),
    #[error("Solver failure: {0}")]
    Internal(String),
    #[error("Solver unavailable: {0}")]
    Unavailable(String),
    #[error("Not expressible for the solver: {0}")]
    Unsupported(String),
    #[error("Constraints are unsatisfiable")]
    Unsat,
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl SolverError {
    /// Failures of the solver itself, as opposed to problems with the query.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            SolverError::Timeout(_) | SolverError::Internal(_) | SolverError::Unavailable(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
}

impl From<ModelValue> for Value {
    fn from(value: ModelValue) -> Self {
        match value {
            ModelValue::Int(n) => Value::Int(n),
            ModelValue::Bool(b) => Value::Bool(b),
        }
    }
}

/// A satisfying assignment for the declared constants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub values: BTreeMap<String, ModelValue>,
}

impl Model {
    pub fn get(&self, name: &str) -> Option<ModelValue> {
        self.values.get(name).copied()
    }

    pub fn to_binding(&self) -> Binding {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(*v)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Sat(Model),
    Unsat,
    Unknown(String),
}

#[mockall::automock]
#[async_trait]
pub trait SolverBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self, query: &SmtQuery) -> SolverResult<CheckOutcome>;
}
