use thiserror::Error;

use crate::analyzer::ParseError;
use crate::config::ConfigError;
use crate::eval::EvalError;
use crate::net::NetError;
use crate::solver::SolverError;
use crate::value::syntax::ValueSyntaxError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Value syntax error: {0}")]
    ValueSyntax(#[from] ValueSyntaxError),
    // evaluation
    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    // net structure
    #[error("Net error: {0}")]
    Net(#[from] NetError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
