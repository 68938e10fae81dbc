pub mod analyzer;
pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod net;
pub mod pattern;
pub mod solver;
pub mod transition;
pub mod type_checker;
pub mod value;

// Re-exports
pub use analyzer::{parse_action, parse_boolean, parse_pattern, parse_term, ParseError};
pub use ast::*;
pub use config::{EngineConfig, SolverConfig};
pub use error::*;
pub use eval::{eval_action, eval_bool, eval_term, Binding, EvalError};
pub use net::{Marking, Net};
pub use pattern::{instantiate, match_pattern};
pub use solver::{SolverContext, SolverError};
pub use transition::{CompiledTransition, ParseCache};
pub use value::{TypeTag, Value};
