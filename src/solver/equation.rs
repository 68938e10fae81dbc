use tracing::{debug, warn};

use super::bridge::{encode, Encoding};
use super::context::SolverContext;
use super::smt::{SmtExpr, Sort};
use super::{CheckOutcome, ModelValue, SolverResult};
use crate::ast::{BoolExpr, CmpOp, LogicOp, Term};
use crate::eval::Binding;
use crate::value::Value;

/// Cap on solutions invented when the solver itself fails.
const SYNTHESIZED_LIMIT: usize = 5;

/// How far the reported solutions can be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confidence {
    /// Every solution is a model returned by the solver.
    Exact,
    /// The solver failed before producing anything; the solutions are
    /// placeholders and need not satisfy the constraint.
    Synthesized { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub solutions: Vec<Binding>,
    pub has_more: bool,
    pub confidence: Confidence,
}

impl SolveOutcome {
    pub fn is_exact(&self) -> bool {
        self.confidence == Confidence::Exact
    }
}

/// Distinct integer/boolean assignments satisfying `lhs == rhs`.
#[tracing::instrument(level = "debug", skip(context, lhs, rhs), fields(lhs = %lhs, rhs = %rhs))]
pub async fn solve_equation(
    context: &SolverContext,
    lhs: &Term,
    rhs: &Term,
    max_models: usize,
) -> SolverResult<SolveOutcome> {
    solve_inequality(context, lhs, rhs, CmpOp::Eq, max_models).await
}

/// Distinct assignments satisfying `lhs op rhs` for any comparison operator.
pub async fn solve_inequality(
    context: &SolverContext,
    lhs: &Term,
    rhs: &Term,
    op: CmpOp,
    max_models: usize,
) -> SolverResult<SolveOutcome> {
    let constraint = BoolExpr::Cmp {
        op,
        left: lhs.clone(),
        right: rhs.clone(),
    };
    let encoding = encode(&constraint, &Binding::new())?;
    enumerate_models(context, encoding, max_models).await
}

/// Repeatedly checks, records the model and blocks it, up to `max_models`
/// solutions. `has_more` comes from one further check.
pub async fn enumerate_models(
    context: &SolverContext,
    encoding: Encoding,
    max_models: usize,
) -> SolverResult<SolveOutcome> {
    let mut session = context.session();
    for (name, sort) in &encoding.declarations {
        session.declare(name, *sort);
    }
    for assertion in encoding.assertions {
        session.assert(assertion);
    }

    let mut solutions = Vec::new();
    loop {
        let outcome = match session.check().await {
            Ok(outcome) => outcome,
            Err(e) if e.is_backend_failure() => {
                if solutions.is_empty() {
                    warn!("solver failed, synthesizing placeholder solutions: {}", e);
                    return Ok(synthesize(&encoding.declarations, max_models, e.to_string()));
                }
                warn!("solver failed after {} solutions: {}", solutions.len(), e);
                return Ok(SolveOutcome {
                    solutions,
                    has_more: false,
                    confidence: Confidence::Exact,
                });
            }
            Err(e) => return Err(e),
        };

        let model = match outcome {
            CheckOutcome::Sat(model) => model,
            CheckOutcome::Unsat | CheckOutcome::Unknown(_) => {
                debug!("enumeration finished with {} solutions", solutions.len());
                return Ok(SolveOutcome {
                    solutions,
                    has_more: false,
                    confidence: Confidence::Exact,
                });
            }
        };
        if solutions.len() >= max_models {
            return Ok(SolveOutcome {
                solutions,
                has_more: true,
                confidence: Confidence::Exact,
            });
        }

        let mut solution = Binding::new();
        let mut equalities = Vec::new();
        for (name, sort) in session.declarations() {
            if let Some(value) = model.get(name) {
                let literal = match value {
                    ModelValue::Int(n) => SmtExpr::Int(n),
                    ModelValue::Bool(b) => SmtExpr::Bool(b),
                };
                equalities.push(SmtExpr::cmp(
                    CmpOp::Eq,
                    SmtExpr::Const(name.clone(), *sort),
                    literal,
                ));
                solution.insert(name.clone(), Value::from(value));
            }
        }
        solutions.push(solution);

        // a closed constraint has exactly one (empty) solution
        if equalities.is_empty() {
            return Ok(SolveOutcome {
                solutions,
                has_more: false,
                confidence: Confidence::Exact,
            });
        }
        session.assert(SmtExpr::not(
            equalities
                .into_iter()
                .reduce(|acc, eq| SmtExpr::logic(LogicOp::And, acc, eq))
                .unwrap_or(SmtExpr::Bool(true)),
        ));
    }
}

/// Placeholder solutions: variable `j` of solution `i` gets `i + j`. A
/// constraint without variables gets none, since every placeholder would be
/// the same empty binding.
fn synthesize(
    declarations: &[(String, Sort)],
    max_models: usize,
    reason: String,
) -> SolveOutcome {
    if declarations.is_empty() {
        return SolveOutcome {
            solutions: Vec::new(),
            has_more: false,
            confidence: Confidence::Synthesized { reason },
        };
    }
    let count = max_models.min(SYNTHESIZED_LIMIT);
    let solutions = (0..count)
        .map(|i| {
            declarations
                .iter()
                .enumerate()
                .map(|(j, (name, sort))| {
                    let value = match sort {
                        Sort::Int => Value::Int((i + j) as i64),
                        Sort::Bool => Value::Bool((i + j) % 2 == 1),
                    };
                    (name.clone(), value)
                })
                .collect()
        })
        .collect();
    SolveOutcome {
        solutions,
        has_more: true,
        confidence: Confidence::Synthesized { reason },
    }
}
