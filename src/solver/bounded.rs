use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::smt::{SmtExpr, SmtQuery, Sort};
use super::{CheckOutcome, Model, ModelValue, SolverBackend, SolverError, SolverResult};
use crate::ast::{ArithOp, CmpOp, LogicOp};

/// Exhaustive search over a bounded integer box.
///
/// Integers range over `[-bound, bound]` in order of increasing magnitude
/// (`0, 1, -1, 2, -2, ...`), booleans over `false, true`. Exhausting the box
/// proves unsatisfiability only when every constant is boolean; otherwise
/// the answer is `Unknown`. Running out of budget or past the query
/// timeout is a solver failure.
/// Candidates tried between deadline checks.
const DEADLINE_STRIDE: u64 = 1024;

#[derive(Debug, Clone)]
pub struct BoundedSearch {
    bound: i64,
    budget: u64,
}

impl BoundedSearch {
    pub fn new(bound: i64, budget: u64) -> Self {
        Self {
            bound: bound.max(0),
            budget,
        }
    }

    fn domain(&self, sort: Sort) -> Vec<ModelValue> {
        match sort {
            Sort::Bool => vec![ModelValue::Bool(false), ModelValue::Bool(true)],
            Sort::Int => {
                let mut values = vec![ModelValue::Int(0)];
                for n in 1..=self.bound {
                    values.push(ModelValue::Int(n));
                    values.push(ModelValue::Int(-n));
                }
                values
            }
        }
    }

    fn search(&self, query: &SmtQuery, deadline: Option<Instant>) -> SolverResult<CheckOutcome> {
        let domains: Vec<Vec<ModelValue>> = query
            .declarations
            .iter()
            .map(|(_, sort)| self.domain(*sort))
            .collect();
        let complete = query.declarations.iter().all(|(_, sort)| *sort == Sort::Bool);
        let mut indices = vec![0usize; domains.len()];
        let mut tried = 0u64;

        loop {
            if tried >= self.budget {
                return Err(SolverError::Internal(format!(
                    "search budget of {} exhausted",
                    self.budget
                )));
            }
            if tried % DEADLINE_STRIDE == 0 && deadline.is_some_and(|d| Instant::now() >= d) {
                debug!("bounded search timed out after {} candidates", tried);
                return Err(SolverError::Timeout(query.timeout));
            }
            tried += 1;

            let env: BTreeMap<&str, ModelValue> = query
                .declarations
                .iter()
                .zip(indices.iter().zip(domains.iter()))
                .map(|((name, _), (i, domain))| (name.as_str(), domain[*i]))
                .collect();
            if query
                .assertions
                .iter()
                .all(|a| eval(a, &env) == Some(ModelValue::Bool(true)))
            {
                debug!("bounded search found a model after {} candidates", tried);
                let values = env.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
                return Ok(CheckOutcome::Sat(Model { values }));
            }

            // advance the odometer, last constant fastest
            let mut position = indices.len();
            loop {
                if position == 0 {
                    return Ok(if complete {
                        CheckOutcome::Unsat
                    } else {
                        CheckOutcome::Unknown(format!("no model with |values| <= {}", self.bound))
                    });
                }
                position -= 1;
                indices[position] += 1;
                if indices[position] < domains[position].len() {
                    break;
                }
                indices[position] = 0;
            }
        }
    }
}

#[async_trait]
impl SolverBackend for BoundedSearch {
    fn name(&self) -> &'static str {
        "bounded"
    }

    async fn check(&self, query: &SmtQuery) -> SolverResult<CheckOutcome> {
        let deadline = Instant::now().checked_add(query.timeout);
        let search = self.clone();
        let query = query.clone();
        tokio::task::spawn_blocking(move || search.search(&query, deadline))
            .await
            .map_err(|e| SolverError::Internal(format!("bounded search task failed: {}", e)))?
    }
}

/// Evaluates under a full assignment. `None` marks an undefined result
/// (division by zero, overflow, ill-sorted operands).
fn eval(expr: &SmtExpr, env: &BTreeMap<&str, ModelValue>) -> Option<ModelValue> {
    match expr {
        SmtExpr::Int(n) => Some(ModelValue::Int(*n)),
        SmtExpr::Bool(b) => Some(ModelValue::Bool(*b)),
        SmtExpr::Const(name, _) => env.get(name.as_str()).copied(),
        SmtExpr::Arith(op, a, b) => {
            let (a, b) = (int(eval(a, env)?)?, int(eval(b, env)?)?);
            let result = match op {
                ArithOp::Add => a.checked_add(b),
                ArithOp::Sub => a.checked_sub(b),
                ArithOp::Mul => a.checked_mul(b),
                ArithOp::Div if b == 0 => None,
                ArithOp::Div => a.checked_div(b),
            }?;
            Some(ModelValue::Int(result))
        }
        SmtExpr::Cmp(op, a, b) => {
            let (a, b) = (eval(a, env)?, eval(b, env)?);
            let result = match (op, a, b) {
                (CmpOp::Eq, a, b) => a == b,
                (CmpOp::Ne, a, b) => a != b,
                (op, ModelValue::Int(a), ModelValue::Int(b)) => match op {
                    CmpOp::Lt => a < b,
                    CmpOp::Le => a <= b,
                    CmpOp::Gt => a > b,
                    _ => a >= b,
                },
                _ => return None,
            };
            Some(ModelValue::Bool(result))
        }
        SmtExpr::Not(inner) => Some(ModelValue::Bool(!boolean(eval(inner, env)?)?)),
        SmtExpr::Logic(op, a, b) => {
            let (a, b) = (boolean(eval(a, env)?)?, boolean(eval(b, env)?)?);
            Some(ModelValue::Bool(match op {
                LogicOp::And => a && b,
                LogicOp::Or => a || b,
                LogicOp::Xor => a != b,
                LogicOp::Implies => !a || b,
                LogicOp::Iff => a == b,
            }))
        }
    }
}

fn int(value: ModelValue) -> Option<i64> {
    match value {
        ModelValue::Int(n) => Some(n),
        ModelValue::Bool(_) => None,
    }
}

fn boolean(value: ModelValue) -> Option<bool> {
    match value {
        ModelValue::Bool(b) => Some(b),
        ModelValue::Int(_) => None,
    }
}
