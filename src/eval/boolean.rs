use super::term::TermEvaluator;
use super::{builtins, Binding, EvalError, EvalResult};
use crate::ast::{BoolExpr, CmpOp, LogicOp};
use crate::value::{TypeTag, Value};

pub fn eval_bool(expr: &BoolExpr, bindings: &Binding) -> EvalResult<bool> {
    let terms = TermEvaluator::new(bindings);
    eval_with(expr, bindings, &terms)
}

fn eval_with(expr: &BoolExpr, bindings: &Binding, terms: &TermEvaluator) -> EvalResult<bool> {
    match expr {
        BoolExpr::Lit(b) => Ok(*b),
        BoolExpr::Var { name, .. } => match bindings.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(EvalError::expected_tag(
                format!("boolean variable '{}'", name),
                TypeTag::Bool,
                other,
            )),
            None => Err(EvalError::UnboundVariable(name.clone())),
        },
        BoolExpr::Not(inner) => Ok(!eval_with(inner, bindings, terms)?),
        BoolExpr::Logic { op, left, right } => {
            let l = eval_with(left, bindings, terms)?;
            // short-circuit only where the result is already fixed
            match (op, l) {
                (LogicOp::And, false) => return Ok(false),
                (LogicOp::Or, true) => return Ok(true),
                (LogicOp::Implies, false) => return Ok(true),
                _ => {}
            }
            let r = eval_with(right, bindings, terms)?;
            Ok(match op {
                LogicOp::And => l && r,
                LogicOp::Or => l || r,
                LogicOp::Xor => l != r,
                LogicOp::Implies => !l || r,
                LogicOp::Iff => l == r,
            })
        }
        BoolExpr::Cmp { op, left, right } => {
            let l = terms.eval(left)?;
            let r = terms.eval(right)?;
            Ok(compare(*op, &l, &r))
        }
        BoolExpr::Call { func, args } => {
            let args = args
                .iter()
                .map(|arg| terms.eval(arg))
                .collect::<EvalResult<Vec<_>>>()?;
            match builtins::call(*func, &args)? {
                Value::Bool(b) => Ok(b),
                other => Err(EvalError::expected_tag(func.to_string(), TypeTag::Bool, &other)),
            }
        }
    }
}

/// Structural comparison. Values of different kinds are never equal, and
/// ordering is only defined between two Ints or two Strings.
pub fn compare(op: CmpOp, left: &Value, right: &Value) -> bool {
    match op {
        CmpOp::Eq => left == right,
        CmpOp::Ne => left != right,
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = match (left, right) {
                (Value::Int(a), Value::Int(b)) => a.cmp(b),
                (Value::String(a), Value::String(b)) => a.cmp(b),
                _ => return false,
            };
            match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }
        }
    }
}
