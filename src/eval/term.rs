use tracing::trace;

use super::{builtins, Binding, EvalError, EvalResult};
use crate::ast::{ArithOp, Term};
use crate::value::Value;

pub fn eval_term(term: &Term, bindings: &Binding) -> EvalResult<Value> {
    TermEvaluator::new(bindings).eval(term)
}

pub struct TermEvaluator<'a> {
    bindings: &'a Binding,
}

impl<'a> TermEvaluator<'a> {
    pub fn new(bindings: &'a Binding) -> Self {
        Self { bindings }
    }

    pub fn eval(&self, term: &Term) -> EvalResult<Value> {
        match term {
            Term::IntLit(n) => Ok(Value::Int(*n)),
            Term::BoolLit(b) => Ok(Value::Bool(*b)),
            Term::StringLit(s) => Ok(Value::String(s.clone())),
            Term::ListLit(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<EvalResult<Vec<_>>>()?,
            )),
            Term::PairLit(a, b) => Ok(Value::pair(self.eval(a)?, self.eval(b)?)),
            Term::Var { name, .. } => self.lookup(name),
            Term::BinOp { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                eval_arith(*op, &left, &right)
            }
            Term::FunCall { func, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<EvalResult<Vec<_>>>()?;
                builtins::call(*func, &args)
            }
        }
    }

    fn lookup(&self, name: &str) -> EvalResult<Value> {
        match self.bindings.get(name) {
            Some(value) => Ok(value.clone()),
            None => {
                trace!("unbound variable {}", name);
                Err(EvalError::UnboundVariable(name.to_string()))
            }
        }
    }
}

/// Integer arithmetic with overflow detection. Division truncates toward zero.
pub fn eval_arith(op: ArithOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let context = format!("'{}'", op);
    let l = left
        .as_int()
        .ok_or_else(|| EvalError::type_mismatch(&context, "Int", left))?;
    let r = right
        .as_int()
        .ok_or_else(|| EvalError::type_mismatch(&context, "Int", right))?;
    let result = match op {
        ArithOp::Add => l.checked_add(r),
        ArithOp::Sub => l.checked_sub(r),
        ArithOp::Mul => l.checked_mul(r),
        ArithOp::Div => {
            if r == 0 {
                return Err(EvalError::DivisionByZero);
            }
            l.checked_div(r)
        }
    };
    result
        .map(Value::Int)
        .ok_or(EvalError::Overflow(context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parse_term;
    use pretty_assertions::assert_eq;

    fn eval(src: &str, bindings: &[(&str, Value)]) -> EvalResult<Value> {
        let bindings: Binding = bindings
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        eval_term(&parse_term(src).unwrap(), &bindings)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3", &[]), Ok(Value::Int(7)));
        assert_eq!(eval("(1 + 2) * 3", &[]), Ok(Value::Int(9)));
        assert_eq!(eval("-7 / 2", &[]), Ok(Value::Int(-3)));
        assert_eq!(eval("x * x - 1", &[("x", Value::Int(4))]), Ok(Value::Int(15)));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(eval("1 / 0", &[]), Err(EvalError::DivisionByZero));
        assert!(matches!(
            eval("9223372036854775807 + 1", &[]),
            Err(EvalError::Overflow(_))
        ));
        assert!(matches!(
            eval("'a' + 1", &[]),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert_eq!(
            eval("y + 1", &[]),
            Err(EvalError::UnboundVariable("y".to_string()))
        );
    }

    #[test]
    fn test_pair_with_call() {
        assert_eq!(
            eval("(1, length([2, 3, 4]))", &[]),
            Ok(Value::pair(Value::Int(1), Value::Int(3)))
        );
    }
}
