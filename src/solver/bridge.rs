use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::context::SolverContext;
use super::equation::{enumerate_models, SolveOutcome};
use super::smt::{SmtExpr, Sort};
use super::{CheckOutcome, SolverError, SolverResult};
use crate::ast::{ArithOp, BoolExpr, CmpOp, Term};
use crate::eval::boolean::compare;
use crate::eval::{builtins, eval_bool, eval_term, Binding, EvalError};
use crate::value::{TypeTag, Value};

const RESULT_CONST: &str = "__result";

/// Replaces bound variables with literal terms.
pub fn substitute_term(term: &Term, bindings: &Binding) -> Term {
    match term {
        Term::Var { name, .. } => match bindings.get(name) {
            Some(value) => Term::from_value(value),
            None => term.clone(),
        },
        Term::ListLit(items) => {
            Term::ListLit(items.iter().map(|t| substitute_term(t, bindings)).collect())
        }
        Term::PairLit(a, b) => Term::PairLit(
            Box::new(substitute_term(a, bindings)),
            Box::new(substitute_term(b, bindings)),
        ),
        Term::BinOp { op, left, right } => Term::binop(
            *op,
            substitute_term(left, bindings),
            substitute_term(right, bindings),
        ),
        Term::FunCall { func, args } => Term::FunCall {
            func: *func,
            args: args.iter().map(|t| substitute_term(t, bindings)).collect(),
        },
        literal => literal.clone(),
    }
}

/// Like [`substitute_term`] for guards. A boolean variable bound to a
/// non-Bool value fails the same way pure evaluation does.
pub fn substitute_bool(expr: &BoolExpr, bindings: &Binding) -> SolverResult<BoolExpr> {
    Ok(match expr {
        BoolExpr::Var { name, .. } => match bindings.get(name) {
            Some(Value::Bool(b)) => BoolExpr::Lit(*b),
            Some(other) => {
                return Err(EvalError::expected_tag(
                    format!("boolean variable '{}'", name),
                    TypeTag::Bool,
                    other,
                )
                .into())
            }
            None => expr.clone(),
        },
        BoolExpr::Not(inner) => BoolExpr::Not(Box::new(substitute_bool(inner, bindings)?)),
        BoolExpr::Logic { op, left, right } => BoolExpr::logic(
            *op,
            substitute_bool(left, bindings)?,
            substitute_bool(right, bindings)?,
        ),
        BoolExpr::Cmp { op, left, right } => BoolExpr::Cmp {
            op: *op,
            left: substitute_term(left, bindings),
            right: substitute_term(right, bindings),
        },
        BoolExpr::Call { func, args } => BoolExpr::Call {
            func: *func,
            args: args.iter().map(|t| substitute_term(t, bindings)).collect(),
        },
        BoolExpr::Lit(_) => expr.clone(),
    })
}

/// Folds every closed subterm to a literal by pure evaluation. Subterms whose
/// evaluation fails are kept as they are.
pub fn partial_reduce(term: &Term) -> Term {
    let reduced = match term {
        Term::ListLit(items) => Term::ListLit(items.iter().map(partial_reduce).collect()),
        Term::PairLit(a, b) => Term::PairLit(Box::new(partial_reduce(a)), Box::new(partial_reduce(b))),
        Term::BinOp { op, left, right } => Term::binop(*op, partial_reduce(left), partial_reduce(right)),
        Term::FunCall { func, args } => Term::FunCall {
            func: *func,
            args: args.iter().map(partial_reduce).collect(),
        },
        other => other.clone(),
    };
    if matches!(reduced, Term::BinOp { .. } | Term::FunCall { .. }) && reduced.is_closed() {
        if let Ok(value) = eval_term(&reduced, &Binding::new()) {
            return Term::from_value(&value);
        }
    }
    reduced
}

/// Reduces closed comparisons, calls and connectives to literals.
pub fn partial_reduce_bool(expr: &BoolExpr) -> BoolExpr {
    match expr {
        BoolExpr::Cmp { op, left, right } => {
            let (left, right) = (partial_reduce(left), partial_reduce(right));
            if left.is_closed() && right.is_closed() {
                let empty = Binding::new();
                if let (Ok(l), Ok(r)) = (eval_term(&left, &empty), eval_term(&right, &empty)) {
                    return BoolExpr::Lit(compare(*op, &l, &r));
                }
            }
            BoolExpr::Cmp { op: *op, left, right }
        }
        BoolExpr::Call { func, args } => {
            let args: Vec<Term> = args.iter().map(partial_reduce).collect();
            if args.iter().all(Term::is_closed) {
                let empty = Binding::new();
                let values: Result<Vec<_>, _> = args.iter().map(|a| eval_term(a, &empty)).collect();
                if let Ok(Value::Bool(b)) = values.and_then(|v| builtins::call(*func, &v)) {
                    return BoolExpr::Lit(b);
                }
            }
            BoolExpr::Call { func: *func, args }
        }
        BoolExpr::Not(inner) => match partial_reduce_bool(inner) {
            BoolExpr::Lit(b) => BoolExpr::Lit(!b),
            inner => BoolExpr::Not(Box::new(inner)),
        },
        BoolExpr::Logic { op, left, right } => {
            let (left, right) = (partial_reduce_bool(left), partial_reduce_bool(right));
            if let (BoolExpr::Lit(l), BoolExpr::Lit(r)) = (&left, &right) {
                let empty = Binding::new();
                let folded = BoolExpr::logic(*op, BoolExpr::Lit(*l), BoolExpr::Lit(*r));
                if let Ok(b) = eval_bool(&folded, &empty) {
                    return BoolExpr::Lit(b);
                }
            }
            BoolExpr::logic(*op, left, right)
        }
        other => other.clone(),
    }
}

/// Solver encoding of a constraint: one constant per free variable plus
/// the assertions (including `divisor != 0` side conditions).
#[derive(Debug, Clone, PartialEq)]
pub struct Encoding {
    pub declarations: Vec<(String, Sort)>,
    pub assertions: Vec<SmtExpr>,
}

struct Translator {
    bool_vars: BTreeSet<String>,
    declarations: Vec<(String, Sort)>,
    side_conditions: Vec<SmtExpr>,
}

impl Translator {
    fn new(expr: &BoolExpr) -> Self {
        let mut bool_vars = BTreeSet::new();
        collect_bool_vars(expr, &mut bool_vars);
        Self {
            bool_vars,
            declarations: Vec::new(),
            side_conditions: Vec::new(),
        }
    }

    fn constant(&mut self, name: &str, sort: Sort) -> SmtExpr {
        if !self.declarations.iter().any(|(n, _)| n == name) {
            self.declarations.push((name.to_string(), sort));
        }
        SmtExpr::Const(name.to_string(), sort)
    }

    fn term(&mut self, term: &Term) -> SolverResult<SmtExpr> {
        match term {
            Term::IntLit(n) => Ok(SmtExpr::Int(*n)),
            Term::BoolLit(b) => Ok(SmtExpr::Bool(*b)),
            Term::Var { name, hint } => {
                let sort = match hint {
                    Some(TypeTag::Bool) => Sort::Bool,
                    Some(TypeTag::Int) => Sort::Int,
                    None if self.bool_vars.contains(name) => Sort::Bool,
                    None => Sort::Int,
                    Some(other) => {
                        return Err(SolverError::Unsupported(format!(
                            "variable '{}' of type {}",
                            name, other
                        )))
                    }
                };
                Ok(self.constant(name, sort))
            }
            Term::BinOp { op, left, right } => {
                let l = self.int_term(left)?;
                let r = self.int_term(right)?;
                if *op == ArithOp::Div {
                    self.side_conditions
                        .push(SmtExpr::cmp(CmpOp::Ne, r.clone(), SmtExpr::Int(0)));
                }
                Ok(SmtExpr::Arith(*op, Box::new(l), Box::new(r)))
            }
            other => Err(SolverError::Unsupported(format!("term {}", other))),
        }
    }

    fn int_term(&mut self, term: &Term) -> SolverResult<SmtExpr> {
        let expr = self.term(term)?;
        if expr.sort() != Sort::Int {
            return Err(SolverError::Unsupported(format!(
                "arithmetic on non-integer {}",
                term
            )));
        }
        Ok(expr)
    }

    fn boolean(&mut self, expr: &BoolExpr) -> SolverResult<SmtExpr> {
        match expr {
            BoolExpr::Lit(b) => Ok(SmtExpr::Bool(*b)),
            BoolExpr::Var { name, .. } => Ok(self.constant(name, Sort::Bool)),
            BoolExpr::Not(inner) => Ok(SmtExpr::not(self.boolean(inner)?)),
            BoolExpr::Logic { op, left, right } => {
                let l = self.boolean(left)?;
                let r = self.boolean(right)?;
                Ok(SmtExpr::logic(*op, l, r))
            }
            BoolExpr::Cmp { op, left, right } => {
                let l = self.term(left)?;
                let r = self.term(right)?;
                let ordered = !matches!(op, CmpOp::Eq | CmpOp::Ne);
                if l.sort() != r.sort() {
                    // mixed kinds are never equal
                    return Ok(SmtExpr::Bool(*op == CmpOp::Ne));
                }
                if ordered && l.sort() != Sort::Int {
                    return Ok(SmtExpr::Bool(false));
                }
                Ok(SmtExpr::cmp(*op, l, r))
            }
            BoolExpr::Call { func, .. } => Err(SolverError::Unsupported(format!(
                "call to {} with free variables",
                func
            ))),
        }
    }
}

fn collect_bool_vars(expr: &BoolExpr, out: &mut BTreeSet<String>) {
    match expr {
        BoolExpr::Var { name, .. } => {
            out.insert(name.clone());
        }
        BoolExpr::Not(inner) => collect_bool_vars(inner, out),
        BoolExpr::Logic { left, right, .. } => {
            collect_bool_vars(left, out);
            collect_bool_vars(right, out);
        }
        _ => {}
    }
}

/// Substitutes `bindings`, reduces closed parts, and encodes what is left.
pub fn encode(expr: &BoolExpr, bindings: &Binding) -> SolverResult<Encoding> {
    let reduced = partial_reduce_bool(&substitute_bool(expr, bindings)?);
    debug!("encoding reduced constraint {}", reduced);
    let mut translator = Translator::new(&reduced);
    let main = translator.boolean(&reduced)?;
    let mut assertions = translator.side_conditions;
    assertions.push(main);
    Ok(Encoding {
        declarations: translator.declarations,
        assertions,
    })
}

/// Decides whether a guard can hold for some values of its unbound variables.
#[tracing::instrument(level = "debug", skip(context, expr, bindings), fields(expr = %expr))]
pub async fn check_predicate_sat(
    context: &SolverContext,
    expr: &BoolExpr,
    bindings: &Binding,
) -> SolverResult<bool> {
    let encoding = encode(expr, bindings)?;
    let mut session = context.session();
    for (name, sort) in &encoding.declarations {
        session.declare(name, *sort);
    }
    for assertion in encoding.assertions {
        session.assert(assertion);
    }
    match session.check().await? {
        CheckOutcome::Sat(_) => Ok(true),
        CheckOutcome::Unsat => Ok(false),
        CheckOutcome::Unknown(reason) => {
            warn!("satisfiability of {} unknown: {}", expr, reason);
            Ok(false)
        }
    }
}

/// Evaluates a term, asking the solver for a value when free variables remain.
pub async fn eval_term_via_solver(
    context: &SolverContext,
    term: &Term,
    bindings: &Binding,
) -> SolverResult<Value> {
    let reduced = partial_reduce(&substitute_term(term, bindings));
    if reduced.is_closed() {
        return Ok(eval_term(&reduced, &Binding::new())?);
    }

    let constraint = BoolExpr::Cmp {
        op: CmpOp::Eq,
        left: Term::Var {
            name: RESULT_CONST.to_string(),
            hint: Some(TypeTag::Int),
        },
        right: reduced,
    };
    let encoding = encode(&constraint, &Binding::new())?;
    let mut session = context.session();
    for (name, sort) in &encoding.declarations {
        session.declare(name, *sort);
    }
    for assertion in encoding.assertions {
        session.assert(assertion);
    }
    match session.check().await? {
        CheckOutcome::Sat(model) => match model.get(RESULT_CONST) {
            Some(value) => Ok(Value::from(value)),
            None => Err(SolverError::Internal(format!(
                "model lacks {}",
                RESULT_CONST
            ))),
        },
        CheckOutcome::Unsat => Err(SolverError::Unsat),
        CheckOutcome::Unknown(reason) => Err(SolverError::Internal(reason)),
    }
}

/// Enumerates assignments to the guard's unbound variables that make it true.
pub async fn solve_guard(
    context: &SolverContext,
    guard: &BoolExpr,
    bindings: &Binding,
    max_models: usize,
) -> SolverResult<SolveOutcome> {
    let encoding = encode(guard, bindings)?;
    enumerate_models(context, encoding, max_models).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{parse_boolean, parse_term};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_reduce_folds_closed_subterms() {
        let term = parse_term("x + length('abc') * 2").unwrap();
        assert_eq!(partial_reduce(&term).to_string(), "(x + 6)");
        let term = parse_term("x + 1 / 0").unwrap();
        assert_eq!(partial_reduce(&term).to_string(), "(x + (1 / 0))");
    }

    #[test]
    fn test_non_integer_comparisons_reduce_purely() {
        let expr = parse_boolean("s == 'ab' and x > 1").unwrap();
        let mut bindings = Binding::new();
        bindings.insert("s".into(), Value::string("ab"));
        let encoding = encode(&expr, &bindings).unwrap();
        assert_eq!(encoding.declarations, vec![("x".to_string(), Sort::Int)]);
        assert_eq!(encoding.assertions.last().unwrap().to_string(), "(and true (> |x| 1))");
    }

    #[test]
    fn test_division_adds_side_condition() {
        let expr = parse_boolean("10 / d == 5").unwrap();
        let encoding = encode(&expr, &Binding::new()).unwrap();
        assert_eq!(encoding.assertions.len(), 2);
        assert_eq!(encoding.assertions[0].to_string(), "(not (= |d| 0))");
    }

    #[test]
    fn test_bool_variables_get_bool_sort() {
        let expr = parse_boolean("flag and x == 1 or flag == F").unwrap();
        let encoding = encode(&expr, &Binding::new()).unwrap();
        assert!(encoding.declarations.contains(&("flag".to_string(), Sort::Bool)));
        assert!(encoding.declarations.contains(&("x".to_string(), Sort::Int)));
    }

    #[test]
    fn test_non_bool_binding_for_boolean_variable() {
        let expr = parse_boolean("flag or x > 1").unwrap();
        let mut bindings = Binding::new();
        bindings.insert("flag".into(), Value::Int(1));
        assert_eq!(
            encode(&expr, &bindings),
            Err(SolverError::Eval(EvalError::TypeMismatch {
                context: "boolean variable 'flag'".to_string(),
                expected: "Bool".to_string(),
                found: "Int".to_string(),
            }))
        );
    }

    #[test]
    fn test_unsupported_free_string_variable() {
        let expr = parse_boolean("s:String == 'a'").unwrap();
        assert!(matches!(
            encode(&expr, &Binding::new()),
            Err(SolverError::Unsupported(_))
        ));
    }
}
