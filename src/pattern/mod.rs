//! Arc binding patterns: matching tokens, building tokens, and type helpers.

mod matcher;

use std::collections::BTreeSet;

use crate::ast::Pattern;
use crate::eval::{Binding, EvalError, EvalResult};
use crate::value::{TypeTag, Value};

pub use matcher::match_pattern;

/// Variables in first-occurrence order, without duplicates.
pub fn pattern_variables(pattern: &Pattern) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    collect(pattern, &mut seen, &mut out);
    out
}

fn collect(pattern: &Pattern, seen: &mut BTreeSet<String>, out: &mut Vec<String>) {
    match pattern {
        Pattern::IntLit(_) | Pattern::BoolLit(_) => {}
        Pattern::Var { name, .. } => {
            if seen.insert(name.clone()) {
                out.push(name.clone());
            }
        }
        Pattern::Pair(a, b) => {
            collect(a, seen, out);
            collect(b, seen, out);
        }
        Pattern::Tuple(items) | Pattern::List(items) => {
            items.iter().for_each(|p| collect(p, seen, out))
        }
    }
}

/// Builds the token a pattern describes from a binding (output arcs).
pub fn instantiate(pattern: &Pattern, bindings: &Binding) -> EvalResult<Value> {
    match pattern {
        Pattern::IntLit(n) => Ok(Value::Int(*n)),
        Pattern::BoolLit(b) => Ok(Value::Bool(*b)),
        Pattern::Var { name, hint } => {
            let value = bindings
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnboundVariable(name.clone()))?;
            match hint {
                Some(tag) if *tag != value.type_tag() => Err(EvalError::expected_tag(
                    format!("output binding '{}'", name),
                    *tag,
                    &value,
                )),
                _ => Ok(value),
            }
        }
        Pattern::Pair(a, b) => Ok(Value::pair(
            instantiate(a, bindings)?,
            instantiate(b, bindings)?,
        )),
        Pattern::Tuple(items) | Pattern::List(items) => Ok(Value::List(
            items
                .iter()
                .map(|p| instantiate(p, bindings))
                .collect::<EvalResult<Vec<_>>>()?,
        )),
    }
}

/// Checks that every variable carries a type hint; the error names the
/// first one that does not.
pub fn validate_typing(pattern: &Pattern) -> Result<(), String> {
    match pattern {
        Pattern::IntLit(_) | Pattern::BoolLit(_) => Ok(()),
        Pattern::Var { hint: Some(_), .. } => Ok(()),
        Pattern::Var { name, hint: None } => Err(name.clone()),
        Pattern::Pair(a, b) => validate_typing(a).and_then(|_| validate_typing(b)),
        Pattern::Tuple(items) | Pattern::List(items) => items.iter().try_for_each(validate_typing),
    }
}

/// Adds `default` to every untyped variable, leaving existing hints alone.
pub fn with_default_types(pattern: &Pattern, default: TypeTag) -> Pattern {
    match pattern {
        Pattern::Var { name, hint } => Pattern::Var {
            name: name.clone(),
            hint: Some(hint.unwrap_or(default)),
        },
        Pattern::Pair(a, b) => Pattern::Pair(
            Box::new(with_default_types(a, default)),
            Box::new(with_default_types(b, default)),
        ),
        Pattern::Tuple(items) => {
            Pattern::Tuple(items.iter().map(|p| with_default_types(p, default)).collect())
        }
        Pattern::List(items) => {
            Pattern::List(items.iter().map(|p| with_default_types(p, default)).collect())
        }
        literal => literal.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parse_pattern;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_variables_in_order() {
        let pattern = parse_pattern("(x, [y, x, 3])").unwrap();
        assert_eq!(pattern_variables(&pattern), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_instantiate() {
        let pattern = parse_pattern("(x, [y, T])").unwrap();
        let mut bindings = Binding::new();
        bindings.insert("x".into(), Value::Int(1));
        bindings.insert("y".into(), Value::string("a"));
        assert_eq!(
            instantiate(&pattern, &bindings).unwrap().to_string(),
            "(1, ['a', T])"
        );
        let typed = parse_pattern("x:String").unwrap();
        assert!(matches!(
            instantiate(&typed, &bindings),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_typing_helpers() {
        let pattern = parse_pattern("(a:Int, b)").unwrap();
        assert_eq!(validate_typing(&pattern), Err("b".to_string()));
        let typed = with_default_types(&pattern, TypeTag::Bool);
        assert_eq!(validate_typing(&typed), Ok(()));
        assert_eq!(typed.to_string(), "(a:Int, b:Bool)");
    }
}
