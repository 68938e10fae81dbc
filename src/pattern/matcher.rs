use tracing::trace;

use crate::ast::Pattern;
use crate::eval::Binding;
use crate::value::Value;

/// Matches a token against a pattern.
///
/// Returns the bindings on success. A variable that occurs more than once
/// must bind equal values, and a typed variable only matches values of
/// that type. Tuple patterns match lists of the same length.
pub fn match_pattern(pattern: &Pattern, value: &Value) -> Option<Binding> {
    let mut bindings = Binding::new();
    if bind(pattern, value, &mut bindings) {
        Some(bindings)
    } else {
        trace!("pattern {} does not match {}", pattern, value);
        None
    }
}

fn bind(pattern: &Pattern, value: &Value, bindings: &mut Binding) -> bool {
    match (pattern, value) {
        (Pattern::IntLit(n), Value::Int(v)) => n == v,
        (Pattern::BoolLit(b), Value::Bool(v)) => b == v,
        (Pattern::Var { name, hint }, _) => {
            if matches!(hint, Some(tag) if *tag != value.type_tag()) {
                return false;
            }
            match bindings.get(name) {
                Some(existing) => existing == value,
                None => {
                    bindings.insert(name.clone(), value.clone());
                    true
                }
            }
        }
        (Pattern::Pair(a, b), Value::Pair(first, second)) => {
            bind(a, first, bindings) && bind(b, second, bindings)
        }
        (Pattern::Tuple(items), Value::List(values)) | (Pattern::List(items), Value::List(values)) => {
            items.len() == values.len()
                && items
                    .iter()
                    .zip(values.iter())
                    .all(|(p, v)| bind(p, v, bindings))
        }
        _ => false,
    }
}
