use std::str::FromStr;

use super::{EvalError, EvalResult};
use crate::ast::Builtin;
use crate::value::{TypeTag, Value};

/// Applies a builtin by name, for callers holding a function name rather than a parsed call.
pub fn call_named(name: &str, args: &[Value]) -> EvalResult<Value> {
    let func = Builtin::from_str(name).map_err(|_| EvalError::UnknownFunction(name.to_string()))?;
    call(func, args)
}

pub fn call(func: Builtin, args: &[Value]) -> EvalResult<Value> {
    if args.len() != func.arity() {
        return Err(EvalError::ArityMismatch {
            function: func.to_string(),
            expected: func.arity(),
            found: args.len(),
        });
    }
    let name = func.as_ref();
    match func {
        Builtin::Concat => match (&args[0], &args[1]) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => Ok(Value::List(join(a, b))),
            (Value::String(_), other) => Err(EvalError::expected_tag(name, TypeTag::String, other)),
            (Value::List(_), other) => Err(EvalError::expected_tag(name, TypeTag::List, other)),
            (other, _) => Err(EvalError::type_mismatch(name, "String or List", other)),
        },
        Builtin::Append => match (&args[0], &args[1]) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => Ok(Value::List(join(a, b))),
            (Value::List(a), element) => {
                let mut items = a.clone();
                items.push(element.clone());
                Ok(Value::List(items))
            }
            (Value::String(_), other) => Err(EvalError::expected_tag(name, TypeTag::String, other)),
            (other, _) => Err(EvalError::type_mismatch(name, "String or List", other)),
        },
        Builtin::Length => match &args[0] {
            Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            other => Err(EvalError::type_mismatch(name, "String or List", other)),
        },
        Builtin::Substring => {
            let (start, len) = (int_arg(name, &args[1])?, int_arg(name, &args[2])?);
            match &args[0] {
                Value::String(s) => {
                    let chars: Vec<char> = s.chars().collect();
                    let (from, to) = slice_bounds(name, chars.len(), start, len)?;
                    Ok(Value::String(chars[from..to].iter().collect()))
                }
                Value::List(items) => {
                    let (from, to) = slice_bounds(name, items.len(), start, len)?;
                    Ok(Value::List(items[from..to].to_vec()))
                }
                other => Err(EvalError::type_mismatch(name, "String or List", other)),
            }
        }
        Builtin::Sublist => {
            let items = list_arg(name, &args[0])?;
            let (start, len) = (int_arg(name, &args[1])?, int_arg(name, &args[2])?);
            let (from, to) = slice_bounds(name, items.len(), start, len)?;
            Ok(Value::List(items[from..to].to_vec()))
        }
        Builtin::IsSubstringOf => match (&args[0], &args[1]) {
            (Value::String(needle), Value::String(haystack)) => {
                Ok(Value::Bool(haystack.contains(needle.as_str())))
            }
            (Value::String(_), other) | (other, _) => {
                Err(EvalError::expected_tag(name, TypeTag::String, other))
            }
        },
        Builtin::IsSublistOf => {
            let sub = list_arg(name, &args[0])?;
            let list = list_arg(name, &args[1])?;
            Ok(Value::Bool(is_contiguous_sublist(sub, list)))
        }
        Builtin::Head => {
            let items = list_arg(name, &args[0])?;
            items
                .first()
                .cloned()
                .ok_or_else(|| EvalError::EmptyList(name.to_string()))
        }
        Builtin::Tail => {
            let items = list_arg(name, &args[0])?;
            if items.is_empty() {
                return Err(EvalError::EmptyList(name.to_string()));
            }
            Ok(Value::List(items[1..].to_vec()))
        }
        Builtin::Fst | Builtin::Snd => match &args[0] {
            Value::Pair(first, _) if func == Builtin::Fst => Ok((**first).clone()),
            Value::Pair(_, second) => Ok((**second).clone()),
            other => Err(EvalError::expected_tag(name, TypeTag::Pair, other)),
        },
    }
}

fn join(a: &[Value], b: &[Value]) -> Vec<Value> {
    a.iter().chain(b.iter()).cloned().collect()
}

fn int_arg(function: &str, value: &Value) -> EvalResult<i64> {
    value
        .as_int()
        .ok_or_else(|| EvalError::expected_tag(function, TypeTag::Int, value))
}

fn list_arg<'v>(function: &str, value: &'v Value) -> EvalResult<&'v [Value]> {
    value
        .as_list()
        .ok_or_else(|| EvalError::expected_tag(function, TypeTag::List, value))
}

/// `[start, start + len)` clamped to the sequence. Negative start or length is rejected.
fn slice_bounds(function: &str, size: usize, start: i64, len: i64) -> EvalResult<(usize, usize)> {
    if start < 0 || len < 0 {
        return Err(EvalError::IndexOutOfRange {
            function: function.to_string(),
            message: format!("start {} and length {} must be non-negative", start, len),
        });
    }
    let from = usize::try_from(start).unwrap_or(usize::MAX).min(size);
    let to = from
        .saturating_add(usize::try_from(len).unwrap_or(usize::MAX))
        .min(size);
    Ok((from, to))
}

/// An empty sublist is contained in every list.
fn is_contiguous_sublist(sub: &[Value], list: &[Value]) -> bool {
    sub.is_empty() || list.windows(sub.len()).any(|window| window == sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ints(items: &[i64]) -> Value {
        Value::List(items.iter().map(|n| Value::Int(*n)).collect())
    }

    #[test]
    fn test_string_builtins() {
        let s = Value::string("hello");
        assert_eq!(
            call(Builtin::Substring, &[s.clone(), Value::Int(1), Value::Int(3)]),
            Ok(Value::string("ell"))
        );
        assert_eq!(
            call(Builtin::Substring, &[s.clone(), Value::Int(3), Value::Int(10)]),
            Ok(Value::string("lo"))
        );
        assert_eq!(call(Builtin::Length, &[s.clone()]), Ok(Value::Int(5)));
        assert_eq!(
            call(Builtin::IsSubstringOf, &[Value::string("ll"), s.clone()]),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            call(Builtin::Concat, &[s, Value::string("!")]),
            Ok(Value::string("hello!"))
        );
    }

    #[test]
    fn test_list_builtins() {
        assert_eq!(call(Builtin::Head, &[ints(&[4, 5])]), Ok(Value::Int(4)));
        assert_eq!(call(Builtin::Tail, &[ints(&[4, 5])]), Ok(ints(&[5])));
        assert_eq!(
            call(Builtin::Tail, &[ints(&[])]),
            Err(EvalError::EmptyList("tail".to_string()))
        );
        assert_eq!(
            call(Builtin::Sublist, &[ints(&[1, 2, 3, 4]), Value::Int(1), Value::Int(2)]),
            Ok(ints(&[2, 3]))
        );
        assert_eq!(
            call(Builtin::IsSublistOf, &[ints(&[2, 3]), ints(&[1, 2, 3])]),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            call(Builtin::IsSublistOf, &[ints(&[1, 3]), ints(&[1, 2, 3])]),
            Ok(Value::Bool(false))
        );
        assert_eq!(
            call(Builtin::IsSublistOf, &[ints(&[]), ints(&[])]),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn test_append_variants() {
        assert_eq!(call(Builtin::Append, &[ints(&[1]), ints(&[2])]), Ok(ints(&[1, 2])));
        assert_eq!(call(Builtin::Append, &[ints(&[1]), Value::Int(2)]), Ok(ints(&[1, 2])));
        assert!(matches!(
            call(Builtin::Append, &[Value::string("a"), Value::Int(2)]),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_pairs() {
        let p = Value::pair(Value::Int(1), Value::string("x"));
        assert_eq!(call(Builtin::Fst, &[p.clone()]), Ok(Value::Int(1)));
        assert_eq!(call(Builtin::Snd, &[p]), Ok(Value::string("x")));
        assert!(call(Builtin::Fst, &[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_arity_and_names() {
        assert!(matches!(
            call(Builtin::Length, &[]),
            Err(EvalError::ArityMismatch { expected: 1, found: 0, .. })
        ));
        assert_eq!(
            call_named("nope", &[]),
            Err(EvalError::UnknownFunction("nope".to_string()))
        );
        assert_eq!(call_named("length", &[ints(&[1])]), Ok(Value::Int(1)));
        assert!(matches!(
            call(Builtin::Substring, &[Value::string("ab"), Value::Int(-1), Value::Int(1)]),
            Err(EvalError::IndexOutOfRange { .. })
        ));
    }
}
