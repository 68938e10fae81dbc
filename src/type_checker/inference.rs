use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::{infer_token_type, ElementKind, TypeMap};
use crate::analyzer::{parse_action, parse_pattern};
use crate::ast::{Builtin, Pattern, Term};
use crate::net::Net;
use crate::pattern::{match_pattern, pattern_variables};
use crate::value::TypeTag;

lazy_static! {
    static ref TYPED_NAME: Regex =
        Regex::new(r"\b([a-z][A-Za-z0-9_]*)\s*:\s*(?i:(int|bool|pair|string|list))\b")
            .expect("valid annotation regex");
}

/// Infers variable types for an arc or a transition.
///
/// Sources in order of precedence: explicit hints and first-token matches on
/// input arcs, `name:Type` annotations in the guard, annotations on output
/// arcs, then the static types of action right-hand sides. For an arc the
/// result covers that arc's variables; any still unknown take the source
/// place's first token type, or Int.
pub fn infer_variable_types(kind: ElementKind, id: &str, net: &Net) -> TypeMap {
    match kind {
        ElementKind::Transition => transition_types(net, id),
        ElementKind::Arc => {
            let Some(arc) = net.arc(id) else {
                return TypeMap::new();
            };
            let transition_id = if net.transition(&arc.target).is_some() {
                &arc.target
            } else {
                &arc.source
            };
            let chain = transition_types(net, transition_id);
            let fallback = net
                .place(&arc.source)
                .and_then(|p| p.tokens.first())
                .map(infer_token_type)
                .unwrap_or(TypeTag::Int);

            let mut types = TypeMap::new();
            for binding in &arc.bindings {
                for name in binding_variables(binding) {
                    let tag = chain.get(&name).copied().unwrap_or(fallback);
                    types.entry(name).or_insert(tag);
                }
            }
            types
        }
    }
}

fn transition_types(net: &Net, transition_id: &str) -> TypeMap {
    let mut types = TypeMap::new();
    let Some(transition) = net.transition(transition_id) else {
        return types;
    };

    for arc in net.input_arcs(transition_id) {
        let first_token = net.place(&arc.source).and_then(|p| p.tokens.first());
        for binding in &arc.bindings {
            let Ok(pattern) = parse_pattern(binding) else {
                continue;
            };
            record_hints(&pattern, &mut types);
            let Some(token) = first_token else {
                continue;
            };
            match match_pattern(&pattern, token) {
                Some(bound) => {
                    for (name, value) in bound {
                        types.entry(name).or_insert(value.type_tag());
                    }
                }
                None => {
                    for name in pattern_variables(&pattern) {
                        types.entry(name).or_insert(infer_token_type(token));
                    }
                }
            }
        }
    }

    if let Some(guard) = &transition.guard {
        record_annotations(guard, &mut types);
    }
    for arc in net.output_arcs(transition_id) {
        for binding in &arc.bindings {
            record_annotations(binding, &mut types);
        }
    }

    if let Some(Ok(action)) = transition.action.as_deref().map(parse_action) {
        for assignment in &action.assignments {
            if types.contains_key(&assignment.target) {
                continue;
            }
            if let Some(tag) = static_type(&assignment.value, &types) {
                types.insert(assignment.target.clone(), tag);
            }
        }
    }
    debug!("inferred types for {}: {:?}", transition_id, types);
    types
}

fn record_hints(pattern: &Pattern, types: &mut TypeMap) {
    match pattern {
        Pattern::Var {
            name,
            hint: Some(tag),
        } => {
            types.entry(name.clone()).or_insert(*tag);
        }
        Pattern::Pair(a, b) => {
            record_hints(a, types);
            record_hints(b, types);
        }
        Pattern::Tuple(items) | Pattern::List(items) => {
            items.iter().for_each(|p| record_hints(p, types))
        }
        _ => {}
    }
}

fn record_annotations(text: &str, types: &mut TypeMap) {
    for caps in TYPED_NAME.captures_iter(text) {
        let (Some(name), Some(tag)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if let Ok(tag) = TypeTag::from_str(tag.as_str()) {
            types.entry(name.as_str().to_string()).or_insert(tag);
        }
    }
}

/// Variables of a binding: pattern variables, or term variables for
/// output expressions that are not patterns.
fn binding_variables(binding: &str) -> Vec<String> {
    if let Ok(pattern) = parse_pattern(binding) {
        return pattern_variables(&pattern);
    }
    crate::analyzer::parse_term(binding)
        .map(|t| t.variables().into_iter().collect())
        .unwrap_or_default()
}

/// Type of a term when it can be decided without evaluating it.
pub fn static_type(term: &Term, types: &TypeMap) -> Option<TypeTag> {
    match term {
        Term::IntLit(_) | Term::BinOp { .. } => Some(TypeTag::Int),
        Term::BoolLit(_) => Some(TypeTag::Bool),
        Term::StringLit(_) => Some(TypeTag::String),
        Term::ListLit(_) => Some(TypeTag::List),
        Term::PairLit(_, _) => Some(TypeTag::Pair),
        Term::Var { name, hint } => hint.or_else(|| types.get(name).copied()),
        Term::FunCall { func, args } => match func {
            Builtin::Length => Some(TypeTag::Int),
            Builtin::IsSubstringOf | Builtin::IsSublistOf => Some(TypeTag::Bool),
            Builtin::Tail | Builtin::Sublist => Some(TypeTag::List),
            Builtin::Concat | Builtin::Substring | Builtin::Append => {
                args.first().and_then(|a| static_type(a, types))
            }
            Builtin::Head | Builtin::Fst | Builtin::Snd => None,
        },
    }
}
