use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::debug;

use super::{TypeMap, RESERVED_WORDS};
use crate::analyzer::parse_pattern;
use crate::net::Net;
use crate::pattern::match_pattern;
use crate::value::TypeTag;

lazy_static! {
    static ref LOWER_TYPE: Regex =
        Regex::new(r"(:\s*)(?i:(int|bool|pair|string|list))\b").expect("valid type regex");
}

/// Rewrites `:int`, `:BOOL` and the like to their canonical capitalized form.
pub fn capitalize_type_names(text: &str) -> String {
    LOWER_TYPE
        .replace_all(text, |caps: &Captures| {
            let word = caps.get(2).map_or("", |m| m.as_str());
            match TypeTag::from_str(word) {
                Ok(tag) => format!("{}{}", &caps[1], tag),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// An identifier occurrence found while scanning expression text.
#[derive(Debug)]
struct Site<'a> {
    name: &'a str,
    start: usize,
    end: usize,
    /// End of an existing `:Type` suffix.
    annotation_end: Option<usize>,
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Lowercase identifiers that could be variables: not reserved words, not
/// function names, not type names after a colon, not inside string literals.
fn variable_sites(text: &str) -> Vec<Site<'_>> {
    let bytes = text.as_bytes();
    let mut sites = Vec::new();
    let mut i = 0;
    let mut after_colon = false;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\'' {
            i += 1;
            while i < bytes.len() && bytes[i] != b'\'' {
                i += if bytes[i] == b'\\' { 2 } else { 1 };
            }
            i += 1;
            after_colon = false;
            continue;
        }
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if !is_ident_byte(b) {
            after_colon = b == b':';
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && is_ident_byte(bytes[i]) {
            i += 1;
        }
        let name = &text[start..i];
        let was_type_position = after_colon;
        after_colon = false;
        if was_type_position
            || !b.is_ascii_lowercase()
            || RESERVED_WORDS.contains(&name)
        {
            continue;
        }

        let next = skip_ws(bytes, i);
        if next < bytes.len() && bytes[next] == b'(' {
            continue;
        }
        let annotation_end = if next < bytes.len() && bytes[next] == b':' {
            let type_start = skip_ws(bytes, next + 1);
            let mut type_end = type_start;
            while type_end < bytes.len() && is_ident_byte(bytes[type_end]) {
                type_end += 1;
            }
            Some(type_end)
        } else {
            None
        };
        sites.push(Site {
            name,
            start,
            end: i,
            annotation_end,
        });
    }
    sites
}

/// Adds `:Type` annotations to bare variables in `text`.
///
/// Types come from `types`, then `default`. Without `overwrite`, a variable
/// that is already annotated anywhere in the text is left alone everywhere;
/// with it, existing annotations are replaced. Applying the same call twice
/// gives the same text as applying it once.
pub fn auto_annotate_types(
    text: &str,
    types: &TypeMap,
    default: Option<TypeTag>,
    overwrite: bool,
) -> String {
    let sites = variable_sites(text);
    let annotated: BTreeSet<&str> = sites
        .iter()
        .filter(|s| s.annotation_end.is_some())
        .map(|s| s.name)
        .collect();

    let mut out = String::with_capacity(text.len() + 16);
    let mut copied = 0;
    for site in &sites {
        let Some(tag) = types.get(site.name).copied().or(default) else {
            continue;
        };
        let replace_to = match site.annotation_end {
            Some(end) if overwrite => end,
            Some(_) => continue,
            None if !overwrite && annotated.contains(site.name) => continue,
            None => site.end,
        };
        out.push_str(&text[copied..site.start]);
        out.push_str(&format!("{}:{}", site.name, tag));
        copied = replace_to;
    }
    out.push_str(&text[copied..]);
    out
}

/// Global annotation pass over a net.
///
/// Input-arc variables are typed from their place's tokens when every
/// matching token agrees; guards and output bindings of the transition are
/// then annotated with those types. Existing annotations are kept.
pub fn annotate_net(net: &Net) -> Net {
    let mut annotated = net.clone();
    for transition in &net.transitions {
        let mut known = TypeMap::new();

        for arc in net.input_arcs(&transition.id) {
            let tokens = net
                .place(&arc.source)
                .map(|p| p.tokens.as_slice())
                .unwrap_or_default();
            let mut new_bindings = Vec::with_capacity(arc.bindings.len());
            for binding in &arc.bindings {
                let types = unambiguous_types(binding, tokens);
                new_bindings.push(auto_annotate_types(binding, &types, None, false));
                for (name, tag) in types {
                    known.entry(name).or_insert(tag);
                }
            }
            if let Some(target) = annotated.arcs.iter_mut().find(|a| a.id == arc.id) {
                target.bindings = new_bindings;
            }
        }
        debug!("annotating {} with {:?}", transition.id, known);

        if let Some(target) = annotated.transitions.iter_mut().find(|t| t.id == transition.id) {
            if let Some(guard) = &transition.guard {
                target.guard = Some(auto_annotate_types(guard, &known, None, false));
            }
        }
        for arc in net.output_arcs(&transition.id) {
            if let Some(target) = annotated.arcs.iter_mut().find(|a| a.id == arc.id) {
                target.bindings = arc
                    .bindings
                    .iter()
                    .map(|b| auto_annotate_types(b, &known, None, false))
                    .collect();
            }
        }
    }
    annotated
}

fn unambiguous_types(binding: &str, tokens: &[crate::value::Value]) -> TypeMap {
    let Ok(pattern) = parse_pattern(binding) else {
        return TypeMap::new();
    };
    let mut seen: BTreeMap<String, BTreeSet<TypeTag>> = BTreeMap::new();
    for token in tokens {
        if let Some(bound) = match_pattern(&pattern, token) {
            for (name, value) in bound {
                seen.entry(name).or_default().insert(value.type_tag());
            }
        }
    }
    seen.into_iter()
        .filter_map(|(name, tags)| match tags.len() {
            1 => tags.into_iter().next().map(|tag| (name, tag)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn types(entries: &[(&str, TypeTag)]) -> TypeMap {
        entries.iter().map(|(n, t)| (n.to_string(), *t)).collect()
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize_type_names("(x:int, y: LIST)"), "(x:Int, y: List)");
        assert_eq!(capitalize_type_names("s:string == t"), "s:String == t");
    }

    #[test]
    fn test_annotates_bare_variables_only() {
        let map = types(&[("x", TypeTag::Int), ("s", TypeTag::String)]);
        let text = "x > 0 and isSubstringOf('x', s) or not done";
        assert_eq!(
            auto_annotate_types(text, &map, None, false),
            "x:Int > 0 and isSubstringOf('x', s:String) or not done"
        );
        assert_eq!(
            auto_annotate_types("T and done", &map, Some(TypeTag::Bool), false),
            "T and done:Bool"
        );
    }

    #[test]
    fn test_annotation_is_idempotent() {
        let map = types(&[("x", TypeTag::Int)]);
        let once = auto_annotate_types("x + x * 2 == y", &map, None, false);
        let twice = auto_annotate_types(&once, &map, None, false);
        assert_eq!(once, "x:Int + x:Int * 2 == y");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_existing_annotations() {
        let map = types(&[("x", TypeTag::Int)]);
        assert_eq!(
            auto_annotate_types("x:Bool == x", &map, None, false),
            "x:Bool == x"
        );
        assert_eq!(
            auto_annotate_types("x:Bool == x", &map, None, true),
            "x:Int == x:Int"
        );
    }

    #[test]
    fn test_annotate_net() {
        let net = Net::from_json(
            r#"{
            "places": [{"id": "p", "tokens": ["(1, 'a')", "(2, 'b')"]}, {"id": "q"}],
            "transitions": [{"id": "t", "guard": "n > 1"}],
            "arcs": [
                {"id": "in", "source": "p", "target": "t", "bindings": ["(n, s)"]},
                {"id": "out", "source": "t", "target": "q", "bindings": ["(s, n)"]}
            ]
        }"#,
        )
        .unwrap();
        let annotated = annotate_net(&net);
        assert_eq!(annotated.arc("in").unwrap().bindings, vec!["(n:Int, s:String)"]);
        assert_eq!(annotated.arc("out").unwrap().bindings, vec!["(s:String, n:Int)"]);
        assert_eq!(annotated.transition("t").unwrap().guard.as_deref(), Some("n:Int > 1"));
        assert_eq!(annotate_net(&annotated), annotated);
    }
}
