//! Static type inference for arc/guard variables and text annotation.

mod annotate;
mod inference;

use std::collections::BTreeMap;

use strum::{Display, EnumString};

use crate::value::{TypeTag, Value};

pub use annotate::{annotate_net, auto_annotate_types, capitalize_type_names};
pub use inference::{infer_variable_types, static_type};

pub type TypeMap = BTreeMap<String, TypeTag>;

/// Which kind of net element a type query is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ElementKind {
    Arc,
    Transition,
}

pub fn infer_token_type(value: &Value) -> TypeTag {
    value.type_tag()
}

/// Names that are never treated as variables when scanning expression text.
pub(crate) const RESERVED_WORDS: [&str; 8] =
    ["true", "false", "and", "or", "not", "xor", "implies", "iff"];
