//! Runtime values carried by tokens and produced by evaluation.
//!
//! Values print and parse in the shared token syntax (`T`, `F`, `42`,
//! `'text'`, `[a, b]`, `(a, b)`); see [`syntax`].

pub mod syntax;

use core::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use self::syntax::ValueSyntaxError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Int(i64),
    Bool(bool),
    String(String),
    List(Vec<Value>),
    Pair(Box<Value>, Box<Value>),
}

/// Discriminator used for static type hints (`x:Int`) and inference results.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    Display,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum TypeTag {
    #[strum(serialize = "Int")]
    Int,
    #[strum(serialize = "Bool")]
    Bool,
    #[strum(serialize = "Pair")]
    Pair,
    #[strum(serialize = "String")]
    String,
    #[strum(serialize = "List")]
    List,
}

impl TypeTag {
    /// Lowercase spelling used when terms are printed back (`x:int`).
    pub fn lowercase(self) -> &'static str {
        match self {
            TypeTag::Int => "int",
            TypeTag::Bool => "bool",
            TypeTag::Pair => "pair",
            TypeTag::String => "string",
            TypeTag::List => "list",
        }
    }
}

impl Value {
    pub fn pair(first: Value, second: Value) -> Self {
        Value::Pair(Box::new(first), Box::new(second))
    }

    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::String(s.into())
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Int(_) => TypeTag::Int,
            Value::Bool(_) => TypeTag::Bool,
            Value::String(_) => TypeTag::String,
            Value::List(_) => TypeTag::List,
            Value::Pair(_, _) => TypeTag::Pair,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(true) => write!(f, "T"),
            Value::Bool(false) => write!(f, "F"),
            Value::String(s) => write!(f, "'{}'", syntax::escape(s)),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Pair(first, second) => write!(f, "({}, {})", first, second),
        }
    }
}

impl FromStr for Value {
    type Err = ValueSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        syntax::parse_value(s)
    }
}

// Tokens travel through JSON as their token syntax string.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        syntax::parse_value(&text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_token_syntax() {
        let value = Value::List(vec![
            Value::Int(1),
            Value::pair(Value::Bool(true), Value::string("a'b")),
            Value::List(vec![]),
        ]);
        assert_eq!(value.to_string(), r"[1, (T, 'a\'b'), []]");
        assert_eq!(Value::Int(-7).to_string(), "-7");
    }

    #[test]
    fn test_type_tag_parses_case_insensitively() {
        assert_eq!(TypeTag::from_str("int").unwrap(), TypeTag::Int);
        assert_eq!(TypeTag::from_str("LIST").unwrap(), TypeTag::List);
        assert!(TypeTag::from_str("float").is_err());
        assert_eq!(TypeTag::Pair.to_string(), "Pair");
    }

    #[test]
    fn test_cross_variant_values_are_unequal() {
        assert_ne!(Value::Int(1), Value::Bool(true));
        assert_ne!(Value::List(vec![Value::Int(1)]), Value::Int(1));
    }

    #[test]
    fn test_serde_uses_token_syntax() {
        let value = Value::pair(Value::Int(2), Value::Bool(false));
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"(2, F)\"");
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
