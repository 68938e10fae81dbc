use core::fmt;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::value::{syntax::escape, TypeTag, Value};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, Serialize, Deserialize,
)]
pub enum ArithOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, Serialize, Deserialize,
)]
pub enum CmpOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, Serialize, Deserialize,
)]
pub enum LogicOp {
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "xor")]
    Xor,
    #[strum(serialize = "implies")]
    Implies,
    #[strum(serialize = "iff")]
    Iff,
}

/// Built-in functions callable from terms.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    Display,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum Builtin {
    #[strum(serialize = "concat")]
    Concat,
    #[strum(serialize = "substring")]
    Substring,
    #[strum(serialize = "length")]
    Length,
    #[strum(serialize = "isSubstringOf")]
    IsSubstringOf,
    #[strum(serialize = "head")]
    Head,
    #[strum(serialize = "tail")]
    Tail,
    #[strum(serialize = "append")]
    Append,
    #[strum(serialize = "sublist")]
    Sublist,
    #[strum(serialize = "isSublistOf")]
    IsSublistOf,
    #[strum(serialize = "fst")]
    Fst,
    #[strum(serialize = "snd")]
    Snd,
}

impl Builtin {
    pub fn arity(self) -> usize {
        match self {
            Builtin::Length | Builtin::Head | Builtin::Tail | Builtin::Fst | Builtin::Snd => 1,
            Builtin::Concat
            | Builtin::IsSubstringOf
            | Builtin::Append
            | Builtin::IsSublistOf => 2,
            Builtin::Substring | Builtin::Sublist => 3,
        }
    }

    pub fn returns_bool(self) -> bool {
        matches!(self, Builtin::IsSubstringOf | Builtin::IsSublistOf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    IntLit(i64),
    BoolLit(bool),
    StringLit(String),
    ListLit(Vec<Term>),
    PairLit(Box<Term>, Box<Term>),
    Var {
        name: String,
        hint: Option<TypeTag>,
    },
    BinOp {
        op: ArithOp,
        left: Box<Term>,
        right: Box<Term>,
    },
    FunCall {
        func: Builtin,
        args: Vec<Term>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoolExpr {
    Lit(bool),
    Var {
        name: String,
        hint: Option<TypeTag>,
    },
    Not(Box<BoolExpr>),
    Logic {
        op: LogicOp,
        left: Box<BoolExpr>,
        right: Box<BoolExpr>,
    },
    Cmp {
        op: CmpOp,
        left: Term,
        right: Term,
    },
    Call {
        func: Builtin,
        args: Vec<Term>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    IntLit(i64),
    BoolLit(bool),
    Var {
        name: String,
        hint: Option<TypeTag>,
    },
    Pair(Box<Pattern>, Box<Pattern>),
    Tuple(Vec<Pattern>),
    List(Vec<Pattern>),
}

/// A transition action: simultaneous `name = term` assignments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Action {
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub target: String,
    pub value: Term,
}

impl Term {
    pub fn var<S: Into<String>>(name: S) -> Self {
        Term::Var {
            name: name.into(),
            hint: None,
        }
    }

    pub fn binop(op: ArithOp, left: Term, right: Term) -> Self {
        Term::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Lifts a runtime value back into a literal term.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Int(n) => Term::IntLit(*n),
            Value::Bool(b) => Term::BoolLit(*b),
            Value::String(s) => Term::StringLit(s.clone()),
            Value::List(items) => Term::ListLit(items.iter().map(Term::from_value).collect()),
            Value::Pair(a, b) => {
                Term::PairLit(Box::new(Term::from_value(a)), Box::new(Term::from_value(b)))
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars.is_empty()
    }

    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    pub fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Term::IntLit(_) | Term::BoolLit(_) | Term::StringLit(_) => {}
            Term::Var { name, .. } => {
                out.insert(name.clone());
            }
            Term::ListLit(items) => items.iter().for_each(|t| t.collect_variables(out)),
            Term::PairLit(a, b) | Term::BinOp { left: a, right: b, .. } => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
            Term::FunCall { args, .. } => args.iter().for_each(|t| t.collect_variables(out)),
        }
    }
}

impl BoolExpr {
    pub fn logic(op: LogicOp, left: BoolExpr, right: BoolExpr) -> Self {
        BoolExpr::Logic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    pub fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            BoolExpr::Lit(_) => {}
            BoolExpr::Var { name, .. } => {
                out.insert(name.clone());
            }
            BoolExpr::Not(inner) => inner.collect_variables(out),
            BoolExpr::Logic { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            BoolExpr::Cmp { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            BoolExpr::Call { args, .. } => args.iter().for_each(|t| t.collect_variables(out)),
        }
    }
}

impl Action {
    /// Variables read by the right-hand sides.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        for assignment in &self.assignments {
            assignment.value.collect_variables(&mut vars);
        }
        vars
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

fn write_args<T: fmt::Display>(f: &mut fmt::Formatter, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::IntLit(n) => write!(f, "{}", n),
            Term::BoolLit(true) => write!(f, "T"),
            Term::BoolLit(false) => write!(f, "F"),
            Term::StringLit(s) => write!(f, "'{}'", escape(s)),
            Term::ListLit(items) => {
                write!(f, "[")?;
                write_args(f, items)?;
                write!(f, "]")
            }
            Term::PairLit(a, b) => write!(f, "({}, {})", a, b),
            Term::Var { name, hint: None } => write!(f, "{}", name),
            Term::Var {
                name,
                hint: Some(tag),
            } => write!(f, "{}:{}", name, tag.lowercase()),
            Term::BinOp { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Term::FunCall { func, args } => {
                write!(f, "{}(", func)?;
                write_args(f, args)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BoolExpr::Lit(true) => write!(f, "T"),
            BoolExpr::Lit(false) => write!(f, "F"),
            BoolExpr::Var { name, hint: None } => write!(f, "{}", name),
            BoolExpr::Var {
                name,
                hint: Some(tag),
            } => write!(f, "{}:{}", name, tag.lowercase()),
            BoolExpr::Not(inner) => write!(f, "not {}", inner),
            BoolExpr::Logic { op, left, right } => write!(f, "({} {} {})", left, op, right),
            BoolExpr::Cmp { op, left, right } => write!(f, "{} {} {}", left, op, right),
            BoolExpr::Call { func, args } => {
                write!(f, "{}(", func)?;
                write_args(f, args)?;
                write!(f, ")")
            }
        }
    }
}

/// Patterns print with capitalized type names and `T`/`F` literals.
impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pattern::IntLit(n) => write!(f, "{}", n),
            Pattern::BoolLit(true) => write!(f, "T"),
            Pattern::BoolLit(false) => write!(f, "F"),
            Pattern::Var { name, hint: None } => write!(f, "{}", name),
            Pattern::Var {
                name,
                hint: Some(tag),
            } => write!(f, "{}:{}", name, tag),
            Pattern::Pair(a, b) => write!(f, "({}, {})", a, b),
            Pattern::Tuple(items) => {
                write!(f, "(")?;
                write_args(f, items)?;
                write!(f, ")")
            }
            Pattern::List(items) => {
                write!(f, "[")?;
                write_args(f, items)?;
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, assignment) in self.assignments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", assignment.target, assignment.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_builtin_names() {
        assert_eq!(Builtin::from_str("isSubstringOf").unwrap(), Builtin::IsSubstringOf);
        assert_eq!(Builtin::Sublist.to_string(), "sublist");
        assert!(Builtin::from_str("reverse").is_err());
        assert_eq!(Builtin::Substring.arity(), 3);
        assert!(Builtin::IsSublistOf.returns_bool());
    }

    #[test]
    fn test_term_display_parenthesizes_binops() {
        let term = Term::binop(
            ArithOp::Add,
            Term::IntLit(1),
            Term::binop(ArithOp::Mul, Term::var("x"), Term::IntLit(3)),
        );
        assert_eq!(term.to_string(), "(1 + (x * 3))");
    }

    #[test]
    fn test_term_variables() {
        let term = Term::FunCall {
            func: Builtin::Concat,
            args: vec![Term::var("b"), Term::PairLit(Box::new(Term::var("a")), Box::new(Term::IntLit(1)))],
        };
        let vars: Vec<_> = term.variables().into_iter().collect();
        assert_eq!(vars, vec!["a".to_string(), "b".to_string()]);
        assert!(!term.is_closed());
        assert!(Term::from_value(&Value::pair(Value::Int(1), Value::Bool(true))).is_closed());
    }
}
