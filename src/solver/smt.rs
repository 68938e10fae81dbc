use core::fmt;
use std::time::Duration;

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, map_res},
    error::{context, VerboseError},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use super::{CheckOutcome, Model, ModelValue, SolverError, SolverResult};
use crate::ast::{ArithOp, CmpOp, LogicOp};

type SmtParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    Int,
    Bool,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Sort::Int => write!(f, "Int"),
            Sort::Bool => write!(f, "Bool"),
        }
    }
}

/// Solver-level expression over integer and boolean constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtExpr {
    Int(i64),
    Bool(bool),
    Const(String, Sort),
    /// `Div` truncates toward zero, matching pure evaluation.
    Arith(ArithOp, Box<SmtExpr>, Box<SmtExpr>),
    Cmp(CmpOp, Box<SmtExpr>, Box<SmtExpr>),
    Not(Box<SmtExpr>),
    Logic(LogicOp, Box<SmtExpr>, Box<SmtExpr>),
}

impl SmtExpr {
    pub fn cmp(op: CmpOp, left: SmtExpr, right: SmtExpr) -> Self {
        SmtExpr::Cmp(op, Box::new(left), Box::new(right))
    }

    pub fn logic(op: LogicOp, left: SmtExpr, right: SmtExpr) -> Self {
        SmtExpr::Logic(op, Box::new(left), Box::new(right))
    }

    pub fn not(inner: SmtExpr) -> Self {
        SmtExpr::Not(Box::new(inner))
    }

    /// Conjunction of all parts; `true` when empty.
    pub fn all(parts: Vec<SmtExpr>) -> Self {
        parts
            .into_iter()
            .reduce(|acc, part| SmtExpr::logic(LogicOp::And, acc, part))
            .unwrap_or(SmtExpr::Bool(true))
    }

    pub fn sort(&self) -> Sort {
        match self {
            SmtExpr::Int(_) | SmtExpr::Arith(..) => Sort::Int,
            SmtExpr::Const(_, sort) => *sort,
            SmtExpr::Bool(_) | SmtExpr::Cmp(..) | SmtExpr::Not(_) | SmtExpr::Logic(..) => {
                Sort::Bool
            }
        }
    }
}

fn write_int(f: &mut fmt::Formatter, n: i64) -> fmt::Result {
    if n < 0 {
        write!(f, "(- {})", n.unsigned_abs())
    } else {
        write!(f, "{}", n)
    }
}

/// SMT-LIB2 rendering.
impl fmt::Display for SmtExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SmtExpr::Int(n) => write_int(f, *n),
            SmtExpr::Bool(b) => write!(f, "{}", b),
            SmtExpr::Const(name, _) => write!(f, "|{}|", name),
            SmtExpr::Arith(ArithOp::Div, a, b) => write!(
                f,
                "(ite (= (< {a} 0) (< {b} 0)) (div (abs {a}) (abs {b})) (- (div (abs {a}) (abs {b}))))",
                a = a,
                b = b
            ),
            SmtExpr::Arith(op, a, b) => write!(f, "({} {} {})", op, a, b),
            SmtExpr::Cmp(CmpOp::Eq, a, b) => write!(f, "(= {} {})", a, b),
            SmtExpr::Cmp(CmpOp::Ne, a, b) => write!(f, "(not (= {} {}))", a, b),
            SmtExpr::Cmp(op, a, b) => write!(f, "({} {} {})", op, a, b),
            SmtExpr::Not(inner) => write!(f, "(not {})", inner),
            SmtExpr::Logic(op, a, b) => {
                let symbol = match op {
                    LogicOp::And => "and",
                    LogicOp::Or => "or",
                    LogicOp::Xor => "xor",
                    LogicOp::Implies => "=>",
                    LogicOp::Iff => "=",
                };
                write!(f, "({} {} {})", symbol, a, b)
            }
        }
    }
}

/// One satisfiability check: declared constants plus assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct SmtQuery {
    pub declarations: Vec<(String, Sort)>,
    pub assertions: Vec<SmtExpr>,
    pub timeout: Duration,
}

impl SmtQuery {
    pub fn to_script(&self) -> String {
        let mut script = String::from("(set-option :produce-models true)\n");
        script.push_str(&format!("(set-option :timeout {})\n", self.timeout.as_millis()));
        for (name, sort) in &self.declarations {
            script.push_str(&format!("(declare-const |{}| {})\n", name, sort));
        }
        for assertion in &self.assertions {
            script.push_str(&format!("(assert {})\n", assertion));
        }
        script.push_str("(check-sat)\n");
        if !self.declarations.is_empty() {
            let names = self
                .declarations
                .iter()
                .map(|(name, _)| format!("|{}|", name))
                .collect::<Vec<_>>()
                .join(" ");
            script.push_str(&format!("(get-value ({}))\n", names));
        }
        script.push_str("(exit)\n");
        script
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> SmtParseResult<'a, O>
where
    F: FnMut(&'a str) -> SmtParseResult<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn symbol(input: &str) -> SmtParseResult<&str> {
    context(
        "symbol",
        alt((
            delimited(char('|'), is_not("|"), char('|')),
            take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')'),
        )),
    )(input)
}

fn model_value(input: &str) -> SmtParseResult<ModelValue> {
    context(
        "model value",
        alt((
            map(tag("true"), |_| ModelValue::Bool(true)),
            map(tag("false"), |_| ModelValue::Bool(false)),
            map_res(digit1, |d: &str| d.parse::<i64>().map(ModelValue::Int)),
            map_res(
                delimited(
                    pair(char('('), ws(char('-'))),
                    digit1,
                    preceded(multispace0, char(')')),
                ),
                |d: &str| format!("-{}", d).parse::<i64>().map(ModelValue::Int),
            ),
        )),
    )(input)
}

fn get_value_response(input: &str) -> SmtParseResult<Vec<(&str, ModelValue)>> {
    context(
        "get-value response",
        delimited(
            ws(char('(')),
            many0(ws(map(
                tuple((char('('), ws(symbol), ws(model_value), char(')'))),
                |(_, name, value, _)| (name, value),
            ))),
            ws(char(')')),
        ),
    )(input)
}

/// Interprets the stdout of `(check-sat)` followed by an optional `(get-value ...)`.
pub fn parse_check_response(output: &str) -> SolverResult<CheckOutcome> {
    let trimmed = output.trim_start();
    let (status, rest) = match trimmed.find('\n') {
        Some(i) => (trimmed[..i].trim(), &trimmed[i + 1..]),
        None => (trimmed.trim(), ""),
    };
    match status {
        "unsat" => Ok(CheckOutcome::Unsat),
        "unknown" => Ok(CheckOutcome::Unknown("solver returned unknown".to_string())),
        "sat" => {
            let rest = rest.trim();
            if rest.is_empty() {
                return Ok(CheckOutcome::Sat(Model::default()));
            }
            let (_, pairs) = all_consuming(get_value_response)(rest)
                .map_err(|e| SolverError::Internal(format!("unreadable model: {}", e)))?;
            let values = pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect();
            Ok(CheckOutcome::Sat(Model { values }))
        }
        other => Err(SolverError::Internal(format!(
            "unexpected solver output: {}",
            other
        ))),
    }
}
