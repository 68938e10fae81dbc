//! Minimal algebraic Petri net model: places with tokens, transitions with
//! guards and actions, and arcs carrying binding patterns.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;
use crate::{config, InternalResult};

/// Place id to its tokens.
pub type Marking = BTreeMap<String, Vec<Value>>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetError {
    #[error("Unknown transition: {0}")]
    UnknownTransition(String),
    #[error("Unknown place: {0}")]
    UnknownPlace(String),
    #[error("Arc {arc} must connect a place and a transition")]
    InvalidArc { arc: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Net {
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub arcs: Vec<NetArc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    #[serde(default)]
    pub tokens: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    #[serde(default)]
    pub guard: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetArc {
    pub id: String,
    pub source: String,
    pub target: String,
    /// One pattern (input arcs) or pattern/term (output arcs) per token moved.
    #[serde(default)]
    pub bindings: Vec<String>,
}

impl Net {
    pub fn load<P: AsRef<Path>>(path: P) -> InternalResult<Net> {
        let net: Net = config::from_file(path)?;
        net.validate()?;
        Ok(net)
    }

    pub fn from_json(json: &str) -> InternalResult<Net> {
        let net: Net = config::from_str(json)?;
        net.validate()?;
        Ok(net)
    }

    /// Every arc joins a place to a transition.
    pub fn validate(&self) -> Result<(), NetError> {
        for arc in &self.arcs {
            let place_to_transition =
                self.place(&arc.source).is_some() && self.transition(&arc.target).is_some();
            let transition_to_place =
                self.transition(&arc.source).is_some() && self.place(&arc.target).is_some();
            if !(place_to_transition || transition_to_place) {
                return Err(NetError::InvalidArc {
                    arc: arc.id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn place(&self, id: &str) -> Option<&Place> {
        self.places.iter().find(|p| p.id == id)
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id == id)
    }

    pub fn arc(&self, id: &str) -> Option<&NetArc> {
        self.arcs.iter().find(|a| a.id == id)
    }

    /// Arcs from a place into the transition.
    pub fn input_arcs<'a>(&'a self, transition_id: &'a str) -> impl Iterator<Item = &'a NetArc> + 'a {
        self.arcs
            .iter()
            .filter(move |a| a.target == transition_id && self.place(&a.source).is_some())
    }

    /// Arcs from the transition into a place.
    pub fn output_arcs<'a>(&'a self, transition_id: &'a str) -> impl Iterator<Item = &'a NetArc> + 'a {
        self.arcs
            .iter()
            .filter(move |a| a.source == transition_id && self.place(&a.target).is_some())
    }

    pub fn marking(&self) -> Marking {
        self.places
            .iter()
            .map(|p| (p.id.clone(), p.tokens.clone()))
            .collect()
    }

    pub fn set_marking(&mut self, marking: &Marking) {
        for place in &mut self.places {
            if let Some(tokens) = marking.get(&place.id) {
                place.tokens = tokens.clone();
            }
        }
    }
}
