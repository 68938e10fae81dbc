//! Compiled transitions: parsed guard/action/arc bindings, enabling search
//! over a marking, and firing.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_recursion::async_recursion;
use dashmap::DashMap;
use lazy_static::lazy_static;
use tracing::{debug, info, trace};

use crate::analyzer::{parse_action, parse_boolean, parse_pattern, parse_term, ParseResult};
use crate::ast::{Action, BoolExpr, Pattern, Term};
use crate::eval::{eval_action, eval_bool, eval_term, Binding, EvalError};
use crate::net::{Marking, Net, NetError};
use crate::pattern::{instantiate, match_pattern, pattern_variables};
use crate::solver::{check_predicate_sat, solve_guard, Confidence, SolverContext, SolverError};
use crate::value::Value;
use crate::InternalResult;

lazy_static! {
    static ref GLOBAL_CACHE: ParseCache = ParseCache::new();
}

/// Parsed guards, patterns, terms and actions keyed by source text.
#[derive(Debug, Default)]
pub struct ParseCache {
    guards: DashMap<String, Arc<BoolExpr>>,
    patterns: DashMap<String, Arc<Pattern>>,
    terms: DashMap<String, Arc<Term>>,
    actions: DashMap<String, Arc<Action>>,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static ParseCache {
        &GLOBAL_CACHE
    }

    pub fn guard(&self, src: &str) -> ParseResult<Arc<BoolExpr>> {
        cached(&self.guards, src, parse_boolean)
    }

    pub fn pattern(&self, src: &str) -> ParseResult<Arc<Pattern>> {
        cached(&self.patterns, src, parse_pattern)
    }

    pub fn term(&self, src: &str) -> ParseResult<Arc<Term>> {
        cached(&self.terms, src, parse_term)
    }

    pub fn action(&self, src: &str) -> ParseResult<Arc<Action>> {
        cached(&self.actions, src, parse_action)
    }

    pub fn len(&self) -> usize {
        self.guards.len() + self.patterns.len() + self.terms.len() + self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cached<T>(
    map: &DashMap<String, Arc<T>>,
    src: &str,
    parse: impl Fn(&str) -> ParseResult<T>,
) -> ParseResult<Arc<T>> {
    if let Some(hit) = map.get(src) {
        return Ok(Arc::clone(hit.value()));
    }
    let parsed = Arc::new(parse(src)?);
    map.insert(src.to_string(), Arc::clone(&parsed));
    Ok(parsed)
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputBinding {
    Pattern(Arc<Pattern>),
    Term(Arc<Term>),
}

#[derive(Debug, Clone)]
pub struct InputArc {
    pub arc_id: String,
    pub place_id: String,
    pub patterns: Vec<Arc<Pattern>>,
}

#[derive(Debug, Clone)]
pub struct OutputArc {
    pub arc_id: String,
    pub place_id: String,
    pub bindings: Vec<OutputBinding>,
}

/// A token chosen from an input place.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPick {
    pub arc_id: String,
    pub place_id: String,
    pub index: usize,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enabling {
    pub binding: Binding,
    pub picks: Vec<TokenPick>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Firing {
    pub transition_id: String,
    /// Input binding, extended with solver-chosen values for free guard variables.
    pub binding: Binding,
    pub assignments: Binding,
    pub consumed: Vec<TokenPick>,
    pub produced: Vec<(String, Value)>,
}

impl Firing {
    pub fn apply(&self, marking: &mut Marking) {
        let mut removals: Vec<&TokenPick> = self.consumed.iter().collect();
        removals.sort_by(|a, b| b.index.cmp(&a.index));
        for pick in removals {
            if let Some(tokens) = marking.get_mut(&pick.place_id) {
                if pick.index < tokens.len() {
                    tokens.remove(pick.index);
                }
            }
        }
        for (place_id, value) in &self.produced {
            marking.entry(place_id.clone()).or_default().push(value.clone());
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledTransition {
    pub id: String,
    pub guard: Option<Arc<BoolExpr>>,
    pub action: Arc<Action>,
    pub inputs: Vec<InputArc>,
    pub outputs: Vec<OutputArc>,
}

impl CompiledTransition {
    pub fn compile(net: &Net, transition_id: &str, cache: &ParseCache) -> InternalResult<Self> {
        let transition = net
            .transition(transition_id)
            .ok_or_else(|| NetError::UnknownTransition(transition_id.to_string()))?;

        let guard = match transition.guard.as_deref().map(str::trim) {
            Some(src) if !src.is_empty() => Some(cache.guard(src)?),
            _ => None,
        };
        let action = match transition.action.as_deref() {
            Some(src) => cache.action(src)?,
            None => Arc::new(Action::default()),
        };

        let mut inputs = Vec::new();
        for arc in net.input_arcs(transition_id) {
            let patterns = arc
                .bindings
                .iter()
                .map(|b| cache.pattern(b))
                .collect::<ParseResult<Vec<_>>>()?;
            inputs.push(InputArc {
                arc_id: arc.id.clone(),
                place_id: arc.source.clone(),
                patterns,
            });
        }

        let mut outputs = Vec::new();
        for arc in net.output_arcs(transition_id) {
            let mut bindings = Vec::new();
            for src in &arc.bindings {
                let binding = match cache.pattern(src) {
                    Ok(pattern) => OutputBinding::Pattern(pattern),
                    Err(_) => OutputBinding::Term(cache.term(src)?),
                };
                bindings.push(binding);
            }
            outputs.push(OutputArc {
                arc_id: arc.id.clone(),
                place_id: arc.target.clone(),
                bindings,
            });
        }

        debug!(
            "compiled transition {} ({} inputs, {} outputs)",
            transition_id,
            inputs.len(),
            outputs.len()
        );
        Ok(Self {
            id: transition_id.to_string(),
            guard,
            action,
            inputs,
            outputs,
        })
    }

    pub fn input_variables(&self) -> BTreeSet<String> {
        self.inputs
            .iter()
            .flat_map(|arc| arc.patterns.iter())
            .flat_map(|p| pattern_variables(p))
            .collect()
    }

    /// Guard and output variables that no input arc binds and the action
    /// does not assign. These are left to the solver.
    pub fn unbound_variables(&self) -> BTreeSet<String> {
        let mut bound = self.input_variables();
        bound.extend(self.action.assignments.iter().map(|a| a.target.clone()));

        let mut used = BTreeSet::new();
        if let Some(guard) = &self.guard {
            guard.collect_variables(&mut used);
        }
        for output in self.outputs.iter().flat_map(|arc| arc.bindings.iter()) {
            match output {
                OutputBinding::Pattern(pattern) => used.extend(pattern_variables(pattern)),
                OutputBinding::Term(term) => term.collect_variables(&mut used),
            }
        }
        used.retain(|v| !bound.contains(v));
        used
    }

    /// Backtracking search for distinct input tokens that match every input
    /// pattern consistently and satisfy the guard.
    pub async fn find_enabling_binding(
        &self,
        marking: &Marking,
        solver: Option<&SolverContext>,
        max_tokens_per_place: usize,
    ) -> InternalResult<Option<Enabling>> {
        // (input arc, pattern) pairs, one per token to pick.
        let slots: Vec<(usize, usize)> = self
            .inputs
            .iter()
            .enumerate()
            .flat_map(|(i, arc)| (0..arc.patterns.len()).map(move |j| (i, j)))
            .collect();
        let mut picks = Vec::with_capacity(slots.len());
        let found = self
            .search(&slots, Binding::new(), &mut picks, marking, solver, max_tokens_per_place)
            .await?;
        match &found {
            Some(_) => debug!("transition {} is enabled", self.id),
            None => debug!("transition {} is not enabled", self.id),
        }
        Ok(found)
    }

    #[async_recursion]
    async fn search(
        &self,
        slots: &[(usize, usize)],
        binding: Binding,
        picks: &mut Vec<TokenPick>,
        marking: &Marking,
        solver: Option<&SolverContext>,
        max_tokens: usize,
    ) -> InternalResult<Option<Enabling>> {
        let Some((&(arc_index, pattern_index), rest)) = slots.split_first() else {
            if self.guard_holds(&binding, solver).await? {
                return Ok(Some(Enabling {
                    binding,
                    picks: picks.clone(),
                }));
            }
            return Ok(None);
        };

        let arc = &self.inputs[arc_index];
        let pattern = &arc.patterns[pattern_index];
        let tokens = marking
            .get(&arc.place_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for (index, token) in tokens.iter().enumerate().take(max_tokens) {
            let taken = picks
                .iter()
                .any(|p| p.place_id == arc.place_id && p.index == index);
            if taken {
                continue;
            }
            let Some(matched) = match_pattern(pattern, token) else {
                continue;
            };
            let Some(merged) = merge(&binding, matched) else {
                trace!("token {} conflicts with earlier bindings", token);
                continue;
            };
            picks.push(TokenPick {
                arc_id: arc.arc_id.clone(),
                place_id: arc.place_id.clone(),
                index,
                value: token.clone(),
            });
            if let Some(enabling) = self
                .search(rest, merged, picks, marking, solver, max_tokens)
                .await?
            {
                return Ok(Some(enabling));
            }
            picks.pop();
        }
        Ok(None)
    }

    /// Pure evaluation first. When that fails (a free variable, a zero
    /// divisor, an ill-typed token) the solver decides; without a solver, or
    /// when the solver cannot express the guard, the candidate does not enable.
    async fn guard_holds(&self, binding: &Binding, solver: Option<&SolverContext>) -> InternalResult<bool> {
        let Some(guard) = &self.guard else {
            return Ok(true);
        };
        let err = match eval_bool(guard, binding) {
            Ok(holds) => return Ok(holds),
            Err(e) => e,
        };
        let Some(context) = solver else {
            trace!("guard of {} not evaluable without a solver: {}", self.id, err);
            return Ok(false);
        };
        trace!("guard of {} failed pure evaluation ({}), asking solver", self.id, err);
        match check_predicate_sat(context, guard, binding).await {
            Ok(sat) => Ok(sat),
            Err(e) if e.is_backend_failure() => Err(e.into()),
            Err(e) => {
                debug!("guard of {} rejected candidate: {}", self.id, e);
                Ok(false)
            }
        }
    }

    /// Fires with an enabling binding. Free guard variables are fixed by the
    /// solver first; the action then runs and output bindings build tokens.
    pub async fn fire(
        &self,
        enabling: &Enabling,
        solver: Option<&SolverContext>,
    ) -> InternalResult<Firing> {
        let mut binding = enabling.binding.clone();
        if let Some(guard) = &self.guard {
            let free: Vec<_> = guard
                .variables()
                .into_iter()
                .filter(|v| !binding.contains_key(v))
                .collect();
            if !free.is_empty() {
                let context = solver.ok_or_else(|| EvalError::UnboundVariable(free[0].clone()))?;
                let outcome = solve_guard(context, guard, &binding, 1).await?;
                if let Confidence::Synthesized { reason } = outcome.confidence {
                    return Err(SolverError::Internal(reason).into());
                }
                let solution = outcome
                    .solutions
                    .into_iter()
                    .next()
                    .ok_or(SolverError::Unsat)?;
                binding.extend(solution);
            }
        }

        let assignments = eval_action(&self.action, &binding)?;
        let mut env = binding.clone();
        env.extend(assignments.clone());

        let mut produced = Vec::new();
        for arc in &self.outputs {
            for output in &arc.bindings {
                let value = match output {
                    OutputBinding::Pattern(pattern) => instantiate(pattern, &env)?,
                    OutputBinding::Term(term) => eval_term(term, &env)?,
                };
                produced.push((arc.place_id.clone(), value));
            }
        }
        info!("fired {}: produced {} tokens", self.id, produced.len());
        Ok(Firing {
            transition_id: self.id.clone(),
            binding,
            assignments,
            consumed: enabling.picks.clone(),
            produced,
        })
    }
}

/// Union of two bindings, or `None` when they disagree on a variable.
fn merge(base: &Binding, extra: Binding) -> Option<Binding> {
    let mut merged = base.clone();
    for (name, value) in extra {
        match merged.get(&name) {
            Some(existing) if *existing != value => return None,
            Some(_) => {}
            None => {
                merged.insert(name, value);
            }
        }
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use pretty_assertions::assert_eq;

    fn net(json: &str) -> Net {
        Net::from_json(json).unwrap()
    }

    const PAIRS: &str = r#"{
        "places": [
            {"id": "src", "tokens": ["(1, 'a')", "(5, 'b')", "(7, 'c')"]},
            {"id": "dst"}
        ],
        "transitions": [{"id": "t", "guard": "n > 4 and n != 7", "action": "m = n * 2"}],
        "arcs": [
            {"id": "in", "source": "src", "target": "t", "bindings": ["(n, s)"]},
            {"id": "out", "source": "t", "target": "dst", "bindings": ["(m, s)", "length(s) + n"]}
        ]
    }"#;

    #[tokio::test]
    async fn test_enable_and_fire() {
        let net = net(PAIRS);
        let cache = ParseCache::new();
        let compiled = CompiledTransition::compile(&net, "t", &cache).unwrap();
        let mut marking = net.marking();
        let enabling = compiled
            .find_enabling_binding(&marking, None, 20)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(enabling.binding.get("n"), Some(&Value::Int(5)));
        assert_eq!(enabling.picks[0].index, 1);

        let firing = compiled.fire(&enabling, None).await.unwrap();
        assert_eq!(firing.assignments.get("m"), Some(&Value::Int(10)));
        assert_eq!(
            firing.produced,
            vec![
                ("dst".to_string(), Value::pair(Value::Int(10), Value::string("b"))),
                ("dst".to_string(), Value::Int(6)),
            ]
        );
        firing.apply(&mut marking);
        assert_eq!(marking["src"].len(), 2);
        assert_eq!(marking["dst"].len(), 2);
        assert!(cache.len() >= 4);
    }

    #[tokio::test]
    async fn test_distinct_tokens_and_shared_variables() {
        let net = net(
            r#"{
            "places": [{"id": "p", "tokens": ["1", "2", "2"]}, {"id": "q", "tokens": ["2"]}],
            "transitions": [{"id": "t"}],
            "arcs": [
                {"id": "a", "source": "p", "target": "t", "bindings": ["x", "x"]},
                {"id": "b", "source": "q", "target": "t", "bindings": ["x"]}
            ]
        }"#,
        );
        let compiled = CompiledTransition::compile(&net, "t", &ParseCache::new()).unwrap();
        let enabling = compiled
            .find_enabling_binding(&net.marking(), None, 20)
            .await
            .unwrap()
            .unwrap();
        let indices: Vec<usize> = enabling.picks.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 0]);
        assert_eq!(enabling.binding.get("x"), Some(&Value::Int(2)));
    }

    #[tokio::test]
    async fn test_not_enabled() {
        let net = net(
            r#"{
            "places": [{"id": "p", "tokens": ["1"]}],
            "transitions": [{"id": "t", "guard": "x > 1"}],
            "arcs": [{"id": "a", "source": "p", "target": "t", "bindings": ["x"]}]
        }"#,
        );
        let compiled = CompiledTransition::compile(&net, "t", &ParseCache::new()).unwrap();
        assert!(compiled
            .find_enabling_binding(&net.marking(), None, 20)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_free_guard_variable_uses_solver() {
        let net = net(
            r#"{
            "places": [{"id": "p", "tokens": ["3"]}, {"id": "q"}],
            "transitions": [{"id": "t", "guard": "x + y == 10"}],
            "arcs": [
                {"id": "a", "source": "p", "target": "t", "bindings": ["x"]},
                {"id": "b", "source": "t", "target": "q", "bindings": ["y"]}
            ]
        }"#,
        );
        let compiled = CompiledTransition::compile(&net, "t", &ParseCache::new()).unwrap();
        assert_eq!(
            compiled.unbound_variables().into_iter().collect::<Vec<_>>(),
            vec!["y".to_string()]
        );

        let marking = net.marking();
        assert!(compiled
            .find_enabling_binding(&marking, None, 20)
            .await
            .unwrap()
            .is_none());

        let solver = SolverContext::bounded(SolverConfig::default());
        let enabling = compiled
            .find_enabling_binding(&marking, Some(&solver), 20)
            .await
            .unwrap()
            .unwrap();
        let firing = compiled.fire(&enabling, Some(&solver)).await.unwrap();
        assert_eq!(firing.binding.get("y"), Some(&Value::Int(7)));
        assert_eq!(firing.produced, vec![("q".to_string(), Value::Int(7))]);
    }

    #[test]
    fn test_unbound_variables_cover_outputs() {
        let net = net(
            r#"{
            "places": [{"id": "p", "tokens": ["1"]}, {"id": "q"}],
            "transitions": [{"id": "t", "guard": "x < z", "action": "m = x + 1"}],
            "arcs": [
                {"id": "a", "source": "p", "target": "t", "bindings": ["x"]},
                {"id": "b", "source": "t", "target": "q", "bindings": ["(m, w)", "x + k"]}
            ]
        }"#,
        );
        let compiled = CompiledTransition::compile(&net, "t", &ParseCache::new()).unwrap();
        assert_eq!(
            compiled.unbound_variables().into_iter().collect::<Vec<_>>(),
            vec!["k".to_string(), "w".to_string(), "z".to_string()]
        );
    }

    #[test]
    fn test_unknown_transition() {
        let err = CompiledTransition::compile(&Net::default(), "nope", &ParseCache::new()).unwrap_err();
        assert!(matches!(err, crate::Error::Net(NetError::UnknownTransition(_))));
    }

    #[test]
    fn test_global_cache_reuses_entries() {
        let cache = ParseCache::global();
        let a = cache.guard("x > 1").unwrap();
        let b = cache.guard("x > 1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
