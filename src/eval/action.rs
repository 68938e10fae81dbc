use super::term::TermEvaluator;
use super::{Binding, EvalResult};
use crate::ast::Action;

/// Evaluates every assignment against the same input binding and returns
/// only the assigned variables.
pub fn eval_action(action: &Action, bindings: &Binding) -> EvalResult<Binding> {
    let terms = TermEvaluator::new(bindings);
    let mut assigned = Binding::new();
    for assignment in &action.assignments {
        let value = terms.eval(&assignment.value)?;
        assigned.insert(assignment.target.clone(), value);
    }
    Ok(assigned)
}
