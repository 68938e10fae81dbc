use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::bounded::BoundedSearch;
use super::smt::{SmtExpr, SmtQuery, Sort};
use super::z3_process::Z3Process;
use super::{CheckOutcome, SolverBackend, SolverResult};
use crate::config::{BackendKind, SolverConfig};

static GLOBAL: OnceCell<Arc<SolverContext>> = OnceCell::const_new();

/// A configured backend. Cheap to share; each check builds its own query,
/// so concurrent sessions do not observe each other's assertions.
pub struct SolverContext {
    backend: Arc<dyn SolverBackend>,
    config: SolverConfig,
}

impl std::fmt::Debug for SolverContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverContext")
            .field("backend", &self.backend.name())
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

impl SolverContext {
    pub fn new(backend: Arc<dyn SolverBackend>, config: SolverConfig) -> Self {
        Self { backend, config }
    }

    pub fn bounded(config: SolverConfig) -> Self {
        let backend = BoundedSearch::new(config.search_bound, config.search_budget);
        Self::new(Arc::new(backend), config)
    }

    /// Resolves the configured backend, probing for z3 when set to `auto`.
    pub async fn from_config(config: SolverConfig) -> SolverResult<Self> {
        match config.backend {
            BackendKind::Bounded => Ok(Self::bounded(config)),
            BackendKind::Z3 => {
                let z3 = Z3Process::new(&config.z3_path);
                z3.probe().await?;
                Ok(Self::new(Arc::new(z3), config))
            }
            BackendKind::Auto => {
                let z3 = Z3Process::new(&config.z3_path);
                match z3.probe().await {
                    Ok(_) => Ok(Self::new(Arc::new(z3), config)),
                    Err(e) => {
                        warn!("z3 unavailable, using bounded search: {}", e);
                        Ok(Self::bounded(config))
                    }
                }
            }
        }
    }

    /// Process-wide context built from the default configuration on first use.
    pub async fn global() -> Arc<SolverContext> {
        GLOBAL
            .get_or_init(|| async {
                let config = SolverConfig {
                    backend: BackendKind::Auto,
                    ..SolverConfig::default()
                };
                let context = match Self::from_config(config.clone()).await {
                    Ok(context) => context,
                    Err(_) => Self::bounded(config),
                };
                info!("Global solver backend: {}", context.backend_name());
                Arc::new(context)
            })
            .await
            .clone()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    pub fn session(&self) -> SolverSession<'_> {
        SolverSession {
            context: self,
            declarations: Vec::new(),
            assertions: Vec::new(),
        }
    }
}

/// Accumulates declarations and assertions for repeated checks, such as
/// model enumeration with blocking clauses.
pub struct SolverSession<'a> {
    context: &'a SolverContext,
    declarations: Vec<(String, Sort)>,
    assertions: Vec<SmtExpr>,
}

impl<'a> SolverSession<'a> {
    pub fn declare(&mut self, name: &str, sort: Sort) {
        if !self.declarations.iter().any(|(n, _)| n == name) {
            self.declarations.push((name.to_string(), sort));
        }
    }

    pub fn assert(&mut self, expr: SmtExpr) {
        self.assertions.push(expr);
    }

    pub fn declarations(&self) -> &[(String, Sort)] {
        &self.declarations
    }

    pub async fn check(&self) -> SolverResult<CheckOutcome> {
        let query = SmtQuery {
            declarations: self.declarations.clone(),
            assertions: self.assertions.clone(),
            timeout: self.context.timeout(),
        };
        let outcome = self.context.backend.check(&query).await?;
        debug!(
            "{} check with {} assertions: {:?}",
            self.context.backend_name(),
            self.assertions.len(),
            outcome
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CmpOp;
    use crate::solver::{MockSolverBackend, ModelValue};

    #[tokio::test]
    async fn test_session_builds_query_from_state() {
        let mut backend = MockSolverBackend::new();
        backend.expect_name().return_const("mock");
        backend
            .expect_check()
            .withf(|q: &SmtQuery| q.declarations.len() == 1 && q.assertions.len() == 2)
            .times(1)
            .returning(|_| Ok(CheckOutcome::Unsat));
        let context = SolverContext::new(Arc::new(backend), SolverConfig::default());

        let mut session = context.session();
        let x = SmtExpr::Const("x".to_string(), Sort::Int);
        session.declare("x", Sort::Int);
        session.declare("x", Sort::Int);
        session.assert(SmtExpr::cmp(CmpOp::Gt, x.clone(), SmtExpr::Int(1)));
        session.assert(SmtExpr::cmp(CmpOp::Lt, x, SmtExpr::Int(2)));
        assert_eq!(session.check().await.unwrap(), CheckOutcome::Unsat);
    }

    #[tokio::test]
    async fn test_bounded_context() {
        let context = SolverContext::bounded(SolverConfig::default());
        assert_eq!(context.backend_name(), "bounded");
        let mut session = context.session();
        session.declare("b", Sort::Bool);
        session.assert(SmtExpr::Const("b".to_string(), Sort::Bool));
        let CheckOutcome::Sat(model) = session.check().await.unwrap() else {
            panic!("expected sat");
        };
        assert_eq!(model.get("b"), Some(ModelValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_auto_falls_back_without_z3() {
        let config = SolverConfig {
            z3_path: "/nonexistent/z3".to_string(),
            ..SolverConfig::default()
        };
        let context = SolverContext::from_config(config.clone()).await.unwrap();
        assert_eq!(context.backend_name(), "bounded");
        let strict = SolverConfig {
            backend: BackendKind::Z3,
            ..config
        };
        assert!(SolverContext::from_config(strict).await.is_err());
    }
}
