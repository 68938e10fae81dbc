mod common;

use std::sync::Arc;
use std::time::Duration;

use apn_term::{
    config::{BackendKind, SolverConfig},
    parse_boolean, parse_term,
    solver::{
        check_predicate_sat, eval_term_via_solver, solve_equation, solve_guard, solve_inequality,
        CheckOutcome, Confidence, MockSolverBackend, SolverContext, SolverError,
    },
    Binding, CmpOp, Value,
};
use pretty_assertions::assert_eq;

fn bounded(bound: i64) -> SolverContext {
    SolverContext::bounded(SolverConfig {
        search_bound: bound,
        ..SolverConfig::default()
    })
}

#[tokio::test]
async fn it_finds_all_roots_in_range() {
    let context = bounded(64);
    let outcome = solve_equation(
        &context,
        &parse_term("x * x").unwrap(),
        &parse_term("16").unwrap(),
        5,
    )
    .await
    .unwrap();
    let roots: Vec<Value> = outcome
        .solutions
        .iter()
        .map(|s| s["x"].clone())
        .collect();
    assert_eq!(roots, vec![Value::Int(4), Value::Int(-4)]);
    assert!(!outcome.has_more);
    assert!(outcome.is_exact());
}

#[tokio::test]
async fn it_caps_inequality_solutions() {
    let context = bounded(32);
    let outcome = solve_inequality(
        &context,
        &parse_term("x + y").unwrap(),
        &parse_term("3").unwrap(),
        CmpOp::Lt,
        4,
    )
    .await
    .unwrap();
    assert_eq!(outcome.solutions.len(), 4);
    assert!(outcome.has_more);
    for solution in &outcome.solutions {
        let sum = solution["x"].as_int().unwrap() + solution["y"].as_int().unwrap();
        assert!(sum < 3);
    }
}

#[tokio::test]
async fn it_checks_guards_with_partial_bindings() {
    let context = bounded(64);
    let guard = parse_boolean("x + y == 10 and y > x").unwrap();
    let mut env = Binding::new();
    env.insert("x".into(), Value::Int(3));
    assert!(check_predicate_sat(&context, &guard, &env).await.unwrap());
    env.insert("x".into(), Value::Int(6));
    assert!(!check_predicate_sat(&context, &guard, &env).await.unwrap());

    let outcome = solve_guard(&context, &guard, &Binding::new(), 3).await.unwrap();
    for solution in &outcome.solutions {
        let x = solution["x"].as_int().unwrap();
        let y = solution["y"].as_int().unwrap();
        assert_eq!(x + y, 10);
        assert!(y > x);
    }
}

#[tokio::test]
async fn it_evaluates_terms_with_free_variables() {
    let context = bounded(8);
    let mut env = Binding::new();
    env.insert("x".into(), Value::Int(4));
    let closed = eval_term_via_solver(&context, &parse_term("x * 3 - length('ab')").unwrap(), &env)
        .await
        .unwrap();
    assert_eq!(closed, Value::Int(10));
}

#[tokio::test]
async fn it_handles_boolean_variables() {
    let context = bounded(4);
    let guard = parse_boolean("flag and not other").unwrap();
    let outcome = solve_guard(&context, &guard, &Binding::new(), 5).await.unwrap();
    assert_eq!(outcome.solutions.len(), 1);
    assert_eq!(outcome.solutions[0]["flag"], Value::Bool(true));
    assert_eq!(outcome.solutions[0]["other"], Value::Bool(false));
    assert!(!outcome.has_more);
}

#[tokio::test]
async fn it_synthesizes_when_the_backend_times_out() {
    let mut mock = MockSolverBackend::new();
    mock.expect_name().return_const("mock");
    mock.expect_check()
        .returning(|_| Err(SolverError::Timeout(Duration::from_millis(10))));
    let context = SolverContext::new(Arc::new(mock), SolverConfig::default());

    let outcome = solve_equation(
        &context,
        &parse_term("x + y").unwrap(),
        &parse_term("10").unwrap(),
        3,
    )
    .await
    .unwrap();
    assert!(matches!(outcome.confidence, Confidence::Synthesized { .. }));
    assert!(outcome.has_more);
    assert_eq!(outcome.solutions.len(), 3);
    assert_eq!(outcome.solutions[1]["x"], Value::Int(1));
    assert_eq!(outcome.solutions[1]["y"], Value::Int(2));
}

#[tokio::test]
async fn it_passes_queries_to_the_backend() {
    let mut mock = MockSolverBackend::new();
    mock.expect_name().return_const("mock");
    mock.expect_check()
        .withf(|query| {
            let script = query.to_script();
            script.contains("(declare-const |n| Int)") && script.contains("(check-sat)")
        })
        .times(1)
        .returning(|_| Ok(CheckOutcome::Unsat));
    let context = SolverContext::new(Arc::new(mock), SolverConfig::default());

    let guard = parse_boolean("n > 100").unwrap();
    assert!(!check_predicate_sat(&context, &guard, &Binding::new()).await.unwrap());
}

#[tokio::test]
async fn it_falls_back_to_bounded_search() {
    let config = SolverConfig {
        backend: BackendKind::Auto,
        z3_path: "/nonexistent/z3-binary".to_string(),
        ..SolverConfig::default()
    };
    let context = SolverContext::from_config(config).await.unwrap();
    assert_eq!(context.backend_name(), "bounded");

    let strict = SolverConfig {
        backend: BackendKind::Z3,
        z3_path: "/nonexistent/z3-binary".to_string(),
        ..SolverConfig::default()
    };
    assert!(matches!(
        SolverContext::from_config(strict).await,
        Err(SolverError::Unavailable(_))
    ));
}

#[tokio::test]
async fn it_rejects_string_variables() {
    let context = bounded(4);
    let err = solve_equation(
        &context,
        &parse_term("s:String").unwrap(),
        &parse_term("'a'").unwrap(),
        1,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SolverError::Unsupported(_)));
}

#[tokio::test]
async fn it_times_out_large_bounded_searches() {
    let context = SolverContext::bounded(SolverConfig {
        timeout: Duration::from_millis(50),
        search_bound: 1_000,
        search_budget: u64::MAX,
        ..SolverConfig::default()
    });
    let guard = parse_boolean("x * y * z == 1000003").unwrap();
    let err = check_predicate_sat(&context, &guard, &Binding::new())
        .await
        .unwrap_err();
    assert_eq!(err, SolverError::Timeout(Duration::from_millis(50)));

    let outcome = solve_equation(
        &context,
        &parse_term("x * y * z").unwrap(),
        &parse_term("1000003").unwrap(),
        3,
    )
    .await
    .unwrap();
    let Confidence::Synthesized { reason } = outcome.confidence else {
        panic!("expected synthesized solutions");
    };
    assert!(reason.contains("timed out"));
    assert_eq!(outcome.solutions.len(), 3);
}

#[tokio::test]
async fn it_rejects_non_boolean_flags_like_evaluation() {
    let context = bounded(4);
    let guard = parse_boolean("flag").unwrap();
    let mut env = Binding::new();
    env.insert("flag".into(), Value::Int(1));

    let solver_err = check_predicate_sat(&context, &guard, &env).await.unwrap_err();
    let eval_err = apn_term::eval_bool(&guard, &env).unwrap_err();
    assert_eq!(solver_err, SolverError::Eval(eval_err));
}

#[tokio::test]
async fn it_reports_no_placeholders_for_closed_constraints() {
    let mut mock = MockSolverBackend::new();
    mock.expect_name().return_const("mock");
    mock.expect_check()
        .returning(|_| Err(SolverError::Timeout(Duration::from_millis(10))));
    let context = SolverContext::new(Arc::new(mock), SolverConfig::default());

    let outcome = solve_equation(
        &context,
        &parse_term("2 * 3").unwrap(),
        &parse_term("6").unwrap(),
        5,
    )
    .await
    .unwrap();
    assert!(outcome.solutions.is_empty());
    assert!(!outcome.has_more);
    assert!(!outcome.is_exact());
}
