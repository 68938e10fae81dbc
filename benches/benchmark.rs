use apn_term::{
    config::SolverConfig,
    eval_bool, eval_term, parse_boolean, parse_pattern, parse_term,
    solver::{solve_equation, SolverContext},
    Binding, Value,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const GUARD: &str = "x > 3 and (length(s) == 2 or isSubstringOf('ab', s)) and not done";
const TERM: &str = "concat(s, 'x') == s or x * (y + 2) / 3 - 1 > 0";

fn binding() -> Binding {
    let mut binding = Binding::new();
    binding.insert("x".into(), Value::Int(7));
    binding.insert("y".into(), Value::Int(11));
    binding.insert("s".into(), Value::string("cab"));
    binding.insert("done".into(), Value::Bool(false));
    binding
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse guard", |b| b.iter(|| parse_boolean(black_box(GUARD))));
    c.bench_function("parse term", |b| {
        b.iter(|| parse_term(black_box("sublist(append(xs, x * 2), 0, length(ys) - 1)")))
    });
    c.bench_function("parse pattern", |b| {
        b.iter(|| parse_pattern(black_box("((a:Int, b), [c, 'k', T])")))
    });
}

fn bench_eval(c: &mut Criterion) {
    let guard = parse_boolean(GUARD).unwrap();
    let mixed = parse_boolean(TERM).unwrap();
    let term = parse_term("(x + y) * (x - y) / 2").unwrap();
    let binding = binding();
    c.bench_function("eval guard", |b| b.iter(|| eval_bool(black_box(&guard), &binding)));
    c.bench_function("eval mixed guard", |b| b.iter(|| eval_bool(black_box(&mixed), &binding)));
    c.bench_function("eval term", |b| b.iter(|| eval_term(black_box(&term), &binding)));
}

fn bench_bounded_solve(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let context = SolverContext::bounded(SolverConfig::default());
    let lhs = parse_term("x * 3 + y").unwrap();
    let rhs = parse_term("17").unwrap();
    c.bench_function("bounded solve x*3+y == 17", |b| {
        b.iter(|| runtime.block_on(solve_equation(&context, &lhs, &rhs, 5)))
    });
}

criterion_group!(benches, bench_parse, bench_eval, bench_bounded_solve);
criterion_main!(benches);
