mod common;

use std::io::Write;

use apn_term::{
    config::SolverConfig,
    solver::SolverContext,
    transition::{CompiledTransition, ParseCache},
    type_checker::{annotate_net, infer_variable_types, ElementKind},
    Net, TypeTag, Value,
};
use pretty_assertions::assert_eq;

const ORDERS: &str = r#"{
    "places": [
        {"id": "orders", "tokens": ["(1, 'tea')", "(2, 'coffee')", "(3, 'cake')"]},
        {"id": "stock", "tokens": ["['tea', 'cake']"]},
        {"id": "served"}
    ],
    "transitions": [
        {
            "id": "serve",
            "guard": "isSublistOf([item], menu) and n > 1",
            "action": "label = concat(item, '!'), rest = menu"
        }
    ],
    "arcs": [
        {"id": "take", "source": "orders", "target": "serve", "bindings": ["(n, item)"]},
        {"id": "look", "source": "stock", "target": "serve", "bindings": ["menu"]},
        {"id": "give", "source": "serve", "target": "served", "bindings": ["(n, label)"]},
        {"id": "keep", "source": "serve", "target": "stock", "bindings": ["rest"]}
    ]
}"#;

fn load() -> Net {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(ORDERS.as_bytes()).unwrap();
    Net::load(file.path()).unwrap()
}

#[test]
fn it_infers_transition_and_arc_types() {
    let net = load();
    let types = infer_variable_types(ElementKind::Transition, "serve", &net);
    assert_eq!(types.get("n"), Some(&TypeTag::Int));
    assert_eq!(types.get("item"), Some(&TypeTag::String));
    assert_eq!(types.get("menu"), Some(&TypeTag::List));
    assert_eq!(types.get("label"), Some(&TypeTag::String));

    let give = infer_variable_types(ElementKind::Arc, "give", &net);
    assert_eq!(give.len(), 2);
    assert_eq!(give.get("label"), Some(&TypeTag::String));
}

#[test]
fn it_annotates_the_net_once() {
    let net = load();
    let annotated = annotate_net(&net);
    assert_eq!(annotated.arc("take").unwrap().bindings, vec!["(n:Int, item:String)"]);
    assert_eq!(
        annotated.transition("serve").unwrap().guard.as_deref(),
        Some("isSublistOf([item:String], menu:List) and n:Int > 1")
    );
    assert_eq!(annotate_net(&annotated), annotated);
}

#[tokio::test]
async fn it_fires_until_disabled() {
    let mut net = load();
    let cache = ParseCache::new();
    let solver = SolverContext::bounded(SolverConfig::default());
    let serve = CompiledTransition::compile(&net, "serve", &cache).unwrap();
    let mut marking = net.marking();

    let enabling = serve
        .find_enabling_binding(&marking, Some(&solver), 20)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enabling.binding["n"], Value::Int(3));
    let firing = serve.fire(&enabling, Some(&solver)).await.unwrap();
    firing.apply(&mut marking);

    assert_eq!(
        marking["served"],
        vec![Value::pair(Value::Int(3), Value::string("cake!"))]
    );
    assert_eq!(marking["orders"].len(), 2);
    assert_eq!(marking["stock"].len(), 1);

    // tea is on the menu but order 1 fails the guard, coffee is not stocked
    assert!(serve
        .find_enabling_binding(&marking, Some(&solver), 20)
        .await
        .unwrap()
        .is_none());

    net.set_marking(&marking);
    assert_eq!(net.place("served").unwrap().tokens.len(), 1);
}

const DIVISORS: &str = r#"{
    "places": [{"id": "p", "tokens": ["0", "2"]}, {"id": "q"}],
    "transitions": [{"id": "halve", "guard": "10 / x == 5"}],
    "arcs": [
        {"id": "a", "source": "p", "target": "halve", "bindings": ["x"]},
        {"id": "b", "source": "halve", "target": "q", "bindings": ["x"]}
    ]
}"#;

#[tokio::test]
async fn it_skips_tokens_whose_guard_fails_to_evaluate() {
    let net = Net::from_json(DIVISORS).unwrap();
    let halve = CompiledTransition::compile(&net, "halve", &ParseCache::new()).unwrap();
    let marking = net.marking();

    let solver = SolverContext::bounded(SolverConfig::default());
    let enabling = halve
        .find_enabling_binding(&marking, Some(&solver), 20)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enabling.binding["x"], Value::Int(2));
    assert_eq!(enabling.picks[0].index, 1);

    let enabling = halve
        .find_enabling_binding(&marking, None, 20)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enabling.binding["x"], Value::Int(2));
}
