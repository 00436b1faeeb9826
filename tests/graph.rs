// tests/graph.rs

mod common;
use crate::common::builders::{failing, graph_of, passing};
use crate::common::{init_tracing, run_recorded};

use std::error::Error;

use dagtest::errors::DagtestError;
use dagtest::{NodeBuilder, Registry, Scope, State, qualified_name, wire_scopes};

type TestResult = Result<(), Box<dyn Error>>;

fn noop_setup(key: &str) -> NodeBuilder {
    NodeBuilder::setup(key, |_| Ok(()))
}

fn noop_teardown(key: &str) -> NodeBuilder {
    NodeBuilder::teardown(key, |_| Ok(()))
}

#[test]
fn cycle_is_rejected_at_freeze() {
    let mut registry = Registry::new();
    registry.register(passing("A").depends_on("C"));
    registry.register(passing("B").depends_on("A"));
    registry.register(passing("C").depends_on("B"));

    match registry.freeze() {
        Err(DagtestError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains('A') || msg.contains('B') || msg.contains('C'));
        }
        Err(e) => panic!("Expected DagCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn unknown_dependency_is_rejected_at_freeze() {
    let mut registry = Registry::new();
    registry.register(passing("A").depends_on("Missing"));

    match registry.freeze() {
        Err(DagtestError::UnknownDependency { node, dependency }) => {
            assert_eq!(node, "A");
            assert_eq!(dependency, "Missing");
        }
        Err(e) => panic!("Expected UnknownDependency error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn direct_edges_are_validated() {
    let mut registry = Registry::new();
    registry.register(passing("A"));

    assert!(matches!(registry.depends("A", "A"), Err(DagtestError::SelfDependency(_))));
    assert!(matches!(registry.depends("A", "B"), Err(DagtestError::NodeNotFound(_))));
}

#[test]
fn edges_are_symmetric_and_order_independent() -> TestResult {
    let mut registry = Registry::new();
    // `B` is declared to depend on `A` before `A` exists.
    registry.register(passing("B").depends_on("A"));
    registry.register(passing("A"));
    registry.register(passing("C"));
    registry.depends("C", "A")?;

    let graph = registry.freeze()?;

    let a = graph.get("A").ok_or("A missing")?;
    assert!(a.dependents().contains("B"));
    assert!(a.dependents().contains("C"));
    let b = graph.get("B").ok_or("B missing")?;
    assert!(b.dependencies().contains("A"));

    let dependents: Vec<&str> = graph.dependents_of("A").iter().map(|n| n.key()).collect();
    assert_eq!(dependents, vec!["B", "C"]);
    Ok(())
}

#[test]
fn registering_a_key_twice_reuses_the_node() -> TestResult {
    let mut registry = Registry::new();
    let first = registry.register(passing("dup").attr("origin", "first"));
    let second = registry.register(failing("dup").attr("origin", "second"));

    assert_eq!(first, second);
    assert_eq!(registry.len(), 1);
    let node = registry.get("dup").ok_or("dup missing")?;
    assert_eq!(node.attr("origin").and_then(|v| v.as_str()), Some("first"));
    Ok(())
}

#[test]
fn attributes_can_be_edited_before_freeze() -> TestResult {
    let mut registry = Registry::new();
    registry.register(passing("t").attr("slow", true));

    let node = registry.get_mut("t").ok_or("t missing")?;
    node.set_attr("owner", "storage");
    assert_eq!(node.remove_attr("slow").and_then(|v| v.as_bool()), Some(true));

    let graph = registry.freeze()?;
    let node = graph.get("t").ok_or("t missing")?;
    assert!(node.attr("slow").is_none());
    assert_eq!(node.attr("owner").and_then(|v| v.as_str()), Some("storage"));
    Ok(())
}

#[test]
fn partner_must_pair_teardown_with_setup() {
    let mut registry = Registry::new();
    registry.register(noop_setup("s"));
    registry.register(noop_teardown("t"));
    registry.register(passing("plain"));

    assert!(matches!(
        registry.set_partner("s", "t"),
        Err(DagtestError::InvalidPartner { .. })
    ));
    assert!(matches!(
        registry.set_partner("t", "plain"),
        Err(DagtestError::InvalidPartner { .. })
    ));
    assert!(registry.set_partner("t", "s").is_ok());

    let node = registry.get("t").expect("teardown registered");
    assert_eq!(node.partner(), Some("s"));
    assert!(node.dependencies().contains("s"));
}

#[test]
fn qualified_names_join_their_parts() {
    assert_eq!(qualified_name("pkg.mod", Some("Case"), "test_x"), "pkg.mod.Case.test_x");
    assert_eq!(qualified_name("pkg.mod", None, "test_x"), "pkg.mod.test_x");
    assert_eq!(qualified_name("", None, "test_x"), "test_x");
}

fn nested_registry() -> Result<Registry, DagtestError> {
    let mut registry = Registry::new();
    registry.register(noop_setup("pkg.setup"));
    registry.register(noop_teardown("pkg.teardown"));
    registry.register(noop_setup("pkg.mod.setup"));
    registry.register(noop_teardown("pkg.mod.teardown"));
    registry.register(passing("pkg.mod.test_a"));
    registry.register(failing("pkg.mod.test_b"));

    wire_scopes(
        &mut registry,
        &[
            Scope::new("pkg").setup("pkg.setup").teardown("pkg.teardown"),
            Scope::new("pkg.mod")
                .setup("pkg.mod.setup")
                .teardown("pkg.mod.teardown")
                .member("pkg.mod.test_a")
                .member("pkg.mod.test_b"),
        ],
    )?;
    Ok(registry)
}

#[test]
fn scopes_chain_fixtures_around_members() -> TestResult {
    let registry = nested_registry()?;
    let deps = |key: &str| {
        registry
            .get(key)
            .map(|n| n.dependencies().iter().cloned().collect::<Vec<_>>())
            .unwrap_or_default()
    };

    assert_eq!(deps("pkg.mod.setup"), vec!["pkg.setup"]);
    assert_eq!(deps("pkg.mod.test_a"), vec!["pkg.mod.setup"]);
    assert_eq!(
        deps("pkg.mod.teardown"),
        vec!["pkg.mod.setup", "pkg.mod.test_a", "pkg.mod.test_b"]
    );
    assert_eq!(deps("pkg.teardown"), vec!["pkg.mod.teardown", "pkg.setup"]);

    assert_eq!(registry.get("pkg.teardown").and_then(|n| n.partner()), Some("pkg.setup"));
    assert_eq!(
        registry.get("pkg.mod.teardown").and_then(|n| n.partner()),
        Some("pkg.mod.setup")
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn teardowns_run_even_when_members_fail() -> TestResult {
    init_tracing();
    let graph = nested_registry()?.freeze()?;

    let (report, recorder) = run_recorded(&graph).await;

    assert_eq!(report.state("pkg.mod.test_a"), Some(State::Ok));
    assert_eq!(report.state("pkg.mod.test_b"), Some(State::Fail));
    assert_eq!(report.state("pkg.mod.teardown"), Some(State::Ok));
    assert_eq!(report.state("pkg.teardown"), Some(State::Ok));

    let outer_setup = recorder.finished_at("pkg.setup").ok_or("pkg.setup never finished")?;
    let inner_setup = recorder.position("pkg.mod.setup", State::Running).ok_or("never started")?;
    let inner_teardown = recorder.finished_at("pkg.mod.teardown").ok_or("never finished")?;
    let outer_teardown = recorder.position("pkg.teardown", State::Running).ok_or("never started")?;
    assert!(outer_setup < inner_setup);
    assert!(inner_teardown < outer_teardown);

    assert_eq!(report.summary.total, 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_setup_depfails_members_and_teardown() -> TestResult {
    init_tracing();
    let mut registry = Registry::new();
    registry.register(NodeBuilder::setup("s", |_| Err(dagtest::TestError::failure("no database"))));
    registry.register(noop_teardown("t"));
    registry.register(passing("member"));
    wire_scopes(&mut registry, &[Scope::new("m").setup("s").teardown("t").member("member")])?;
    let graph = registry.freeze()?;

    let (report, _) = run_recorded(&graph).await;

    assert_eq!(report.state("s"), Some(State::Fail));
    assert_eq!(report.state("member"), Some(State::Depfail));
    assert_eq!(report.state("t"), Some(State::Depfail));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn dot_export_reflects_latest_states() -> TestResult {
    init_tracing();
    let mut registry = Registry::new();
    registry.register(noop_setup("fixture"));
    registry.register(failing("broken").depends_on("fixture"));
    registry.register(passing("blocked").depends_on("broken"));
    registry.register(passing("ignored").skip());
    let graph = registry.freeze()?;

    let (_report, _) = run_recorded(&graph).await;

    let dot = graph.to_dot("suite");
    assert!(dot.starts_with("strict digraph \"suite\" {"));
    assert!(dot.trim_end().ends_with('}'));
    assert!(dot.contains("broken\\n(Result: FAIL)"));
    assert!(dot.contains("blocked\\n(Result: DEPFAIL)"));
    assert!(dot.contains("color = \"red\""));
    assert!(dot.contains("color = \"blue\""));
    assert!(dot.contains("style = \"dashed\""));
    assert!(dot.contains("style = \"dotted\""));
    assert!(dot.contains("->"));

    let description = graph.describe();
    assert_eq!(description.nodes.len(), 4);
    let broken = description
        .nodes
        .iter()
        .find(|n| n.key == "broken")
        .ok_or("broken missing")?;
    assert!(broken.failed());
    let fixture_edge = description
        .edges
        .iter()
        .find(|e| e.from == "broken" && e.to == "fixture")
        .ok_or("fixture edge missing")?;
    assert!(fixture_edge.fixture);
    assert!(!fixture_edge.partner);
    Ok(())
}

#[test]
fn listing_separates_tests_from_fixtures() {
    let graph = graph_of([noop_setup("s"), passing("a"), passing("b")]);

    let tests: Vec<&str> = graph.tests().map(|n| n.key()).collect();
    let fixtures: Vec<&str> = graph.fixtures().map(|n| n.key()).collect();
    assert_eq!(tests, vec!["a", "b"]);
    assert_eq!(fixtures, vec!["s"]);
    assert_eq!(graph.len(), 3);
}
