// tests/properties.rs

mod common;
use crate::common::{RecordingObserver, within};

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;

use dagtest::engine::{Observer, RunOptions};
use dagtest::exec::{BasicPolicy, Counts, ResultPolicy, ThresholdPolicy, UnlimitedParallelStrategy};
use dagtest::{NodeBuilder, Registry, State, TestError, TestGraph};

/// Per-node plan for a generated graph.
#[derive(Debug, Clone)]
struct NodePlan {
    deps: BTreeSet<usize>,
    fails: bool,
    skip: bool,
}

// Strategy to generate a valid DAG.
// Acyclicity holds by construction: node N may only depend on nodes 0..N-1.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<NodePlan>> {
    (1..=max_nodes).prop_flat_map(|num_nodes| {
        proptest::collection::vec(
            (
                proptest::collection::vec(any::<usize>(), 0..4),
                proptest::bool::weighted(0.2),
                proptest::bool::weighted(0.1),
            ),
            num_nodes,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (potential, fails, skip))| NodePlan {
                    deps: if i == 0 {
                        BTreeSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    },
                    fails,
                    skip,
                })
                .collect()
        })
    })
}

fn node_key(i: usize) -> String {
    format!("node_{i}")
}

fn build_graph(plan: &[NodePlan]) -> TestGraph {
    let mut registry = Registry::new();
    for (i, node) in plan.iter().enumerate() {
        let fails = node.fails;
        let mut builder = NodeBuilder::test(node_key(i), move |_| {
            if fails {
                Err(TestError::failure("planned failure"))
            } else {
                Ok(())
            }
        });
        for dep in &node.deps {
            builder = builder.depends_on(node_key(*dep));
        }
        if node.skip {
            builder = builder.skip();
        }
        registry.register(builder);
    }
    registry.freeze().expect("generated graph is acyclic")
}

fn run_blocking(graph: &TestGraph, max_threads: Option<usize>) -> (dagtest::engine::RunReport, RecordingObserver) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("failed to build runtime");
    let recorder = RecordingObserver::new();
    let observer: Arc<dyn Observer> = Arc::new(recorder.clone());
    let options = RunOptions {
        max_threads,
        ..RunOptions::default()
    };
    // Generated graphs run on a fresh runtime per case, so allow more slack
    // than a single hand-written graph gets.
    let report = runtime.block_on(within(
        std::time::Duration::from_secs(15),
        dagtest::run(graph, options, observer),
    ));
    (report, recorder)
}

/// Outcome of one sub-invocation in a generated repeat plan.
#[derive(Debug, Clone, Copy)]
enum Planned {
    Pass,
    Fail,
    Error,
}

fn planned_counts(plan: &[Planned]) -> Counts {
    let mut counts = Counts {
        total: plan.len(),
        ..Counts::default()
    };
    for outcome in plan {
        match outcome {
            Planned::Pass => counts.success += 1,
            Planned::Fail => counts.failure += 1,
            Planned::Error => counts.error += 1,
        }
    }
    counts
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn every_node_resolves_and_only_runs_when_ready(
        plan in dag_strategy(12),
        max_threads in proptest::option::of(1..4usize),
    ) {
        let graph = build_graph(&plan);
        let (report, recorder) = run_blocking(&graph, max_threads);

        // Eventual termination: nothing left pending or stranded.
        prop_assert!(report.stranded.is_empty());
        for i in 0..plan.len() {
            let state = report.state(&node_key(i));
            prop_assert!(state.is_some_and(State::is_terminal), "{} ended as {:?}", node_key(i), state);
        }
        prop_assert_eq!(report.summary.total, plan.len());

        // Topology: a node only starts after every dependency finished
        // positively.
        for (i, node) in plan.iter().enumerate() {
            let key = node_key(i);
            let Some(started) = recorder.position(&key, State::Running) else {
                continue;
            };
            for dep in &node.deps {
                let dep_key = node_key(*dep);
                let finished = recorder.finished_at(&dep_key);
                prop_assert!(finished.is_some_and(|f| f < started), "{} started before {} finished", key, dep_key);
                prop_assert!(report.state(&dep_key).is_some_and(State::is_positive));
            }
        }

        // A node never runs twice and never reports two terminal states.
        let mut seen = HashSet::new();
        for event in recorder.events().iter().filter(|e| e.state.is_terminal()) {
            prop_assert!(seen.insert(event.key.clone()), "{} resolved twice", event.key);
        }
    }

    #[test]
    fn states_follow_from_the_plan(plan in dag_strategy(10)) {
        let graph = build_graph(&plan);
        let (report, _) = run_blocking(&graph, None);

        for (i, node) in plan.iter().enumerate() {
            let state = report.state(&node_key(i)).expect("every node resolves");
            let dep_states: Vec<State> = node
                .deps
                .iter()
                .filter_map(|d| report.state(&node_key(*d)))
                .collect();

            if node.skip {
                prop_assert_eq!(state, State::Skipped);
            } else if state == State::Skipped {
                // Only reachable through a skipped dependency.
                prop_assert!(dep_states.contains(&State::Skipped));
            } else if dep_states.iter().any(|s| s.is_failed()) {
                prop_assert_eq!(state, State::Depfail);
            } else if node.fails {
                prop_assert_eq!(state, State::Fail);
            } else {
                prop_assert_eq!(state, State::Ok);
            }
        }
    }

    #[test]
    fn threshold_of_100_matches_basic_policy(
        success in 0..50usize,
        failure in 0..50usize,
        error in 0..5usize,
    ) {
        let counts = Counts { total: success + failure + error, success, failure, error };
        let strict = ThresholdPolicy::new(100.0).expect("valid threshold");
        prop_assert_eq!(strict.evaluate(counts), BasicPolicy.evaluate(counts));
    }

    #[test]
    fn verdict_is_error_only_when_not_passed(
        success in 0..50usize,
        failure in 0..50usize,
        error in 0..5usize,
        threshold in 0.0..=100.0f64,
    ) {
        let counts = Counts { total: success + failure + error, success, failure, error };
        let policy = ThresholdPolicy::new(threshold).expect("valid threshold");
        for verdict in [policy.evaluate(counts), BasicPolicy.evaluate(counts)] {
            prop_assert!(!(verdict.passed && verdict.is_error));
        }
        if error == 0 && failure == 0 {
            prop_assert!(policy.evaluate(counts).passed);
        }
    }

    #[test]
    fn parallel_completion_order_does_not_change_the_verdict(
        plan in proptest::collection::vec(
            prop_oneof![Just(Planned::Pass), Just(Planned::Fail), Just(Planned::Error)],
            2..8,
        ),
        threshold in 0.0..=100.0f64,
    ) {
        let policy = ThresholdPolicy::new(threshold).expect("valid threshold");
        let calls = Arc::new(AtomicUsize::new(0));
        let outcomes = plan.clone();
        let body = move |_: &dagtest::TestContext| {
            let i = calls.fetch_add(1, Ordering::SeqCst);
            // Later calls finish first.
            std::thread::sleep(std::time::Duration::from_millis((outcomes.len() - i) as u64 * 3));
            match outcomes[i] {
                Planned::Pass => Ok(()),
                Planned::Fail => Err(TestError::failure("planned failure")),
                Planned::Error => Err(TestError::error("RuntimeError", "planned error")),
            }
        };

        let mut registry = Registry::new();
        registry.register(
            NodeBuilder::test("fanned", body)
                .repeat(plan.len())
                .strategy(UnlimitedParallelStrategy)
                .policy(policy),
        );
        let graph = registry.freeze().expect("single node graph");
        let (report, _) = run_blocking(&graph, None);

        let result = report.result("fanned").expect("node resolves");
        let expected = policy.evaluate(planned_counts(&plan));
        prop_assert_eq!(result.counts(), planned_counts(&plan));
        let expected_state = if expected.passed {
            State::Ok
        } else if expected.is_error {
            State::Error
        } else {
            State::Fail
        };
        prop_assert_eq!(result.state(), Some(expected_state));
    }
}
