// tests/multi_result.rs

mod common;
use crate::common::builders::graph_of;
use crate::common::{Counter, init_tracing, run_recorded};

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dagtest::exec::{LimitedParallelStrategy, ThresholdPolicy, UnlimitedParallelStrategy};
use dagtest::{AttrValue, Body, NodeBuilder, Phase, State, SubTest, TestContext, TestError, TestOutcome};

type TestResult = Result<(), Box<dyn Error>>;

/// Body failing on its `nth` call (1-based) and passing otherwise.
fn fails_on_call(counter: &Counter, nth: usize) -> impl Fn(&TestContext) -> TestOutcome + Send + Sync + 'static {
    let counter = counter.clone();
    move |_| {
        if counter.bump() == nth {
            Err(TestError::failure(format!("call {nth} failed")))
        } else {
            Ok(())
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn repeat_runs_body_serially() -> TestResult {
    init_tracing();
    let counter = Counter::new();
    let graph = graph_of([NodeBuilder::test("repeated", counter.passing()).repeat(3)]);

    let (report, recorder) = run_recorded(&graph).await;

    assert_eq!(counter.get(), 3);
    assert_eq!(report.state("repeated"), Some(State::Ok));
    // One RUNNING and one terminal notification, however many invocations.
    assert_eq!(recorder.states_of("repeated"), vec![State::Running, State::Ok]);

    let result = report.result("repeated").ok_or("missing result")?;
    assert!(result.is_multi());
    let counts = result.counts();
    assert_eq!((counts.total, counts.success, counts.failure, counts.error), (3, 3, 0, 0));

    let ids: Vec<String> = result.sub_messages().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["repeated", "repeated#1", "repeated#2"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn basic_policy_fails_on_any_failure() -> TestResult {
    init_tracing();
    let counter = Counter::new();
    let graph = graph_of([NodeBuilder::test("flaky", fails_on_call(&counter, 2)).repeat(4)]);

    let (report, _) = run_recorded(&graph).await;

    assert_eq!(report.state("flaky"), Some(State::Fail));
    let counts = report.result("flaky").ok_or("missing result")?.counts();
    assert_eq!((counts.success, counts.failure), (3, 1));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn threshold_policy_tolerates_some_failures() -> TestResult {
    init_tracing();
    let lenient = Counter::new();
    let strict = Counter::new();
    let graph = graph_of([
        NodeBuilder::test("lenient", fails_on_call(&lenient, 2))
            .repeat(4)
            .policy(ThresholdPolicy::new(70.0)?),
        NodeBuilder::test("strict", fails_on_call(&strict, 2))
            .repeat(4)
            .policy(ThresholdPolicy::new(80.0)?),
    ]);

    let (report, _) = run_recorded(&graph).await;

    // 3 of 4 succeeded: 75%.
    assert_eq!(report.state("lenient"), Some(State::Ok));
    assert_eq!(report.state("strict"), Some(State::Fail));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn threshold_policy_never_tolerates_errors() -> TestResult {
    init_tracing();
    let counter = Counter::new();
    let graph = graph_of([NodeBuilder::test("errors", {
        let counter = counter.clone();
        move |_| {
            if counter.bump() == 1 {
                Err(TestError::error("IOError", "disk"))
            } else {
                Ok(())
            }
        }
    })
    .repeat(10)
    .policy(ThresholdPolicy::new(0.0)?)]);

    let (report, _) = run_recorded(&graph).await;

    assert_eq!(report.state("errors"), Some(State::Error));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn generator_ids_avoid_collisions() -> TestResult {
    init_tracing();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);

    let body = Body::generator(move |_| {
        let recorded = Arc::clone(&recorded);
        let check = move |ctx: &TestContext, args: &[AttrValue], _: &BTreeMap<String, AttrValue>| -> TestOutcome {
            recorded.lock().unwrap().push((ctx.slot().to_string(), args.to_vec()));
            Ok(())
        };
        Ok(vec![
            SubTest::new(check.clone()).named("case").arg(1),
            SubTest::new(check.clone()).named("case").arg(2),
            SubTest::new(check).arg(3),
        ])
    });
    let graph = graph_of([NodeBuilder::test_body("gen", body)]);

    let (report, _) = run_recorded(&graph).await;

    assert_eq!(report.state("gen"), Some(State::Ok));
    let result = report.result("gen").ok_or("missing result")?;
    assert_eq!(result.counts().total, 3);

    let ids: Vec<String> = result.sub_messages().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["case", "case#1", "gen"]);

    let mut seen = seen.lock().unwrap().clone();
    seen.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(seen[0], ("case".to_string(), vec![AttrValue::from(1)]));
    assert_eq!(seen[1], ("case#1".to_string(), vec![AttrValue::from(2)]));
    assert_eq!(seen[2], ("gen".to_string(), vec![AttrValue::from(3)]));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn generator_items_repeat() -> TestResult {
    init_tracing();
    let counter = Counter::new();
    let item_counter = counter.clone();
    let body = Body::generator(move |_| {
        let counter = item_counter.clone();
        Ok(vec![SubTest::simple(move |_| {
            counter.bump();
            Ok(())
        })
        .named("item")])
    });
    let graph = graph_of([NodeBuilder::test_body("gen", body).repeat(2)]);

    let (report, _) = run_recorded(&graph).await;

    assert_eq!(counter.get(), 2);
    let ids: Vec<String> = report
        .result("gen")
        .ok_or("missing result")?
        .sub_messages()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec!["item", "item#1"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn generator_error_is_recorded_as_sub_error() -> TestResult {
    init_tracing();
    let body = Body::generator(|_| Err(TestError::error("ImportError", "no fixtures")));
    let graph = graph_of([NodeBuilder::test_body("gen", body)]);

    let (report, _) = run_recorded(&graph).await;

    assert_eq!(report.state("gen"), Some(State::Error));
    let message = report
        .result("gen")
        .and_then(|r| r.sub_message("gen"))
        .ok_or("missing generator message")?;
    assert_eq!(message.raised.map(|e| e.kind().to_string()), Some("ImportError".to_string()));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn parallel_strategies_fan_out_invocations() -> TestResult {
    init_tracing();

    let unlimited = Arc::new((AtomicUsize::new(0), AtomicUsize::new(0)));
    let limited = Arc::new((AtomicUsize::new(0), AtomicUsize::new(0)));
    let gauge = |cell: Arc<(AtomicUsize, AtomicUsize)>| {
        move |_: &TestContext| -> TestOutcome {
            let now = cell.0.fetch_add(1, Ordering::SeqCst) + 1;
            cell.1.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(80));
            cell.0.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    };

    let graph = graph_of([
        NodeBuilder::test("unlimited", gauge(Arc::clone(&unlimited)))
            .repeat(4)
            .strategy(UnlimitedParallelStrategy),
        NodeBuilder::test("limited", gauge(Arc::clone(&limited)))
            .repeat(6)
            .strategy(LimitedParallelStrategy::new(2)),
    ]);

    let (report, _) = run_recorded(&graph).await;

    assert!(report.passed());
    assert_eq!(report.result("unlimited").ok_or("missing")?.counts().total, 4);
    assert_eq!(report.result("limited").ok_or("missing")?.counts().total, 6);
    assert!(unlimited.1.load(Ordering::SeqCst) >= 2);
    assert!(limited.1.load(Ordering::SeqCst) <= 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn generator_output_is_kept_on_success() -> TestResult {
    init_tracing();
    let body = Body::generator(|ctx| {
        ctx.println("collecting cases");
        Ok(vec![SubTest::simple(|ctx| {
            ctx.print("case ran");
            Ok(())
        })
        .named("case")])
    });
    let graph = graph_of([NodeBuilder::test_body("gen", body)]);

    let (report, _) = run_recorded(&graph).await;

    assert_eq!(report.state("gen"), Some(State::Ok));
    let result = report.result("gen").ok_or("missing result")?;
    let collected = result.message(Phase::Test).ok_or("generator output dropped")?;
    assert_eq!(collected.captured[0].output, "collecting cases\n");
    assert!(collected.raised.is_none());

    let case = result.sub_message("case").ok_or("missing case message")?;
    assert_eq!(case.captured[0].output, "case ran");
    Ok(())
}
