// src/exec/runner.rs

//! Execution protocol for a single node.
//!
//! The node moves to RUNNING (observer notified), its resources are
//! acquired, then the PRE, TEST and POST phases run in order. POST runs even
//! when the body failed. Resources are released with the final state before
//! the node moves to that state (observer notified again).
//!
//! Every callable runs on tokio's blocking pool. A node-level timeout races
//! each call; when it fires the phase is recorded as a failure while the
//! abandoned call keeps running in the background.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use tracing::{debug, warn};

use crate::engine::Observer;
use crate::exec::resource::{ResourceManager, ResourceObject};
use crate::node::{Body, Node, TestContext, TestError, TestOutcome};
use crate::result::{PhaseGuard, RunResult, Slot};
use crate::types::{Phase, State};

/// Shared collaborators for node execution.
#[derive(Clone)]
pub struct ExecEnv {
    pub resources: Arc<ResourceManager>,
    pub observer: Arc<dyn Observer>,
}

type Objects = BTreeMap<String, Arc<ResourceObject>>;
type Call = Box<dyn FnOnce(&TestContext) -> TestOutcome + Send>;

/// Run `node` to a terminal state.
///
/// Errors returned here come from the execution machinery, never from the
/// node's own callables; those are recorded in the result.
pub async fn execute_node(node: Arc<Node>, result: Arc<RunResult>, env: ExecEnv) -> Result<State> {
    ensure!(
        result.transition(State::Running),
        "node '{}' was already resolved before it started",
        node.key()
    );
    env.observer.notify(&node, State::Running);

    let objects = acquire_resources(&node, &result, &env).await?;

    if let Some(objects) = &objects {
        if let Some(pre) = node.pre.clone() {
            run_phase(&node, &result, Slot::Phase(Phase::Pre), objects, Box::new(move |ctx: &TestContext| pre(ctx))).await;
        }

        if node.is_multi() {
            run_multi(&node, &result, objects).await;
        } else if let Body::Call(body) = &node.body {
            let body = Arc::clone(body);
            run_phase(&node, &result, Slot::Phase(Phase::Test), objects, Box::new(move |ctx: &TestContext| body(ctx))).await;
        }

        if let Some(post) = node.post.clone() {
            run_phase(&node, &result, Slot::Phase(Phase::Post), objects, Box::new(move |ctx: &TestContext| post(ctx))).await;
        }
    }

    let state = result.outcome();

    if let Some(objects) = objects {
        let manager = Arc::clone(&env.resources);
        tokio::task::spawn_blocking(move || manager.release_many(objects, Some(state)))
            .await
            .with_context(|| format!("releasing resources of node '{}'", node.key()))?;
    }

    ensure!(
        result.transition(state),
        "node '{}' could not move to {state}",
        node.key()
    );
    debug!(node = %node.key(), %state, "node finished");
    env.observer.notify(&node, state);
    Ok(state)
}

/// Acquire the node's resources. A set-up failure is recorded in the PRE
/// slot and yields `None`, in which case no phase runs.
async fn acquire_resources(node: &Arc<Node>, result: &Arc<RunResult>, env: &ExecEnv) -> Result<Option<Objects>> {
    if node.resources().is_empty() {
        return Ok(Some(Objects::new()));
    }

    let manager = Arc::clone(&env.resources);
    let declared = node.resources().clone();
    let collected = tokio::task::spawn_blocking(move || manager.collect(&declared))
        .await
        .with_context(|| format!("acquiring resources of node '{}'", node.key()))?;

    match collected {
        Ok(objects) => Ok(Some(objects)),
        Err(err) => {
            warn!(node = %node.key(), error = %err, "resource set-up failed");
            result.record_phase(Phase::Pre, Vec::new(), Some(err));
            Ok(None)
        }
    }
}

/// Fan the body out over repeats and generated sub-tests using the node's
/// strategy.
async fn run_multi(node: &Arc<Node>, result: &Arc<RunResult>, objects: &Objects) {
    let mut calls: Vec<(String, Call)> = Vec::new();

    match &node.body {
        Body::Call(body) => {
            for _ in 0..node.repeat() {
                let body = Arc::clone(body);
                calls.push((node.key().to_string(), Box::new(move |ctx: &TestContext| body(ctx))));
            }
        }
        Body::Generator(generator) => {
            let ctx = context_for(node, Phase::Test.as_str(), objects);
            let generator = Arc::clone(generator);
            let generated = call_blocking(Arc::clone(&ctx), node.timeout(), move |ctx| generator(ctx)).await;
            match generated {
                Ok(items) => {
                    result.record_output(Phase::Test, ctx.retrieve());
                    for item in items {
                        let natural = item.name.clone().unwrap_or_else(|| node.key().to_string());
                        for _ in 0..node.repeat() {
                            let item = item.clone();
                            calls.push((
                                natural.clone(),
                                Box::new(move |ctx: &TestContext| (item.call)(ctx, &item.args, &item.kwargs)),
                            ));
                        }
                    }
                }
                Err(err) => {
                    let id = result.reserve_id(node.key());
                    result.record_sub(id, ctx.retrieve(), Some(err));
                }
            }
        }
    }

    debug!(
        node = %node.key(),
        invocations = calls.len(),
        concurrency = ?node.strategy().concurrency(),
        "fanning out"
    );
    let mut batch = node.strategy().prepare();
    for (natural, call) in calls {
        let slot = Slot::Sub(result.reserve_id(&natural));
        let node = Arc::clone(node);
        let result = Arc::clone(result);
        let objects = objects.clone();
        batch
            .spawn(Box::pin(async move {
                run_phase(&node, &result, slot, &objects, call).await;
            }))
            .await;
    }
    batch.wait().await;
}

async fn run_phase(node: &Node, result: &Arc<RunResult>, slot: Slot, objects: &Objects, call: Call) {
    let ctx = context_for(node, slot.id(), objects);
    let guard = PhaseGuard::enter(Arc::clone(result), slot, Arc::clone(&ctx));
    let outcome = call_blocking(ctx, node.timeout(), call).await;
    if let Err(err) = &outcome {
        debug!(node = %node.key(), slot = %guard.slot().id(), error = %err, "phase raised");
    }
    guard.finish(outcome);
}

fn context_for(node: &Node, slot: &str, objects: &Objects) -> Arc<TestContext> {
    Arc::new(TestContext::new(
        node.key().to_string(),
        slot.to_string(),
        node.attrs().clone(),
        objects.clone(),
    ))
}

/// Run `call` on the blocking pool, racing the optional timeout. A panic is
/// reported as a failure, the way a failed `assert!` would be.
async fn call_blocking<T, F>(ctx: Arc<TestContext>, timeout: Option<Duration>, call: F) -> Result<T, TestError>
where
    T: Send + 'static,
    F: FnOnce(&TestContext) -> Result<T, TestError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(move || call(&ctx));

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => return Err(TestError::failure(format!("timed out after {limit:?}"))),
        },
        None => handle.await,
    };

    match joined {
        Ok(outcome) => outcome,
        Err(err) if err.is_panic() => Err(TestError::failure(panic_message(err.into_panic()))),
        Err(err) => Err(TestError::error("Cancelled", err.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "test panicked".to_string()
    }
}
