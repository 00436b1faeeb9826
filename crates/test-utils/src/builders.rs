#![allow(dead_code)]

use std::time::Duration;

use dagtest::{NodeBuilder, Registry, TestError, TestGraph};

/// Test that passes immediately.
pub fn passing(key: &str) -> NodeBuilder {
    NodeBuilder::test(key, |_| Ok(()))
}

/// Test that fails with an assertion failure.
pub fn failing(key: &str) -> NodeBuilder {
    NodeBuilder::test(key, |_| Err(TestError::failure("assertion failed")))
}

/// Test that raises a non-assertion error of `kind`.
pub fn erroring(key: &str, kind: &str) -> NodeBuilder {
    let kind = kind.to_string();
    NodeBuilder::test(key, move |_| Err(TestError::error(kind.clone(), "boom")))
}

/// Test that sleeps on its blocking thread, then passes.
pub fn sleeping(key: &str, duration: Duration) -> NodeBuilder {
    NodeBuilder::test(key, move |_| {
        std::thread::sleep(duration);
        Ok(())
    })
}

/// Register every builder and freeze the registry.
pub fn graph_of(builders: impl IntoIterator<Item = NodeBuilder>) -> TestGraph {
    let mut registry = Registry::new();
    for builder in builders {
        registry.register(builder);
    }
    registry.freeze().expect("failed to freeze test graph")
}

/// Chain `keys[0] <- keys[1] <- ...` of passing tests, each depending on the
/// previous one.
pub fn chain(keys: &[&str]) -> TestGraph {
    let mut builders = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        let mut builder = passing(key);
        if i > 0 {
            builder = builder.depends_on(keys[i - 1]);
        }
        builders.push(builder);
    }
    graph_of(builders)
}
