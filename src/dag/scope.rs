// src/dag/scope.rs

//! Fixture wiring for nested scopes (package, module, class).
//!
//! Given a chain of scopes from outermost to innermost:
//! - each setup fixture depends on the nearest enclosing setup
//! - each enclosing teardown depends on the nearest inner teardown
//! - every member depends on the innermost setup that covers it
//! - the innermost teardown that covers a member depends on that member
//! - a teardown is partnered with the setup of its own scope

use crate::dag::registry::Registry;
use crate::errors::Result;
use crate::types::NodeKey;

/// One level of nesting and the nodes declared at that level.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub name: String,
    pub setup: Option<NodeKey>,
    pub teardown: Option<NodeKey>,
    pub members: Vec<NodeKey>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn setup(mut self, key: impl Into<NodeKey>) -> Self {
        self.setup = Some(key.into());
        self
    }

    pub fn teardown(mut self, key: impl Into<NodeKey>) -> Self {
        self.teardown = Some(key.into());
        self
    }

    pub fn member(mut self, key: impl Into<NodeKey>) -> Self {
        self.members.push(key.into());
        self
    }
}

/// Wire the fixtures of `chain` (outermost first) into `registry`.
pub fn wire_scopes(registry: &mut Registry, chain: &[Scope]) -> Result<()> {
    let mut outer_setup: Option<&str> = None;
    let mut outer_teardown: Option<&str> = None;

    for scope in chain {
        if let (Some(setup), Some(parent)) = (scope.setup.as_deref(), outer_setup) {
            registry.depends(setup, parent)?;
        }
        if let Some(teardown) = scope.teardown.as_deref() {
            if let Some(parent) = outer_teardown {
                registry.depends(parent, teardown)?;
            }
            if let Some(setup) = scope.setup.as_deref() {
                registry.set_partner(teardown, setup)?;
            }
        }

        let setup = scope.setup.as_deref().or(outer_setup);
        let teardown = scope.teardown.as_deref().or(outer_teardown);
        for member in &scope.members {
            if let Some(setup) = setup {
                registry.depends(member, setup)?;
            }
            if let Some(teardown) = teardown {
                registry.depends(teardown, member)?;
            }
        }

        outer_setup = setup;
        outer_teardown = teardown;
    }
    Ok(())
}
