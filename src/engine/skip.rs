// src/engine/skip.rs

//! Rules selecting which nodes to skip at the start of a run.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{DagtestError, Result};
use crate::node::Node;

/// Predicate deciding whether a node is skipped before scheduling.
#[derive(Clone, Default)]
pub enum SkipRule {
    /// Skip nodes declared with [`NodeBuilder::skip`](crate::node::NodeBuilder::skip).
    #[default]
    Flag,
    /// Skip nothing.
    Never,
    /// Skip nodes carrying the attribute.
    HasAttr(String),
    /// Skip nodes whose attribute renders as the given text.
    AttrEquals(String, String),
    Custom(Arc<dyn Fn(&Node) -> bool + Send + Sync>),
}

impl SkipRule {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Node) -> bool + Send + Sync + 'static,
    {
        SkipRule::Custom(Arc::new(f))
    }

    /// Parse `"key"` (attribute present) or `"key=value"` (attribute equal).
    pub fn parse(rule: &str) -> Result<Self> {
        let rule = rule.trim();
        match rule.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                if key.is_empty() {
                    return Err(DagtestError::ConfigError(format!(
                        "skip rule '{rule}' has an empty attribute name"
                    )));
                }
                Ok(SkipRule::AttrEquals(key.to_string(), value.trim().to_string()))
            }
            None if rule.is_empty() => Err(DagtestError::ConfigError(
                "skip rule must not be empty".to_string(),
            )),
            None => Ok(SkipRule::HasAttr(rule.to_string())),
        }
    }

    pub fn should_skip(&self, node: &Node) -> bool {
        match self {
            SkipRule::Flag => node.skip(),
            SkipRule::Never => false,
            SkipRule::HasAttr(key) => node.attrs().contains(key),
            SkipRule::AttrEquals(key, value) => node.attr(key).is_some_and(|v| v.matches_text(value)),
            SkipRule::Custom(f) => f(node),
        }
    }
}

impl FromStr for SkipRule {
    type Err = DagtestError;

    fn from_str(s: &str) -> Result<Self> {
        SkipRule::parse(s)
    }
}

impl fmt::Debug for SkipRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipRule::Flag => f.write_str("Flag"),
            SkipRule::Never => f.write_str("Never"),
            SkipRule::HasAttr(key) => f.debug_tuple("HasAttr").field(key).finish(),
            SkipRule::AttrEquals(key, value) => f.debug_tuple("AttrEquals").field(key).field(value).finish(),
            SkipRule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
