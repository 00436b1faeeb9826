// src/exec/policy.rs

//! Result aggregation policies for multi-result nodes.
//!
//! A node invoked several times (repeat count above one, or a generator
//! body) accumulates success/failure/error counts. After each completed
//! sub-invocation the node's policy turns the running counts into an overall
//! verdict.

use std::fmt;

use crate::errors::{DagtestError, Result};

/// Running counts of sub-invocation outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    pub error: usize,
}

/// Overall verdict. `is_error` is only ever true when `passed` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub is_error: bool,
}

impl Verdict {
    pub const PASS: Verdict = Verdict {
        passed: true,
        is_error: false,
    };
    pub const FAIL: Verdict = Verdict {
        passed: false,
        is_error: false,
    };
    pub const ERROR: Verdict = Verdict {
        passed: false,
        is_error: true,
    };
}

/// Maps running counts to a verdict.
pub trait ResultPolicy: Send + Sync + fmt::Debug {
    fn evaluate(&self, counts: Counts) -> Verdict;
}

/// Every sub-invocation must succeed; any error makes the node an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicPolicy;

impl ResultPolicy for BasicPolicy {
    fn evaluate(&self, counts: Counts) -> Verdict {
        Verdict {
            passed: counts.failure == 0 && counts.error == 0,
            is_error: counts.error > 0,
        }
    }
}

/// No errors allowed, and at least `threshold` percent of sub-invocations
/// must succeed. With zero failures the node always passes.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdPolicy {
    threshold: f64,
}

impl ThresholdPolicy {
    /// `threshold` is a percentage in `0.0..=100.0`.
    pub fn new(threshold: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&threshold) {
            return Err(DagtestError::InvalidPolicy(format!(
                "threshold must be between 0 and 100 (got {threshold})"
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl ResultPolicy for ThresholdPolicy {
    fn evaluate(&self, counts: Counts) -> Verdict {
        if counts.error > 0 {
            return Verdict::ERROR;
        }
        if counts.failure == 0 {
            return Verdict::PASS;
        }

        let percent = (counts.success as f64 * 100.0) / counts.total as f64;
        if percent >= self.threshold {
            Verdict::PASS
        } else {
            Verdict::FAIL
        }
    }
}
