// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, DefaultSection, RawConfigFile, RunSection, StrategyKind, StrategySpec};
use crate::engine::SkipRule;
use crate::errors::{DagtestError, Result};
use crate::exec::policy::ThresholdPolicy;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DagtestError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let RawConfigFile { run, default } = raw;
        let (max_threads, skip) = validate_run_section(&run)?;
        let (timeout, strategy, threshold) = validate_default_section(&default)?;

        Ok(ConfigFile {
            max_threads,
            skip,
            dot: run.dot,
            timeout,
            strategy,
            threshold,
        })
    }
}

fn validate_run_section(run: &RunSection) -> Result<(Option<usize>, SkipRule)> {
    if run.max_threads == Some(0) {
        return Err(DagtestError::ConfigError(
            "[run].max_threads must be >= 1 (got 0)".to_string(),
        ));
    }

    let skip = if run.no_skip {
        SkipRule::Never
    } else {
        match run.skip.as_deref() {
            Some(rule) => SkipRule::parse(rule)
                .map_err(|e| DagtestError::ConfigError(format!("[run].skip: {e}")))?,
            None => SkipRule::Flag,
        }
    };

    Ok((run.max_threads, skip))
}

fn validate_default_section(
    default: &DefaultSection,
) -> Result<(Option<Duration>, StrategyKind, Option<ThresholdPolicy>)> {
    let timeout = default
        .timeout
        .as_deref()
        .map(parse_duration)
        .transpose()
        .map_err(|e| DagtestError::ConfigError(format!("[default].timeout: {e}")))?;

    let strategy = match &default.strategy {
        None => StrategyKind::Serial,
        Some(StrategySpec::Named(name)) => match name.trim().to_lowercase().as_str() {
            "serial" => StrategyKind::Serial,
            "parallel" => StrategyKind::Parallel,
            other => {
                return Err(DagtestError::ConfigError(format!(
                    "[default].strategy: unknown strategy '{other}'; expected \"serial\", \"parallel\" or {{ parallel = N }}"
                )));
            }
        },
        Some(StrategySpec::Limited { parallel: 0 }) => {
            return Err(DagtestError::ConfigError(
                "[default].strategy: parallel limit must be >= 1 (got 0)".to_string(),
            ));
        }
        Some(StrategySpec::Limited { parallel }) => StrategyKind::LimitedParallel(*parallel),
    };

    let threshold = default
        .threshold
        .map(ThresholdPolicy::new)
        .transpose()
        .map_err(|e| DagtestError::ConfigError(format!("[default].threshold: {e}")))?;

    Ok((timeout, strategy, threshold))
}

/// Parse a duration such as `"250ms"`, `"2s"`, `"5m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    let secs_per_unit = match unit_part.trim().to_lowercase().as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        unit => {
            return Err(format!(
                "unsupported duration unit '{unit}'; expected ms, s, m, or h"
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
