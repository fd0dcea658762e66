//! Consistency checks for threshold and pattern-rule sets.
//!
//! Validation never aborts: each offending entry contributes one error per
//! violated constraint and the remaining entries stay usable.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::detect::model::{PatternRule, Threshold};
use crate::detect::ConfigError;

/// Outcome of validating one configuration list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ConfigError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors: errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Validation result together with the entries that passed.
#[derive(Debug, Clone)]
pub struct Validated<T> {
    pub accepted: Vec<T>,
    pub result: ValidationResult,
}

pub fn check_threshold(threshold: &Threshold) -> Vec<ConfigError> {
    // NaN bounds compare as None and are rejected too.
    if threshold.upper_bound.partial_cmp(&threshold.lower_bound) != Some(Ordering::Greater) {
        return vec![ConfigError::InvertedBounds {
            metric: threshold.metric_name.clone(),
            upper: threshold.upper_bound,
            lower: threshold.lower_bound,
        }];
    }
    Vec::new()
}

pub fn check_pattern_rule(rule: &PatternRule) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    let params = &rule.parameters;

    if params.window_size < 3 {
        errors.push(ConfigError::WindowTooSmall {
            rule: rule.rule_id.clone(),
            size: params.window_size,
        });
    }
    if !(0.0..=100.0).contains(&params.threshold_percent) {
        errors.push(ConfigError::ThresholdPercentOutOfRange {
            rule: rule.rule_id.clone(),
            value: params.threshold_percent,
        });
    }
    if params.min_duration_minutes < 1 {
        errors.push(ConfigError::MinDurationTooShort {
            rule: rule.rule_id.clone(),
            minutes: params.min_duration_minutes,
        });
    }
    errors
}

pub fn validate_thresholds(thresholds: &[Threshold]) -> Validated<Threshold> {
    validate_with(thresholds, check_threshold)
}

pub fn validate_pattern_rules(rules: &[PatternRule]) -> Validated<PatternRule> {
    validate_with(rules, check_pattern_rule)
}

fn validate_with<T: Clone>(entries: &[T], check: fn(&T) -> Vec<ConfigError>) -> Validated<T> {
    let mut accepted = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();

    for entry in entries {
        let entry_errors = check(entry);
        if entry_errors.is_empty() {
            accepted.push(entry.clone());
        } else {
            for e in &entry_errors {
                warn!(error = %e, "rejecting configuration entry");
            }
            errors.extend(entry_errors);
        }
    }

    Validated {
        accepted,
        result: ValidationResult::from_errors(errors),
    }
}
