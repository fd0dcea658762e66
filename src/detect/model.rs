//! Data model shared by the detectors and the assessment stages.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::Severity;

// ---------------------------------------------------------------------------
// Input samples
// ---------------------------------------------------------------------------

/// A single timestamped metric sample from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, MetadataValue>>,
}

impl MetricPoint {
    pub fn new(source: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            source: source.into(),
            metadata: None,
        }
    }
}

/// Constrained JSON-like value allowed in point metadata. Nested objects are
/// not accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<MetadataValue>),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Static upper/lower bound configuration for a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threshold {
    pub metric_name: String,
    pub upper_bound: f64,
    pub lower_bound: f64,
    pub severity: Severity,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl Threshold {
    pub fn new(metric_name: &str, upper_bound: f64, lower_bound: f64, severity: Severity) -> Self {
        Self {
            metric_name: metric_name.to_string(),
            upper_bound,
            lower_bound,
            severity,
            enabled: true,
        }
    }
}

/// The five statistical shape recognizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Spike,
    Drop,
    Trend,
    Oscillation,
    Flatline,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Spike => "spike",
            PatternKind::Drop => "drop",
            PatternKind::Trend => "trend",
            PatternKind::Oscillation => "oscillation",
            PatternKind::Flatline => "flatline",
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer fields are signed so that out-of-range values reach validation
/// as per-entry errors instead of failing the whole request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternParameters {
    pub window_size: i64,
    pub threshold_percent: f64,
    pub min_duration_minutes: i64,
}

impl PatternParameters {
    /// Window length usable for slicing, `None` below the three-point minimum.
    pub fn window_len(&self) -> Option<usize> {
        usize::try_from(self.window_size).ok().filter(|&n| n >= 3)
    }
}

/// Configuration for one recognizer applied over a sliding window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRule {
    pub rule_id: String,
    pub name: String,
    pub pattern: PatternKind,
    pub parameters: PatternParameters,
    pub severity: Severity,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl PatternRule {
    pub fn new(
        rule_id: &str,
        name: &str,
        pattern: PatternKind,
        (window_size, threshold_percent, min_duration_minutes): (i64, f64, i64),
        severity: Severity,
    ) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            name: name.to_string(),
            pattern,
            parameters: PatternParameters {
                window_size,
                threshold_percent,
                min_duration_minutes,
            },
            severity,
            enabled: true,
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Detected anomalies
// ---------------------------------------------------------------------------

/// Anomaly discriminant, used for dedup keys and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    Threshold,
    Pattern,
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyKind::Threshold => write!(f, "threshold"),
            AnomalyKind::Pattern => write!(f, "pattern"),
        }
    }
}

/// Common anomaly envelope. The type-specific payload is flattened in next to
/// the envelope fields and tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub id: String,
    pub severity: Severity,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub impact: Severity,
    pub recommended_actions: Vec<String>,
    #[serde(flatten)]
    pub detail: AnomalyDetail,
}

impl Anomaly {
    pub fn kind(&self) -> AnomalyKind {
        match self.detail {
            AnomalyDetail::Threshold(_) => AnomalyKind::Threshold,
            AnomalyDetail::Pattern(_) => AnomalyKind::Pattern,
        }
    }

    pub fn pattern(&self) -> Option<PatternKind> {
        match &self.detail {
            AnomalyDetail::Pattern(p) => Some(p.pattern),
            AnomalyDetail::Threshold(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnomalyDetail {
    Threshold(ThresholdDetail),
    Pattern(PatternDetail),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdDetail {
    pub metric_name: String,
    pub value: f64,
    /// The sensitivity-adjusted bound that was crossed.
    pub threshold_value: f64,
    pub deviation_percent: f64,
    pub breach: Breach,
}

/// Which side of a threshold was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breach {
    Upper,
    Lower,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternDetail {
    pub pattern: PatternKind,
    pub rule_id: String,
    pub rule_name: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub values: Vec<f64>,
    pub pattern_strength: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<TrendDirection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}
