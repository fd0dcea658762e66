//! Anomaly detection: threshold and pattern detectors, fusion, and assessment.

pub mod engine;
pub mod fuse;
pub mod ids;
pub mod model;
pub mod pattern;
pub mod playbook;
pub mod recommend;
pub mod request;
pub mod stats;
pub mod stream;
pub mod summary;
pub mod threshold;
pub mod validate;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use engine::DetectionEngine;
pub use model::{Anomaly, AnomalyDetail, AnomalyKind, MetricPoint, PatternKind, PatternRule, Threshold};

use self::ids::IdGenerator;

/// A detector examines one time-ordered stream and reports anomalies.
pub trait Detector: Send + Sync {
    /// Human-readable name for this detector
    fn name(&self) -> &str;

    /// Analyze the stream of `source`, sorted ascending by timestamp.
    fn detect(&self, source: &str, stream: &[MetricPoint], ids: &dyn IdGenerator) -> Vec<Anomaly>;
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("invalid request: {}", errors.join("; "))]
    InvalidRequest { errors: Vec<String> },

    #[error("detection cancelled before completion")]
    Cancelled,

    #[error("internal detection failure: {0}")]
    Internal(String),
}

/// A single offending configuration entry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("threshold '{metric}': upperBound ({upper}) must be greater than lowerBound ({lower})")]
    InvertedBounds { metric: String, upper: f64, lower: f64 },

    #[error("pattern rule '{rule}': windowSize must be at least 3, got {size}")]
    WindowTooSmall { rule: String, size: i64 },

    #[error("pattern rule '{rule}': thresholdPercent must be within 0..=100, got {value}")]
    ThresholdPercentOutOfRange { rule: String, value: f64 },

    #[error("pattern rule '{rule}': minDurationMinutes must be at least 1, got {minutes}")]
    MinDurationTooShort { rule: String, minutes: i64 },
}

/// Severity levels for detectors and derived impact, ordered low < critical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All levels, most severe first.
    pub const DESCENDING: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call scaling applied to threshold bounds and pattern thresholds.
///
/// Higher sensitivity multiplies by a larger factor, which widens bounds and
/// raises pattern thresholds. `High` therefore reports fewer anomalies than
/// `Low`. This is the established contract and is kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    pub fn multiplier(&self) -> f64 {
        match self {
            Sensitivity::Low => 0.8,
            Sensitivity::Medium => 1.0,
            Sensitivity::High => 1.2,
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensitivity::Low => write!(f, "low"),
            Sensitivity::Medium => write!(f, "medium"),
            Sensitivity::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Sensitivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Sensitivity::Low),
            "medium" => Ok(Sensitivity::Medium),
            "high" => Ok(Sensitivity::High),
            other => Err(format!("unknown sensitivity '{}' (expected low, medium or high)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_total_order() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(Severity::DESCENDING[0], Severity::Critical);
    }

    #[test]
    fn test_sensitivity_multipliers() {
        assert_eq!(Sensitivity::Low.multiplier(), 0.8);
        assert_eq!(Sensitivity::Medium.multiplier(), 1.0);
        assert_eq!(Sensitivity::High.multiplier(), 1.2);
        assert_eq!(Sensitivity::default(), Sensitivity::Medium);
        assert_eq!("HIGH".parse::<Sensitivity>().unwrap(), Sensitivity::High);
        assert!("extreme".parse::<Sensitivity>().is_err());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
