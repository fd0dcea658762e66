//! Request and response shapes for a detection call.
//!
//! These are transport-agnostic; the HTTP API and the CLI both exchange them
//! as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{Anomaly, PatternRule, Threshold};
use super::recommend::Recommendation;
use super::stream::RawMetricPoint;
use super::summary::{DetectionSummary, ImpactAssessment};
use super::validate::ValidationResult;
use super::Sensitivity;

/// Allowed range for `timeWindow`, in hours.
pub const TIME_WINDOW_HOURS: std::ops::RangeInclusive<u32> = 1..=168;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    DetectThreshold,
    DetectPattern,
    Comprehensive,
    Configure,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::DetectThreshold => write!(f, "detect_threshold"),
            Action::DetectPattern => write!(f, "detect_pattern"),
            Action::Comprehensive => write!(f, "comprehensive"),
            Action::Configure => write!(f, "configure"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequest {
    pub action: Action,
    #[serde(default)]
    pub data: Vec<RawMetricPoint>,
    /// Absent means the configured default set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Vec<Threshold>>,
    /// Absent means the configured default set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_rules: Option<Vec<PatternRule>>,
    /// Hours of data kept by `comprehensive`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<Sensitivity>,
}

impl DetectionRequest {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            data: Vec::new(),
            thresholds: None,
            pattern_rules: None,
            time_window: None,
            sensitivity: None,
        }
    }
}

/// Validation of the caller-supplied configuration lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigValidation {
    pub thresholds: ValidationResult,
    pub pattern_rules: ValidationResult,
}

/// The configuration a detection call actually ran with.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationEcho {
    pub sensitivity: Sensitivity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_window: Option<u32>,
    pub thresholds: Vec<Threshold>,
    pub pattern_rules: Vec<PatternRule>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub success: bool,
    pub detection_type: Action,
    pub anomalies: Vec<Anomaly>,
    pub summary: DetectionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_assessment: Option<ImpactAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Recommendation>>,
    pub configuration: ConfigurationEcho,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ConfigValidation>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSets {
    pub thresholds: Vec<Threshold>,
    pub pattern_rules: Vec<PatternRule>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationReport {
    pub success: bool,
    pub detection_type: Action,
    /// The accepted entries of the supplied lists (defaults where absent).
    pub configuration: RuleSets,
    pub defaults: RuleSets,
    pub validation: ConfigValidation,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DetectionResponse {
    Detection(Box<DetectionReport>),
    Configuration(ConfigurationReport),
}
