use tracing::debug;

use super::ids::IdGenerator;
use super::model::{Anomaly, AnomalyDetail, AnomalyKind, Breach, MetricPoint, Threshold, ThresholdDetail};
use super::{playbook, Detector, Sensitivity};

/// Name of the catch-all threshold used when no metric name matches a source.
pub const DEFAULT_THRESHOLD_NAME: &str = "default";

/// Static bound checking of every sample against the matching threshold.
pub struct ThresholdDetector {
    thresholds: Vec<Threshold>,
    sensitivity: Sensitivity,
}

impl ThresholdDetector {
    pub fn new(thresholds: Vec<Threshold>, sensitivity: Sensitivity) -> Self {
        Self {
            thresholds,
            sensitivity,
        }
    }

    /// First enabled threshold whose metric name occurs in `source`, else the
    /// enabled threshold named `default`.
    pub fn select(&self, source: &str) -> Option<&Threshold> {
        let enabled = || self.thresholds.iter().filter(|t| t.enabled);
        enabled()
            .find(|t| source.contains(t.metric_name.as_str()))
            .or_else(|| enabled().find(|t| t.metric_name == DEFAULT_THRESHOLD_NAME))
    }

    /// Check one value against the sensitivity-adjusted bounds. Values exactly
    /// on a bound are not breaches. Breaches of a non-positive bound are not
    /// reported since no deviation percentage exists for them.
    pub fn check(&self, threshold: &Threshold, value: f64) -> Option<ThresholdDetail> {
        let multiplier = self.sensitivity.multiplier();
        let upper = threshold.upper_bound * multiplier;
        let lower = threshold.lower_bound * multiplier;

        let (breach, bound) = if value > upper {
            (Breach::Upper, upper)
        } else if value < lower {
            (Breach::Lower, lower)
        } else {
            return None;
        };

        if bound <= 0.0 {
            return None;
        }

        Some(ThresholdDetail {
            metric_name: threshold.metric_name.clone(),
            value,
            threshold_value: bound,
            deviation_percent: (value - bound).abs() / bound * 100.0,
            breach,
        })
    }
}

impl Detector for ThresholdDetector {
    fn name(&self) -> &str {
        "threshold"
    }

    fn detect(&self, source: &str, stream: &[MetricPoint], ids: &dyn IdGenerator) -> Vec<Anomaly> {
        let Some(threshold) = self.select(source) else {
            debug!(source, "no threshold configured for source, skipping");
            return Vec::new();
        };

        stream
            .iter()
            .filter_map(|point| {
                let detail = self.check(threshold, point.value)?;
                let description = match detail.breach {
                    Breach::Upper => format!(
                        "{} value {:.2} exceeds upper threshold {:.2} ({:.1}% above)",
                        detail.metric_name, detail.value, detail.threshold_value, detail.deviation_percent
                    ),
                    Breach::Lower => format!(
                        "{} value {:.2} falls below lower threshold {:.2} ({:.1}% below)",
                        detail.metric_name, detail.value, detail.threshold_value, detail.deviation_percent
                    ),
                };

                Some(Anomaly {
                    id: ids.next_id(AnomalyKind::Threshold),
                    severity: threshold.severity,
                    source: source.to_string(),
                    timestamp: point.timestamp,
                    description,
                    impact: playbook::threshold_impact(detail.deviation_percent),
                    recommended_actions: playbook::threshold_actions(&detail.metric_name, detail.breach),
                    detail: AnomalyDetail::Threshold(detail),
                })
            })
            .collect()
    }
}
