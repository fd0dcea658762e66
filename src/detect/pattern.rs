//! Sliding-window shape recognition.
//!
//! Every enabled rule slides a window of `windowSize` points one sample at a
//! time over each source's stream and runs the single recognizer named by the
//! rule. Percentages are only computed against a positive denominator; a
//! window whose baseline or mean is zero or negative never fires.

use chrono::Duration;
use tracing::debug;

use super::ids::IdGenerator;
use super::model::{
    Anomaly, AnomalyDetail, AnomalyKind, MetricPoint, PatternDetail, PatternKind, PatternRule,
    TrendDirection,
};
use super::stats::{percent_change, TimeSeries};
use super::{playbook, Detector, Sensitivity};

/// Minimum relative change between neighbours that counts towards oscillation.
pub const OSCILLATION_MIN_CHANGE_PERCENT: f64 = 5.0;

/// A positive recognizer result for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    /// Score in `0..=100`.
    pub strength: f64,
    /// The raw quantity compared against the threshold.
    pub measure: f64,
    pub direction: Option<TrendDirection>,
}

impl Recognition {
    fn new(measure: f64, strength: f64) -> Self {
        Self {
            strength,
            measure,
            direction: None,
        }
    }
}

/// Run the recognizer for `kind` over `values` against an already
/// sensitivity-adjusted threshold.
pub fn recognize(kind: PatternKind, values: &[f64], threshold: f64) -> Option<Recognition> {
    if values.len() < 3 {
        return None;
    }
    match kind {
        PatternKind::Spike => recognize_spike(values, threshold),
        PatternKind::Drop => recognize_drop(values, threshold),
        PatternKind::Trend => recognize_trend(values, threshold),
        PatternKind::Oscillation => recognize_oscillation(values, threshold),
        PatternKind::Flatline => recognize_flatline(values, threshold),
    }
}

/// Baseline over all but the last two points, and those last two points.
fn split_tail(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len();
    let baseline = TimeSeries::new(&values[..n - 2]).mean();
    (baseline, values[n - 2], values[n - 1])
}

fn recognize_spike(values: &[f64], threshold: f64) -> Option<Recognition> {
    let (baseline, a, b) = split_tail(values);
    let increase = percent_change(baseline, a.max(b))?;
    (increase > threshold).then(|| Recognition::new(increase, increase.min(100.0)))
}

fn recognize_drop(values: &[f64], threshold: f64) -> Option<Recognition> {
    let (baseline, a, b) = split_tail(values);
    let decrease = -percent_change(baseline, a.min(b))?;
    (decrease > threshold).then(|| Recognition::new(decrease, decrease.min(100.0)))
}

fn recognize_trend(values: &[f64], threshold: f64) -> Option<Recognition> {
    let series = TimeSeries::new(values);
    let mean = series.mean();
    if mean <= 0.0 {
        return None;
    }
    let slope = series.slope()?;
    let span = (values.len() - 1) as f64;
    let change = (slope * span / mean).abs() * 100.0;
    if change <= threshold {
        return None;
    }
    Some(Recognition {
        strength: change.min(100.0),
        measure: change,
        direction: Some(if slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        }),
    })
}

fn recognize_oscillation(values: &[f64], threshold: f64) -> Option<Recognition> {
    let changes = TimeSeries::new(values).significant_changes(OSCILLATION_MIN_CHANGE_PERCENT);
    let ratio = changes as f64 / (values.len() - 1) as f64 * 100.0;
    (ratio > threshold).then(|| Recognition::new(changes as f64, ratio))
}

// Inverted test: a flat window is one whose deviation is *below* the threshold.
fn recognize_flatline(values: &[f64], threshold: f64) -> Option<Recognition> {
    let series = TimeSeries::new(values);
    let mean = series.mean();
    if mean <= 0.0 {
        return None;
    }
    let deviation = series.max_abs_deviation() / mean * 100.0;
    (deviation < threshold).then(|| Recognition::new(deviation, 100.0 - deviation))
}

/// Statistical pattern recognition over sliding windows.
pub struct PatternDetector {
    rules: Vec<PatternRule>,
    sensitivity: Sensitivity,
}

impl PatternDetector {
    pub fn new(rules: Vec<PatternRule>, sensitivity: Sensitivity) -> Self {
        Self { rules, sensitivity }
    }

    fn scan(
        &self,
        rule: &PatternRule,
        source: &str,
        stream: &[MetricPoint],
        ids: &dyn IdGenerator,
    ) -> Vec<Anomaly> {
        let params = &rule.parameters;
        let Some(window_len) = params.window_len() else {
            return Vec::new();
        };
        if stream.len() < window_len {
            return Vec::new();
        }

        let threshold = params.threshold_percent * self.sensitivity.multiplier();
        let min_duration = Duration::minutes(params.min_duration_minutes);
        let mut anomalies = Vec::new();

        for window in stream.windows(window_len) {
            let (first, last) = (&window[0], &window[window.len() - 1]);
            let values: Vec<f64> = window.iter().map(|p| p.value).collect();

            let Some(hit) = recognize(rule.pattern, &values, threshold) else {
                continue;
            };
            if last.timestamp - first.timestamp < min_duration {
                continue;
            }

            anomalies.push(Anomaly {
                id: ids.next_id(AnomalyKind::Pattern),
                severity: rule.severity,
                source: source.to_string(),
                timestamp: last.timestamp,
                description: describe(rule.pattern, source, &hit, values.len()),
                impact: playbook::pattern_impact(rule.pattern, rule.severity),
                recommended_actions: playbook::pattern_actions(rule.pattern),
                detail: AnomalyDetail::Pattern(PatternDetail {
                    pattern: rule.pattern,
                    rule_id: rule.rule_id.clone(),
                    rule_name: rule.name.clone(),
                    window_start: first.timestamp,
                    window_end: last.timestamp,
                    values,
                    pattern_strength: hit.strength,
                    direction: hit.direction,
                }),
            });
        }

        debug!(
            source,
            rule = %rule.rule_id,
            found = anomalies.len(),
            "pattern scan complete"
        );
        anomalies
    }
}

fn describe(kind: PatternKind, source: &str, hit: &Recognition, window_len: usize) -> String {
    match kind {
        PatternKind::Spike => format!(
            "Spike detected in {}: {:.1}% above baseline",
            source, hit.measure
        ),
        PatternKind::Drop => format!(
            "Drop detected in {}: {:.1}% below baseline",
            source, hit.measure
        ),
        PatternKind::Trend => {
            let direction = match hit.direction {
                Some(TrendDirection::Decreasing) => "Decreasing",
                _ => "Increasing",
            };
            format!(
                "{} trend detected in {}: {:.1}% change across the window",
                direction, source, hit.measure
            )
        }
        PatternKind::Oscillation => format!(
            "Oscillation detected in {}: {} of {} intervals changed by more than {}%",
            source,
            hit.measure,
            window_len - 1,
            OSCILLATION_MIN_CHANGE_PERCENT
        ),
        PatternKind::Flatline => format!(
            "Flatline detected in {}: values within {:.2}% of the mean, possible data collection failure",
            source, hit.measure
        ),
    }
}

impl Detector for PatternDetector {
    fn name(&self) -> &str {
        "pattern"
    }

    fn detect(&self, source: &str, stream: &[MetricPoint], ids: &dyn IdGenerator) -> Vec<Anomaly> {
        self.rules
            .iter()
            .filter(|r| r.enabled)
            .flat_map(|rule| self.scan(rule, source, stream, ids))
            .collect()
    }
}
