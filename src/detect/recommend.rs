//! Rule-based remediation guidance over the fused anomaly set.
//!
//! Rules run in a fixed order. The critical-response rule always precedes the
//! systemic-issue rule when both apply; supplementary rules follow.

use std::collections::BTreeSet;

use serde::Serialize;

use super::model::{Anomaly, AnomalyDetail, AnomalyKind, PatternKind};
use super::Severity;

/// More than this many pattern anomalies indicates a systemic issue.
const SYSTEMIC_PATTERN_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Immediate,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub category: String,
    pub action: String,
    pub steps: Vec<String>,
}

impl Recommendation {
    fn new(priority: Priority, category: &str, action: String, steps: &[&str]) -> Self {
        Self {
            priority,
            category: category.to_string(),
            action,
            steps: steps.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub fn recommend(anomalies: &[Anomaly]) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let critical = anomalies
        .iter()
        .filter(|a| a.severity == Severity::Critical)
        .count();
    if critical > 0 {
        out.push(Recommendation::new(
            Priority::Immediate,
            "crisis_response",
            format!("Address {} critical anomal{} immediately", critical, plural(critical)),
            &[
                "Verify system and data integrity for the affected sources",
                "Check infrastructure health and recent deployments",
                "Escalate to the on-call owner and operations leadership",
            ],
        ));
    }

    let patterns = anomalies
        .iter()
        .filter(|a| a.kind() == AnomalyKind::Pattern)
        .count();
    if patterns > SYSTEMIC_PATTERN_COUNT {
        out.push(Recommendation::new(
            Priority::High,
            "systemic_issue",
            format!("Investigate systemic issue behind {} pattern anomalies", patterns),
            &[
                "Run a root-cause analysis across the affected sources",
                "Correlate pattern onsets with deployments and process changes",
                "Review whether thresholds and rules still match normal operation",
            ],
        ));
    }

    let flatlined: BTreeSet<&str> = anomalies
        .iter()
        .filter(|a| a.pattern() == Some(PatternKind::Flatline))
        .map(|a| a.source.as_str())
        .collect();
    if !flatlined.is_empty() {
        out.push(Recommendation::new(
            Priority::High,
            "data_collection",
            format!(
                "Confirm data collection is live for {}",
                flatlined.into_iter().collect::<Vec<_>>().join(", ")
            ),
            &[
                "Check collector processes and integration credentials",
                "Compare the last reported values against the upstream system",
            ],
        ));
    }

    let breached: BTreeSet<&str> = anomalies
        .iter()
        .filter_map(|a| match &a.detail {
            AnomalyDetail::Threshold(t) => Some(t.metric_name.as_str()),
            AnomalyDetail::Pattern(_) => None,
        })
        .collect();
    for metric in breached {
        out.push(Recommendation::new(
            Priority::Medium,
            "threshold_review",
            format!("Review threshold breaches for {}", metric),
            &[
                "Confirm the breach reflects a real operational change",
                "Adjust bounds if normal operation has shifted",
            ],
        ));
    }

    out
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        "y"
    } else {
        "ies"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::model::{Breach, PatternDetail, ThresholdDetail};
    use chrono::{TimeZone, Utc};

    fn pattern(kind: PatternKind, severity: Severity, source: &str) -> Anomaly {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Anomaly {
            id: "p".into(),
            severity,
            source: source.into(),
            timestamp: ts,
            description: String::new(),
            impact: severity,
            recommended_actions: Vec::new(),
            detail: AnomalyDetail::Pattern(PatternDetail {
                pattern: kind,
                rule_id: kind.to_string(),
                rule_name: kind.to_string(),
                window_start: ts,
                window_end: ts,
                values: Vec::new(),
                pattern_strength: 50.0,
                direction: None,
            }),
        }
    }

    #[test]
    fn test_no_anomalies_no_recommendations() {
        assert!(recommend(&[]).is_empty());
    }

    #[test]
    fn test_critical_precedes_systemic() {
        let anomalies = vec![
            pattern(PatternKind::Spike, Severity::High, "a"),
            pattern(PatternKind::Drop, Severity::High, "b"),
            pattern(PatternKind::Flatline, Severity::Critical, "c"),
        ];
        let recs = recommend(&anomalies);
        assert_eq!(recs[0].priority, Priority::Immediate);
        assert_eq!(recs[0].action, "Address 1 critical anomaly immediately");
        assert_eq!(recs[1].priority, Priority::High);
        assert_eq!(recs[1].category, "systemic_issue");
        assert_eq!(recs[2].category, "data_collection");
        assert!(recs[2].action.ends_with("c"));
    }

    #[test]
    fn test_two_patterns_are_not_systemic() {
        let anomalies = vec![
            pattern(PatternKind::Spike, Severity::High, "a"),
            pattern(PatternKind::Trend, Severity::Medium, "a"),
        ];
        assert!(recommend(&anomalies).is_empty());
    }

    #[test]
    fn test_threshold_review_per_metric() {
        let mut t = pattern(PatternKind::Spike, Severity::Medium, "cost_efficiency_eu");
        t.detail = AnomalyDetail::Threshold(ThresholdDetail {
            metric_name: "cost_efficiency".into(),
            value: 130.0,
            threshold_value: 110.0,
            deviation_percent: 18.0,
            breach: Breach::Upper,
        });
        let recs = recommend(&[t.clone(), t]);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].priority, Priority::Medium);
        assert_eq!(recs[0].action, "Review threshold breaches for cost_efficiency");
    }
}
