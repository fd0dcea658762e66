//! Aggregate counts and business-impact assessment over fused anomalies.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::model::Anomaly;
use super::Severity;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    pub total: usize,
    pub severity_counts: BTreeMap<Severity, usize>,
    /// `"none"` when there are no anomalies.
    #[serde(serialize_with = "severity_or_none")]
    pub highest_severity: Option<Severity>,
    pub sources: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

fn severity_or_none<S: Serializer>(value: &Option<Severity>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(severity) => severity.serialize(s),
        None => s.serialize_str("none"),
    }
}

impl DetectionSummary {
    pub fn count(&self, severity: Severity) -> usize {
        self.severity_counts.get(&severity).copied().unwrap_or(0)
    }
}

pub fn summarize(anomalies: &[Anomaly]) -> DetectionSummary {
    let mut severity_counts: BTreeMap<Severity, usize> =
        Severity::DESCENDING.iter().map(|s| (*s, 0)).collect();
    for anomaly in anomalies {
        *severity_counts.entry(anomaly.severity).or_insert(0) += 1;
    }

    let highest_severity = Severity::DESCENDING
        .into_iter()
        .find(|s| severity_counts.get(s).is_some_and(|&n| n > 0));

    let time_range = anomalies
        .iter()
        .map(|a| a.timestamp)
        .min()
        .zip(anomalies.iter().map(|a| a.timestamp).max())
        .map(|(start, end)| TimeRange { start, end });

    DetectionSummary {
        total: anomalies.len(),
        severity_counts,
        highest_severity,
        sources: anomalies.iter().map(|a| a.source.clone()).collect(),
        time_range,
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessImpact {
    pub delivery_risk: bool,
    pub cost_risk: bool,
    pub quality_risk: bool,
    pub compliance_risk: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAssessment {
    pub overall_impact: Severity,
    pub affected_systems: BTreeSet<String>,
    pub estimated_downtime_minutes: u64,
    pub business_impact: BusinessImpact,
}

/// Downtime attributed to each critical and high anomaly.
const CRITICAL_DOWNTIME_MINUTES: u64 = 30;
const HIGH_DOWNTIME_MINUTES: u64 = 10;

pub fn assess_impact(anomalies: &[Anomaly]) -> ImpactAssessment {
    let count = |severity: Severity| anomalies.iter().filter(|a| a.severity == severity).count();
    let critical = count(Severity::Critical);
    let high = count(Severity::High);

    let overall_impact = if critical > 0 {
        Severity::Critical
    } else if high > 2 {
        Severity::High
    } else if high > 0 || anomalies.len() > 5 {
        Severity::Medium
    } else {
        Severity::Low
    };

    let source_mentions = |needle: &str| {
        anomalies
            .iter()
            .any(|a| a.source.to_lowercase().contains(needle))
    };

    ImpactAssessment {
        overall_impact,
        affected_systems: anomalies.iter().map(|a| a.source.clone()).collect(),
        estimated_downtime_minutes: critical as u64 * CRITICAL_DOWNTIME_MINUTES
            + high as u64 * HIGH_DOWNTIME_MINUTES,
        business_impact: BusinessImpact {
            delivery_risk: source_mentions("delivery"),
            cost_risk: source_mentions("cost"),
            quality_risk: source_mentions("quality"),
            compliance_risk: critical > 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::model::{AnomalyDetail, Breach, ThresholdDetail};
    use chrono::TimeZone;

    fn anomaly(source: &str, severity: Severity, minute: u32) -> Anomaly {
        Anomaly {
            id: format!("threshold-{}", minute),
            severity,
            source: source.into(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
            description: String::new(),
            impact: Severity::Low,
            recommended_actions: Vec::new(),
            detail: AnomalyDetail::Threshold(ThresholdDetail {
                metric_name: source.into(),
                value: 0.0,
                threshold_value: 1.0,
                deviation_percent: 100.0,
                breach: Breach::Lower,
            }),
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.highest_severity, None);
        assert!(summary.time_range.is_none());
        assert_eq!(summary.count(Severity::Critical), 0);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["highestSeverity"], "none");
        assert_eq!(json["severityCounts"]["low"], 0);
        assert!(json.get("timeRange").is_none());

        let impact = assess_impact(&[]);
        assert_eq!(impact.overall_impact, Severity::Low);
        assert_eq!(impact.estimated_downtime_minutes, 0);
    }

    #[test]
    fn test_critical_dominates() {
        let anomalies = vec![
            anomaly("risk_level", Severity::Critical, 10),
            anomaly("delivery_performance", Severity::Medium, 2),
        ];
        let summary = summarize(&anomalies);
        assert_eq!(summary.highest_severity, Some(Severity::Critical));
        assert_eq!(summary.count(Severity::Medium), 1);
        assert_eq!(summary.sources.len(), 2);
        let range = summary.time_range.unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 3, 1, 12, 2, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 3, 1, 12, 10, 0).unwrap());

        let impact = assess_impact(&anomalies);
        assert_eq!(impact.overall_impact, Severity::Critical);
        assert_eq!(impact.estimated_downtime_minutes, 30);
        assert!(impact.business_impact.compliance_risk);
        assert!(impact.business_impact.delivery_risk);
        assert!(!impact.business_impact.cost_risk);
    }

    #[test]
    fn test_overall_impact_ladder() {
        let highs: Vec<Anomaly> = (0..3).map(|m| anomaly("Cost_Center", Severity::High, m)).collect();
        let impact = assess_impact(&highs);
        assert_eq!(impact.overall_impact, Severity::High);
        assert_eq!(impact.estimated_downtime_minutes, 30);
        assert!(impact.business_impact.cost_risk);
        assert!(!impact.business_impact.compliance_risk);

        assert_eq!(assess_impact(&highs[..1]).overall_impact, Severity::Medium);

        let lows: Vec<Anomaly> = (0..6).map(|m| anomaly("quality_index", Severity::Low, m)).collect();
        assert_eq!(assess_impact(&lows).overall_impact, Severity::Medium);
        assert_eq!(assess_impact(&lows[..5]).overall_impact, Severity::Low);
        assert!(assess_impact(&lows).business_impact.quality_risk);
    }
}
