//! Fixed remediation and impact tables.
//!
//! All tables are compile-time constants; nothing here is mutable at runtime.

use crate::detect::model::{Breach, PatternKind};
use crate::detect::Severity;

/// (metric name, actions on upper breach, actions on lower breach)
type MetricPlaybook = (&'static str, &'static [&'static str], &'static [&'static str]);

const METRIC_PLAYBOOKS: &[MetricPlaybook] = &[
    (
        "delivery_performance",
        &[
            "Confirm delivery capacity can sustain the elevated volume",
            "Check for duplicated or batched delivery events inflating the metric",
        ],
        &[
            "Investigate carrier and route delays",
            "Review the dispatch backlog at affected sites",
            "Notify customer service of potential late deliveries",
        ],
    ),
    (
        "cost_efficiency",
        &[
            "Audit recent spend against budget",
            "Identify the cost centers driving the overrun",
            "Review supplier pricing and contract terms",
        ],
        &[
            "Confirm cost data is complete for the period",
            "Check for deferred costs that have not been booked yet",
        ],
    ),
    (
        "risk_level",
        &[
            "Escalate to the risk management team",
            "Review active mitigation plans",
            "Assess exposure of the affected operations",
        ],
        &["Confirm risk scoring inputs are still being collected"],
    ),
    (
        "sustainability_score",
        &["Validate sustainability data sources for reporting errors"],
        &[
            "Review energy use and emissions for the affected operations",
            "Check progress against sustainability targets",
        ],
    ),
];

const GENERIC_UPPER: &[&str] = &[
    "Investigate the cause of the elevated value",
    "Compare against recent operational changes",
];

const GENERIC_LOWER: &[&str] = &[
    "Investigate the cause of the depressed value",
    "Compare against recent operational changes",
];

/// Remediation steps for a threshold breach, falling back to generic guidance
/// for metric names without a playbook.
pub fn threshold_actions(metric_name: &str, breach: Breach) -> Vec<String> {
    let actions = METRIC_PLAYBOOKS
        .iter()
        .find(|(name, _, _)| *name == metric_name)
        .map(|(_, upper, lower)| match breach {
            Breach::Upper => *upper,
            Breach::Lower => *lower,
        })
        .unwrap_or(match breach {
            Breach::Upper => GENERIC_UPPER,
            Breach::Lower => GENERIC_LOWER,
        });
    actions.iter().map(|s| s.to_string()).collect()
}

/// Remediation steps for a recognized pattern.
pub fn pattern_actions(pattern: PatternKind) -> Vec<String> {
    let actions: &[&str] = match pattern {
        PatternKind::Spike => &[
            "Identify the event that triggered the sudden increase",
            "Check for data entry or ingestion errors",
            "Verify downstream systems can absorb the load",
        ],
        PatternKind::Drop => &[
            "Check for outages or failed upstream feeds",
            "Verify data collection for the affected source",
            "Review recent configuration or process changes",
        ],
        PatternKind::Trend => &[
            "Project when the trend will cross operating limits",
            "Review capacity and resource planning",
            "Correlate with recent business changes",
        ],
        PatternKind::Oscillation => &[
            "Look for competing control loops or scheduling conflicts",
            "Review batching and polling intervals",
            "Stabilize the process before tuning thresholds",
        ],
        PatternKind::Flatline => &[
            "Verify the metric collector and data pipeline are running",
            "Check integration health for the source",
            "Confirm the source is still reporting live values",
        ],
    };
    actions.iter().map(|s| s.to_string()).collect()
}

/// Business impact of a pattern at a given rule severity.
///
/// Flatline is always critical since it usually means data collection has
/// stopped.
pub fn pattern_impact(pattern: PatternKind, severity: Severity) -> Severity {
    use Severity::*;
    match (pattern, severity) {
        (PatternKind::Flatline, _) => Critical,
        (PatternKind::Drop, Low) => Medium,
        (PatternKind::Drop, Medium) => High,
        (PatternKind::Drop, High | Critical) => Critical,
        (PatternKind::Spike, s) => s,
        (PatternKind::Trend, Critical) => High,
        (PatternKind::Trend, s) => s,
        (PatternKind::Oscillation, Low | Medium) => Low,
        (PatternKind::Oscillation, High) => Medium,
        (PatternKind::Oscillation, Critical) => High,
    }
}

/// Business impact of a threshold breach from its deviation percentage.
pub fn threshold_impact(deviation_percent: f64) -> Severity {
    if deviation_percent > 50.0 {
        Severity::High
    } else if deviation_percent > 20.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_metric_actions_depend_on_direction() {
        let upper = threshold_actions("cost_efficiency", Breach::Upper);
        let lower = threshold_actions("cost_efficiency", Breach::Lower);
        assert_eq!(upper[0], "Audit recent spend against budget");
        assert_ne!(upper, lower);
    }

    #[test]
    fn test_unknown_metric_falls_back() {
        let actions = threshold_actions("queue_depth", Breach::Upper);
        assert_eq!(actions[0], GENERIC_UPPER[0]);
        assert_eq!(threshold_actions("queue_depth", Breach::Lower)[0], GENERIC_LOWER[0]);
    }

    #[test]
    fn test_flatline_impact_is_always_critical() {
        for severity in Severity::DESCENDING {
            assert_eq!(pattern_impact(PatternKind::Flatline, severity), Severity::Critical);
        }
        assert_eq!(pattern_impact(PatternKind::Spike, Severity::High), Severity::High);
        assert_eq!(pattern_impact(PatternKind::Drop, Severity::High), Severity::Critical);
    }

    #[test]
    fn test_threshold_impact_bands() {
        assert_eq!(threshold_impact(75.0), Severity::High);
        assert_eq!(threshold_impact(50.0), Severity::Medium);
        assert_eq!(threshold_impact(20.0), Severity::Low);
        assert_eq!(threshold_impact(5.0), Severity::Low);
        assert!(!pattern_actions(PatternKind::Oscillation).is_empty());
    }
}
