//! The detection pipeline.
//!
//! `DetectionEngine` owns the validated default configuration and the id
//! generator; both are read-only after construction, so one engine can serve
//! concurrent requests. A call ingests samples, groups them per source, runs
//! the detectors source by source, fuses the output, and assesses it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fuse::fuse;
use super::ids::IdGenerator;
use super::model::{Anomaly, MetricPoint, PatternRule, Threshold};
use super::pattern::PatternDetector;
use super::recommend::{recommend, Recommendation};
use super::request::{
    Action, ConfigValidation, ConfigurationEcho, ConfigurationReport, DetectionReport,
    DetectionRequest, DetectionResponse, RuleSets, TIME_WINDOW_HOURS,
};
use super::stream::{group_by_source, ingest, retain_recent};
use super::summary::{assess_impact, summarize, DetectionSummary, ImpactAssessment};
use super::threshold::ThresholdDetector;
use super::validate::{validate_pattern_rules, validate_thresholds, Validated, ValidationResult};
use super::{DetectError, Detector, Sensitivity};
use crate::config::DetectionConfig;

/// Which detectors a call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Threshold,
    Pattern,
    Both,
}

/// Fused anomalies and everything derived from them.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub anomalies: Vec<Anomaly>,
    pub summary: DetectionSummary,
    pub impact: ImpactAssessment,
    pub recommendations: Vec<Recommendation>,
}

pub struct DetectionEngine {
    defaults: DetectionConfig,
    ids: Arc<dyn IdGenerator>,
}

impl DetectionEngine {
    /// Create an engine. Invalid entries in the configured default sets are
    /// logged and dropped; an out-of-range default time window is replaced by
    /// the built-in one.
    pub fn new(mut defaults: DetectionConfig, ids: Arc<dyn IdGenerator>) -> Self {
        if !TIME_WINDOW_HOURS.contains(&defaults.default_time_window_hours) {
            let fallback = DetectionConfig::default().default_time_window_hours;
            warn!(
                configured = defaults.default_time_window_hours,
                fallback, "default_time_window_hours out of range, using built-in default"
            );
            defaults.default_time_window_hours = fallback;
        }

        let thresholds = validate_thresholds(&defaults.thresholds);
        let rules = validate_pattern_rules(&defaults.pattern_rules);
        if !thresholds.result.valid || !rules.result.valid {
            warn!(
                threshold_errors = thresholds.result.errors.len(),
                rule_errors = rules.result.errors.len(),
                "default detection configuration contains invalid entries"
            );
        }
        defaults.thresholds = thresholds.accepted;
        defaults.pattern_rules = rules.accepted;

        info!(
            thresholds = defaults.thresholds.len(),
            pattern_rules = defaults.pattern_rules.len(),
            sensitivity = %defaults.default_sensitivity,
            "detection engine ready"
        );
        Self { defaults, ids }
    }

    pub fn defaults(&self) -> &DetectionConfig {
        &self.defaults
    }

    /// Validation of the default sets as they stand (always valid after `new`).
    pub fn default_validation(&self) -> ConfigValidation {
        ConfigValidation {
            thresholds: validate_thresholds(&self.defaults.thresholds).result,
            pattern_rules: validate_pattern_rules(&self.defaults.pattern_rules).result,
        }
    }

    /// Run the detectors selected by `scope` over `points` and assess the
    /// fused result.
    ///
    /// `cancel` is checked before each source group; once cancelled, partial
    /// output is discarded and `DetectError::Cancelled` is returned.
    pub fn analyze(
        &self,
        points: Vec<MetricPoint>,
        thresholds: &[Threshold],
        rules: &[PatternRule],
        sensitivity: Sensitivity,
        scope: Scope,
        cancel: &CancellationToken,
    ) -> Result<Analysis, DetectError> {
        let streams = group_by_source(points);
        let threshold_detector = ThresholdDetector::new(thresholds.to_vec(), sensitivity);
        let pattern_detector = PatternDetector::new(rules.to_vec(), sensitivity);

        let mut from_thresholds = Vec::new();
        let mut from_patterns = Vec::new();

        for (source, stream) in &streams {
            if cancel.is_cancelled() {
                warn!(source = %source, "detection cancelled, discarding partial results");
                return Err(DetectError::Cancelled);
            }
            if scope != Scope::Pattern {
                from_thresholds.extend(threshold_detector.detect(source, stream, self.ids.as_ref()));
            }
            if scope != Scope::Threshold {
                from_patterns.extend(pattern_detector.detect(source, stream, self.ids.as_ref()));
            }
            debug!(source = %source, points = stream.len(), "source analyzed");
        }

        let raw = from_thresholds.len() + from_patterns.len();
        let anomalies = fuse(from_thresholds, from_patterns);
        info!(
            sources = streams.len(),
            detected = raw,
            fused = anomalies.len(),
            "detection pass complete"
        );

        Ok(Analysis {
            summary: summarize(&anomalies),
            impact: assess_impact(&anomalies),
            recommendations: recommend(&anomalies),
            anomalies,
        })
    }

    /// Serve one request. Schema problems are rejected before any
    /// computation; partially invalid rule sets run with their valid subset.
    pub fn handle(
        &self,
        request: DetectionRequest,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<DetectionResponse, DetectError> {
        let mut errors = Vec::new();

        let time_window = request
            .time_window
            .unwrap_or(self.defaults.default_time_window_hours);
        if !TIME_WINDOW_HOURS.contains(&time_window) {
            errors.push(format!(
                "timeWindow: must be between {} and {} hours, got {}",
                TIME_WINDOW_HOURS.start(),
                TIME_WINDOW_HOURS.end(),
                time_window
            ));
        }
        if request.data.len() > self.defaults.max_points_per_request {
            errors.push(format!(
                "data: {} points exceeds the limit of {}",
                request.data.len(),
                self.defaults.max_points_per_request
            ));
        }

        let ingested = ingest(&request.data);
        errors.extend(ingested.errors);
        if !errors.is_empty() {
            return Err(DetectError::InvalidRequest { errors });
        }

        let supplied = request.thresholds.is_some() || request.pattern_rules.is_some();
        let (thresholds, threshold_result) =
            resolve(request.thresholds, &self.defaults.thresholds, validate_thresholds);
        let (rules, rule_result) =
            resolve(request.pattern_rules, &self.defaults.pattern_rules, validate_pattern_rules);
        let validation = ConfigValidation {
            thresholds: threshold_result,
            pattern_rules: rule_result,
        };

        if request.action == Action::Configure {
            return Ok(DetectionResponse::Configuration(ConfigurationReport {
                success: true,
                detection_type: Action::Configure,
                configuration: RuleSets {
                    thresholds,
                    pattern_rules: rules,
                },
                defaults: RuleSets {
                    thresholds: self.defaults.thresholds.clone(),
                    pattern_rules: self.defaults.pattern_rules.clone(),
                },
                validation,
                timestamp: now,
            }));
        }

        let sensitivity = request
            .sensitivity
            .unwrap_or(self.defaults.default_sensitivity);
        let (scope, points, echoed_window) = match request.action {
            Action::DetectThreshold => (Scope::Threshold, ingested.points, None),
            Action::DetectPattern => (Scope::Pattern, ingested.points, None),
            _ => (
                Scope::Both,
                retain_recent(ingested.points, now, time_window),
                Some(time_window),
            ),
        };

        info!(
            action = %request.action,
            points = points.len(),
            sensitivity = %sensitivity,
            "running detection"
        );
        let analysis = self.analyze(points, &thresholds, &rules, sensitivity, scope, cancel)?;
        let comprehensive = scope == Scope::Both;

        Ok(DetectionResponse::Detection(Box::new(DetectionReport {
            success: true,
            detection_type: request.action,
            anomalies: analysis.anomalies,
            summary: analysis.summary,
            impact_assessment: comprehensive.then_some(analysis.impact),
            recommendations: comprehensive.then_some(analysis.recommendations),
            configuration: ConfigurationEcho {
                sensitivity,
                time_window: echoed_window,
                thresholds,
                pattern_rules: rules,
            },
            validation: supplied.then_some(validation),
            timestamp: now,
        })))
    }
}

/// Supplied list (valid subset) or the defaults, with the validation of
/// whichever was chosen.
fn resolve<T: Clone>(
    supplied: Option<Vec<T>>,
    defaults: &[T],
    validate: fn(&[T]) -> Validated<T>,
) -> (Vec<T>, ValidationResult) {
    match supplied {
        Some(list) => {
            let validated = validate(&list);
            (validated.accepted, validated.result)
        }
        None => (defaults.to_vec(), ValidationResult { valid: true, errors: Vec::new() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ids::SequentialIds;
    use crate::detect::model::{AnomalyKind, PatternKind};
    use crate::detect::stream::RawMetricPoint;
    use crate::detect::Severity;
    use chrono::{Duration, TimeZone};

    fn engine() -> DetectionEngine {
        DetectionEngine::new(DetectionConfig::default(), Arc::new(SequentialIds::new()))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()
    }

    fn raw_series(source: &str, values: &[f64], step_minutes: i64) -> Vec<RawMetricPoint> {
        let start = now() - Duration::hours(2);
        values
            .iter()
            .enumerate()
            .map(|(i, v)| RawMetricPoint {
                timestamp: (start + Duration::minutes(i as i64 * step_minutes)).to_rfc3339(),
                value: *v,
                source: source.to_string(),
                metadata: None,
            })
            .collect()
    }

    fn report(response: DetectionResponse) -> DetectionReport {
        match response {
            DetectionResponse::Detection(r) => *r,
            DetectionResponse::Configuration(_) => panic!("expected detection report"),
        }
    }

    #[test]
    fn test_configure_defaults_are_valid() {
        let mut req = DetectionRequest::new(Action::Configure);
        req.thresholds = Some(crate::config::default_thresholds());
        req.pattern_rules = Some(crate::config::default_pattern_rules());
        let response = engine().handle(req, now(), &CancellationToken::new()).unwrap();
        let DetectionResponse::Configuration(cfg) = response else { panic!("expected configuration") };
        assert!(cfg.validation.thresholds.valid);
        assert!(cfg.validation.thresholds.errors.is_empty());
        assert!(cfg.validation.pattern_rules.valid);
        assert!(cfg.validation.pattern_rules.errors.is_empty());
        assert_eq!(cfg.defaults.thresholds.len(), 4);
        assert_eq!(cfg.configuration.pattern_rules.len(), 5);
    }

    #[test]
    fn test_configure_reports_invalid_entries() {
        let mut req = DetectionRequest::new(Action::Configure);
        req.thresholds = Some(vec![
            Threshold::new("a", 1.0, 2.0, Severity::Low),
            Threshold::new("b", 2.0, 1.0, Severity::Low),
        ]);
        let response = engine().handle(req, now(), &CancellationToken::new()).unwrap();
        let DetectionResponse::Configuration(cfg) = response else { panic!("expected configuration") };
        assert!(!cfg.validation.thresholds.valid);
        assert_eq!(cfg.validation.thresholds.errors.len(), 1);
        assert_eq!(cfg.configuration.thresholds.len(), 1);
        assert!(cfg.validation.pattern_rules.valid);
    }

    #[test]
    fn test_malformed_timestamp_rejects_request() {
        let mut req = DetectionRequest::new(Action::DetectThreshold);
        req.data = raw_series("cost_efficiency", &[100.0, 200.0], 1);
        req.data[1].timestamp = "last tuesday".into();
        let err = engine().handle(req, now(), &CancellationToken::new()).unwrap_err();
        let DetectError::InvalidRequest { errors } = err else { panic!("expected invalid request") };
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("data[1].timestamp"));
    }

    #[test]
    fn test_time_window_out_of_range() {
        for hours in [0, 169] {
            let mut req = DetectionRequest::new(Action::Comprehensive);
            req.time_window = Some(hours);
            let err = engine().handle(req, now(), &CancellationToken::new()).unwrap_err();
            assert!(matches!(err, DetectError::InvalidRequest { .. }));
        }
    }

    #[test]
    fn test_threshold_only_action() {
        let mut req = DetectionRequest::new(Action::DetectThreshold);
        req.data = raw_series("cost_efficiency", &[100.0, 100.0, 100.0, 100.0, 150.0, 100.0], 10);
        let r = report(engine().handle(req, now(), &CancellationToken::new()).unwrap());
        assert_eq!(r.anomalies.len(), 1);
        assert_eq!(r.anomalies[0].kind(), AnomalyKind::Threshold);
        assert!(r.impact_assessment.is_none());
        assert!(r.recommendations.is_none());
        assert!(r.validation.is_none());
        assert_eq!(r.configuration.thresholds.len(), 4);
    }

    #[test]
    fn test_pattern_only_action() {
        let mut req = DetectionRequest::new(Action::DetectPattern);
        req.data = raw_series("orders", &[100.0, 100.0, 100.0, 100.0, 200.0], 2);
        let r = report(engine().handle(req, now(), &CancellationToken::new()).unwrap());
        assert_eq!(r.anomalies.len(), 1);
        assert_eq!(r.anomalies[0].pattern(), Some(PatternKind::Spike));
    }

    #[test]
    fn test_partially_invalid_rules_use_valid_subset() {
        let mut req = DetectionRequest::new(Action::DetectPattern);
        req.data = raw_series("orders", &[100.0, 100.0, 100.0, 100.0, 200.0], 2);
        let mut broken = crate::config::default_pattern_rules()[0].clone();
        broken.rule_id = "broken".into();
        broken.parameters.window_size = 1;
        req.pattern_rules = Some(vec![broken, crate::config::default_pattern_rules()[0].clone()]);
        let r = report(engine().handle(req, now(), &CancellationToken::new()).unwrap());
        assert_eq!(r.anomalies.len(), 1);
        let validation = r.validation.unwrap();
        assert!(!validation.pattern_rules.valid);
        assert_eq!(validation.pattern_rules.errors.len(), 1);
        assert_eq!(r.configuration.pattern_rules.len(), 1);
    }

    #[test]
    fn test_negative_window_size_runs_valid_rules() {
        let body = r#"{"action":"detect_pattern","patternRules":[
            {"ruleId":"neg","name":"Neg","pattern":"spike","severity":"high",
             "parameters":{"windowSize":-1,"thresholdPercent":25.0,"minDurationMinutes":5}},
            {"ruleId":"spike_detection","name":"Spike","pattern":"spike","severity":"high",
             "parameters":{"windowSize":5,"thresholdPercent":25.0,"minDurationMinutes":5}}]}"#;
        let mut req: DetectionRequest = serde_json::from_str(body).unwrap();
        req.data = raw_series("orders", &[100.0, 100.0, 100.0, 100.0, 200.0], 2);

        let r = report(engine().handle(req, now(), &CancellationToken::new()).unwrap());
        assert_eq!(r.anomalies.len(), 1);
        let validation = r.validation.unwrap();
        assert!(!validation.pattern_rules.valid);
        assert_eq!(validation.pattern_rules.errors.len(), 1);
        assert!(validation.pattern_rules.errors[0].contains("'neg'"));
        assert_eq!(r.configuration.pattern_rules.len(), 1);
    }

    #[test]
    fn test_comprehensive_filters_old_points() {
        let mut req = DetectionRequest::new(Action::Comprehensive);
        req.time_window = Some(1);
        // Two hours ago is outside a one-hour window.
        req.data = raw_series("risk_level", &[95.0], 1);
        let r = report(engine().handle(req, now(), &CancellationToken::new()).unwrap());
        assert!(r.anomalies.is_empty());
        assert_eq!(r.configuration.time_window, Some(1));
        assert_eq!(r.impact_assessment.unwrap().overall_impact, Severity::Low);
        assert!(r.recommendations.unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_token_aborts() {
        let token = CancellationToken::new();
        token.cancel();
        let mut req = DetectionRequest::new(Action::Comprehensive);
        req.data = raw_series("orders", &[1.0, 2.0, 3.0], 1);
        let err = engine().handle(req, now(), &token).unwrap_err();
        assert!(matches!(err, DetectError::Cancelled));
    }

    #[test]
    fn test_out_of_range_default_window_is_replaced() {
        for hours in [0, 500] {
            let config = DetectionConfig {
                default_time_window_hours: hours,
                ..DetectionConfig::default()
            };
            let engine = DetectionEngine::new(config, Arc::new(SequentialIds::new()));
            assert_eq!(engine.defaults().default_time_window_hours, 24);

            let mut req = DetectionRequest::new(Action::DetectThreshold);
            req.data = raw_series("cost_efficiency", &[100.0], 1);
            assert!(engine.handle(req, now(), &CancellationToken::new()).is_ok());
        }
    }

    #[test]
    fn test_invalid_defaults_are_dropped() {
        let mut config = DetectionConfig::default();
        config.thresholds.push(Threshold::new("inverted", 0.0, 10.0, Severity::Low));
        let engine = DetectionEngine::new(config, Arc::new(SequentialIds::new()));
        assert_eq!(engine.defaults().thresholds.len(), 4);
        assert!(engine.default_validation().thresholds.valid);
    }
}
